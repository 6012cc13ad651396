// Threshold alerts, evaluated after every queue sample. All triggered conditions go out as a
// single notification; delivery failures are logged and never retried.

mod discord;

pub use discord::DiscordWebhook;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::AlertConfig;
use crate::models::QueueSnapshot;

pub const ALERT_TITLE: &str = "Review queue needs attention";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertCondition {
    QueueSize {
        queue_length: u32,
        threshold: u32,
    },
    StaleItem {
        oldest_age_hours: i64,
        threshold_hours: u32,
    },
    PostShare {
        post_id: String,
        item_count: u32,
        percent: f64,
        threshold: f64,
    },
}

impl fmt::Display for AlertCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertCondition::QueueSize {
                queue_length,
                threshold,
            } => write!(
                f,
                "Queue size is {} (threshold {})",
                queue_length, threshold
            ),
            AlertCondition::StaleItem {
                oldest_age_hours,
                threshold_hours,
            } => write!(
                f,
                "Oldest queue item is {} hours old (threshold {} hours)",
                oldest_age_hours, threshold_hours
            ),
            AlertCondition::PostShare {
                post_id,
                item_count,
                percent,
                ..
            } => write!(
                f,
                "Post {} has {} items in the queue ({:.0}% of the queue)",
                post_id, item_count, percent
            ),
        }
    }
}

/// The message handed to a notifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub title: String,
    pub conditions: Vec<String>,
    pub role_id: Option<String>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, alert: &Alert) -> anyhow::Result<()>;
}

/// Conditions met by `snapshot`. Empty when alerts are disabled.
pub fn evaluate(
    config: &AlertConfig,
    snapshot: &QueueSnapshot,
    now: DateTime<Utc>,
) -> Vec<AlertCondition> {
    if !config.enabled {
        return Vec::new();
    }
    let mut conditions = Vec::new();

    if config.queue_size_threshold > 0 && snapshot.queue_length >= config.queue_size_threshold {
        conditions.push(AlertCondition::QueueSize {
            queue_length: snapshot.queue_length,
            threshold: config.queue_size_threshold,
        });
    }

    if config.item_age_threshold_hours > 0 {
        let threshold = TimeDelta::hours(config.item_age_threshold_hours as i64);
        let oldest = snapshot.items.iter().map(|i| now - i.queued_at).max();
        if let Some(age) = oldest.filter(|age| *age > threshold) {
            conditions.push(AlertCondition::StaleItem {
                oldest_age_hours: age.num_hours(),
                threshold_hours: config.item_age_threshold_hours,
            });
        }
    }

    if config.per_post_percent_threshold > 0.0 && snapshot.queue_length > 0 {
        let mut per_post: BTreeMap<&str, u32> = BTreeMap::new();
        for item in &snapshot.items {
            *per_post.entry(item.post_id.as_str()).or_default() += 1;
        }
        for (post_id, item_count) in per_post {
            let percent = item_count as f64 * 100.0 / snapshot.queue_length as f64;
            if percent > config.per_post_percent_threshold {
                conditions.push(AlertCondition::PostShare {
                    post_id: post_id.to_string(),
                    item_count,
                    percent,
                    threshold: config.per_post_percent_threshold,
                });
            }
        }
    }

    conditions
}

/// Evaluates and, when anything triggered, sends one notification. Returns the alert that was
/// attempted, if any.
pub async fn check_and_notify(
    config: &AlertConfig,
    snapshot: &QueueSnapshot,
    notifier: Option<&dyn Notifier>,
    now: DateTime<Utc>,
) -> Option<Alert> {
    let conditions = evaluate(config, snapshot, now);
    if conditions.is_empty() {
        return None;
    }
    let alert = Alert {
        title: ALERT_TITLE.to_string(),
        conditions: conditions.iter().map(ToString::to_string).collect(),
        role_id: config.role_id.clone(),
    };
    let Some(notifier) = notifier else {
        debug!(
            conditions = alert.conditions.len(),
            "alert triggered but no webhook configured"
        );
        return Some(alert);
    };
    match notifier.send(&alert).await {
        Ok(()) => info!(conditions = alert.conditions.len(), "alert sent"),
        Err(e) => warn!(error = %e, operation = "send_alert", "alert delivery failed"),
    }
    Some(alert)
}
