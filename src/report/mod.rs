// Daily report: per-day table over a trailing window plus lifetime totals, rendered as
// markdown and published to a named document. Reads raw and hourly samples as one series.

pub mod format;
mod publish;

pub use publish::{
    Document, DocumentLookup, DocumentPublisher, DocumentSettings, INITIAL_SETTINGS, Permission,
    PublishOutcome, publish_report,
};

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use tracing::{info, instrument};

use crate::config::ReportConfig;
use crate::models::{AggregatedSample, Metric, SeriesEntry};
use crate::sample_store::SampleStore;
use crate::sample_store::aggregation::merge;

const TITLE: &str = "# Queue Statistics\n\n";
const TABLE_HEADER: &str = "Date | Average Queue | Peak Queue | Average Time before action | Max Time before action | Mod Actions\n- | - | - | - | - | -\n";
const FOOTER: &str = "\nThis report only covers actions and queue lengths seen since the service started recording. \
Mod actions include approve/remove actions on queue items only, not actions taken elsewhere. All times in UTC.\n\n";

/// One row of the day table. Delay fields are None on days without handled items.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySummaryRow {
    pub date: NaiveDate,
    pub average_queue_length: u32,
    pub peak_queue_length: u32,
    pub average_action_delay: Option<f64>,
    pub max_action_delay: Option<f64>,
    pub action_count: u32,
}

/// Trailing window start: the later of the earliest queue sample and `now - summary_days`.
fn window_start(queue_lengths: &[SeriesEntry], now: DateTime<Utc>, summary_days: u32) -> DateTime<Utc> {
    let floor = now - TimeDelta::days(summary_days as i64);
    match queue_lengths.iter().map(SeriesEntry::timestamp).min() {
        Some(earliest) => earliest.max(floor),
        None => floor,
    }
}

/// Days covered by the table, oldest first; today is excluded as incomplete.
fn window_days(start: DateTime<Utc>, now: DateTime<Utc>) -> Option<(NaiveDate, NaiveDate)> {
    let first = start.date_naive();
    let last = (now - TimeDelta::days(1)).date_naive();
    (first <= last).then_some((first, last))
}

fn bucket_by_day(entries: &[SeriesEntry]) -> BTreeMap<NaiveDate, Vec<AggregatedSample>> {
    let mut by_day: BTreeMap<NaiveDate, Vec<AggregatedSample>> = BTreeMap::new();
    for e in entries {
        by_day
            .entry(e.timestamp().date_naive())
            .or_default()
            .push(e.to_aggregated());
    }
    by_day
}

/// Rows for each day in the window that has queue samples, most recent first.
pub fn daily_summary(
    queue_lengths: &[SeriesEntry],
    action_delays: &[SeriesEntry],
    now: DateTime<Utc>,
    summary_days: u32,
) -> Vec<DailySummaryRow> {
    let start = window_start(queue_lengths, now, summary_days);
    let Some((first, last)) = window_days(start, now) else {
        return Vec::new();
    };

    let queue_by_day = bucket_by_day(queue_lengths);
    let delays_by_day = bucket_by_day(action_delays);

    let mut rows = Vec::new();
    for (day, samples) in queue_by_day.range(first..=last).rev() {
        let Some(queue) = merge(samples) else {
            continue;
        };
        let delays = delays_by_day.get(day).and_then(|d| merge(d));
        rows.push(DailySummaryRow {
            date: *day,
            average_queue_length: queue.mean_value.round() as u32,
            peak_queue_length: queue.max_value.round() as u32,
            average_action_delay: delays.map(|d| d.mean_value.round()),
            max_action_delay: delays.map(|d| d.max_value),
            action_count: delays.map(|d| d.sample_count).unwrap_or(0),
        });
    }
    rows
}

/// Renders the full report. Same inputs and `now` give the same bytes.
pub fn render_report(
    queue_lengths: &[SeriesEntry],
    action_delays: &[SeriesEntry],
    now: DateTime<Utc>,
    summary_days: u32,
) -> String {
    let mut out = String::from(TITLE);

    let start = window_start(queue_lengths, now, summary_days);
    if let Some((first, _)) = window_days(start, now) {
        // Whole days, matching what the rows aggregate, so no peak bar overflows.
        let peak_in_window = queue_lengths
            .iter()
            .filter(|e| e.timestamp().date_naive() >= first)
            .map(|e| e.to_aggregated().max_value)
            .fold(0.0, f64::max);

        out.push('\n');
        out.push_str(TABLE_HEADER);
        for row in daily_summary(queue_lengths, action_delays, now, summary_days) {
            out.push_str(&format!(
                "{} | {} | {} | {} | {} | {}\n",
                format::day_label(row.date),
                format::with_bar(row.average_queue_length, peak_in_window / 2.0),
                format::with_bar(row.peak_queue_length, peak_in_window),
                row.average_action_delay
                    .map(format::duration)
                    .unwrap_or_else(|| "-".to_string()),
                row.max_action_delay
                    .map(format::duration)
                    .unwrap_or_else(|| "-".to_string()),
                row.action_count,
            ));
        }
    }

    let earliest = queue_lengths.iter().map(SeriesEntry::timestamp).min();
    match earliest {
        Some(ts) => out.push_str(&format!("\nSince {}:\n\n", format::utc_timestamp(ts))),
        None => out.push_str("\nSince recording began:\n\n"),
    }

    let queue_samples: Vec<AggregatedSample> =
        queue_lengths.iter().map(SeriesEntry::to_aggregated).collect();
    match merge(&queue_samples) {
        Some(lifetime) => {
            out.push_str(&format!(
                "* Average queue length: {}\n",
                lifetime.mean_value.round() as u32
            ));
            // First entry reaching the peak, so ties resolve the same way every run. A rolled-up
            // peak is reported at its hour's start.
            if let Some(peak) = queue_lengths
                .iter()
                .find(|e| e.to_aggregated().max_value >= lifetime.max_value)
            {
                out.push_str(&format!(
                    "* Peak queue length: {} at {}\n",
                    lifetime.max_value.round() as u32,
                    format::utc_timestamp(peak.timestamp())
                ));
            }
        }
        None => out.push_str("* No queue lengths recorded.\n"),
    }

    let delay_samples: Vec<AggregatedSample> =
        action_delays.iter().map(SeriesEntry::to_aggregated).collect();
    match merge(&delay_samples) {
        Some(lifetime) => {
            out.push_str(&format!(
                "* Mod actions: {} (excludes automated actions)\n",
                lifetime.sample_count
            ));
            if let Some(ts) = earliest {
                let hours = (now - ts).num_hours().max(1) as f64;
                out.push_str(&format!(
                    "* Average actions/day: {}\n",
                    (lifetime.sample_count as f64 / hours * 24.0).round() as u64
                ));
            }
            out.push_str(&format!(
                "* Average time to handle a queue item: {}\n",
                format::duration(lifetime.mean_value)
            ));
            out.push_str(&format!(
                "* Maximum time to handle a queue item: {}\n",
                format::duration(lifetime.max_value)
            ));
        }
        None => out.push_str("* No mod actions recorded.\n"),
    }

    out.push_str(FOOTER);
    out
}

/// Loads both series, renders and publishes. Runs once a day.
#[instrument(skip_all, fields(job = "build_report", document = %config.document_name))]
pub async fn run_report(
    store: &SampleStore,
    publisher: &dyn DocumentPublisher,
    config: &ReportConfig,
    now: DateTime<Utc>,
) -> anyhow::Result<PublishOutcome> {
    let queue_lengths = store.load_series(Metric::QueueLength).await?;
    let action_delays = store.load_series(Metric::ActionDelay).await?;
    if queue_lengths.is_empty() {
        info!("no queue lengths recorded yet; publishing empty report");
    }
    let content = render_report(&queue_lengths, &action_delays, now, config.summary_days);
    publish_report(publisher, &config.document_name, &content).await
}
