// Live queue shapes: items waiting for review and completed handling actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub item_id: String,
    /// Post the item belongs to (the post itself or a comment under it).
    pub post_id: String,
    pub queued_at: DateTime<Utc>,
}

/// Who handled a queue item. Automated actors never count as qualifying actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorKind {
    Moderator,
    Automated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandledAction {
    pub item_id: String,
    pub actor: ActorKind,
    pub handled_at: DateTime<Utc>,
    pub delay_secs: f64,
}

/// Queue state at one instant, as seen by the alert evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    pub queue_length: u32,
    pub items: Vec<QueueItem>,
}
