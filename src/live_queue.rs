// In-process queue state fed by item events. Items enter when reported/queued and leave when
// handled; handling a known item records its latency into the pending batch the sampler drains.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{ActorKind, HandledAction, QueueItem};
use crate::sampler::QueueSource;

#[derive(Default)]
struct State {
    items: BTreeMap<String, QueueItem>,
    pending: Vec<HandledAction>,
}

#[derive(Default)]
pub struct LiveQueue {
    state: Mutex<State>,
}

impl LiveQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Adds an item. An item already in the queue keeps its original queued time.
    pub fn enqueue(&self, item: QueueItem) {
        self.lock().items.entry(item.item_id.clone()).or_insert(item);
    }

    /// Removes an item and records the action. Returns None for items never seen queued.
    pub fn resolve(
        &self,
        item_id: &str,
        actor: ActorKind,
        handled_at: DateTime<Utc>,
    ) -> Option<HandledAction> {
        let mut state = self.lock();
        let item = state.items.remove(item_id)?;
        let delay = (handled_at - item.queued_at).num_milliseconds().max(0) as f64 / 1000.0;
        let action = HandledAction {
            item_id: item.item_id,
            actor,
            handled_at,
            delay_secs: delay,
        };
        state.pending.push(action.clone());
        Some(action)
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<QueueItem> {
        let mut items: Vec<QueueItem> = self.lock().items.values().cloned().collect();
        items.sort_by(|a, b| a.queued_at.cmp(&b.queued_at).then(a.item_id.cmp(&b.item_id)));
        items
    }
}

#[async_trait]
impl QueueSource for LiveQueue {
    async fn queue_items(&self) -> anyhow::Result<Vec<QueueItem>> {
        Ok(self.snapshot())
    }

    async fn drain_handled(&self) -> anyhow::Result<Vec<HandledAction>> {
        Ok(std::mem::take(&mut self.lock().pending))
    }
}
