//! Pending queue: arrived-but-unbatched items in arrival order.

use super::handle::{ItemId, ResultSlot};
use super::policy::Trigger;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tokio::time::Instant;

/// One submitted item waiting for a batch
pub(crate) struct PendingItem<I, O> {
    pub(crate) id: ItemId,
    pub(crate) payload: I,
    pub(crate) arrived_at: Instant,
    pub(crate) slot: Arc<ResultSlot<O>>,
}

/// FIFO of pending items
///
/// Ids and arrival timestamps are assigned by [`PendingSet::push`] so both
/// are monotonic in queue order.
pub(crate) struct PendingSet<I, O> {
    items: VecDeque<PendingItem<I, O>>,
    next_id: u64,
}

impl<I, O> PendingSet<I, O> {
    pub(crate) fn new() -> Self {
        Self {
            items: VecDeque::new(),
            next_id: 0,
        }
    }

    /// Enqueue a payload stamped with the current time
    pub(crate) fn push(&mut self, payload: I, slot: Arc<ResultSlot<O>>) -> ItemId {
        let id = ItemId::new(self.next_id);
        self.next_id += 1;
        self.items.push_back(PendingItem {
            id,
            payload,
            arrived_at: Instant::now(),
            slot,
        });
        id
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn oldest_arrival(&self) -> Option<Instant> {
        self.items.front().map(|item| item.arrived_at)
    }

    /// Remove a still-pending item by id
    pub(crate) fn remove(&mut self, id: ItemId) -> Option<PendingItem<I, O>> {
        let index = self.items.binary_search_by_key(&id, |item| item.id).ok()?;
        self.items.remove(index)
    }

    /// Remove up to `max` of the oldest items, preserving arrival order
    pub(crate) fn take_oldest(&mut self, max: usize) -> Vec<PendingItem<I, O>> {
        let count = max.min(self.items.len());
        self.items.drain(..count).collect()
    }
}

/// Identifier of one closed batch, unique within its batcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct BatchId(pub(crate) u64);

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "batch-{}", self.0)
    }
}

/// A closed batch; its membership never changes after formation
pub(crate) struct Batch<I, O> {
    pub(crate) id: BatchId,
    pub(crate) trigger: Trigger,
    pub(crate) items: Vec<PendingItem<I, O>>,
}

impl<I, O> Batch<I, O> {
    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    /// Split into payloads for the executor and slots for the dispatcher,
    /// both in batch order
    pub(crate) fn into_parts(self) -> (Vec<I>, Vec<Arc<ResultSlot<O>>>) {
        self.items
            .into_iter()
            .map(|item| (item.payload, item.slot))
            .unzip()
    }
}
