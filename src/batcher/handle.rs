//! Item identity, write-once result slots and caller handles.

use crate::{BatcherError, BatcherResult};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::oneshot;

/// Identifier of one submitted item, unique within its batcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(u64);

impl ItemId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item-{}", self.0)
    }
}

/// Lifecycle of an item: `Pending -> Batched -> Completed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    /// Waiting in the pending set; may still be cancelled
    Pending,
    /// Part of a closed batch; will complete with that batch
    Batched,
    /// Result (or error) has been written; terminal
    Completed,
}

const PENDING: u8 = 0;
const BATCHED: u8 = 1;
const COMPLETED: u8 = 2;

/// Outcome of writing into a [`ResultSlot`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fill {
    /// The waiting handle received the result
    Delivered,
    /// The result was written but the handle had been dropped
    Abandoned,
    /// The slot already held a result; nothing was written
    AlreadyFilled,
}

/// Write-once result slot shared by the batcher and one [`ItemHandle`]
pub(crate) struct ResultSlot<O> {
    state: AtomicU8,
    sender: Mutex<Option<oneshot::Sender<BatcherResult<O>>>>,
}

impl<O> ResultSlot<O> {
    pub(crate) fn new() -> (Arc<Self>, oneshot::Receiver<BatcherResult<O>>) {
        let (tx, rx) = oneshot::channel();
        let slot = Arc::new(Self {
            state: AtomicU8::new(PENDING),
            sender: Mutex::new(Some(tx)),
        });
        (slot, rx)
    }

    pub(crate) fn state(&self) -> ItemState {
        match self.state.load(Ordering::Acquire) {
            PENDING => ItemState::Pending,
            BATCHED => ItemState::Batched,
            _ => ItemState::Completed,
        }
    }

    /// Move `Pending -> Batched`. Must be called under the pending-set lock.
    pub(crate) fn mark_batched(&self) {
        let _ = self
            .state
            .compare_exchange(PENDING, BATCHED, Ordering::AcqRel, Ordering::Acquire);
    }

    /// Write the result; only the first call has any effect
    pub(crate) fn fill(&self, result: BatcherResult<O>) -> Fill {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match sender {
            Some(tx) => {
                self.state.store(COMPLETED, Ordering::Release);
                match tx.send(result) {
                    Ok(()) => Fill::Delivered,
                    Err(_) => Fill::Abandoned,
                }
            }
            None => Fill::AlreadyFilled,
        }
    }
}

/// Withdraws a still-pending item from its batcher
pub(crate) trait Withdraw: Send + Sync {
    fn withdraw(&self, id: ItemId) -> bool;
}

/// Caller's handle to one submitted item
///
/// A handle may be waited on repeatedly until it returns the result once.
/// Dropping the handle does not cancel the item; its result is discarded
/// when the batch completes.
pub struct ItemHandle<O> {
    id: ItemId,
    slot: Arc<ResultSlot<O>>,
    /// `None` once the result has been returned
    rx: Option<oneshot::Receiver<BatcherResult<O>>>,
    owner: Weak<dyn Withdraw>,
}

impl<O> ItemHandle<O> {
    pub(crate) fn new(
        id: ItemId,
        slot: Arc<ResultSlot<O>>,
        rx: oneshot::Receiver<BatcherResult<O>>,
        owner: Weak<dyn Withdraw>,
    ) -> Self {
        Self {
            id,
            slot,
            rx: Some(rx),
            owner,
        }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn state(&self) -> ItemState {
        self.slot.state()
    }

    /// Withdraw the item if it has not been batched yet.
    ///
    /// Returns `true` when the item was removed; [`wait`](Self::wait) then
    /// yields `BatcherError::Cancelled`. Returns `false` once the item is
    /// batched (it completes with its batch) or already completed.
    pub fn cancel(&self) -> bool {
        match self.owner.upgrade() {
            Some(owner) => owner.withdraw(self.id),
            None => false,
        }
    }

    /// Wait for the item's result
    pub async fn wait(mut self) -> BatcherResult<O> {
        let Some(rx) = self.rx.take() else {
            return Err(BatcherError::ResultTaken { item: self.id });
        };
        match rx.await {
            Ok(result) => result,
            Err(_) => Err(BatcherError::Shutdown),
        }
    }

    /// Wait for the item's result for at most `timeout`.
    ///
    /// On expiry only this wait ends: the item stays in its batch, and the
    /// handle can wait again or [`cancel`](Self::cancel).
    pub async fn wait_timeout(&mut self, timeout: Duration) -> BatcherResult<O> {
        let Some(rx) = self.rx.as_mut() else {
            return Err(BatcherError::ResultTaken { item: self.id });
        };
        let received = match tokio::time::timeout(timeout, rx).await {
            Ok(received) => received,
            Err(_) => return Err(BatcherError::Timeout(timeout)),
        };

        self.rx = None;
        match received {
            Ok(result) => result,
            Err(_) => Err(BatcherError::Shutdown),
        }
    }
}

impl<O> fmt::Debug for ItemHandle<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemHandle")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}
