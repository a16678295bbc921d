//! Dynamic request batching.
//!
//! This module folds the four stages of a batcher into one front-end:
//! - `pending`: arrived-but-unbatched items, strictly FIFO
//! - `policy`: closes a batch on `max_batch_size` or `max_wait_time`
//! - `executor`: one bulk-processor call per batch, length-checked
//! - `dispatch`: routes each result (or the shared failure) to its caller
//!
//! [`Batcher`] ties them together around a single coordinating task.

mod coordinator;
mod dispatch;
mod executor;
mod handle;
mod pending;
mod policy;

pub use coordinator::Batcher;
pub use handle::{ItemHandle, ItemId, ItemState};

pub(crate) use policy::Trigger;
