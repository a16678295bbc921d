//! # dynbatch-core
//!
//! Dynamic request batching for bulk processors.
//!
//! Many workloads are far cheaper per item when run in bulk: one GPU forward
//! pass over 32 prompts costs little more than one over a single prompt.
//! This crate lets many independent callers submit one item each while a
//! user-supplied bulk function sees them as batches.
//!
//! ## Overview
//!
//! - Callers [`submit`](Batcher::submit) payloads and await an [`ItemHandle`]
//! - A single coordinator closes a batch when it holds `max_batch_size`
//!   items, or when the oldest item has waited `max_wait_time`
//! - The [`BatchProcessor`] runs once per batch and must return exactly one
//!   output per input, in order
//! - Each caller receives its own output, or the error shared by the whole
//!   batch
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dynbatch_core::{Batcher, BatcherConfig, BatcherResult};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> BatcherResult<()> {
//!     let config = BatcherConfig::new(32, Duration::from_millis(10)).with_name("embedder");
//!
//!     let batcher = Batcher::from_fn(config, |texts: Vec<String>| async move {
//!         // One model call for the whole batch
//!         Ok(texts.iter().map(|t| vec![t.len() as f32]).collect::<Vec<_>>())
//!     })?;
//!
//!     let embedding = batcher.call("hello world".to_string()).await?;
//!     println!("{:?}", embedding);
//!
//!     batcher.shutdown().await
//! }
//! ```
//!
//! ## Features
//!
//! - **Strict FIFO batching**: no item is batched ahead of an older pending one
//! - **Atomic batch failure**: a failed or panicking bulk call fails every item of its batch
//! - **Cancellation and caller timeouts**: withdraw a pending item, or stop waiting without
//!   disturbing its batch
//! - **Pipelining**: optionally execute several batches at once
//! - **Observability**: `metrics` counters and histograms, `tracing` logs, and a
//!   [`BatcherStats`] snapshot
//! - **Configuration**: programmatic, TOML file or `BATCHER_*` environment variables

mod batcher;
mod config;
mod error;
mod metrics;
mod retry;
mod traits;

// Re-export public API
pub use batcher::{Batcher, ItemHandle, ItemId, ItemState};
pub use config::{
    BatcherConfig, RetrySettings, ENV_LOG_LEVEL, ENV_MAX_BATCH_SIZE, ENV_MAX_CONCURRENT_BATCHES,
    ENV_MAX_WAIT_MS, ENV_NAME,
};
pub use error::{BatcherError, BatcherResult};
pub use crate::metrics::BatcherStats;
pub use traits::{BatchProcessor, FnProcessor};

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
