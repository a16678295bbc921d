//! Error types for batcher operations.

use crate::batcher::ItemId;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Result type for batcher operations
pub type BatcherResult<T> = Result<T, BatcherError>;

/// Error types surfaced to callers of a batcher
///
/// Errors are `Clone` because a single batch failure is delivered to every
/// item of that batch.
#[derive(Error, Debug, Clone)]
pub enum BatcherError {
    /// The bulk processor returned a result sequence whose length differs
    /// from the batch it was given
    #[error("Contract violation: bulk processor returned {actual} results for a batch of {expected}")]
    ContractViolation { expected: usize, actual: usize },

    /// The bulk processor failed (or panicked) for the whole batch
    #[error("Processing failure: {message}")]
    Processing {
        message: String,
        #[source]
        source: Option<Arc<dyn std::error::Error + Send + Sync>>,
    },

    /// The caller withdrew the item before it was batched
    #[error("Item {item} was cancelled before it was batched")]
    Cancelled { item: ItemId },

    /// The caller's own wait elapsed; the item keeps progressing
    #[error("Timed out after {0:?} waiting for result")]
    Timeout(Duration),

    /// The handle already returned this item's result
    #[error("Result of {item} was already taken")]
    ResultTaken { item: ItemId },

    /// The batcher no longer accepts or completes work
    #[error("Batcher is shut down")]
    Shutdown,

    /// Configuration error - detected at startup
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl BatcherError {
    /// Check if resubmitting the same payload may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, BatcherError::Processing { .. })
    }

    pub fn is_contract_violation(&self) -> bool {
        matches!(self, BatcherError::ContractViolation { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, BatcherError::Cancelled { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, BatcherError::Timeout(_))
    }

    /// Stable label for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            BatcherError::ContractViolation { .. } => "contract_violation",
            BatcherError::Processing { .. } => "processing",
            BatcherError::Cancelled { .. } => "cancelled",
            BatcherError::Timeout(_) => "timeout",
            BatcherError::ResultTaken { .. } => "result_taken",
            BatcherError::Shutdown => "shutdown",
            BatcherError::Configuration(_) => "configuration",
        }
    }

    /// Create a processing failure from a message
    pub fn processing(message: impl Into<String>) -> Self {
        BatcherError::Processing {
            message: message.into(),
            source: None,
        }
    }

    /// Create a processing failure with source
    pub fn processing_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        BatcherError::Processing {
            message: message.into(),
            source: Some(Arc::new(source)),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        BatcherError::Configuration(message.into())
    }

    /// Normalize an error returned by a bulk processor.
    ///
    /// Processing failures and contract violations pass through; any other
    /// kind is wrapped so the batch still fails as a processing failure.
    pub(crate) fn into_processing_failure(self) -> Self {
        match self {
            err @ (BatcherError::Processing { .. } | BatcherError::ContractViolation { .. }) => {
                err
            }
            other => BatcherError::Processing {
                message: other.to_string(),
                source: Some(Arc::new(other)),
            },
        }
    }
}
