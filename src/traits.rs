//! Bulk processor trait definitions.
//!
//! A batcher owns exactly one [`BatchProcessor`]: the user-supplied function
//! that turns an ordered batch of inputs into an ordered batch of outputs.
//! Plain async closures are adapted with [`FnProcessor`].

use crate::BatcherResult;
use async_trait::async_trait;
use std::future::Future;
use std::marker::PhantomData;

/// Trait for implementing bulk processors
///
/// # Example
///
/// ```rust,no_run
/// use dynbatch_core::{BatchProcessor, BatcherResult};
/// use async_trait::async_trait;
///
/// pub struct Embedder;
///
/// #[async_trait]
/// impl BatchProcessor for Embedder {
///     type Input = String;
///     type Output = Vec<f32>;
///
///     async fn process(&self, texts: Vec<String>) -> BatcherResult<Vec<Vec<f32>>> {
///         // One forward pass for the whole batch
///         Ok(texts.iter().map(|t| vec![t.len() as f32]).collect())
///     }
/// }
/// ```
#[async_trait]
pub trait BatchProcessor: Send + Sync + 'static {
    /// One caller's payload
    type Input: Send + 'static;

    /// One caller's result
    type Output: Send + 'static;

    /// Process one closed batch
    ///
    /// Called exactly once per batch, never concurrently with itself unless
    /// `max_concurrent_batches > 1`.
    ///
    /// # Contract
    ///
    /// The returned vector must have the same length as `inputs`, with
    /// `outputs[i]` answering `inputs[i]`. A length mismatch fails every item
    /// of the batch with `BatcherError::ContractViolation`.
    ///
    /// # Errors
    ///
    /// Any error fails the whole batch: every item receives the same
    /// `BatcherError::Processing` failure.
    async fn process(&self, inputs: Vec<Self::Input>) -> BatcherResult<Vec<Self::Output>>;
}

/// Adapter turning an async closure into a [`BatchProcessor`]
pub struct FnProcessor<F, I, O> {
    f: F,
    _marker: PhantomData<fn(I) -> O>,
}

impl<F, I, O> FnProcessor<F, I, O> {
    pub fn new(f: F) -> Self {
        Self {
            f,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut, I, O> BatchProcessor for FnProcessor<F, I, O>
where
    F: Fn(Vec<I>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = BatcherResult<Vec<O>>> + Send + 'static,
    I: Send + 'static,
    O: Send + 'static,
{
    type Input = I;
    type Output = O;

    async fn process(&self, inputs: Vec<I>) -> BatcherResult<Vec<O>> {
        (self.f)(inputs).await
    }
}
