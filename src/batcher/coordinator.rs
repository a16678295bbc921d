//! Batcher front-end and its coordinating task.
//!
//! One coordinator task per batcher owns batch formation: it sleeps until
//! either trigger of the [`FormationPolicy`] fires, closes a batch, and
//! hands it to a spawned execution task. Callers only touch the pending set
//! briefly under its lock to submit or withdraw.

use super::dispatch::dispatch;
use super::executor::BatchExecutor;
use super::handle::{ItemHandle, ItemId, ResultSlot, Withdraw};
use super::pending::{Batch, BatchId, PendingSet};
use super::policy::{Decision, FormationPolicy, Trigger};
use crate::metrics::{BatchTimer, BatcherMetrics};
use crate::retry::{RetryConfig, RetryStrategy};
use crate::{
    BatchProcessor, BatcherConfig, BatcherError, BatcherResult, BatcherStats, FnProcessor,
};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

/// Dynamic request batcher
///
/// Groups individually submitted payloads into batches for one
/// [`BatchProcessor`] and hands each caller its own result.
///
/// Must be created inside a Tokio runtime. Dropping the batcher stops new
/// submissions; pending items are still flushed in the background.
///
/// # Example
///
/// ```rust,no_run
/// use dynbatch_core::{Batcher, BatcherConfig, BatcherResult};
/// use std::time::Duration;
///
/// # async fn run() -> BatcherResult<()> {
/// let config = BatcherConfig::new(16, Duration::from_millis(20)).with_name("scorer");
/// let batcher = Batcher::from_fn(config, |texts: Vec<String>| async move {
///     Ok(texts.iter().map(|t| t.len()).collect::<Vec<_>>())
/// })?;
///
/// let len = batcher.call("hello".to_string()).await?;
/// assert_eq!(len, 5);
/// batcher.shutdown().await
/// # }
/// ```
pub struct Batcher<P: BatchProcessor> {
    shared: Arc<Shared<P>>,
    coordinator: Mutex<Option<JoinHandle<()>>>,
}

struct Shared<P: BatchProcessor> {
    name: String,
    policy: FormationPolicy,
    max_concurrent_batches: usize,
    pending: Mutex<PendingSet<P::Input, P::Output>>,
    /// Set under the pending lock so every accepted item is flushed
    closed: AtomicBool,
    wakeup: Notify,
    in_flight: Arc<Semaphore>,
    next_batch_id: AtomicU64,
    executor: BatchExecutor<P>,
    metrics: BatcherMetrics,
    retry_strategy: RetryStrategy,
}

impl<P: BatchProcessor> Batcher<P> {
    /// Create a batcher around `processor` and start its coordinator
    pub fn new(config: BatcherConfig, processor: P) -> BatcherResult<Self> {
        config.validate()?;

        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            BatcherError::config(format!("Batcher must be created inside a Tokio runtime: {}", e))
        })?;

        Self::init_tracing(&config);

        info!(
            batcher = %config.name,
            max_batch_size = config.max_batch_size,
            max_wait_ms = config.max_wait_ms,
            max_concurrent_batches = config.max_concurrent_batches,
            "Initializing batcher"
        );

        let retry_strategy = RetryStrategy::new(RetryConfig::new(
            config.retry.max_retries,
            config.retry.retry_backoff_ms,
            config.retry.max_backoff_ms,
        ));

        let shared = Arc::new(Shared {
            policy: FormationPolicy::new(config.max_batch_size, config.max_wait_time()),
            max_concurrent_batches: config.max_concurrent_batches,
            pending: Mutex::new(PendingSet::new()),
            closed: AtomicBool::new(false),
            wakeup: Notify::new(),
            in_flight: Arc::new(Semaphore::new(config.max_concurrent_batches)),
            next_batch_id: AtomicU64::new(0),
            executor: BatchExecutor::new(Arc::new(processor)),
            metrics: BatcherMetrics::new(config.name.clone()),
            retry_strategy,
            name: config.name,
        });

        let coordinator = runtime.spawn(Shared::run(Arc::clone(&shared)));

        Ok(Self {
            shared,
            coordinator: Mutex::new(Some(coordinator)),
        })
    }

    /// Submit one payload; never blocks.
    ///
    /// Returns `BatcherError::Shutdown` once [`shutdown`](Self::shutdown)
    /// has begun.
    pub fn submit(&self, payload: P::Input) -> BatcherResult<ItemHandle<P::Output>> {
        let (slot, rx) = ResultSlot::new();

        let (id, depth) = {
            let mut pending = self.shared.lock_pending();
            if self.shared.closed.load(Ordering::Acquire) {
                return Err(BatcherError::Shutdown);
            }
            let id = pending.push(payload, Arc::clone(&slot));
            self.shared.metrics.set_pending(pending.len());
            (id, pending.len())
        };

        self.shared.metrics.record_submitted();
        self.shared.wakeup.notify_one();
        trace!(batcher = %self.shared.name, item = %id, pending = depth, "item submitted");

        let owner: Arc<dyn Withdraw> = self.shared.clone();
        Ok(ItemHandle::new(id, slot, rx, Arc::downgrade(&owner)))
    }

    /// Submit and wait for the result
    pub async fn call(&self, payload: P::Input) -> BatcherResult<P::Output> {
        self.submit(payload)?.wait().await
    }

    /// Submit and wait at most `timeout` for the result
    pub async fn call_timeout(
        &self,
        payload: P::Input,
        timeout: Duration,
    ) -> BatcherResult<P::Output> {
        let mut handle = self.submit(payload)?;
        handle.wait_timeout(timeout).await
    }

    /// Submit, resubmitting a copy of the payload after retryable failures.
    ///
    /// Retries happen here in the caller, never inside the batcher: each
    /// attempt is a fresh item that joins the back of the queue.
    pub async fn call_with_retry(&self, payload: P::Input) -> BatcherResult<P::Output>
    where
        P::Input: Clone,
    {
        let strategy = &self.shared.retry_strategy;
        let mut attempt = 0;

        loop {
            match self.call(payload.clone()).await {
                Ok(output) => return Ok(output),
                Err(e) if e.is_retryable() && strategy.should_retry(attempt) => {
                    attempt += 1;
                    self.shared.metrics.record_retry();

                    let backoff = strategy.calculate_backoff(attempt);
                    warn!(
                        batcher = %self.shared.name,
                        "Retry attempt {} after {:?} - error: {}",
                        attempt, backoff, e
                    );

                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Stop accepting submissions, flush pending items and wait for every
    /// in-flight batch to finish
    pub async fn shutdown(&self) -> BatcherResult<()> {
        info!(batcher = %self.shared.name, "Shutting down batcher");
        self.shared.begin_shutdown();

        let coordinator = self
            .coordinator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = coordinator {
            handle.await.map_err(|e| {
                BatcherError::processing_with_source("batch coordinator task failed", e)
            })?;
        }

        let permits = self.shared.max_concurrent_batches as u32;
        let _drained = self
            .shared
            .in_flight
            .acquire_many(permits)
            .await
            .map_err(|_| BatcherError::Shutdown)?;

        info!(batcher = %self.shared.name, "Batcher stopped");
        Ok(())
    }

    /// Items waiting to be batched
    pub fn pending_len(&self) -> usize {
        self.shared.lock_pending().len()
    }

    pub fn stats(&self) -> BatcherStats {
        self.shared.metrics.snapshot()
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Initialize tracing/logging
    fn init_tracing(config: &BatcherConfig) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));

        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .ok(); // Ignore if already initialized
    }
}

impl<F, Fut, I, O> Batcher<FnProcessor<F, I, O>>
where
    F: Fn(Vec<I>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = BatcherResult<Vec<O>>> + Send + 'static,
    I: Send + 'static,
    O: Send + 'static,
{
    /// Create a batcher around an async bulk function
    pub fn from_fn(config: BatcherConfig, f: F) -> BatcherResult<Self> {
        Self::new(config, FnProcessor::new(f))
    }
}

impl<P: BatchProcessor> fmt::Debug for Batcher<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Batcher")
            .field("name", &self.shared.name)
            .field("policy", &self.shared.policy)
            .field("pending", &self.pending_len())
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

impl<P: BatchProcessor> Drop for Batcher<P> {
    fn drop(&mut self) {
        self.shared.begin_shutdown();
    }
}

impl<P: BatchProcessor> Shared<P> {
    fn lock_pending(&self) -> MutexGuard<'_, PendingSet<P::Input, P::Output>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin_shutdown(&self) {
        {
            let _pending = self.lock_pending();
            self.closed.store(true, Ordering::Release);
        }
        self.wakeup.notify_one();
    }

    /// Coordinator loop: take an execution slot, wait for the next batch,
    /// run it in the background
    async fn run(self: Arc<Self>) {
        debug!(batcher = %self.name, "Batch coordinator started");

        loop {
            let permit = match Arc::clone(&self.in_flight).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            let Some(batch) = self.next_batch().await else {
                break;
            };

            let shared = Arc::clone(&self);
            tokio::spawn(async move {
                shared.execute_batch(batch).await;
                drop(permit);
            });
        }

        debug!(batcher = %self.name, "Batch coordinator stopped");
    }

    /// Wait until a batch can be closed; `None` once shut down and drained
    async fn next_batch(&self) -> Option<Batch<P::Input, P::Output>> {
        loop {
            let notified = self.wakeup.notified();

            let deadline = {
                let mut pending = self.lock_pending();
                let now = Instant::now();
                let closed = self.closed.load(Ordering::Acquire);

                let decision = if closed && !pending.is_empty() {
                    Decision::Close(Trigger::Flush)
                } else {
                    self.policy
                        .evaluate(pending.len(), pending.oldest_arrival(), now)
                };

                match decision {
                    Decision::Close(trigger) => {
                        return Some(self.close_batch(&mut pending, trigger, now));
                    }
                    Decision::Idle if closed => return None,
                    Decision::Idle => None,
                    Decision::WaitUntil(deadline) => Some(deadline),
                }
            };

            match deadline {
                Some(deadline) => {
                    tokio::select! {
                        _ = notified => {}
                        _ = tokio::time::sleep_until(deadline) => {}
                    }
                }
                None => notified.await,
            }
        }
    }

    /// Move the oldest items into a new batch. Caller holds the pending lock.
    fn close_batch(
        &self,
        pending: &mut PendingSet<P::Input, P::Output>,
        trigger: Trigger,
        now: Instant,
    ) -> Batch<P::Input, P::Output> {
        let items = pending.take_oldest(self.policy.max_batch_size());
        for item in &items {
            item.slot.mark_batched();
            self.metrics
                .record_queue_wait(now.saturating_duration_since(item.arrived_at));
        }

        let batch = Batch {
            id: BatchId(self.next_batch_id.fetch_add(1, Ordering::Relaxed)),
            trigger,
            items,
        };

        self.metrics.record_batch_formed(trigger, batch.len());
        self.metrics.set_pending(pending.len());
        debug!(
            batcher = %self.name,
            batch_id = %batch.id,
            size = batch.len(),
            trigger = %trigger,
            remaining = pending.len(),
            "batch closed"
        );

        batch
    }

    async fn execute_batch(&self, batch: Batch<P::Input, P::Output>) {
        let batch_id = batch.id;
        let trigger = batch.trigger;
        let size = batch.len();
        let (inputs, slots) = batch.into_parts();

        let timer = BatchTimer::start(&self.metrics);
        let outcome = self.executor.execute(inputs).await;
        let elapsed = timer.finish();

        match &outcome {
            Ok(_) => {
                self.metrics.record_batch_succeeded(size);
                debug!(
                    batcher = %self.name,
                    batch_id = %batch_id,
                    size,
                    trigger = %trigger,
                    ?elapsed,
                    "batch completed"
                );
            }
            Err(e) => {
                self.metrics.record_batch_failed(e.kind(), size);
                warn!(batcher = %self.name, batch_id = %batch_id, size, error = %e, "batch failed");
            }
        }

        let report = dispatch(slots, outcome);
        self.metrics.record_abandoned(report.abandoned);
        if report.abandoned > 0 {
            debug!(
                batcher = %self.name,
                batch_id = %batch_id,
                abandoned = report.abandoned,
                "results dropped for callers that stopped waiting"
            );
        }
    }
}

impl<P: BatchProcessor> Withdraw for Shared<P> {
    fn withdraw(&self, id: ItemId) -> bool {
        let removed = {
            let mut pending = self.lock_pending();
            let removed = pending.remove(id);
            if removed.is_some() {
                self.metrics.set_pending(pending.len());
            }
            removed
        };

        let Some(item) = removed else {
            return false;
        };

        item.slot.fill(Err(BatcherError::Cancelled { item: id }));
        self.metrics.record_cancelled();
        // Deadline may have moved if the oldest item left
        self.wakeup.notify_one();
        trace!(batcher = %self.name, item = %id, "item cancelled");
        true
    }
}
