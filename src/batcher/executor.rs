//! Batch executor: one bulk-processor call per closed batch.

use crate::{BatchProcessor, BatcherError, BatcherResult};
use std::sync::Arc;
use tracing::error;

pub(crate) struct BatchExecutor<P: BatchProcessor> {
    processor: Arc<P>,
}

impl<P: BatchProcessor> BatchExecutor<P> {
    pub(crate) fn new(processor: Arc<P>) -> Self {
        Self { processor }
    }

    /// Run the processor once over `inputs`.
    ///
    /// Outputs are returned only when they line up one-to-one with the
    /// inputs. Processor errors, panics and length mismatches all become a
    /// single error that fails the whole batch.
    pub(crate) async fn execute(&self, inputs: Vec<P::Input>) -> BatcherResult<Vec<P::Output>> {
        let expected = inputs.len();
        let processor = Arc::clone(&self.processor);

        // Own task so a panicking processor surfaces as a JoinError
        let outcome = tokio::spawn(async move { processor.process(inputs).await }).await;

        match outcome {
            Ok(Ok(outputs)) if outputs.len() == expected => Ok(outputs),
            Ok(Ok(outputs)) => {
                error!(
                    expected,
                    actual = outputs.len(),
                    "bulk processor broke the length contract"
                );
                Err(BatcherError::ContractViolation {
                    expected,
                    actual: outputs.len(),
                })
            }
            Ok(Err(e)) => Err(e.into_processing_failure()),
            Err(join_err) if join_err.is_panic() => {
                error!("bulk processor panicked");
                Err(BatcherError::processing("bulk processor panicked"))
            }
            Err(join_err) => Err(BatcherError::processing_with_source(
                "bulk processor task was aborted",
                join_err,
            )),
        }
    }
}
