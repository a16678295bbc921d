//! Result dispatcher: route batch outcomes back to item slots.

use super::handle::{Fill, ResultSlot};
use crate::BatcherResult;
use std::sync::Arc;
use tracing::warn;

/// Tally of one dispatch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct DispatchReport {
    pub(crate) abandoned: usize,
}

/// Deliver a batch outcome to its slots, in batch order.
///
/// A success hands `outputs[i]` to `slots[i]`; a failure hands a clone of
/// the same error to every slot. The executor guarantees equal lengths on
/// success.
pub(crate) fn dispatch<O>(
    slots: Vec<Arc<ResultSlot<O>>>,
    outcome: BatcherResult<Vec<O>>,
) -> DispatchReport {
    let mut report = DispatchReport::default();

    match outcome {
        Ok(outputs) => {
            debug_assert_eq!(slots.len(), outputs.len());
            for (slot, output) in slots.iter().zip(outputs) {
                report.tally(slot.fill(Ok(output)));
            }
        }
        Err(err) => {
            for slot in &slots {
                report.tally(slot.fill(Err(err.clone())));
            }
        }
    }

    report
}

impl DispatchReport {
    fn tally(&mut self, fill: Fill) {
        match fill {
            Fill::Delivered => {}
            Fill::Abandoned => self.abandoned += 1,
            Fill::AlreadyFilled => warn!("result slot was already filled; dropping duplicate"),
        }
    }
}
