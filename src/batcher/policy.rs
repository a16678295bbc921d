//! Batch formation policy: when does the next batch close?

use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Why a batch was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Trigger {
    /// The pending set reached `max_batch_size`
    Size,
    /// The oldest pending item waited `max_wait_time`
    Wait,
    /// The batcher is shutting down and drains what is left
    Flush,
}

impl Trigger {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Trigger::Size => "size",
            Trigger::Wait => "wait",
            Trigger::Flush => "flush",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the coordinator should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decision {
    /// Close a batch now
    Close(Trigger),
    /// Nothing to close before this instant (unless more items arrive)
    WaitUntil(Instant),
    /// Nothing pending; sleep until the next arrival
    Idle,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct FormationPolicy {
    max_batch_size: usize,
    max_wait: Duration,
}

impl FormationPolicy {
    pub(crate) fn new(max_batch_size: usize, max_wait: Duration) -> Self {
        Self {
            max_batch_size: max_batch_size.max(1),
            max_wait,
        }
    }

    pub(crate) fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    /// Evaluate both triggers against the pending set.
    ///
    /// When both hold at once the size trigger wins.
    pub(crate) fn evaluate(
        &self,
        pending: usize,
        oldest_arrival: Option<Instant>,
        now: Instant,
    ) -> Decision {
        let Some(oldest) = oldest_arrival else {
            return Decision::Idle;
        };

        if pending >= self.max_batch_size {
            return Decision::Close(Trigger::Size);
        }

        let deadline = oldest + self.max_wait;
        if now >= deadline {
            Decision::Close(Trigger::Wait)
        } else {
            Decision::WaitUntil(deadline)
        }
    }
}
