//! Worker-budget accounting for the server under test.
//!
//! A server runs on a fixed worker total. Acceptors and I/O multiplexers
//! reserve slots off the top; what remains is the capacity available to
//! request handlers. Scenarios that rendezvous exactly that many handler
//! invocations depend on this arithmetic being reproduced exactly.

/// Slots charged per I/O multiplexer: one for readiness waiting, one for
/// completion dispatch.
///
/// This constant is load-bearing. Rendezvous party counts are derived
/// from it, and a wrong charge makes saturation scenarios
/// non-deterministic.
pub const SLOTS_PER_MULTIPLEXER: usize = 2;

/// Partition of a fixed worker total into reserved and handler capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerBudget {
    total: usize,
    acceptors: usize,
    multiplexers: usize,
}

impl WorkerBudget {
    /// Build a budget, rejecting partitions that leave no handler capacity.
    pub fn new(
        total: usize,
        acceptors: usize,
        multiplexers: usize,
    ) -> Result<Self, BudgetError> {
        let reserved = acceptors + SLOTS_PER_MULTIPLEXER * multiplexers;
        if reserved >= total {
            return Err(BudgetError::Exhausted { total, reserved });
        }
        Ok(Self {
            total,
            acceptors,
            multiplexers,
        })
    }

    /// The fixed worker total.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Reserved acceptor slots.
    pub fn acceptors(&self) -> usize {
        self.acceptors
    }

    /// Reserved I/O multiplexers (charged at [`SLOTS_PER_MULTIPLEXER`] each).
    pub fn multiplexers(&self) -> usize {
        self.multiplexers
    }

    /// Total reserved slots.
    pub fn reserved(&self) -> usize {
        self.acceptors + SLOTS_PER_MULTIPLEXER * self.multiplexers
    }

    /// Slots left for request handlers. Always at least 1.
    pub fn available_for_handlers(&self) -> usize {
        self.total - self.reserved()
    }
}

/// Invalid worker-budget partitions.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BudgetError {
    /// Reservations consume the whole worker total.
    #[error("worker budget exhausted: {reserved} reserved slots leave no handler capacity out of {total}")]
    Exhausted {
        /// The configured worker total.
        total: usize,
        /// Slots reserved for acceptors and multiplexers.
        reserved: usize,
    },
}
