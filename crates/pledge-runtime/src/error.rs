//! Error types for settlement, scheduling, and combinators

use thiserror::Error;

/// Composite failure produced by [`any`](crate::combinator::any) when every input rejects
///
/// Reasons are kept in input order, not settlement order.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct AggregateError<E> {
    /// Individual rejection reasons, one per input
    pub reasons: Vec<E>,
    /// Human-readable summary
    pub message: String,
}

impl<E> AggregateError<E> {
    pub fn new(reasons: Vec<E>) -> Self {
        Self {
            reasons,
            message: "All futures were rejected".to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.reasons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reasons.is_empty()
    }
}

/// A rejection that drained with no rejection observer attached
///
/// Reported through [`Scheduler`](crate::Scheduler) hooks and records,
/// never raised as a panic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("(in future #{future_id}) unhandled rejection: {reason}")]
pub struct UnhandledRejection {
    /// Id of the future that rejected
    pub future_id: u64,
    /// Debug rendering of the rejection reason
    pub reason: String,
}

/// Scheduler errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("task budget exhausted after {executed} tasks ({pending} still queued)")]
    BudgetExhausted { executed: usize, pending: usize },
}
