//! Pledge Runtime - deferred computation primitive
//!
//! This library provides a single-threaded Future with:
//! - A write-once settlement state machine
//! - An explicit FIFO scheduler for deferred notifications
//! - Chaining via `then`, `then_with`, `catch`, and `finally`
//! - Combinators: `all`, `all_settled`, `race`, `any`
//! - Unhandled rejection reporting
//!
//! Nothing settles synchronously. Work only progresses when the owner of a
//! [`Scheduler`] flushes it:
//!
//! ```
//! use pledge_runtime::{combinator, Future, Scheduler};
//!
//! let scheduler = Scheduler::new();
//! let sum = combinator::all(
//!     &scheduler,
//!     vec![
//!         Future::<i32, String>::resolve(&scheduler, 1),
//!         Future::resolve(&scheduler, 2),
//!     ],
//! )
//! .then(|values| Ok(values.iter().sum::<i32>()));
//!
//! scheduler.run_until_idle().unwrap();
//! assert_eq!(sum.peek(), Some(Ok(3)));
//! ```

/// Pledge runtime version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod combinator;
pub mod error;
pub mod future;
pub mod scheduler;

pub use combinator::{all, all_settled, any, race, Settled};
pub use error::{AggregateError, SchedulerError, UnhandledRejection};
pub use future::{Future, FutureState, FutureStatus, Resolution, Resolver};
pub use scheduler::{Scheduler, SchedulerOptions, SchedulerStats};

// Configuration types consumed by `Scheduler::from_config`
pub use pledge_config::{RejectionLog, RuntimeConfig};
