//! Combinators over collections of futures
//!
//! - `all`: every input fulfills, or the first rejection wins
//! - `all_settled`: waits for every input, never rejects
//! - `race`: the first input to settle wins, either way
//! - `any`: the first fulfillment wins, or every reason is aggregated
//!
//! These are built on the public chaining contract only. "First" means
//! first to drain; ties inside one flush go to the earlier input because
//! registration and notification are both FIFO.

use crate::error::AggregateError;
use crate::future::{Future, FutureStatus};
use crate::scheduler::Scheduler;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::convert::Infallible;
use std::fmt;
use std::rc::Rc;

/// Outcome record produced by [`all_settled`]
///
/// Serializes as `{"status":"fulfilled","value":..}` or
/// `{"status":"rejected","reason":..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Settled<T, E> {
    Fulfilled { value: T },
    Rejected { reason: E },
}

impl<T, E> Settled<T, E> {
    pub fn status(&self) -> FutureStatus {
        match self {
            Settled::Fulfilled { .. } => FutureStatus::Fulfilled,
            Settled::Rejected { .. } => FutureStatus::Rejected,
        }
    }

    pub fn into_result(self) -> Result<T, E> {
        match self {
            Settled::Fulfilled { value } => Ok(value),
            Settled::Rejected { reason } => Err(reason),
        }
    }
}

/// Slots filled by index as inputs settle, plus a countdown
struct Collector<V> {
    slots: RefCell<Vec<Option<V>>>,
    remaining: Cell<usize>,
}

impl<V> Collector<V> {
    fn new(len: usize) -> Rc<Self> {
        Rc::new(Self {
            slots: RefCell::new((0..len).map(|_| None).collect()),
            remaining: Cell::new(len),
        })
    }

    /// Store a slot; returns the full vector once the last slot is filled
    fn fill(&self, index: usize, value: V) -> Option<Vec<V>> {
        self.slots.borrow_mut()[index] = Some(value);
        let remaining = self.remaining.get() - 1;
        self.remaining.set(remaining);

        if remaining == 0 {
            Some(self.slots.borrow_mut().drain(..).flatten().collect())
        } else {
            None
        }
    }
}

/// Fulfill with every value in input order, or reject with the first reason
///
/// An empty input fulfills with an empty vector.
pub fn all<T, E, I>(scheduler: &Scheduler, inputs: I) -> Future<Vec<T>, E>
where
    T: Clone + 'static,
    E: Clone + fmt::Debug + 'static,
    I: IntoIterator<Item = Future<T, E>>,
{
    let inputs: Vec<Future<T, E>> = inputs.into_iter().collect();
    let (combined, resolver) = Future::pending(scheduler);

    if inputs.is_empty() {
        resolver.resolve(Vec::new());
        return combined;
    }

    let collector = Collector::new(inputs.len());
    for (index, input) in inputs.iter().enumerate() {
        let collector = Rc::clone(&collector);
        let on_value = resolver.clone();
        let on_reason = resolver.clone();

        input.then_with(
            move |value| {
                if let Some(values) = collector.fill(index, value) {
                    on_value.resolve(values);
                }
                Ok::<(), E>(())
            },
            move |reason| {
                on_reason.reject(reason);
                Ok(())
            },
        );
    }

    combined
}

/// Fulfill with one outcome record per input, in input order, once all settle
///
/// Never rejects. An empty input fulfills with an empty vector.
pub fn all_settled<T, E, I>(scheduler: &Scheduler, inputs: I) -> Future<Vec<Settled<T, E>>, Infallible>
where
    T: Clone + 'static,
    E: Clone + fmt::Debug + 'static,
    I: IntoIterator<Item = Future<T, E>>,
{
    let inputs: Vec<Future<T, E>> = inputs.into_iter().collect();
    let (combined, resolver) = Future::pending(scheduler);

    if inputs.is_empty() {
        resolver.resolve(Vec::new());
        return combined;
    }

    let collector = Collector::new(inputs.len());
    for (index, input) in inputs.iter().enumerate() {
        let on_value = (Rc::clone(&collector), resolver.clone());
        let on_reason = (Rc::clone(&collector), resolver.clone());

        input.then_with(
            move |value| {
                let (collector, resolver) = on_value;
                if let Some(outcomes) = collector.fill(index, Settled::Fulfilled { value }) {
                    resolver.resolve(outcomes);
                }
                Ok::<(), E>(())
            },
            move |reason| {
                let (collector, resolver) = on_reason;
                if let Some(outcomes) = collector.fill(index, Settled::Rejected { reason }) {
                    resolver.resolve(outcomes);
                }
                Ok(())
            },
        );
    }

    combined
}

/// Settle like the first input to settle
///
/// An empty input never settles.
pub fn race<T, E, I>(scheduler: &Scheduler, inputs: I) -> Future<T, E>
where
    T: Clone + 'static,
    E: Clone + fmt::Debug + 'static,
    I: IntoIterator<Item = Future<T, E>>,
{
    let (combined, resolver) = Future::pending(scheduler);

    for input in inputs {
        let on_value = resolver.clone();
        let on_reason = resolver.clone();
        input.then_with(
            move |value| {
                on_value.resolve(value);
                Ok::<(), E>(())
            },
            move |reason| {
                on_reason.reject(reason);
                Ok(())
            },
        );
    }

    combined
}

/// Fulfill with the first value, or reject with every reason once all fail
///
/// An empty input rejects with an empty [`AggregateError`].
pub fn any<T, E, I>(scheduler: &Scheduler, inputs: I) -> Future<T, AggregateError<E>>
where
    T: Clone + 'static,
    E: Clone + fmt::Debug + 'static,
    I: IntoIterator<Item = Future<T, E>>,
{
    let inputs: Vec<Future<T, E>> = inputs.into_iter().collect();
    let (combined, resolver) = Future::pending(scheduler);

    if inputs.is_empty() {
        resolver.reject(AggregateError::new(Vec::new()));
        return combined;
    }

    let collector = Collector::new(inputs.len());
    for (index, input) in inputs.iter().enumerate() {
        let collector = Rc::clone(&collector);
        let on_value = resolver.clone();
        let on_reason = resolver.clone();

        input.then_with(
            move |value| {
                on_value.resolve(value);
                Ok::<(), E>(())
            },
            move |reason| {
                if let Some(reasons) = collector.fill(index, reason) {
                    on_reason.reject(AggregateError::new(reasons));
                }
                Ok(())
            },
        );
    }

    combined
}
