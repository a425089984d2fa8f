//! Shared test utilities for Pledge runtime tests
//!
//! Helpers for flushing schedulers and observing callbacks without
//! repeating the same `Rc<RefCell<..>>` plumbing in every test.

#![allow(dead_code)]

use pledge_runtime::{Future, Scheduler};
use std::cell::RefCell;
use std::rc::Rc;

/// The future type most tests use
pub type Fut = Future<i32, String>;

/// Flush every queued task, panicking on budget exhaustion
pub fn flush(scheduler: &Scheduler) -> usize {
    scheduler
        .run_until_idle()
        .expect("scheduler should drain within budget")
}

/// Build an owned rejection reason
pub fn reason(text: &str) -> String {
    text.to_string()
}

/// Shared, append-only log for observing callback order
#[derive(Clone)]
pub struct Log<T> {
    entries: Rc<RefCell<Vec<T>>>,
}

impl<T: Clone> Log<T> {
    pub fn new() -> Self {
        Self {
            entries: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn push(&self, entry: T) {
        self.entries.borrow_mut().push(entry);
    }

    pub fn entries(&self) -> Vec<T> {
        self.entries.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}
