//! Deferred-task scheduler
//!
//! A FIFO queue of zero-argument tasks. Every future is bound to one
//! scheduler: settlement and late notifications are enqueued here and only
//! run when the owner flushes the queue with [`Scheduler::run_until_idle`]
//! or [`Scheduler::run_next`].
//!
//! The scheduler also owns the unhandled-rejection channel. When a future
//! rejects with nobody listening, the event is logged, recorded, and handed
//! to every registered hook.

use crate::error::{SchedulerError, UnhandledRejection};
use pledge_config::{
    RejectionLog, RuntimeConfig, DEFAULT_MAX_TASKS_PER_FLUSH, DEFAULT_RECORD_LIMIT,
};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

type Task = Box<dyn FnOnce()>;
type RejectionHook = Rc<dyn Fn(&UnhandledRejection)>;

/// Tunables for a [`Scheduler`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerOptions {
    /// Maximum tasks one `run_until_idle` call may execute
    pub max_tasks_per_flush: usize,
    /// Log level used for unhandled rejections
    pub rejection_log: RejectionLog,
    /// How many unhandled rejections are kept (oldest dropped first)
    pub record_limit: usize,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            max_tasks_per_flush: DEFAULT_MAX_TASKS_PER_FLUSH,
            rejection_log: RejectionLog::default(),
            record_limit: DEFAULT_RECORD_LIMIT,
        }
    }
}

impl SchedulerOptions {
    /// Build options from loaded configuration
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self {
            max_tasks_per_flush: config.max_tasks_per_flush(),
            rejection_log: config.rejection_log(),
            record_limit: config.record_limit(),
        }
    }
}

/// Counters describing scheduler activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Tasks ever enqueued
    pub enqueued: u64,
    /// Tasks ever executed
    pub executed: u64,
    /// Unhandled rejections ever reported
    pub unhandled_rejections: u64,
}

struct Inner {
    queue: RefCell<VecDeque<Task>>,
    options: SchedulerOptions,
    next_future_id: Cell<u64>,
    stats: Cell<SchedulerStats>,
    hooks: RefCell<Vec<RejectionHook>>,
    unhandled: RefCell<VecDeque<UnhandledRejection>>,
}

/// Handle to a single-threaded FIFO task queue
///
/// Cloning the handle shares the queue. Tasks run one at a time, to
/// completion, in the order they were enqueued; tasks enqueued while a
/// flush is in progress run in that same flush.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<Inner>,
}

impl Scheduler {
    /// Create a scheduler with default options
    pub fn new() -> Self {
        Self::with_options(SchedulerOptions::default())
    }

    /// Create a scheduler with explicit options
    pub fn with_options(options: SchedulerOptions) -> Self {
        Self {
            inner: Rc::new(Inner {
                queue: RefCell::new(VecDeque::new()),
                options,
                next_future_id: Cell::new(1),
                stats: Cell::new(SchedulerStats::default()),
                hooks: RefCell::new(Vec::new()),
                unhandled: RefCell::new(VecDeque::new()),
            }),
        }
    }

    /// Create a scheduler from loaded configuration
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::with_options(SchedulerOptions::from_config(config))
    }

    pub fn options(&self) -> SchedulerOptions {
        self.inner.options
    }

    /// Enqueue a task at the back of the queue
    pub fn defer<F>(&self, task: F)
    where
        F: FnOnce() + 'static,
    {
        self.inner.queue.borrow_mut().push_back(Box::new(task));
        self.update_stats(|stats| stats.enqueued += 1);
    }

    /// Run the task at the front of the queue
    ///
    /// Returns false if the queue was empty.
    pub fn run_next(&self) -> bool {
        // The borrow must end before the task runs: tasks enqueue more tasks.
        let task = self.inner.queue.borrow_mut().pop_front();
        match task {
            Some(task) => {
                tracing::trace!(pending = self.pending_tasks(), "running deferred task");
                task();
                self.update_stats(|stats| stats.executed += 1);
                true
            }
            None => false,
        }
    }

    /// Run tasks until the queue is empty
    ///
    /// Returns the number of tasks executed. Stops with
    /// [`SchedulerError::BudgetExhausted`] once `max_tasks_per_flush` tasks
    /// have run and work remains; the remaining tasks stay queued and a
    /// later call resumes them.
    pub fn run_until_idle(&self) -> Result<usize, SchedulerError> {
        let budget = self.inner.options.max_tasks_per_flush;
        let mut executed = 0;

        while executed < budget {
            if !self.run_next() {
                return Ok(executed);
            }
            executed += 1;
        }

        if self.is_idle() {
            return Ok(executed);
        }

        let pending = self.pending_tasks();
        tracing::debug!(executed, pending, "flush budget exhausted");
        Err(SchedulerError::BudgetExhausted { executed, pending })
    }

    /// Number of queued tasks
    pub fn pending_tasks(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    /// Check if no tasks are queued
    pub fn is_idle(&self) -> bool {
        self.inner.queue.borrow().is_empty()
    }

    pub fn stats(&self) -> SchedulerStats {
        self.inner.stats.get()
    }

    /// Register a hook invoked for every unhandled rejection
    pub fn on_unhandled_rejection<F>(&self, hook: F)
    where
        F: Fn(&UnhandledRejection) + 'static,
    {
        self.inner.hooks.borrow_mut().push(Rc::new(hook));
    }

    /// Recorded unhandled rejections, oldest first
    pub fn unhandled_rejections(&self) -> Vec<UnhandledRejection> {
        self.inner.unhandled.borrow().iter().cloned().collect()
    }

    /// Drain the recorded unhandled rejections
    pub fn take_unhandled_rejections(&self) -> Vec<UnhandledRejection> {
        self.inner.unhandled.borrow_mut().drain(..).collect()
    }

    /// Check if two handles share the same queue
    pub fn ptr_eq(&self, other: &Scheduler) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn next_future_id(&self) -> u64 {
        let id = self.inner.next_future_id.get();
        self.inner.next_future_id.set(id + 1);
        id
    }

    pub(crate) fn report_unhandled(&self, event: UnhandledRejection) {
        self.update_stats(|stats| stats.unhandled_rejections += 1);

        match self.inner.options.rejection_log {
            RejectionLog::Warn => tracing::warn!(
                future_id = event.future_id,
                reason = %event.reason,
                "unhandled rejection"
            ),
            RejectionLog::Error => tracing::error!(
                future_id = event.future_id,
                reason = %event.reason,
                "unhandled rejection"
            ),
            RejectionLog::Off => {}
        }

        let limit = self.inner.options.record_limit;
        if limit > 0 {
            let mut records = self.inner.unhandled.borrow_mut();
            if records.len() == limit {
                records.pop_front();
            }
            records.push_back(event.clone());
        }

        // Hooks may register further hooks or enqueue work.
        let hooks: Vec<RejectionHook> = self.inner.hooks.borrow().clone();
        for hook in hooks {
            hook(&event);
        }
    }

    fn update_stats(&self, apply: impl FnOnce(&mut SchedulerStats)) {
        let mut stats = self.inner.stats.get();
        apply(&mut stats);
        self.inner.stats.set(stats);
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending", &self.pending_tasks())
            .field("options", &self.inner.options)
            .field("stats", &self.stats())
            .finish()
    }
}
