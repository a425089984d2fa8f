//! Future/Promise implementation for Pledge
//!
//! A `Future` is a write-once container for a value that is not known yet.
//! Futures can be in three states:
//! - Pending: no outcome yet
//! - Fulfilled: settled successfully with a value
//! - Rejected: settled with a failure reason
//!
//! Settlement never happens synchronously. Resolving a future enqueues a
//! settlement task on its [`Scheduler`]; observers registered with `then`,
//! `catch`, or `finally` are notified from that task, in registration
//! order. Observers registered after settlement are notified through the
//! queue as well.
//!
//! Resolving a future with another future adopts the inner future's
//! eventual outcome instead of nesting it.

use crate::error::UnhandledRejection;
use crate::scheduler::Scheduler;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

/// Future state representing the status of a deferred computation
#[derive(Clone)]
pub enum FutureState<T, E> {
    /// No outcome yet
    Pending,
    /// Settled successfully with a value
    Fulfilled(T),
    /// Settled with a failure reason
    Rejected(E),
}

impl<T, E> FutureState<T, E> {
    pub fn status(&self) -> FutureStatus {
        match self {
            FutureState::Pending => FutureStatus::Pending,
            FutureState::Fulfilled(_) => FutureStatus::Fulfilled,
            FutureState::Rejected(_) => FutureStatus::Rejected,
        }
    }
}

impl<T, E> fmt::Debug for FutureState<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FutureState::Pending => write!(f, "Pending"),
            FutureState::Fulfilled(_) => write!(f, "Fulfilled"),
            FutureState::Rejected(_) => write!(f, "Rejected"),
        }
    }
}

/// Value-free view of a [`FutureState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FutureStatus {
    Pending,
    Fulfilled,
    Rejected,
}

impl fmt::Display for FutureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FutureStatus::Pending => write!(f, "pending"),
            FutureStatus::Fulfilled => write!(f, "fulfilled"),
            FutureStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// What a future is being settled with
///
/// Handlers passed to `then`/`catch` may return a `Result` (`Err` rejects
/// the derived future) or a `Future` (adopted), both of which convert into
/// a `Resolution`.
pub enum Resolution<T, E> {
    /// Fulfill with a plain value
    Value(T),
    /// Adopt the eventual outcome of another future
    Adopt(Future<T, E>),
    /// Reject with a reason
    Fail(E),
}

impl<T, E> From<Result<T, E>> for Resolution<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Resolution::Value(value),
            Err(reason) => Resolution::Fail(reason),
        }
    }
}

impl<T, E> From<Future<T, E>> for Resolution<T, E> {
    fn from(future: Future<T, E>) -> Self {
        Resolution::Adopt(future)
    }
}

type Observer<V> = Box<dyn FnOnce(V)>;

struct Shared<T, E> {
    state: FutureState<T, E>,
    on_fulfilled: Vec<Observer<T>>,
    on_rejected: Vec<Observer<E>>,
    /// Future whose outcome this one adopts, compressed towards the end of
    /// the adoption chain
    adopting: Option<Weak<RefCell<Shared<T, E>>>>,
}

/// Pledge Future - a write-once container for an eventual outcome
///
/// # State Machine
/// - Pending → Fulfilled (success)
/// - Pending → Rejected (failure)
/// - Once Fulfilled or Rejected, state is final
///
/// Cloning a future shares its state.
///
/// # Example
/// ```
/// use pledge_runtime::{Future, Scheduler};
///
/// let scheduler = Scheduler::new();
/// let doubled = Future::<i32, String>::resolve(&scheduler, 21).then(|x| Ok(x * 2));
///
/// scheduler.run_until_idle().unwrap();
/// assert_eq!(doubled.peek(), Some(Ok(42)));
/// ```
pub struct Future<T, E> {
    id: u64,
    shared: Rc<RefCell<Shared<T, E>>>,
    scheduler: Scheduler,
}

impl<T, E> Clone for Future<T, E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            shared: Rc::clone(&self.shared),
            scheduler: self.scheduler.clone(),
        }
    }
}

impl<T, E> Future<T, E> {
    /// Scheduler-unique identifier
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Scheduler this future settles on
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn status(&self) -> FutureStatus {
        self.shared.borrow().state.status()
    }

    /// Check if the future is pending
    pub fn is_pending(&self) -> bool {
        matches!(self.shared.borrow().state, FutureState::Pending)
    }

    /// Check if the future is fulfilled
    pub fn is_fulfilled(&self) -> bool {
        matches!(self.shared.borrow().state, FutureState::Fulfilled(_))
    }

    /// Check if the future is rejected
    pub fn is_rejected(&self) -> bool {
        matches!(self.shared.borrow().state, FutureState::Rejected(_))
    }

    /// Check if two handles refer to the same future
    pub fn ptr_eq(&self, other: &Future<T, E>) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }
}

impl<T, E> Future<T, E>
where
    T: Clone + 'static,
    E: Clone + fmt::Debug + 'static,
{
    /// Create a future driven by an initializer
    ///
    /// The initializer runs synchronously and receives the future's
    /// [`Resolver`]. An `Err` returned from it rejects the future, unless
    /// the resolver was already used.
    pub fn new<F>(scheduler: &Scheduler, initializer: F) -> Self
    where
        F: FnOnce(Resolver<T, E>) -> Result<(), E>,
    {
        let (future, resolver) = Self::pending(scheduler);
        if let Err(reason) = initializer(resolver.clone()) {
            resolver.reject(reason);
        }
        future
    }

    /// Create a pending future together with its resolver
    pub fn pending(scheduler: &Scheduler) -> (Self, Resolver<T, E>) {
        let future = Self {
            id: scheduler.next_future_id(),
            shared: Rc::new(RefCell::new(Shared {
                state: FutureState::Pending,
                on_fulfilled: Vec::new(),
                on_rejected: Vec::new(),
                adopting: None,
            })),
            scheduler: scheduler.clone(),
        };
        let resolver = Resolver {
            future: future.clone(),
            claimed: Rc::new(Cell::new(false)),
        };
        (future, resolver)
    }

    /// Create a future that fulfills with `value`
    pub fn resolve(scheduler: &Scheduler, value: T) -> Self {
        let (future, resolver) = Self::pending(scheduler);
        resolver.resolve(value);
        future
    }

    /// Create a future that rejects with `reason`
    pub fn reject(scheduler: &Scheduler, reason: E) -> Self {
        let (future, resolver) = Self::pending(scheduler);
        resolver.reject(reason);
        future
    }

    /// Create a future that adopts the outcome of `inner`
    pub fn adopt(scheduler: &Scheduler, inner: Future<T, E>) -> Self {
        let (future, resolver) = Self::pending(scheduler);
        resolver.adopt(inner);
        future
    }

    /// Get the current state (cloned)
    pub fn state(&self) -> FutureState<T, E> {
        self.shared.borrow().state.clone()
    }

    /// Outcome if settled
    pub fn peek(&self) -> Option<Result<T, E>> {
        match &self.shared.borrow().state {
            FutureState::Pending => None,
            FutureState::Fulfilled(value) => Some(Ok(value.clone())),
            FutureState::Rejected(reason) => Some(Err(reason.clone())),
        }
    }

    /// Chain a success handler
    ///
    /// Rejections propagate to the returned future unchanged.
    pub fn then<U, F, R>(&self, on_fulfilled: F) -> Future<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> R + 'static,
        R: Into<Resolution<U, E>>,
    {
        self.chain(move |value| on_fulfilled(value).into(), Resolution::Fail)
    }

    /// Chain both a success and a failure handler
    pub fn then_with<U, F, G, R, S>(&self, on_fulfilled: F, on_rejected: G) -> Future<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> R + 'static,
        G: FnOnce(E) -> S + 'static,
        R: Into<Resolution<U, E>>,
        S: Into<Resolution<U, E>>,
    {
        self.chain(
            move |value| on_fulfilled(value).into(),
            move |reason| on_rejected(reason).into(),
        )
    }

    /// Chain a failure handler
    ///
    /// Values propagate to the returned future unchanged.
    pub fn catch<F, R>(&self, on_rejected: F) -> Future<T, E>
    where
        F: FnOnce(E) -> R + 'static,
        R: Into<Resolution<T, E>>,
    {
        self.chain(Resolution::Value, move |reason| on_rejected(reason).into())
    }

    /// Run `on_finally` once the future settles, either way
    ///
    /// The returned future keeps the original outcome, unless `on_finally`
    /// itself fails, in which case it rejects with that error.
    pub fn finally<F>(&self, on_finally: F) -> Future<T, E>
    where
        F: FnOnce() -> Result<(), E> + 'static,
    {
        let on_value = Rc::new(Cell::new(Some(on_finally)));
        let on_reason = Rc::clone(&on_value);

        self.chain(
            move |value| match run_once(&on_value) {
                Ok(()) => Resolution::Value(value),
                Err(error) => Resolution::Fail(error),
            },
            move |reason| match run_once(&on_reason) {
                Ok(()) => Resolution::Fail(reason),
                Err(error) => Resolution::Fail(error),
            },
        )
    }

    fn chain<U, F, G>(&self, on_fulfilled: F, on_rejected: G) -> Future<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Resolution<U, E> + 'static,
        G: FnOnce(E) -> Resolution<U, E> + 'static,
    {
        let (derived, resolver) = Future::pending(&self.scheduler);
        let on_value = resolver.clone();

        self.subscribe(
            Box::new(move |value| on_value.settle(on_fulfilled(value))),
            Box::new(move |reason| resolver.settle(on_rejected(reason))),
        );

        derived
    }

    /// Register one observer per outcome
    ///
    /// On a settled future the matching observer is enqueued right away and
    /// the other one is dropped.
    fn subscribe(&self, on_fulfilled: Observer<T>, on_rejected: Observer<E>) {
        match self.peek() {
            None => {
                let mut shared = self.shared.borrow_mut();
                shared.on_fulfilled.push(on_fulfilled);
                shared.on_rejected.push(on_rejected);
            }
            Some(Ok(value)) => self.scheduler.defer(move || on_fulfilled(value)),
            Some(Err(reason)) => self.scheduler.defer(move || on_rejected(reason)),
        }
    }

    fn enqueue(&self, resolution: Resolution<T, E>) {
        let future = self.clone();
        self.scheduler.defer(move || future.settle(resolution));
    }

    fn settle(&self, resolution: Resolution<T, E>) {
        if !self.is_pending() {
            tracing::trace!(future_id = self.id, "settlement ignored: already settled");
            return;
        }

        match resolution {
            Resolution::Adopt(inner) => self.follow(inner),
            Resolution::Value(value) => self.fulfill(value),
            Resolution::Fail(reason) => self.fail(reason),
        }
    }

    fn follow(&self, inner: Future<T, E>) {
        if self.adoption_reaches_self(&inner) {
            tracing::warn!(
                future_id = self.id,
                inner_id = inner.id,
                "adoption cycle: future stays pending"
            );
            return;
        }

        tracing::debug!(future_id = self.id, inner_id = inner.id, "adopting outcome");
        self.shared.borrow_mut().adopting = Some(Rc::downgrade(&inner.shared));
        let on_value = self.clone();
        let on_reason = self.clone();
        inner.subscribe(
            Box::new(move |value| on_value.enqueue(Resolution::Value(value))),
            Box::new(move |reason| on_reason.enqueue(Resolution::Fail(reason))),
        );
    }

    /// Walk the adoption links starting at `inner`
    ///
    /// A future about to adopt follows nothing yet, so the walk ends here
    /// exactly when adopting `inner` would close a cycle. Visited links are
    /// pointed at the end of the walk.
    fn adoption_reaches_self(&self, inner: &Future<T, E>) -> bool {
        let mut visited = Vec::new();
        let mut current = Rc::clone(&inner.shared);

        loop {
            let next = current.borrow().adopting.as_ref().and_then(Weak::upgrade);
            match next {
                Some(next) => visited.push(std::mem::replace(&mut current, next)),
                None => break,
            }
        }

        let end = Rc::downgrade(&current);
        for node in visited {
            node.borrow_mut().adopting = Some(end.clone());
        }

        Rc::ptr_eq(&current, &self.shared)
    }

    fn fulfill(&self, value: T) {
        let observers = {
            let mut shared = self.shared.borrow_mut();
            shared.state = FutureState::Fulfilled(value.clone());
            shared.adopting = None;
            shared.on_rejected.clear();
            std::mem::take(&mut shared.on_fulfilled)
        };

        tracing::debug!(future_id = self.id, observers = observers.len(), "future fulfilled");
        for observer in observers {
            observer(value.clone());
        }
    }

    fn fail(&self, reason: E) {
        let observers = {
            let mut shared = self.shared.borrow_mut();
            shared.state = FutureState::Rejected(reason.clone());
            shared.adopting = None;
            shared.on_fulfilled.clear();
            std::mem::take(&mut shared.on_rejected)
        };

        tracing::debug!(future_id = self.id, observers = observers.len(), "future rejected");
        if observers.is_empty() {
            self.scheduler.report_unhandled(UnhandledRejection {
                future_id: self.id,
                reason: format!("{:?}", reason),
            });
        }
        for observer in observers {
            observer(reason.clone());
        }
    }
}

fn run_once<F, E>(slot: &Cell<Option<F>>) -> Result<(), E>
where
    F: FnOnce() -> Result<(), E>,
{
    match slot.take() {
        Some(callback) => callback(),
        None => Ok(()),
    }
}

impl<T, E> fmt::Debug for Future<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Future#{}({:?})", self.id, self.shared.borrow().state)
    }
}

impl<T, E> fmt::Display for Future<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Future#{}({})", self.id, self.status())
    }
}

/// Settlement entry points handed to a future's producer
///
/// All clones of a resolver share one claim: the first `resolve`, `adopt`,
/// `reject`, or `settle` call wins and enqueues the settlement task; later
/// calls are ignored.
pub struct Resolver<T, E> {
    future: Future<T, E>,
    claimed: Rc<Cell<bool>>,
}

impl<T, E> Clone for Resolver<T, E> {
    fn clone(&self) -> Self {
        Self {
            future: self.future.clone(),
            claimed: Rc::clone(&self.claimed),
        }
    }
}

impl<T, E> Resolver<T, E>
where
    T: Clone + 'static,
    E: Clone + fmt::Debug + 'static,
{
    /// Fulfill with a value
    pub fn resolve(&self, value: T) {
        self.settle(Resolution::Value(value));
    }

    /// Follow another future's outcome
    pub fn adopt(&self, inner: Future<T, E>) {
        self.settle(Resolution::Adopt(inner));
    }

    /// Reject with a reason
    pub fn reject(&self, reason: E) {
        self.settle(Resolution::Fail(reason));
    }

    pub fn settle(&self, resolution: Resolution<T, E>) {
        if self.claimed.replace(true) {
            tracing::trace!(
                future_id = self.future.id,
                "resolution ignored: resolver already used"
            );
            return;
        }
        self.future.enqueue(resolution);
    }

    /// Check if a settlement call has already been made
    pub fn is_claimed(&self) -> bool {
        self.claimed.get()
    }

    /// The future this resolver settles
    pub fn future(&self) -> &Future<T, E> {
        &self.future
    }
}

impl<T, E> fmt::Debug for Resolver<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("future", &self.future)
            .field("claimed", &self.claimed.get())
            .finish()
    }
}
