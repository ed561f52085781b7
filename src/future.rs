//! The read side of a completion slot.
//!
//! A [`Future`] is a cheap, cloneable handle. Every clone observes the same
//! slot, which moves from pending to completed exactly once, either through its
//! [`Promise`], through the completion of the future it was derived from, or
//! through cancellation.
use crate::{
    boundary::{catch, invoke, panic_message},
    lock, CancelToken, Cause, Classify, Outcome, PartialFunc, Promise,
};
use std::{
    cell::RefCell,
    collections::VecDeque,
    fmt, mem,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{Arc, Condvar, Mutex, OnceLock, PoisonError},
    time::Duration,
};

pub(crate) type Callback<T> = Box<dyn FnOnce(&Outcome<T>) + Send>;

type Drain = Box<dyn FnOnce()>;

thread_local! {
    /// Drains started while this thread is already draining. `None` when no
    /// drain is running here.
    static DEFERRED: RefCell<Option<VecDeque<Drain>>> = const { RefCell::new(None) };
}

/// Clears the deferred queue when the outermost drain on a thread returns.
struct DrainScope;

impl Drop for DrainScope {
    fn drop(&mut self) {
        DEFERRED.with(|deferred| deferred.borrow_mut().take());
    }
}

/// Runs `drain` now, or queues it behind the drain already running on this
/// thread. A chain of derived futures therefore completes in a loop instead
/// of one nested call per link.
fn run_drain(drain: Drain) {
    let first = DEFERRED.with(|deferred| {
        let mut deferred = deferred.borrow_mut();
        match deferred.as_mut() {
            Some(queue) => {
                queue.push_back(drain);
                None
            }
            None => {
                *deferred = Some(VecDeque::new());
                Some(drain)
            }
        }
    });
    let Some(mut drain) = first else {
        return;
    };
    let _scope = DrainScope;
    loop {
        drain();
        let next = DEFERRED.with(|deferred| {
            deferred
                .borrow_mut()
                .as_mut()
                .and_then(VecDeque::pop_front)
        });
        match next {
            Some(next) => drain = next,
            None => break,
        }
    }
}

enum State<T> {
    Pending(Vec<Callback<T>>),
    /// The slot is filled and the completing thread is running callbacks.
    /// Callbacks registered meanwhile are queued behind them.
    Draining {
        outcome: Outcome<T>,
        queued: Vec<Callback<T>>,
    },
    Completed(Outcome<T>),
}

struct Shared<T> {
    state: Mutex<State<T>>,
    /// Signalled when the slot leaves `Pending`.
    filled: Condvar,
    token: CancelToken,
    /// Our hook on `token`, dropped once the slot is filled.
    cancel_hook: OnceLock<u64>,
}

impl<T> Shared<T> {
    fn new(state: State<T>, token: CancelToken) -> Self {
        Self {
            state: Mutex::new(state),
            filled: Condvar::new(),
            token,
            cancel_hook: OnceLock::new(),
        }
    }
}

/// How a derived future is settled once its source completes.
enum Next<U> {
    Settle(Outcome<U>),
    Adopt(Future<U>),
}

pub struct Future<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> Future<T>
where
    T: Clone + Send + 'static,
{
    /// A pending future that completes with a "user cancel" failure as soon
    /// as `token` fires.
    pub(crate) fn pending(token: CancelToken) -> Self {
        let future = Self {
            shared: Arc::new(Shared::new(State::Pending(vec![]), token)),
        };
        let weak = Arc::downgrade(&future.shared);
        let hook = future.shared.token.on_cancel(move || {
            if let Some(shared) = weak.upgrade() {
                if (Future { shared }).try_complete(Outcome::Failure(Cause::cancelled())) {
                    tracing::debug!("future cancelled");
                }
            }
        });
        if let Some(id) = hook {
            let _ = future.shared.cancel_hook.set(id);
        }
        future
    }

    fn settled(outcome: Outcome<T>) -> Self {
        Self {
            shared: Arc::new(Shared::new(State::Completed(outcome), CancelToken::new())),
        }
    }

    /// An already completed successful future.
    pub fn successful(value: T) -> Self {
        Self::settled(Outcome::Success(value))
    }

    /// An already completed failed future.
    pub fn failed(cause: Cause) -> Self {
        Self::settled(Outcome::Failure(cause))
    }

    /// Fills the slot if it is still empty and runs every queued callback in
    /// registration order. Returns false, doing nothing, if the slot was
    /// already filled.
    ///
    /// Called from inside a callback, the slot is filled before this returns
    /// but the callbacks run after the current one, on the same thread.
    pub(crate) fn try_complete(&self, outcome: Outcome<T>) -> bool {
        let batch = {
            let mut state = lock(&self.shared.state);
            let State::Pending(callbacks) = &mut *state else {
                tracing::trace!("ignoring completion of a completed future");
                return false;
            };
            let callbacks = mem::take(callbacks);
            *state = State::Draining {
                outcome: outcome.clone(),
                queued: vec![],
            };
            callbacks
        };
        self.shared.filled.notify_all();
        tracing::trace!(callbacks = batch.len(), success = outcome.is_success(), "future completed");
        if let Some(id) = self.shared.cancel_hook.get() {
            self.shared.token.remove(*id);
        }

        let future = self.clone();
        run_drain(Box::new(move || future.drain(batch, outcome)));
        true
    }

    fn drain(&self, mut batch: Vec<Callback<T>>, outcome: Outcome<T>) {
        loop {
            for callback in batch {
                if let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback(&outcome))) {
                    let message = panic_message(payload.as_ref());
                    tracing::warn!(%message, "completion callback panicked");
                }
            }
            let mut state = lock(&self.shared.state);
            if let State::Draining { queued, .. } = &mut *state {
                if !queued.is_empty() {
                    batch = mem::take(queued);
                    continue;
                }
            }
            *state = State::Completed(outcome);
            break;
        }
    }

    pub fn is_completed(&self) -> bool {
        !matches!(*lock(&self.shared.state), State::Pending(_))
    }

    /// Registers `callback` to receive the final outcome.
    ///
    /// On a completed future the callback runs right away on the calling
    /// thread. Otherwise it runs on the completing thread, after every callback
    /// registered before it.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce(&Outcome<T>) + Send + 'static,
    {
        let outcome = {
            let mut state = lock(&self.shared.state);
            match &mut *state {
                State::Pending(callbacks) => {
                    callbacks.push(Box::new(callback));
                    return;
                }
                State::Draining { queued, .. } => {
                    queued.push(Box::new(callback));
                    return;
                }
                State::Completed(outcome) => outcome.clone(),
            }
        };
        callback(&outcome);
    }

    /// The outcome, if the future has completed. Never blocks.
    pub fn value(&self) -> Option<Outcome<T>> {
        match &*lock(&self.shared.state) {
            State::Pending(_) => None,
            State::Draining { outcome, .. } | State::Completed(outcome) => Some(outcome.clone()),
        }
    }

    /// Blocks the calling thread until the future completes or `at_most`
    /// elapses.
    pub fn ready(&self, at_most: Duration) -> Option<Future<T>> {
        let state = lock(&self.shared.state);
        let (state, _) = self
            .shared
            .filled
            .wait_timeout_while(state, at_most, |state| matches!(state, State::Pending(_)))
            .unwrap_or_else(PoisonError::into_inner);
        match &*state {
            State::Pending(_) => None,
            _ => Some(self.clone()),
        }
    }

    /// Like [`ready`](Self::ready), projected to the success payload.
    pub fn result(&self, at_most: Duration) -> Option<T> {
        self.ready(at_most)
            .and_then(|future| future.value())
            .and_then(Outcome::success)
    }

    /// Cancels the future unless it has already completed. Pending futures
    /// derived from this one fail with the same cancel cause through normal
    /// propagation; its source is left alone.
    pub fn cancel(&self) {
        if !self.is_completed() {
            self.shared.token.cancel();
        }
    }

    // Derived promises own a fresh token. Cancellation reaches them only as
    // the failure their source completes with, so a cancel that loses to a
    // success never touches them.
    fn transform<U, F>(&self, f: F) -> Future<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(Outcome<T>) -> Outcome<U> + Send + 'static,
    {
        let promise = Promise::new();
        let future = promise.future();
        self.on_complete(move |outcome| {
            promise.complete(f(outcome.clone()));
        });
        future
    }

    fn transform_with<U, F>(&self, f: F) -> Future<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(Outcome<T>) -> Next<U> + Send + 'static,
    {
        let promise = Promise::new();
        let future = promise.future();
        self.on_complete(move |outcome| match f(outcome.clone()) {
            Next::Settle(outcome) => {
                promise.complete(outcome);
            }
            Next::Adopt(next) => promise.complete_with(&next),
        });
        future
    }

    fn failed_cause(&self) -> Option<Cause> {
        self.value().and_then(Outcome::failure)
    }

    /// Applies `f` to the success payload. A failure is propagated unchanged
    /// and `f` never sees it.
    pub fn map<R, F>(&self, f: F) -> Future<R::Payload>
    where
        R: Classify,
        R::Payload: Clone + Send + 'static,
        F: FnOnce(T) -> R + Send + 'static,
    {
        if let Some(cause) = self.failed_cause() {
            return Future::failed(cause);
        }
        self.transform(move |outcome| match outcome {
            Outcome::Success(value) => invoke(move || f(value)),
            Outcome::Failure(cause) => Outcome::Failure(cause),
        })
    }

    /// Binds `f` across the success payload and adopts the outcome of the
    /// future it returns.
    pub fn flat_map<U, F>(&self, f: F) -> Future<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Future<U> + Send + 'static,
    {
        if let Some(cause) = self.failed_cause() {
            return Future::failed(cause);
        }
        self.transform_with(move |outcome| match outcome {
            Outcome::Success(value) => match catch(move || f(value)) {
                Outcome::Success(next) => Next::Adopt(next),
                Outcome::Failure(cause) => Next::Settle(Outcome::Failure(cause)),
            },
            Outcome::Failure(cause) => Next::Settle(Outcome::Failure(cause)),
        })
    }

    /// Substitutes a fallback for a failure. A success passes through and `f`
    /// never runs.
    pub fn recover<R, F>(&self, f: F) -> Future<T>
    where
        R: Classify<Payload = T>,
        F: FnOnce(Cause) -> R + Send + 'static,
    {
        if matches!(self.value(), Some(Outcome::Success(_))) {
            return self.clone();
        }
        self.transform(move |outcome| match outcome {
            Outcome::Success(value) => Outcome::Success(value),
            Outcome::Failure(cause) => invoke(move || f(cause)),
        })
    }

    /// Substitutes a fallback future for a failure.
    pub fn recover_with<F>(&self, f: F) -> Future<T>
    where
        F: FnOnce(Cause) -> Future<T> + Send + 'static,
    {
        if matches!(self.value(), Some(Outcome::Success(_))) {
            return self.clone();
        }
        self.transform_with(move |outcome| match outcome {
            Outcome::Success(value) => Next::Settle(Outcome::Success(value)),
            Outcome::Failure(cause) => match catch(move || f(cause)) {
                Outcome::Success(next) => Next::Adopt(next),
                Outcome::Failure(cause) => Next::Settle(Outcome::Failure(cause)),
            },
        })
    }

    /// Same as [`map`](Self::map) with a predicate: a `false` answer fails the
    /// derived future with [`Cause::False`].
    pub fn filter<F>(&self, f: F) -> Future<bool>
    where
        F: FnOnce(T) -> bool + Send + 'static,
    {
        self.map(f)
    }

    /// Applies a partial function. If its condition rejects the payload the
    /// derived future fails with [`Cause::False`].
    pub fn collect<U>(&self, pf: PartialFunc<T, U>) -> Future<U>
    where
        U: Clone + Send + 'static,
    {
        if let Some(cause) = self.failed_cause() {
            return Future::failed(cause);
        }
        self.transform(move |outcome| {
            outcome.flat_map(|value| {
                catch(move || pf.apply(value)).flat_map(|matched| match matched {
                    Some(value) => Outcome::Success(value),
                    None => Outcome::Failure(Cause::False),
                })
            })
        })
    }

    /// Runs `f` on the success payload for its side effects.
    pub fn foreach<F>(&self, f: F)
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.map(f);
    }
}

impl<T: fmt::Debug> fmt::Display for Future<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*lock(&self.shared.state) {
            State::Pending(_) => f.write_str("Future(Not Yet)"),
            State::Draining { outcome, .. } | State::Completed(outcome) => {
                write!(f, "Future({outcome})")
            }
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Future<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Future");
        match &*lock(&self.shared.state) {
            State::Pending(callbacks) => s.field("callbacks", &callbacks.len()),
            State::Draining { outcome, .. } | State::Completed(outcome) => {
                s.field("outcome", outcome)
            }
        };
        s.finish()
    }
}
