//! The write side of a completion slot.
use crate::{CancelToken, Classify, Future, Outcome};
use std::fmt;

/// The exclusive writer of a [`Future`].
///
/// Clones share the same slot. Only the first completion through any clone
/// takes effect; later ones are silent no-ops.
///
/// # Examples
///
/// ```
/// use promise_future::Promise;
/// use std::thread;
/// use std::time::Duration;
///
/// let (promise, future) = Promise::<String>::pair();
/// let task = thread::spawn(move || promise.success(String::from("🍓")));
/// assert_eq!(future.result(Duration::from_secs(5)), Some("🍓".to_owned()));
/// task.join().expect("The task thread has panicked.");
/// ```
pub struct Promise<T> {
    future: Future<T>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            future: self.future.clone(),
        }
    }
}

impl<T> Promise<T>
where
    T: Clone + Send + 'static,
{
    /// A pending promise with its own root cancel token.
    pub fn new() -> Self {
        Self::with_token(CancelToken::new())
    }

    /// A pending promise whose future is cancelled when `token` fires.
    pub fn with_token(token: CancelToken) -> Self {
        Self {
            future: Future::pending(token),
        }
    }

    pub fn pair() -> (Self, Future<T>) {
        let promise = Self::new();
        let future = promise.future();
        (promise, future)
    }

    pub fn future(&self) -> Future<T> {
        self.future.clone()
    }

    pub fn is_completed(&self) -> bool {
        self.future.is_completed()
    }

    /// Delivers `outcome`. Returns true if this call completed the future,
    /// false if it had already been completed.
    pub fn complete(&self, outcome: Outcome<T>) -> bool {
        self.future.try_complete(outcome)
    }

    /// Completes with `value` as is, without classification, so
    /// `resolve(false)` on a `Promise<bool>` succeeds with `false`.
    pub fn resolve(&self, value: T) -> bool {
        self.complete(Outcome::Success(value))
    }

    /// Completes with the classification of `value`.
    ///
    /// Unsuffixed integer literals default to `i32` here, so a
    /// `Promise<u64>` needs `success(0_u64)` or [`resolve`](Self::resolve).
    pub fn success<V>(&self, value: V) -> bool
    where
        V: Classify<Payload = T>,
    {
        self.complete(value.classify())
    }

    /// Completes with the classification of `value`. A value that is not
    /// error-like still succeeds, so `failure(100)` completes with 100.
    pub fn failure<V>(&self, value: V) -> bool
    where
        V: Classify<Payload = T>,
    {
        self.complete(value.classify())
    }

    /// Forwards the eventual outcome of `other` into this promise.
    pub fn complete_with(&self, other: &Future<T>) {
        if self.is_completed() {
            return;
        }
        let promise = self.clone();
        other.on_complete(move |outcome| {
            promise.complete(outcome.clone());
        });
    }
}

impl<T> Default for Promise<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Display for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self.future.to_string();
        let inner = rendered
            .strip_prefix("Future(")
            .and_then(|rest| rest.strip_suffix(')'))
            .unwrap_or(&rendered);
        write!(f, "Promise({inner})")
    }
}

impl<T: fmt::Debug> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise").field("future", &self.future).finish()
    }
}
