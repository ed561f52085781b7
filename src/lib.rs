//! A single-assignment [`Future`]/[`Promise`] pair with chained derivation,
//! blocking wait-with-timeout and cooperative cancellation.
//!
//! A [`Promise`] is the only writer of its [`Future`]. The first completion
//! wins; later ones are silently ignored. Combinators such as
//! [`Future::map`] and [`Future::flat_map`] allocate a derived promise and
//! complete it from a callback on the source future.
//!
//! # Examples
//!
//! ```
//! use promise_future::future_of;
//! use std::time::Duration;
//!
//! let f1 = future_of(|| 1000_i32);
//! let f2 = future_of(|| 2000_i32);
//! let f3 = f1.flat_map(move |x| f2.map(move |y| x * y));
//! assert_eq!(f3.result(Duration::from_secs(10)), Some(2_000_000));
//! ```
//!
//! Completion values follow the error-or-false convention of [`Classify`]:
//!
//! ```
//! use promise_future::Promise;
//! use std::time::Duration;
//!
//! let promise = Promise::<i32>::new();
//! // Not error-like, so this still succeeds.
//! promise.failure(100);
//! assert_eq!(promise.future().result(Duration::ZERO), Some(100));
//! ```
use std::sync::{Mutex, MutexGuard, PoisonError};

mod boundary;
pub mod cancel;
pub mod future;
pub mod outcome;
pub mod partial;
pub mod promise;
pub mod runtime;
pub mod waiter;

pub use cancel::CancelToken;
pub use future::Future;
pub use outcome::{Cause, Classify, Outcome};
pub use partial::PartialFunc;
pub use promise::Promise;
pub use runtime::{future_of, unit, Runtime, RuntimeConfig};
pub use waiter::Waiter;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The canonical cause of a cancelled future.
    #[error("user cancel")]
    Cancelled,
    #[error("transform panicked: {0}")]
    Panicked(String),
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// User code never runs while one of our locks is held, so a poisoned lock
/// still guards consistent state.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
