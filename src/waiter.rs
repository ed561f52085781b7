//! Bridges a completion slot into `async` code.
//!
//! # Examples
//!
//! ```
//! use promise_future::Promise;
//! use futures::executor::block_on;
//! use std::thread;
//!
//! let (promise, future) = Promise::<String>::pair();
//! let task1 = thread::spawn(move || block_on(async {
//!     future.await.success()
//! }));
//! promise.success(String::from("Hi"));
//! assert_eq!(task1.join().expect("The task1 thread has panicked."), Some("Hi".into()));
//! ```
use crate::{lock, Future, Outcome};
use std::{
    future::{Future as StdFuture, IntoFuture},
    mem,
    pin::Pin,
    sync::{Arc, Mutex},
    task::{Context, Poll, Waker},
};

#[derive(Debug)]
enum WakerState {
    Fresh,
    Tainted,
}

#[derive(Debug)]
struct Inner {
    waker: Result<Waker, WakerState>,
}

/// An awaitable view of a [`Future`], resolving to its [`Outcome`].
#[derive(Debug)]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Waiter<T> {
    future: Future<T>,
    inner: Arc<Mutex<Inner>>,
    registered: bool,
}

impl<T> StdFuture for Waiter<T>
where
    T: Clone + Send + 'static,
{
    type Output = Outcome<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if let Some(outcome) = this.future.value() {
            return Poll::Ready(outcome);
        }
        let previous = mem::replace(&mut lock(&this.inner).waker, Ok(cx.waker().clone()));
        if let Err(WakerState::Tainted) = previous {
            // Woken already, so the slot is filled.
            if let Some(outcome) = this.future.value() {
                return Poll::Ready(outcome);
            }
        }
        if !this.registered {
            this.registered = true;
            let inner = this.inner.clone();
            this.future.on_complete(move |_| {
                let mut inner = lock(&inner);
                if let Ok(waker) = mem::replace(&mut inner.waker, Err(WakerState::Tainted)) {
                    waker.wake()
                }
            });
        }
        Poll::Pending
    }
}

impl<T> IntoFuture for Future<T>
where
    T: Clone + Send + 'static,
{
    type Output = Outcome<T>;
    type IntoFuture = Waiter<T>;

    fn into_future(self) -> Waiter<T> {
        Waiter {
            future: self,
            inner: Arc::new(Mutex::new(Inner {
                waker: Err(WakerState::Fresh),
            })),
            registered: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{future_of, Promise};
    use futures::executor::block_on;
    use std::thread;

    #[test]
    fn test_await_resolved_by_other_thread() {
        let (op, op_a) = Promise::<String>::pair();
        let task1 = thread::spawn(move || block_on(async { op_a.await.success() }));
        let task2 = thread::spawn(move || op.success(String::from("🍓")));
        task2.join().expect("The task2 thread has panicked");
        assert_eq!(
            task1.join().expect("The task1 thread has panicked"),
            Some(String::from("🍓"))
        );
    }

    #[test]
    fn test_two_waiters_on_one_future() {
        let (op, op_a) = Promise::<i32>::pair();
        let op_b = op_a.clone();
        let task1 = thread::spawn(move || block_on(async { op_a.await.success() }));
        let task2 = thread::spawn(move || block_on(async { op_b.await.success() }));
        op.success(42);
        assert_eq!(task1.join().expect("The task1 thread has panicked"), Some(42));
        assert_eq!(task2.join().expect("The task2 thread has panicked"), Some(42));
    }

    #[test]
    fn test_await_failure() {
        let f = future_of(|| false);
        let outcome = block_on(async { f.await });
        assert!(outcome.is_failure());
    }

    #[test]
    fn test_await_cancelled() {
        let (_op, op_a) = Promise::<i32>::pair();
        let canceller = op_a.clone();
        let task1 = thread::spawn(move || block_on(async { op_a.await }));
        canceller.cancel();
        let outcome = task1.join().expect("The task1 thread has panicked");
        assert!(outcome.failure().is_some_and(|cause| cause.is_cancelled()));
    }
}
