//! Invocation boundary for user supplied transforms. A panic inside a
//! transform becomes a `Failure` instead of unwinding through the thread that
//! is delivering a completion.
use crate::{Error, Classify, Outcome};
use std::{
    any::Any,
    panic::{catch_unwind, AssertUnwindSafe},
};

/// Runs `f`, turning a panic into `Failure(Error::Panicked)`.
pub(crate) fn catch<R>(f: impl FnOnce() -> R) -> Outcome<R> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Outcome::Success(value),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::warn!(%message, "transform panicked, completing with failure");
            Outcome::Failure(Error::Panicked(message).into())
        }
    }
}

/// Runs `f` and classifies its output.
pub(crate) fn invoke<R: Classify>(f: impl FnOnce() -> R) -> Outcome<R::Payload> {
    catch(f).flat_map(Classify::classify)
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "opaque panic payload".to_owned()
    }
}
