//! The settled value of a future: either a `Success` payload or a `Failure`
//! cause.
//!
//! Values produced by user code are turned into an [`Outcome`] through the
//! [`Classify`] trait, which follows the error-or-false convention: an error
//! or boolean `false` is a failure, anything else is a success.
use crate::Error;
use std::{error, fmt, sync::Arc};

/// Why a future failed.
#[derive(Debug, Clone)]
pub enum Cause {
    /// The producer answered with boolean `false`.
    False,
    /// The producer answered with an error.
    Error(Arc<dyn error::Error + Send + Sync>),
}

impl Cause {
    pub fn error<E>(err: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        Cause::Error(Arc::new(err))
    }

    /// True if this is the canonical "user cancel" cause.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Cause::Error(err) => matches!(err.downcast_ref::<Error>(), Some(Error::Cancelled)),
            Cause::False => false,
        }
    }

    /// True if a user transform panicked.
    pub fn is_panic(&self) -> bool {
        match self {
            Cause::Error(err) => matches!(err.downcast_ref::<Error>(), Some(Error::Panicked(_))),
            Cause::False => false,
        }
    }

    pub(crate) fn cancelled() -> Self {
        Cause::error(Error::Cancelled)
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cause::False => f.write_str("false"),
            Cause::Error(err) => write!(f, "{err}"),
        }
    }
}

impl From<Error> for Cause {
    fn from(err: Error) -> Self {
        Cause::error(err)
    }
}

/// A settled result. Never mixes success and failure data.
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    Success(T),
    Failure(Cause),
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    /// Projects the success payload, dropping the cause.
    pub fn success(self) -> Option<T> {
        match self {
            Outcome::Success(value) => Some(value),
            Outcome::Failure(_) => None,
        }
    }

    pub fn failure(self) -> Option<Cause> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Failure(cause) => Some(cause),
        }
    }

    pub fn as_ref(&self) -> Outcome<&T> {
        match self {
            Outcome::Success(value) => Outcome::Success(value),
            Outcome::Failure(cause) => Outcome::Failure(cause.clone()),
        }
    }

    pub fn get_or_else(self, default: impl FnOnce(Cause) -> T) -> T {
        match self {
            Outcome::Success(value) => value,
            Outcome::Failure(cause) => default(cause),
        }
    }

    pub fn or_else(self, fallback: impl FnOnce(Cause) -> Outcome<T>) -> Outcome<T> {
        match self {
            Outcome::Success(value) => Outcome::Success(value),
            Outcome::Failure(cause) => fallback(cause),
        }
    }

    /// Applies `f` to a success payload and classifies what it returns.
    pub fn map<R: Classify>(self, f: impl FnOnce(T) -> R) -> Outcome<R::Payload> {
        match self {
            Outcome::Success(value) => f(value).classify(),
            Outcome::Failure(cause) => Outcome::Failure(cause),
        }
    }

    pub fn flat_map<U>(self, f: impl FnOnce(T) -> Outcome<U>) -> Outcome<U> {
        match self {
            Outcome::Success(value) => f(value),
            Outcome::Failure(cause) => Outcome::Failure(cause),
        }
    }

    pub fn fold<U>(self, on_failure: impl FnOnce(Cause) -> U, on_success: impl FnOnce(T) -> U) -> U {
        match self {
            Outcome::Success(value) => on_success(value),
            Outcome::Failure(cause) => on_failure(cause),
        }
    }
}

impl<T: fmt::Debug> fmt::Display for Outcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success(value) => write!(f, "Success({value:?})"),
            Outcome::Failure(cause) => write!(f, "Failure({cause})"),
        }
    }
}

/// Turns a produced value into an [`Outcome`].
///
/// `false` and `Err(_)` classify as failures. Every other implementor is a
/// plain payload and always succeeds, `()` included as the "no value" marker.
pub trait Classify {
    type Payload;

    fn classify(self) -> Outcome<Self::Payload>;
}

impl Classify for bool {
    type Payload = bool;

    fn classify(self) -> Outcome<bool> {
        if self {
            Outcome::Success(true)
        } else {
            Outcome::Failure(Cause::False)
        }
    }
}

impl<T, E> Classify for Result<T, E>
where
    E: error::Error + Send + Sync + 'static,
{
    type Payload = T;

    fn classify(self) -> Outcome<T> {
        match self {
            Ok(value) => Outcome::Success(value),
            Err(err) => Outcome::Failure(Cause::error(err)),
        }
    }
}

impl<T> Classify for Outcome<T> {
    type Payload = T;

    fn classify(self) -> Outcome<T> {
        self
    }
}

macro_rules! classify_as_success {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Classify for $ty {
                type Payload = $ty;

                fn classify(self) -> Outcome<$ty> {
                    Outcome::Success(self)
                }
            }
        )*
    };
}

classify_as_success!(
    (),
    i8, i16, i32, i64, i128, isize,
    u8, u16, u32, u64, u128, usize,
    f32, f64, char, String, &'static str,
);

macro_rules! classify_generic_as_success {
    ($($ty:ident),*) => {
        $(
            impl<T> Classify for $ty<T> {
                type Payload = $ty<T>;

                fn classify(self) -> Outcome<$ty<T>> {
                    Outcome::Success(self)
                }
            }
        )*
    };
}

classify_generic_as_success!(Vec, Option, Box, Arc);

macro_rules! classify_tuple_as_success {
    ($(($($name:ident),+)),*) => {
        $(
            impl<$($name),+> Classify for ($($name,)+) {
                type Payload = ($($name,)+);

                fn classify(self) -> Outcome<Self::Payload> {
                    Outcome::Success(self)
                }
            }
        )*
    };
}

classify_tuple_as_success!((A, B), (A, B, C), (A, B, C, D));

#[cfg(test)]
mod tests {
    use super::{Cause, Classify, Outcome};
    use crate::Error;

    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct Boom;

    #[test]
    fn test_false_is_failure() {
        assert!(false.classify().is_failure());
        assert_eq!(true.classify().success(), Some(true));
    }

    #[test]
    fn test_err_is_failure() {
        let outcome = Err::<i32, _>(Boom).classify();
        match outcome {
            Outcome::Failure(cause) => assert_eq!(cause.to_string(), "boom"),
            Outcome::Success(_) => panic!("expected failure"),
        }
        assert_eq!(Ok::<_, Boom>(7).classify().success(), Some(7));
    }

    #[test]
    fn test_null_like_values_succeed() {
        assert_eq!(None::<i32>.classify().success(), Some(None));
        assert_eq!(().classify().success(), Some(()));
        assert_eq!(0_i32.classify().success(), Some(0));
        assert_eq!("".classify().success(), Some(""));
    }

    #[test]
    fn test_cancel_cause_is_recognised() {
        assert!(Cause::cancelled().is_cancelled());
        assert!(!Cause::False.is_cancelled());
        assert!(!Cause::error(Boom).is_cancelled());
        assert!(Cause::from(Error::Panicked("x".into())).is_panic());
        assert_eq!(Cause::cancelled().to_string(), "user cancel");
    }

    #[test]
    fn test_map_short_circuits_failure() {
        let failed: Outcome<i32> = Outcome::Failure(Cause::False);
        let mapped = failed.map(|_| -> i32 { panic!("must not run") });
        assert!(mapped.is_failure());

        let mapped = Outcome::Success(3).map(|x| x > 5);
        assert!(mapped.is_failure());
    }

    #[test]
    fn test_get_or_else_and_fold() {
        let failed: Outcome<i32> = Outcome::Failure(Cause::False);
        assert_eq!(failed.clone().get_or_else(|_| 9), 9);
        assert_eq!(failed.fold(|c| c.to_string(), |v| v.to_string()), "false");
        assert_eq!(Outcome::Success(2).to_string(), "Success(2)");
        assert_eq!(Outcome::<i32>::Failure(Cause::False).to_string(), "Failure(false)");
    }
}
