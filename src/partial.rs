use std::fmt;

/// A function defined only where its condition holds.
///
/// # Examples
///
/// ```
/// use promise_future::PartialFunc;
///
/// let even_half = PartialFunc::new(|x: &i32| x % 2 == 0, |x| x / 2);
/// assert_eq!(even_half.apply(8), Some(4));
///
/// let even_half = PartialFunc::new(|x: &i32| x % 2 == 0, |x| x / 2);
/// assert_eq!(even_half.apply(7), None);
/// ```
pub struct PartialFunc<T, U> {
    condition: Box<dyn Fn(&T) -> bool + Send>,
    action: Box<dyn FnOnce(T) -> U + Send>,
}

impl<T, U> PartialFunc<T, U> {
    pub fn new<C, A>(condition: C, action: A) -> Self
    where
        C: Fn(&T) -> bool + Send + 'static,
        A: FnOnce(T) -> U + Send + 'static,
    {
        Self {
            condition: Box::new(condition),
            action: Box::new(action),
        }
    }

    pub fn is_defined_at(&self, value: &T) -> bool {
        (self.condition)(value)
    }

    /// Runs the action if the condition accepts `value`.
    pub fn apply(self, value: T) -> Option<U> {
        if (self.condition)(&value) {
            Some((self.action)(value))
        } else {
            None
        }
    }
}

impl<T, U> fmt::Debug for PartialFunc<T, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartialFunc").finish_non_exhaustive()
    }
}
