//! Cooperative cancellation signal shared by a future and everything derived
//! from it.
//!
//! A [`CancelToken`] is either a root or the child of another token. Cancelling
//! a token runs its hooks once and cancels every live child; cancelling a child
//! never reaches the parent.
use crate::lock;
use std::{
    collections::BTreeMap,
    fmt,
    sync::{Arc, Mutex, Weak},
};

type Hook = Box<dyn FnOnce() + Send>;

#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    parent: Mutex<Option<(CancelToken, u64)>>,
}

#[derive(Default)]
struct State {
    cancelled: bool,
    next_id: u64,
    hooks: BTreeMap<u64, Hook>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives a token that is cancelled whenever `self` is.
    pub fn child(&self) -> Self {
        let child = CancelToken::new();
        let weak: Weak<Inner> = Arc::downgrade(&child.inner);
        let id = self.on_cancel(move || {
            if let Some(inner) = weak.upgrade() {
                CancelToken { inner }.cancel();
            }
        });
        if let Some(id) = id {
            *lock(&child.inner.parent) = Some((self.clone(), id));
        }
        child
    }

    pub fn is_cancelled(&self) -> bool {
        lock(&self.inner.state).cancelled
    }

    /// Registers `hook` to run on cancellation and returns its handle.
    ///
    /// If the token is already cancelled the hook runs right away on the
    /// calling thread and `None` is returned.
    pub fn on_cancel<F>(&self, hook: F) -> Option<u64>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = lock(&self.inner.state);
        if state.cancelled {
            drop(state);
            hook();
            return None;
        }
        let id = state.next_id;
        state.next_id += 1;
        state.hooks.insert(id, Box::new(hook));
        Some(id)
    }

    /// Forgets a hook that has not run yet.
    pub fn remove(&self, id: u64) {
        lock(&self.inner.state).hooks.remove(&id);
    }

    /// Fires the signal. Hooks run in registration order, outside the lock.
    /// Only the first call has any effect.
    pub fn cancel(&self) {
        let hooks = {
            let mut state = lock(&self.inner.state);
            if state.cancelled {
                return;
            }
            state.cancelled = true;
            std::mem::take(&mut state.hooks)
        };
        tracing::debug!(hooks = hooks.len(), "cancel token fired");
        self.detach();
        for (_, hook) in hooks {
            hook();
        }
    }

    /// Stops listening to the parent token, if any.
    pub fn detach(&self) {
        let parent = lock(&self.inner.parent).take();
        if let Some((parent, id)) = parent {
            parent.remove(id);
        }
    }

    #[cfg(test)]
    pub(crate) fn hook_count(&self) -> usize {
        lock(&self.inner.state).hooks.len()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.inner.state);
        f.debug_struct("CancelToken")
            .field("cancelled", &state.cancelled)
            .field("hooks", &state.hooks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::CancelToken;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };
    use std::thread;

    #[test]
    fn test_hooks_run_once_in_order() {
        let token = CancelToken::new();
        let seen = Arc::new(Mutex::new(vec![]));
        for i in 0..3 {
            let seen = seen.clone();
            token.on_cancel(move || seen.lock().unwrap().push(i));
        }
        token.cancel();
        token.cancel();
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_late_hook_runs_inline() {
        let token = CancelToken::new();
        token.cancel();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        assert_eq!(token.on_cancel(move || {
            h.fetch_add(1, Ordering::SeqCst);
        }), None);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_removed_hook_never_runs() {
        let token = CancelToken::new();
        let id = token.on_cancel(|| panic!("removed hook ran")).unwrap();
        token.remove(id);
        token.cancel();
    }

    #[test]
    fn test_parent_cancels_child_but_not_reverse() {
        let parent = CancelToken::new();
        let child = parent.child();
        let sibling = parent.child();

        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
        assert!(!sibling.is_cancelled());
        // the cancelled child no longer hangs off the parent
        assert_eq!(parent.hook_count(), 1);

        parent.cancel();
        assert!(sibling.is_cancelled());
    }

    #[test]
    fn test_child_of_cancelled_parent_starts_cancelled() {
        let parent = CancelToken::new();
        parent.cancel();
        assert!(parent.child().is_cancelled());
    }

    #[test]
    fn test_detach_and_dropped_child() {
        let parent = CancelToken::new();
        let child = parent.child();
        child.detach();
        assert_eq!(parent.hook_count(), 0);
        parent.cancel();
        assert!(!child.is_cancelled());

        let parent = CancelToken::new();
        drop(parent.child());
        parent.cancel();
    }

    #[test]
    fn test_concurrent_cancel_fires_once() {
        let token = CancelToken::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        token.on_cancel(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let token = token.clone();
                thread::spawn(move || token.cancel())
            })
            .collect();
        for handle in handles {
            handle.join().expect("The cancel thread has panicked");
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
