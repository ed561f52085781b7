//! Runs producers on worker threads and owns the already-completed unit
//! future.
use crate::{boundary::invoke, Classify, Error, Future, Outcome, Promise};
use std::{sync::OnceLock, thread};

/// Settings for the worker threads a [`Runtime`] starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub thread_name: String,
    /// `None` keeps the platform default.
    pub stack_size: Option<usize>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            thread_name: "promise-future-worker".to_owned(),
            stack_size: None,
        }
    }
}

impl RuntimeConfig {
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }
}

#[derive(Debug)]
pub struct Runtime {
    config: RuntimeConfig,
    unit: OnceLock<Future<()>>,
}

impl Runtime {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            unit: OnceLock::new(),
        }
    }

    /// The process-wide runtime, built with the default config on first use.
    pub fn global() -> &'static Runtime {
        static GLOBAL: OnceLock<Runtime> = OnceLock::new();
        GLOBAL.get_or_init(|| Runtime::new(RuntimeConfig::default()))
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// The runtime's completed `Success(())` future.
    pub fn unit(&self) -> Future<()> {
        self.unit.get_or_init(|| Future::successful(())).clone()
    }

    /// Runs `f` on a new worker thread and returns a future of its classified
    /// output.
    ///
    /// Cancelling the returned future completes it right away; the worker keeps
    /// running and its late result is discarded.
    pub fn spawn<R, F>(&self, f: F) -> Future<R::Payload>
    where
        R: Classify,
        R::Payload: Clone + Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        let promise = Promise::new();
        let future = promise.future();

        let mut builder = thread::Builder::new().name(self.config.thread_name.clone());
        if let Some(size) = self.config.stack_size {
            builder = builder.stack_size(size);
        }
        let worker = promise.clone();
        match builder.spawn(move || {
            worker.complete(invoke(f));
        }) {
            Ok(_) => tracing::debug!(thread = %self.config.thread_name, "spawned worker"),
            Err(err) => {
                tracing::warn!(%err, "failed to spawn worker thread");
                promise.complete(Outcome::Failure(Error::Spawn(err).into()));
            }
        }
        future
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

/// Runs `f` on the global runtime.
pub fn future_of<R, F>(f: F) -> Future<R::Payload>
where
    R: Classify,
    R::Payload: Clone + Send + 'static,
    F: FnOnce() -> R + Send + 'static,
{
    Runtime::global().spawn(f)
}

/// The global runtime's unit future.
pub fn unit() -> Future<()> {
    Runtime::global().unit()
}
