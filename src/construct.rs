//! Turning plain computations into promises.
use crate::{promise::guarded, resolution::Resolution, Error, Executors, Promise, Resolver};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Runs `computation` on the default execution executor. `Ok` completes the
/// returned promise and `Err` fails it.
///
/// # Examples
///
/// ```
/// use promise_chain::promise;
///
/// let p = promise(|| Ok(21 * 2));
/// assert_eq!(p.wait().unwrap(), 42);
/// ```
pub fn promise<V, F>(computation: F) -> Promise<V>
where
    V: Clone + Send + Sync + 'static,
    F: FnOnce() -> Result<V, Error> + Send + 'static,
{
    Executors::default().promise(computation)
}

/// Runs `executor` on the default execution executor with a [`Resolver`] for
/// the returned promise.
///
/// # Examples
///
/// ```
/// use promise_chain::promise_with;
///
/// let p = promise_with(|resolver| resolver.resolve("done"));
/// assert_eq!(p.wait().unwrap(), "done");
/// ```
pub fn promise_with<V, F>(executor: F) -> Promise<V>
where
    V: Clone + Send + Sync + 'static,
    F: FnOnce(Resolver<V>) + Send + 'static,
{
    Executors::default().promise_with(executor)
}

/// A promise already completed with `value`. Nothing is dispatched.
pub fn fulfill<V>(value: V) -> Promise<V>
where
    V: Clone + Send + Sync + 'static,
{
    Promise::fulfilled(value)
}

impl Executors {
    /// Runs `computation` on the execution executor; callbacks on the
    /// returned promise are delivered on the target executor.
    pub fn promise<V, F>(&self, computation: F) -> Promise<V>
    where
        V: Clone + Send + Sync + 'static,
        F: FnOnce() -> Result<V, Error> + Send + 'static,
    {
        let (promise, resolver) = Promise::pending_on(self.target.clone());
        self.execution.execute(Box::new(move || {
            resolver.settle(guarded(computation).into());
        }));
        promise
    }

    /// Runs `executor` on the execution executor with a [`Resolver`].
    ///
    /// The executor may settle right away or hand the resolver (or clones of
    /// it) to other work that settles later. Returning after dropping every
    /// handle unsettled is a bug: the promise fails with
    /// [`Error::ProducerDropped`] and a debug assertion fires.
    pub fn promise_with<V, F>(&self, executor: F) -> Promise<V>
    where
        V: Clone + Send + Sync + 'static,
        F: FnOnce(Resolver<V>) + Send + 'static,
    {
        let (promise, resolver) = Promise::pending_on(self.target.clone());
        self.execution.execute(Box::new(move || {
            let fallback = resolver.clone();
            if let Err(payload) = catch_unwind(AssertUnwindSafe(move || executor(resolver))) {
                fallback.try_settle(Resolution::Failed(Error::panicked(payload)));
                return;
            }
            let abandoned = fallback.is_sole_handle() && !fallback.is_settled();
            drop(fallback);
            if abandoned {
                tracing::error!("promise executor returned without calling resolve or reject");
            }
            debug_assert!(!abandoned, "promise executor must call resolve or reject");
        }));
        promise
    }
}
