use crate::{
    deferred::{Continuation, DeferredQueue},
    executor::{Executor, Inline},
    resolution::{Resolution, ResolutionCell},
    Error, Resolver,
};
use std::{
    fmt,
    future::Future,
    panic::{catch_unwind, AssertUnwindSafe},
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

/// A single-assignment handle to the eventual outcome of a computation.
///
/// Cloning a `Promise` is cheap and every clone observes the same outcome.
/// Callbacks may be registered at any time, before or after the promise
/// settles; either way each one runs exactly once on the promise's target
/// executor, and callbacks registered before settlement run in registration
/// order.
///
/// # Examples
///
/// ```
/// use promise_chain::promise;
///
/// let p = promise(|| Ok(23)).map(|v| v + 23).map(|v| v.to_string());
/// assert_eq!(p.wait().unwrap(), "46");
/// ```
pub struct Promise<V> {
    shared: Arc<Shared<V>>,
}

struct Shared<V> {
    cell: ResolutionCell<V>,
    queue: DeferredQueue<V>,
}

impl<V> Clone for Promise<V> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<V> Promise<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// An unresolved promise delivering callbacks inline, together with the
    /// handle that settles it.
    pub fn pending() -> (Self, Resolver<V>) {
        Self::pending_on(Arc::new(Inline))
    }

    /// An unresolved promise delivering callbacks on `target`.
    pub fn pending_on(target: Arc<dyn Executor>) -> (Self, Resolver<V>) {
        let promise = Self {
            shared: Arc::new(Shared {
                cell: ResolutionCell::new(),
                queue: DeferredQueue::suspended(target),
            }),
        };
        let resolver = Resolver::new(promise.clone());
        (promise, resolver)
    }

    /// A promise that is already completed with `value`.
    pub fn fulfilled(value: V) -> Self {
        Self::settled(Resolution::Completed(value))
    }

    /// A promise that has already failed with `error`.
    pub fn rejected(error: Error) -> Self {
        Self::settled(Resolution::Failed(error))
    }

    pub fn from_result(result: Result<V, Error>) -> Self {
        Self::settled(result.into())
    }

    fn settled(resolution: Resolution<V>) -> Self {
        let (promise, resolver) = Self::pending();
        resolver.settle(resolution);
        promise
    }

    /// `true` once the promise has settled, whatever the outcome.
    pub fn is_fulfilled(&self) -> bool {
        self.shared.cell.is_resolved()
    }

    /// The completed value. `None` while unresolved or when failed.
    pub fn value(&self) -> Option<V> {
        self.shared.cell.get().and_then(Resolution::value).cloned()
    }

    /// The failure. `None` while unresolved or when completed.
    pub fn error(&self) -> Option<Error> {
        self.shared.cell.get().and_then(Resolution::error).cloned()
    }

    pub fn resolution(&self) -> Option<Resolution<V>> {
        self.shared.cell.get().cloned()
    }

    /// Blocks the calling thread until the promise settles.
    ///
    /// Calling this from the thread that is expected to settle the promise,
    /// for example the worker of a [`SerialQueue`](crate::SerialQueue) the
    /// producer runs on, never returns.
    pub fn wait(&self) -> Result<V, Error> {
        loop {
            if let Some(resolution) = self.shared.cell.get() {
                return resolution.clone().into_result();
            }
            self.shared.queue.wait_resumed();
        }
    }

    /// Runs `block` with the value if the promise completes.
    pub fn then<F>(&self, block: F) -> Self
    where
        F: FnOnce(V) + Send + 'static,
    {
        self.subscribe(move |resolution| {
            if let Resolution::Completed(value) = resolution {
                invoke("then", move || block(value));
            }
        });
        self.clone()
    }

    /// Runs `block` with the error if the promise fails.
    pub fn catch<F>(&self, block: F) -> Self
    where
        F: FnOnce(Error) + Send + 'static,
    {
        self.subscribe(move |resolution| {
            if let Resolution::Failed(error) = resolution {
                invoke("catch", move || block(error));
            }
        });
        self.clone()
    }

    /// Runs `block` once the promise settles, whatever the outcome.
    pub fn always<F>(&self, block: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.subscribe(move |_| invoke("always", block));
        self.clone()
    }

    /// A promise of `block` applied to this promise's value. A failure skips
    /// `block` and is passed on unchanged.
    pub fn map<R, F>(&self, block: F) -> Promise<R>
    where
        R: Clone + Send + Sync + 'static,
        F: FnOnce(V) -> R + Send + 'static,
    {
        self.try_map(move |value| Ok(block(value)))
    }

    /// Like [`map`](Self::map), but `block` may fail, failing the derived
    /// promise.
    pub fn try_map<R, F>(&self, block: F) -> Promise<R>
    where
        R: Clone + Send + Sync + 'static,
        F: FnOnce(V) -> Result<R, Error> + Send + 'static,
    {
        self.derive(move |resolution, resolver| match resolution {
            Resolution::Completed(value) => resolver.settle(guarded(move || block(value)).into()),
            Resolution::Failed(error) => resolver.reject(error),
        })
    }

    /// Like [`try_map`](Self::try_map), but `block` runs on `executor`
    /// instead of this promise's target.
    pub fn try_map_on<R, F>(&self, executor: Arc<dyn Executor>, block: F) -> Promise<R>
    where
        R: Clone + Send + Sync + 'static,
        F: FnOnce(V) -> Result<R, Error> + Send + 'static,
    {
        self.derive(move |resolution, resolver| match resolution {
            Resolution::Completed(value) => executor.execute(Box::new(move || {
                resolver.settle(guarded(move || block(value)).into())
            })),
            Resolution::Failed(error) => resolver.reject(error),
        })
    }

    /// Chains a computation that itself returns a promise. The derived
    /// promise settles with whatever the returned promise settles with.
    pub fn and_then<R, F>(&self, block: F) -> Promise<R>
    where
        R: Clone + Send + Sync + 'static,
        F: FnOnce(V) -> Promise<R> + Send + 'static,
    {
        self.derive(move |resolution, resolver| match resolution {
            Resolution::Completed(value) => match guarded(move || Ok(block(value))) {
                Ok(next) => resolver.adopt(&next),
                Err(error) => resolver.reject(error),
            },
            Resolution::Failed(error) => resolver.reject(error),
        })
    }

    /// Turns a failure back into a value. A completed promise passes through
    /// untouched.
    pub fn recover<F>(&self, block: F) -> Promise<V>
    where
        F: FnOnce(Error) -> V + Send + 'static,
    {
        self.try_recover(move |error| Ok(block(error)))
    }

    /// Like [`recover`](Self::recover), but `block` may fail again with a new
    /// error.
    pub fn try_recover<F>(&self, block: F) -> Promise<V>
    where
        F: FnOnce(Error) -> Result<V, Error> + Send + 'static,
    {
        self.derive(move |resolution, resolver| match resolution {
            Resolution::Completed(value) => resolver.resolve(value),
            Resolution::Failed(error) => resolver.settle(guarded(move || block(error)).into()),
        })
    }

    /// Builds a promise on the same target whose settlement is driven by
    /// `wire` once this one settles.
    fn derive<R, F>(&self, wire: F) -> Promise<R>
    where
        R: Clone + Send + Sync + 'static,
        F: FnOnce(Resolution<V>, Resolver<R>) + Send + 'static,
    {
        let (derived, resolver) = Promise::pending_on(self.shared.queue.target().clone());
        self.subscribe(move |resolution| wire(resolution, resolver));
        derived
    }

    /// Registers `continuation` to receive the resolution on the target
    /// executor, now if already settled, otherwise at settlement.
    pub(crate) fn subscribe<F>(&self, continuation: F)
    where
        F: FnOnce(Resolution<V>) + Send + 'static,
    {
        let continuation: Continuation<V> = Box::new(continuation);
        let Err(continuation) = self.shared.queue.enqueue(continuation) else {
            return;
        };
        // Resumed queues always sit behind a written cell.
        match self.shared.cell.get() {
            Some(resolution) => self.shared.queue.dispatch(continuation, resolution.clone()),
            None => {
                tracing::error!("resumed promise has no resolution, dropping callback");
                debug_assert!(false, "promise queue resumed before its resolution was written");
            }
        }
    }

    /// Commits `resolution` unless the promise already settled.
    pub(crate) fn try_settle(&self, resolution: Resolution<V>) -> bool {
        let outcome = resolution.outcome();
        if !self.shared.cell.try_resolve(resolution) {
            return false;
        }
        tracing::trace!(outcome, "promise settled");
        if let Some(resolution) = self.shared.cell.get() {
            self.shared.queue.resume(resolution);
        }
        true
    }
}

impl<V> Future for Promise<V>
where
    V: Clone + Send + Sync + 'static,
{
    type Output = Result<V, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(resolution) = self.shared.cell.get() {
            return Poll::Ready(resolution.clone().into_result());
        }
        if self.shared.queue.register_waker(cx.waker()) {
            if let Some(resolution) = self.shared.cell.get() {
                return Poll::Ready(resolution.clone().into_result());
            }
        }
        Poll::Pending
    }
}

impl<V: fmt::Debug> fmt::Debug for Promise<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("resolution", &self.shared.cell.get())
            .finish()
    }
}

/// Runs a user block, turning a panic into [`Error::Panicked`].
pub(crate) fn guarded<R>(block: impl FnOnce() -> Result<R, Error>) -> Result<R, Error> {
    catch_unwind(AssertUnwindSafe(block)).unwrap_or_else(|payload| Err(Error::panicked(payload)))
}

/// Runs a side-effect callback. A panic is logged and swallowed so the
/// callbacks queued behind it still run.
fn invoke(kind: &'static str, block: impl FnOnce()) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(block)) {
        let error = Error::panicked(payload);
        tracing::error!(callback = kind, %error, "promise callback panicked");
    }
}
