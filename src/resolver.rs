//! The producer side of a [`Promise`].
use crate::{resolution::Resolution, Error, Promise};
use std::sync::Arc;

/// Settles the [`Promise`] it was created with.
///
/// `resolve`, `reject`, `settle` and `adopt` consume the handle, so a single
/// handle cannot settle twice. Clones share the promise; when several clones
/// race, use [`try_settle`](Self::try_settle), which lets all but the first
/// settlement fall through. Settling an already settled promise through one
/// of the consuming calls is a bug in the caller: it is logged, trips a debug
/// assertion, and never overwrites the first outcome.
///
/// When the last clone is dropped without settling, the promise fails with
/// [`Error::ProducerDropped`].
///
/// # Examples
///
/// ```
/// use promise_chain::Promise;
/// use std::thread;
///
/// let (promise, resolver) = Promise::<String>::pending();
/// let task = thread::spawn(move || resolver.resolve("Hi".into()));
/// assert_eq!(promise.wait().unwrap(), "Hi");
/// task.join().expect("The producer thread has panicked.");
/// ```
pub struct Resolver<V>
where
    V: Clone + Send + Sync + 'static,
{
    handle: Arc<Handle<V>>,
}

struct Handle<V>
where
    V: Clone + Send + Sync + 'static,
{
    promise: Promise<V>,
}

impl<V> Drop for Handle<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// If this is an unresolved producer, fail its promise.
    fn drop(&mut self) {
        if self
            .promise
            .try_settle(Resolution::Failed(Error::ProducerDropped))
        {
            tracing::warn!("promise producer dropped without settling");
        }
    }
}

impl<V> Clone for Resolver<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
        }
    }
}

impl<V> Resolver<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(promise: Promise<V>) -> Self {
        Self {
            handle: Arc::new(Handle { promise }),
        }
    }

    pub fn resolve(self, value: V) {
        self.settle(Resolution::Completed(value))
    }

    pub fn reject(self, error: Error) {
        self.settle(Resolution::Failed(error))
    }

    pub fn settle(self, resolution: Resolution<V>) {
        let settled = self.try_settle(resolution);
        if !settled {
            tracing::error!("attempted to settle an already settled promise");
        }
        debug_assert!(settled, "a promise may only be settled once");
    }

    /// Commits `resolution` if nothing has settled the promise yet. Returns
    /// whether this call won.
    pub fn try_settle(&self, resolution: Resolution<V>) -> bool {
        self.handle.promise.try_settle(resolution)
    }

    /// Settles with whatever `source` eventually settles with.
    pub fn adopt(self, source: &Promise<V>) {
        source.subscribe(move |resolution| self.settle(resolution));
    }

    pub fn is_settled(&self) -> bool {
        self.handle.promise.is_fulfilled()
    }

    /// The promise this handle settles.
    pub fn promise(&self) -> Promise<V> {
        self.handle.promise.clone()
    }

    /// `true` when no other clone of this handle is alive.
    pub(crate) fn is_sole_handle(&self) -> bool {
        Arc::strong_count(&self.handle) == 1
    }
}

#[cfg(test)]
mod tests {
    use crate::{resolution::Resolution, Error, Promise};
    use std::thread;

    #[test]
    fn test_resolve_from_another_thread() {
        let (p, resolver) = Promise::<String>::pending();
        let task = thread::spawn(move || resolver.resolve(String::from("🍓")));
        assert_eq!(p.wait().unwrap(), "🍓");
        task.join().expect("The task thread has panicked");
    }

    #[test]
    fn test_dropped_producer_fails_promise() {
        let (p, resolver) = Promise::<String>::pending();
        let task = thread::spawn(move || {
            // Move the producer into this thread but never resolve it.
            std::mem::drop(resolver);
        });
        task.join().expect("The task thread has panicked");
        assert!(matches!(p.wait(), Err(Error::ProducerDropped)));
    }

    #[test]
    fn test_clone_keeps_promise_pending() {
        let (p, resolver) = Promise::<i32>::pending();
        let kept = resolver.clone();
        drop(resolver);
        assert!(!p.is_fulfilled());
        kept.resolve(3);
        assert_eq!(p.value(), Some(3));
    }

    #[test]
    fn test_second_settlement_has_no_effect() {
        let (p, resolver) = Promise::pending();
        let other = resolver.clone();
        resolver.resolve(1);
        assert!(!other.try_settle(Resolution::Completed(2)));
        assert!(!other.try_settle(Resolution::Failed(Error::msg("late"))));
        assert_eq!(p.value(), Some(1));
        assert!(p.error().is_none());
        assert!(other.is_settled());
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "a promise may only be settled once")]
    fn test_resolving_twice_is_loud() {
        let (_p, resolver) = Promise::pending();
        let other = resolver.clone();
        resolver.resolve(1);
        other.reject(Error::msg("again"));
    }

    #[test]
    fn test_adopt_follows_source() {
        let (source, source_resolver) = Promise::<i32>::pending();
        let (p, resolver) = Promise::pending();
        resolver.adopt(&source);
        assert!(!p.is_fulfilled());
        source_resolver.reject(Error::msg("upstream"));
        assert_eq!(p.error().map(|e| e.to_string()).as_deref(), Some("upstream"));
    }

    #[test]
    fn test_resolver_hands_out_its_promise() {
        let (p, resolver) = Promise::pending();
        let same = resolver.promise();
        resolver.resolve("x");
        assert_eq!(p.value(), same.value());
    }
}
