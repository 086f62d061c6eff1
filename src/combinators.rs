//! Building one promise out of several.
//!
//! `all` and the `zip` family share one join: every input writes its value
//! into a slot of a mutex-guarded accumulator and counts down; the input that
//! brings the count to zero settles the outer promise with every slot. The
//! first failure marks the accumulator failed and rejects the outer promise;
//! anything that arrives after that is discarded.
use crate::{
    executor::{Executor, Inline},
    resolution::Resolution,
    Error, Promise, Resolver,
};
use parking_lot::Mutex;
use std::sync::Arc;

/// Slot storage of a join: one optional value per input.
trait Slots: Send + 'static {
    type Output: Clone + Send + Sync + 'static;

    /// Empties every slot, `None` if any was still unset.
    fn take_all(&mut self) -> Option<Self::Output>;
}

impl<V> Slots for Vec<Option<V>>
where
    V: Clone + Send + Sync + 'static,
{
    type Output = Vec<V>;

    fn take_all(&mut self) -> Option<Vec<V>> {
        self.iter_mut().map(Option::take).collect()
    }
}

macro_rules! tuple_slots {
    ($($ty:ident $idx:tt),+) => {
        impl<$($ty),+> Slots for ($(Option<$ty>,)+)
        where
            $($ty: Clone + Send + Sync + 'static),+
        {
            type Output = ($($ty,)+);

            fn take_all(&mut self) -> Option<Self::Output> {
                let taken = ($(self.$idx.take(),)+);
                Some(($(taken.$idx?,)+))
            }
        }
    };
}

tuple_slots!(A 0, B 1);
tuple_slots!(A 0, B 1, C 2);
tuple_slots!(A 0, B 1, C 2, D 3);
tuple_slots!(A 0, B 1, C 2, D 3, E 4);

struct Join<S> {
    slots: S,
    remaining: usize,
    failed: bool,
}

type SharedJoin<S> = Arc<Mutex<Join<S>>>;

fn join<S: Slots>(slots: S, remaining: usize) -> SharedJoin<S> {
    Arc::new(Mutex::new(Join {
        slots,
        remaining,
        failed: false,
    }))
}

/// Feeds `input` into the join. `store` writes the input's value into its
/// slot.
fn wire<T, S, F>(input: &Promise<T>, join: &SharedJoin<S>, resolver: &Resolver<S::Output>, store: F)
where
    T: Clone + Send + Sync + 'static,
    S: Slots,
    F: FnOnce(&mut S, T) + Send + 'static,
{
    let join = join.clone();
    let resolver = resolver.clone();
    input.subscribe(move |resolution| {
        let mut state = join.lock();
        if state.failed {
            return;
        }
        match resolution {
            Resolution::Completed(value) => {
                store(&mut state.slots, value);
                state.remaining -= 1;
                if state.remaining > 0 {
                    return;
                }
                let output = state.slots.take_all();
                drop(state);
                if let Some(output) = output {
                    resolver.try_settle(Resolution::Completed(output));
                }
            }
            Resolution::Failed(error) => {
                state.failed = true;
                drop(state);
                resolver.try_settle(Resolution::Failed(error));
            }
        }
    });
}

/// Completes with every input value, in input order, once all inputs have
/// completed. Fails with the first failure observed among the inputs.
/// No inputs completes immediately with an empty `Vec`. Callbacks on the
/// result run inline; see [`all_on`] to pick their executor.
///
/// # Examples
///
/// ```
/// use promise_chain::{all, fulfill};
///
/// let joined = all([fulfill(1), fulfill(2), fulfill(3)]);
/// assert_eq!(joined.wait().unwrap(), vec![1, 2, 3]);
/// ```
pub fn all<V, I>(promises: I) -> Promise<Vec<V>>
where
    V: Clone + Send + Sync + 'static,
    I: IntoIterator<Item = Promise<V>>,
{
    all_on(Arc::new(Inline), promises)
}

/// [`all`] whose result delivers its callbacks on `target`.
pub fn all_on<V, I>(target: Arc<dyn Executor>, promises: I) -> Promise<Vec<V>>
where
    V: Clone + Send + Sync + 'static,
    I: IntoIterator<Item = Promise<V>>,
{
    let promises: Vec<_> = promises.into_iter().collect();
    let (outer, resolver) = Promise::pending_on(target);
    if promises.is_empty() {
        resolver.resolve(vec![]);
        return outer;
    }
    let join = join(vec![None; promises.len()], promises.len());
    for (index, promise) in promises.iter().enumerate() {
        wire(promise, &join, &resolver, move |slots: &mut Vec<Option<V>>, value| {
            slots[index] = Some(value)
        });
    }
    outer
}

/// Same as [`all`].
pub fn when<V, I>(promises: I) -> Promise<Vec<V>>
where
    V: Clone + Send + Sync + 'static,
    I: IntoIterator<Item = Promise<V>>,
{
    all(promises)
}

/// Settles exactly as the first input to settle, value or error. Later
/// settlements are ignored. No inputs fails with [`Error::EmptyRace`].
pub fn first<V, I>(promises: I) -> Promise<V>
where
    V: Clone + Send + Sync + 'static,
    I: IntoIterator<Item = Promise<V>>,
{
    first_on(Arc::new(Inline), promises)
}

/// [`first`] whose result delivers its callbacks on `target`.
pub fn first_on<V, I>(target: Arc<dyn Executor>, promises: I) -> Promise<V>
where
    V: Clone + Send + Sync + 'static,
    I: IntoIterator<Item = Promise<V>>,
{
    let (outer, resolver) = Promise::pending_on(target);
    let mut raced = false;
    for promise in promises {
        raced = true;
        let resolver = resolver.clone();
        promise.subscribe(move |resolution| {
            resolver.try_settle(resolution);
        });
    }
    if !raced {
        resolver.reject(Error::EmptyRace);
    }
    outer
}

macro_rules! zip_fn {
    (
        $(#[$meta:meta])* $name:ident, $name_on:ident, $count:literal;
        $($ty:ident $arg:ident $idx:tt),+
    ) => {
        $(#[$meta])*
        pub fn $name<$($ty),+>($($arg: Promise<$ty>),+) -> Promise<($($ty,)+)>
        where
            $($ty: Clone + Send + Sync + 'static),+
        {
            $name_on(Arc::new(Inline), $($arg),+)
        }

        #[doc = concat!("[`", stringify!($name), "`] whose result delivers its callbacks on `target`.")]
        pub fn $name_on<$($ty),+>(
            target: Arc<dyn Executor>,
            $($arg: Promise<$ty>),+
        ) -> Promise<($($ty,)+)>
        where
            $($ty: Clone + Send + Sync + 'static),+
        {
            let (outer, resolver) = Promise::pending_on(target);
            let join: SharedJoin<($(Option<$ty>,)+)> = join(Default::default(), $count);
            $(
                wire(&$arg, &join, &resolver, |slots, value| slots.$idx = Some(value));
            )+
            outer
        }
    };
}

zip_fn!(
    /// Joins two promises into a pair. Fails with the first failure among
    /// them.
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_chain::{fulfill, zip};
    ///
    /// let pair = zip(fulfill(1), fulfill("x"));
    /// assert_eq!(pair.wait().unwrap(), (1, "x"));
    /// ```
    zip, zip_on, 2; A a 0, B b 1
);
zip_fn!(
    /// Three-way [`zip`].
    zip3, zip3_on, 3; A a 0, B b 1, C c 2
);
zip_fn!(
    /// Four-way [`zip`].
    zip4, zip4_on, 4; A a 0, B b 1, C c 2, D d 3
);
zip_fn!(
    /// Five-way [`zip`].
    zip5, zip5_on, 5; A a 0, B b 1, C c 2, D d 3, E e 4
);
