//! The gate that holds callbacks back until a promise settles.
//!
//! A `DeferredQueue` starts suspended. Continuations registered while it is
//! suspended are parked in FIFO order. `resume` is called once, right after
//! the resolution cell is written, and hands the whole parked batch to the
//! target executor as a single drain job, so the batch runs in registration
//! order even on a target that runs jobs concurrently. Registrations that
//! arrive while that drain is still running queue up behind the batch. Once
//! the drain finishes, registrations are handed back to the caller to
//! dispatch directly.
use crate::{executor::Executor, resolution::Resolution, Error};
use parking_lot::{Condvar, Mutex};
use std::{
    collections::VecDeque,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
    task::Waker,
};

pub(crate) type Continuation<V> = Box<dyn FnOnce(Resolution<V>) + Send + 'static>;

pub(crate) struct DeferredQueue<V> {
    state: Arc<Mutex<QueueState<V>>>,
    resumed: Condvar,
    target: Arc<dyn Executor>,
}

struct QueueState<V> {
    suspended: bool,
    /// A drain job owns `pending` until it finds it empty.
    draining: bool,
    pending: VecDeque<Continuation<V>>,
    wakers: Vec<Waker>,
}

impl<V> DeferredQueue<V>
where
    V: Clone + Send + 'static,
{
    pub(crate) fn suspended(target: Arc<dyn Executor>) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState {
                suspended: true,
                draining: false,
                pending: VecDeque::new(),
                wakers: vec![],
            })),
            resumed: Condvar::new(),
            target,
        }
    }

    pub(crate) fn target(&self) -> &Arc<dyn Executor> {
        &self.target
    }

    /// Parks `continuation` until resume, or behind the running drain. Hands
    /// it back once the queue is resumed and drained.
    pub(crate) fn enqueue(&self, continuation: Continuation<V>) -> Result<(), Continuation<V>> {
        let mut state = self.state.lock();
        if state.suspended || state.draining {
            state.pending.push_back(continuation);
            Ok(())
        } else {
            Err(continuation)
        }
    }

    pub(crate) fn dispatch(&self, continuation: Continuation<V>, resolution: Resolution<V>) {
        self.target.execute(Box::new(move || continuation(resolution)));
    }

    /// Releases everything parked so far. Only the first call has an effect.
    pub(crate) fn resume(&self, resolution: &Resolution<V>) {
        let (count, wakers) = {
            let mut state = self.state.lock();
            if !state.suspended {
                return;
            }
            state.suspended = false;
            state.draining = !state.pending.is_empty();
            (state.pending.len(), std::mem::take(&mut state.wakers))
        };
        self.resumed.notify_all();
        for waker in wakers {
            waker.wake();
        }
        if count == 0 {
            return;
        }
        tracing::trace!(count, "draining deferred callbacks");
        let state = self.state.clone();
        let resolution = resolution.clone();
        self.target.execute(Box::new(move || drain(&state, &resolution)));
    }

    /// Registers `waker` to be woken on resume. Returns `true` instead if the
    /// queue is already resumed.
    pub(crate) fn register_waker(&self, waker: &Waker) -> bool {
        let mut state = self.state.lock();
        if !state.suspended {
            return true;
        }
        if !state.wakers.iter().any(|w| w.will_wake(waker)) {
            state.wakers.push(waker.clone());
        }
        false
    }

    /// Blocks the calling thread until resume.
    pub(crate) fn wait_resumed(&self) {
        let mut state = self.state.lock();
        while state.suspended {
            self.resumed.wait(&mut state);
        }
    }
}

/// Runs parked continuations one at a time until none are left, then hands
/// the queue back to direct dispatch.
fn drain<V: Clone>(state: &Mutex<QueueState<V>>, resolution: &Resolution<V>) {
    loop {
        let next = {
            let mut state = state.lock();
            match state.pending.pop_front() {
                Some(continuation) => continuation,
                None => {
                    state.draining = false;
                    return;
                }
            }
        };
        let resolution = resolution.clone();
        if let Err(payload) = catch_unwind(AssertUnwindSafe(move || next(resolution))) {
            let error = Error::panicked(payload);
            tracing::error!(%error, "deferred callback panicked");
        }
    }
}
