//! The terminal outcome of a promise and the write-once cell that holds it.
use crate::Error;
use std::sync::{
    atomic::{AtomicU8, Ordering},
    OnceLock,
};

/// The outcome a promise settles with. Exactly one of a value or an error,
/// never both and never partially populated.
#[derive(Debug, Clone)]
pub enum Resolution<V> {
    Completed(V),
    Failed(Error),
}

impl<V> Resolution<V> {
    pub fn is_completed(&self) -> bool {
        matches!(self, Resolution::Completed(_))
    }

    /// The completed value, if any.
    pub fn value(&self) -> Option<&V> {
        match self {
            Resolution::Completed(value) => Some(value),
            Resolution::Failed(_) => None,
        }
    }

    /// The failure, if any.
    pub fn error(&self) -> Option<&Error> {
        match self {
            Resolution::Completed(_) => None,
            Resolution::Failed(error) => Some(error),
        }
    }

    pub fn into_result(self) -> Result<V, Error> {
        match self {
            Resolution::Completed(value) => Ok(value),
            Resolution::Failed(error) => Err(error),
        }
    }

    pub(crate) fn outcome(&self) -> &'static str {
        match self {
            Resolution::Completed(_) => "completed",
            Resolution::Failed(_) => "failed",
        }
    }
}

impl<V> From<Result<V, Error>> for Resolution<V> {
    fn from(result: Result<V, Error>) -> Self {
        match result {
            Ok(value) => Resolution::Completed(value),
            Err(error) => Resolution::Failed(error),
        }
    }
}

const UNRESOLVED: u8 = 0;
const RESOLVING: u8 = 1;
const RESOLVED: u8 = 2;

/// Write-once slot for a [`Resolution`].
///
/// Any number of producers may race on [`try_resolve`](Self::try_resolve);
/// the compare-and-swap on `guard` elects exactly one of them. Readers only
/// ever see the slot empty or holding a fully built resolution.
#[derive(Debug)]
pub(crate) struct ResolutionCell<V> {
    guard: AtomicU8,
    slot: OnceLock<Resolution<V>>,
}

impl<V> ResolutionCell<V> {
    pub(crate) fn new() -> Self {
        Self {
            guard: AtomicU8::new(UNRESOLVED),
            slot: OnceLock::new(),
        }
    }

    /// Returns `true` iff this call moved the cell from unresolved to
    /// resolved. A `false` return leaves the stored resolution untouched.
    pub(crate) fn try_resolve(&self, resolution: Resolution<V>) -> bool {
        if self
            .guard
            .compare_exchange(UNRESOLVED, RESOLVING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        let stored = self.slot.set(resolution).is_ok();
        debug_assert!(stored, "resolution slot written outside the guard");
        self.guard.store(RESOLVED, Ordering::Release);
        true
    }

    pub(crate) fn get(&self) -> Option<&Resolution<V>> {
        self.slot.get()
    }

    pub(crate) fn is_resolved(&self) -> bool {
        self.guard.load(Ordering::Acquire) == RESOLVED
    }
}
