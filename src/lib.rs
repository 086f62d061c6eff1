//! Single-assignment promises with chaining, recovery and fan-in combinators.
//!
//! A [`Promise`] holds the eventual outcome of a computation: a value or an
//! [`Error`], committed exactly once. Callbacks and derived promises can be
//! attached at any time; the ones attached before the outcome is known wait
//! for it, the ones attached afterwards run straight away, and both observe
//! the same outcome.
//!
//! ```
//! use promise_chain::{all, promise, Error};
//!
//! let total = all([promise(|| Ok(1)), promise(|| Ok(2))])
//!     .map(|values| values.iter().sum::<i32>())
//!     .try_map(|sum| if sum > 0 { Ok(sum) } else { Err(Error::msg("empty")) });
//! assert_eq!(total.wait().unwrap(), 3);
//! ```
//!
//! Work runs on the executors given by [`Executors`]: producers on its
//! execution executor, callbacks on its target executor.
mod combinators;
mod construct;
mod deferred;
mod executor;
mod promise;
mod resolution;
mod resolver;

use std::{any::Any, sync::Arc};

pub use combinators::{
    all, all_on, first, first_on, when, zip, zip3, zip3_on, zip4, zip4_on, zip5, zip5_on, zip_on,
};
pub use construct::{fulfill, promise, promise_with};
pub use executor::{Executor, Executors, Inline, Job, SerialQueue, Spawn};
pub use promise::Promise;
pub use resolution::Resolution;
pub use resolver::Resolver;

#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Other(Arc<dyn std::error::Error + Send + Sync + 'static>),
    #[error("promise producer dropped without settling it")]
    ProducerDropped,
    #[error("panicked: {0}")]
    Panicked(String),
    #[error("first() needs at least one promise to race")]
    EmptyRace,
}

impl Error {
    pub fn msg(message: impl Into<String>) -> Self {
        Error::Message(message.into())
    }

    /// Wraps any error type.
    pub fn other<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Other(Arc::new(error))
    }

    pub(crate) fn panicked(payload: Box<dyn Any + Send>) -> Self {
        let message = match payload.downcast::<String>() {
            Ok(message) => *message,
            Err(payload) => match payload.downcast::<&'static str>() {
                Ok(message) => message.to_string(),
                Err(_) => String::from("non-string panic payload"),
            },
        };
        Error::Panicked(message)
    }
}

#[cfg(test)]
mod tests {
    use super::Error;
    use std::{io, panic::catch_unwind};

    #[test]
    fn test_other_is_transparent() {
        let error = Error::other(io::Error::new(io::ErrorKind::Other, "disk on fire"));
        assert_eq!(error.to_string(), "disk on fire");
        assert!(std::error::Error::source(&error).is_none());
    }

    #[test]
    fn test_panic_payloads() {
        let payload = catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(Error::panicked(payload).to_string(), "panicked: static");
        let payload = catch_unwind(|| panic!("formatted {}", 1)).unwrap_err();
        assert_eq!(Error::panicked(payload).to_string(), "panicked: formatted 1");
        let payload = catch_unwind(|| std::panic::panic_any(7)).unwrap_err();
        assert!(matches!(Error::panicked(payload), Error::Panicked(_)));
    }
}
