//! Where work runs.
//!
//! Promises never create threads on their own account. Producer computations
//! are handed to an *execution* executor and callbacks are delivered on a
//! *target* executor; both are supplied through [`Executors`].
use crossbeam_channel::{unbounded, Sender};
use std::{
    fmt, io,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
    thread,
};

/// A unit of work handed to an [`Executor`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs jobs, eventually, possibly on another thread.
pub trait Executor: Send + Sync {
    /// Schedule `job`. Must not block waiting for the job to finish.
    fn execute(&self, job: Job);
}

/// Runs every job immediately on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct Inline;

impl Executor for Inline {
    fn execute(&self, job: Job) {
        job()
    }
}

/// Spawns one OS thread per job.
#[derive(Debug, Clone, Default)]
pub struct Spawn {
    name: Option<String>,
}

impl Spawn {
    /// Threads spawned by this executor carry `name`.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }
}

impl Executor for Spawn {
    fn execute(&self, job: Job) {
        let mut builder = thread::Builder::new();
        if let Some(name) = &self.name {
            builder = builder.name(name.clone());
        }
        if let Err(err) = builder.spawn(job) {
            tracing::error!(error = %err, "failed to spawn executor thread; job dropped");
        }
    }
}

/// A FIFO queue drained by one dedicated worker thread.
///
/// Jobs run strictly in submission order. A job that panics is logged and the
/// worker moves on to the next one. The worker exits once every handle to the
/// queue has been dropped and the backlog is empty.
#[derive(Debug, Clone)]
pub struct SerialQueue {
    label: Arc<str>,
    sender: Sender<Job>,
}

impl SerialQueue {
    pub fn new(label: impl Into<String>) -> io::Result<Self> {
        let label: Arc<str> = label.into().into();
        let (sender, receiver) = unbounded::<Job>();
        let worker_label = label.clone();
        thread::Builder::new()
            .name(label.to_string())
            .spawn(move || {
                for job in receiver {
                    if catch_unwind(AssertUnwindSafe(job)).is_err() {
                        tracing::error!(queue = %worker_label, "job panicked on serial queue");
                    }
                }
            })?;
        Ok(Self { label, sender })
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Executor for SerialQueue {
    fn execute(&self, job: Job) {
        if self.sender.send(job).is_err() {
            tracing::warn!(queue = %self.label, "serial queue worker has exited; job dropped");
        }
    }
}

/// Executor configuration for constructing promises.
///
/// `execution` runs producer computations, `target` delivers callbacks. The
/// default runs producers on a fresh thread each and delivers callbacks
/// inline on whichever thread settles the promise or registers the callback.
#[derive(Clone)]
pub struct Executors {
    pub(crate) execution: Arc<dyn Executor>,
    pub(crate) target: Arc<dyn Executor>,
}

impl Executors {
    pub fn new(execution: Arc<dyn Executor>, target: Arc<dyn Executor>) -> Self {
        Self { execution, target }
    }

    pub fn with_execution(mut self, execution: Arc<dyn Executor>) -> Self {
        self.execution = execution;
        self
    }

    pub fn with_target(mut self, target: Arc<dyn Executor>) -> Self {
        self.target = target;
        self
    }

    pub fn execution(&self) -> &Arc<dyn Executor> {
        &self.execution
    }

    pub fn target(&self) -> &Arc<dyn Executor> {
        &self.target
    }
}

impl Default for Executors {
    fn default() -> Self {
        Self {
            execution: Arc::new(Spawn::named("promise-execution")),
            target: Arc::new(Inline),
        }
    }
}

impl fmt::Debug for Executors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executors").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::{Executor, Inline, SerialQueue, Spawn};
    use crossbeam_channel::unbounded;
    use parking_lot::Mutex;
    use std::{sync::Arc, thread, time::Duration};

    #[test]
    fn test_inline_runs_before_returning() {
        let ran = Arc::new(Mutex::new(false));
        let flag = ran.clone();
        Inline.execute(Box::new(move || *flag.lock() = true));
        assert!(*ran.lock());
    }

    #[test]
    fn test_spawn_runs_on_named_thread() {
        let (tx, rx) = unbounded();
        Spawn::named("spawned-job").execute(Box::new(move || {
            tx.send(thread::current().name().map(String::from)).unwrap();
        }));
        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some("spawned-job"));
    }

    #[test]
    fn test_serial_queue_preserves_order() {
        let queue = SerialQueue::new("serial-order").unwrap();
        let (tx, rx) = unbounded();
        for i in 0..32 {
            let tx = tx.clone();
            queue.execute(Box::new(move || {
                tx.send((i, thread::current().name().map(String::from)))
                    .unwrap();
            }));
        }
        for i in 0..32 {
            let (seen, name) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            assert_eq!(seen, i);
            assert_eq!(name.as_deref(), Some(queue.label()));
        }
    }

    #[test]
    fn test_serial_queue_survives_panicking_job() {
        let queue = SerialQueue::new("serial-panic").unwrap();
        let (tx, rx) = unbounded();
        queue.execute(Box::new(|| panic!("boom")));
        queue.execute(Box::new(move || tx.send(7).unwrap()));
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 7);
    }
}
