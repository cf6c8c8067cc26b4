//! Parallel decode scheduler.
//!
//! Jobs run on a dedicated rayon pool and publish their result through a
//! single-slot channel. The driving thread polls handles without blocking;
//! a job that panics publishes an [`IngestError::Job`] instead of leaving
//! its slot empty.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{IngestError, Result};

/// Worker pool shared by every job of a load.
pub struct JobPool {
    pool: ThreadPool,
    spawned: AtomicUsize,
}

impl JobPool {
    /// `threads` of `None` uses rayon's default (one per logical CPU).
    pub fn new(threads: Option<usize>) -> Result<Self> {
        let mut builder =
            ThreadPoolBuilder::new().thread_name(|i| format!("gltf-ingest-worker-{}", i));
        if let Some(n) = threads {
            builder = builder.num_threads(n);
        }
        let pool = builder
            .build()
            .map_err(|e| IngestError::Job(format!("Failed to start worker pool: {}", e)))?;
        Ok(Self {
            pool,
            spawned: AtomicUsize::new(0),
        })
    }

    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Total number of jobs spawned on this pool.
    pub fn jobs_spawned(&self) -> usize {
        self.spawned.load(Ordering::Relaxed)
    }

    pub fn spawn<T, F>(&self, job: F) -> JobHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        self.spawned.fetch_add(1, Ordering::Relaxed);
        let (completer, handle) = JobHandle::channel();
        self.pool.spawn(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(job))
                .unwrap_or_else(|payload| Err(panic_error(payload)));
            completer.complete(result);
        });
        handle
    }
}

impl std::fmt::Debug for JobPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobPool")
            .field("threads", &self.num_threads())
            .field("spawned", &self.jobs_spawned())
            .finish()
    }
}

fn panic_error(payload: Box<dyn Any + Send>) -> IngestError {
    let msg = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    IngestError::Job(format!("job panicked: {}", msg))
}

/// Write side of a [`JobHandle`]. Completing consumes it, so a result is
/// published at most once.
#[derive(Debug)]
pub struct Completer<T> {
    tx: Sender<Result<T>>,
}

impl<T> Completer<T> {
    pub fn complete(self, result: Result<T>) {
        // The handle may already be gone; the result is simply dropped then.
        let _ = self.tx.send(result);
    }
}

#[derive(Debug)]
enum Slot<T> {
    Pending(Receiver<Result<T>>),
    Ready(Result<T>),
    Taken,
}

/// Read side of a job's result slot.
#[derive(Debug)]
pub struct JobHandle<T> {
    slot: Slot<T>,
}

impl<T> JobHandle<T> {
    /// A connected completer/handle pair.
    pub fn channel() -> (Completer<T>, JobHandle<T>) {
        let (tx, rx) = mpsc::channel();
        (
            Completer { tx },
            JobHandle {
                slot: Slot::Pending(rx),
            },
        )
    }

    /// A handle that is already complete.
    pub fn ready(result: Result<T>) -> Self {
        JobHandle {
            slot: Slot::Ready(result),
        }
    }

    /// Non-blocking completion check.
    pub fn is_completed(&mut self) -> bool {
        if let Slot::Pending(rx) = &self.slot {
            let result = match rx.try_recv() {
                Ok(result) => result,
                Err(TryRecvError::Empty) => return false,
                Err(TryRecvError::Disconnected) => Err(dropped_error()),
            };
            self.slot = Slot::Ready(result);
        }
        true
    }

    /// Block until the job has published.
    pub fn wait(&mut self) {
        if let Slot::Pending(rx) = &self.slot {
            let result = rx.recv().unwrap_or_else(|_| Err(dropped_error()));
            self.slot = Slot::Ready(result);
        }
    }

    /// Move the result out. `None` while pending or after a previous take.
    pub fn take(&mut self) -> Option<Result<T>> {
        if !self.is_completed() {
            return None;
        }
        match std::mem::replace(&mut self.slot, Slot::Taken) {
            Slot::Ready(result) => Some(result),
            _ => None,
        }
    }

    /// Block, then move the result out.
    pub fn join(mut self) -> Result<T> {
        self.wait();
        self.take().unwrap_or_else(|| Err(dropped_error()))
    }
}

fn dropped_error() -> IngestError {
    IngestError::Job("job ended without publishing a result".into())
}

/// The jobs belonging to one primitive, tagged with a key per job.
#[derive(Debug)]
pub struct JobSet<K, T> {
    jobs: Vec<(K, JobHandle<T>)>,
}

impl<K, T> Default for JobSet<K, T> {
    fn default() -> Self {
        Self { jobs: Vec::new() }
    }
}

impl<K, T> JobSet<K, T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: K, handle: JobHandle<T>) {
        self.jobs.push((key, handle));
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// True once every job has published.
    pub fn is_completed(&mut self) -> bool {
        // No short-circuit: drain every slot that is ready.
        self.jobs
            .iter_mut()
            .fold(true, |done, (_, handle)| handle.is_completed() && done)
    }

    pub fn wait(&mut self) {
        for (_, handle) in &mut self.jobs {
            handle.wait();
        }
    }

    /// Wait for every job and hand back all results in push order.
    pub fn harvest(self) -> Vec<(K, Result<T>)> {
        self.jobs
            .into_iter()
            .map(|(key, handle)| (key, handle.join()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};

    #[test]
    fn test_spawn_and_join() {
        let pool = JobPool::new(Some(2)).unwrap();
        let handle = pool.spawn(|| Ok(21 * 2));
        assert_eq!(handle.join(), Ok(42));
        assert_eq!(pool.jobs_spawned(), 1);
    }

    #[test]
    fn test_poll_is_non_blocking() {
        let pool = JobPool::new(Some(1)).unwrap();
        let gate = Arc::new(Barrier::new(2));
        let job_gate = gate.clone();
        let mut handle = pool.spawn(move || {
            job_gate.wait();
            Ok("done")
        });
        assert!(!handle.is_completed());
        assert!(handle.take().is_none());
        gate.wait();
        handle.wait();
        assert!(handle.is_completed());
        assert_eq!(handle.take(), Some(Ok("done")));
        assert_eq!(handle.take(), None);
    }

    #[test]
    fn test_panic_becomes_job_error() {
        let pool = JobPool::new(Some(1)).unwrap();
        let handle = pool.spawn::<u32, _>(|| panic!("boom"));
        match handle.join() {
            Err(IngestError::Job(msg)) => assert!(msg.contains("boom")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_dropped_completer() {
        let (completer, mut handle) = JobHandle::<u8>::channel();
        drop(completer);
        assert!(handle.is_completed());
        assert!(matches!(handle.take(), Some(Err(IngestError::Job(_)))));
    }

    #[test]
    fn test_external_completion() {
        let (completer, mut handle) = JobHandle::channel();
        assert!(!handle.is_completed());
        completer.complete(Ok(vec![1u8, 2, 3]));
        assert_eq!(handle.take(), Some(Ok(vec![1, 2, 3])));
    }

    #[test]
    fn test_job_set_harvest_keeps_order_and_errors() {
        let pool = JobPool::new(Some(4)).unwrap();
        let mut set = JobSet::new();
        set.push("a", pool.spawn(|| Ok(1)));
        set.push("b", JobHandle::ready(Err(IngestError::format("bad"))));
        set.push("c", pool.spawn(|| Ok(3)));
        set.wait();
        assert!(set.is_completed());

        let results = set.harvest();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0], ("a", Ok(1)));
        assert!(results[1].1.is_err());
        assert_eq!(results[2], ("c", Ok(3)));
    }
}
