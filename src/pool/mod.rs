//! Fixed-size worker pool fed by a [`TaskQueue`].

mod queue;

pub use queue::{Task, TaskQueue};

use crate::error::{ServerError, ServerResult};
use parking_lot::Mutex;
use queue::Message;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Worker count used when core detection fails.
pub const FALLBACK_THREADS: usize = 4;

pub struct WorkerPool {
    queue: Arc<TaskQueue>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    thread_count: usize,
}

impl WorkerPool {
    /// Starts `thread_count` workers; `0` means one per available core.
    pub fn new(thread_count: usize) -> ServerResult<Self> {
        let thread_count = if thread_count == 0 {
            default_thread_count()
        } else {
            thread_count
        };
        let queue = Arc::new(TaskQueue::new());
        let mut workers = Vec::with_capacity(thread_count);

        for id in 0..thread_count {
            let worker_queue = Arc::clone(&queue);
            let spawned = thread::Builder::new()
                .name(format!("crest-worker-{}", id))
                .spawn(move || run_worker(&worker_queue));
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    queue.close(workers.len());
                    for handle in workers {
                        let _ = handle.join();
                    }
                    return Err(ServerError::ThreadSpawn(e));
                }
            }
        }

        tracing::debug!(threads = thread_count, "worker pool started");
        Ok(WorkerPool {
            queue,
            workers: Mutex::new(workers),
            thread_count,
        })
    }

    /// Queues `task`. Returns `false` after shutdown.
    pub fn submit<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.queue.push(Box::new(task))
    }

    /// Runs every queued task, then stops and joins the workers.
    /// Later calls return immediately.
    pub fn shutdown(&self) {
        if !self.queue.close(self.thread_count) {
            return;
        }
        let workers = std::mem::take(&mut *self.workers.lock());
        for handle in workers {
            if handle.join().is_err() {
                tracing::error!("worker thread exited abnormally");
            }
        }
        tracing::debug!("worker pool stopped");
    }

    pub fn thread_count(&self) -> usize {
        self.thread_count
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_shutdown(&self) -> bool {
        self.queue.is_closed()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(queue: &TaskQueue) {
    loop {
        match queue.pop() {
            Message::Run(task) => {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
                    tracing::error!(panic = %panic_message(payload.as_ref()), "task panicked");
                }
            }
            Message::Terminate => break,
        }
    }
}

/// One worker per available core, or [`FALLBACK_THREADS`] if that is unknown.
pub fn default_thread_count() -> usize {
    match thread::available_parallelism() {
        Ok(n) => n.get(),
        Err(e) => {
            tracing::warn!(error = %e, "could not detect core count, using {} workers", FALLBACK_THREADS);
            FALLBACK_THREADS
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn every_task_runs_exactly_once() {
        let pool = WorkerPool::new(4).unwrap();
        let runs: Arc<Vec<AtomicUsize>> = Arc::new((0..1000).map(|_| AtomicUsize::new(0)).collect());
        for i in 0..1000 {
            let runs = runs.clone();
            assert!(pool.submit(move || {
                runs[i].fetch_add(1, Ordering::SeqCst);
            }));
        }
        pool.shutdown();
        assert!(runs.iter().all(|r| r.load(Ordering::SeqCst) == 1));
    }

    #[test]
    fn shutdown_drains_queue() {
        let pool = WorkerPool::new(2).unwrap();
        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..20 {
            let done = done.clone();
            pool.submit(move || {
                thread::sleep(Duration::from_millis(5));
                done.fetch_add(1, Ordering::SeqCst);
            });
        }
        pool.shutdown();
        assert_eq!(done.load(Ordering::SeqCst), 20);
        assert_eq!(pool.queue_len(), 0);
        assert!(pool.is_shutdown());
    }

    #[test]
    fn submit_after_shutdown_is_refused() {
        let pool = WorkerPool::new(1).unwrap();
        pool.shutdown();
        pool.shutdown();
        assert!(!pool.submit(|| {}));
    }

    #[test]
    fn panicking_task_does_not_kill_worker() {
        let pool = WorkerPool::new(1).unwrap();
        let done = Arc::new(AtomicUsize::new(0));
        pool.submit(|| panic!("boom"));
        let counter = done.clone();
        pool.submit(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        drop(pool);
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn single_worker_starts_tasks_in_order() {
        let pool = WorkerPool::new(1).unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..50 {
            let order = order.clone();
            pool.submit(move || order.lock().push(i));
        }
        pool.shutdown();
        assert_eq!(*order.lock(), (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn thread_count_defaults() {
        assert!(default_thread_count() >= 1);
        let pool = WorkerPool::new(0).unwrap();
        assert_eq!(pool.thread_count(), default_thread_count());
        let pool = WorkerPool::new(3).unwrap();
        assert_eq!(pool.thread_count(), 3);
    }

    #[test]
    fn panic_messages() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42u8), "unknown panic");
    }
}
