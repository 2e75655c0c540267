use std::{
    collections::VecDeque,
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    thread,
};

use log::debug;
use thiserror::Error;

pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Number of workers the daemon runs with.
pub const DEFAULT_WORKERS: usize = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("thread pool is shutting down, task rejected")]
    ShutDown,
}

#[derive(Default)]
struct State {
    jobs: VecDeque<Job>,
    stopping: bool,
}

#[derive(Default)]
struct Shared {
    state: Mutex<State>,
    available: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        // Jobs never run while the lock is held, so a poisoned queue is still consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fixed-size pool of worker threads fed from a single FIFO queue.
///
/// Shutdown starts with [`ThreadPool::close`] (or on drop) and lets workers
/// drain every queued job before they exit.
pub struct ThreadPool {
    workers: Vec<Worker>,
    shared: Arc<Shared>,
}

impl ThreadPool {
    pub fn new(size: usize) -> Self {
        assert!(size > 0);

        let shared = Arc::new(Shared::default());
        let workers = (0..size)
            .map(|id| Worker::new(id, Arc::clone(&shared)))
            .collect();

        Self { workers, shared }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queue a job and wake one idle worker. Never blocks on capacity.
    pub fn execute<F>(&self, f: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut state = self.shared.lock();
            if state.stopping {
                return Err(PoolError::ShutDown);
            }
            state.jobs.push_back(Box::new(f));
        }
        self.shared.available.notify_one();
        Ok(())
    }

    /// Stop accepting jobs. Queued jobs still run.
    pub fn close(&self) {
        self.shared.lock().stopping = true;
        self.shared.available.notify_all();
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.close();

        for worker in self.workers.drain(..) {
            debug!("shutting down worker {}", worker.id);

            if worker.thread.join().is_err() {
                debug!("worker {} exited with a panic", worker.id);
            }
        }
    }
}

struct Worker {
    id: usize,
    thread: thread::JoinHandle<()>,
}

impl Worker {
    fn new(id: usize, shared: Arc<Shared>) -> Self {
        let thread = thread::spawn(move || {
            loop {
                let job = {
                    let mut state = shared
                        .available
                        .wait_while(shared.lock(), |s| s.jobs.is_empty() && !s.stopping)
                        .unwrap_or_else(PoisonError::into_inner);

                    match state.jobs.pop_front() {
                        Some(job) => job,
                        None => {
                            debug!("worker {id} disconnected!");
                            return;
                        }
                    }
                };

                debug!("worker {id} handling a connection!");
                job();
            }
        });

        Self { id, thread }
    }
}
