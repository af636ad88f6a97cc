use crate::{
    error::{PoolError, Result},
    queue::JobQueue,
    task::{Job, JobId, Task, TaskListeners},
    worker::Worker,
    ThreadPoolBuilder,
};

use log::{debug, error, trace};
use parking_lot::{Condvar, Mutex};

use std::{
    collections::VecDeque,
    io, mem,
    sync::Arc,
    thread::{self, JoinHandle},
};

/// A function that starts the OS thread of a worker.
pub(crate) type SpawnFn =
    dyn Fn(usize, Box<dyn FnOnce() + Send>) -> io::Result<JoinHandle<()>> + Send + Sync;

pub(crate) fn default_spawner() -> Arc<SpawnFn> {
    Arc::new(|_: usize, body: Box<dyn FnOnce() + Send>| {
        thread::Builder::new().spawn(body)
    })
}

/// Everything guarded by the pool mutex.
pub(crate) struct PoolState {
    pub(crate) stopped: bool,
    /// Generation of the current worker set, bumped by every `start`.
    pub(crate) epoch: u64,
    /// Number of threads blocked in `wait`.
    pub(crate) waiters: usize,
    /// Queued plus running jobs.
    pub(crate) pending: usize,
    pub(crate) next_job_id: JobId,
    pub(crate) queue: JobQueue,
    pub(crate) workers: Vec<Worker>,
}

impl PoolState {
    #[inline]
    pub(crate) fn should_exit(&self, epoch: u64) -> bool {
        self.stopped || self.epoch != epoch
    }

    #[inline]
    fn running(&self) -> usize {
        self.pending - self.queue.len()
    }

    /// Removes all queued jobs, keeping `pending` in step.
    ///
    /// The removed tasks are returned so that they can be dropped after
    /// the lock is released.
    fn clear_queue(&mut self, drained: &Condvar) -> VecDeque<Task> {
        let removed = self.queue.take_all();
        self.pending -= removed.len();
        if !removed.is_empty() && self.pending == 0 && self.waiters > 0 {
            drained.notify_all();
        }
        removed
    }
}

pub(crate) struct PoolShared {
    pub(crate) state: Mutex<PoolState>,
    /// Signalled when a job is queued or the pool stops.
    pub(crate) job_available: Condvar,
    /// Signalled when `pending` drops to zero.
    pub(crate) drained: Condvar,
    pub(crate) listeners: Arc<TaskListeners>,
}

impl PoolShared {
    fn add_job(&self, job: Job) -> JobId {
        let mut state = self.state.lock();
        // Taken under the lock so that ids follow queue order.
        let id = state.next_job_id;
        state.next_job_id += 1;
        state.pending += 1;
        state
            .queue
            .push(Task::create(id, job, self.listeners.clone()));
        trace!("job {} added, {} pending", id, state.pending);
        self.job_available.notify_one();
        id
    }

    fn clear_queue(&self) -> usize {
        let discarded = self.state.lock().clear_queue(&self.drained);
        let removed = discarded.len();
        drop(discarded);
        debug!("cleared {} queued jobs", removed);
        removed
    }

    fn is_stopped(&self) -> bool {
        self.state.lock().stopped
    }

    fn pending_jobs(&self) -> usize {
        self.state.lock().pending
    }

    fn queued_jobs(&self) -> usize {
        self.state.lock().queue.len()
    }

    fn running_jobs(&self) -> usize {
        self.state.lock().running()
    }
}

/// A `ThreadPool` runs submitted jobs on a fixed set of worker
/// threads.
///
/// # Job Queue
///
/// Jobs are kept in an unbounded FIFO queue and are handed to workers
/// in the order they were added. With a single worker this means jobs
/// also run in submission order; with more workers they start in order
/// but may finish in any order.
///
/// # Lifecycle
///
/// A pool is either stopped or running. [`start`] spawns the workers
/// and [`stop`] joins them again. Both return `false` when they find
/// the pool already in the requested state. Dropping the pool stops it
/// and discards anything still queued.
///
/// Jobs may be added to a stopped pool; they stay queued until the
/// next [`start`].
///
/// # Accounting
///
/// The pool counts every job that has been added but has not finished
/// yet ([`pending_jobs`]). That count is the sum of the jobs waiting in
/// the queue ([`queued_jobs`]) and the jobs currently being executed
/// ([`running_jobs`]). [`wait`] blocks until it reaches zero.
///
/// # Panics in jobs
///
/// A panicking job is caught on the worker, logged, passed to the
/// panic handler set with [`ThreadPoolBuilder::panic_handler`] and
/// counted as finished. The worker keeps running.
///
/// # Re-entrancy
///
/// A job must not stop or wait on the pool that runs it. Jobs that need
/// to submit more work capture a [`PoolHandle`] instead, which only
/// exposes the operations that are safe to call from a worker.
///
/// [`start`]: ThreadPool::start
/// [`stop`]: ThreadPool::stop
/// [`wait`]: ThreadPool::wait
/// [`pending_jobs`]: ThreadPool::pending_jobs
/// [`queued_jobs`]: ThreadPool::queued_jobs
/// [`running_jobs`]: ThreadPool::running_jobs
pub struct ThreadPool {
    pub(crate) share: Arc<PoolShared>,
    pub(crate) spawner: Arc<SpawnFn>,
}

impl ThreadPool {
    /// Creates a thread pool, starting `worker_count` workers right away
    /// if `auto_start` is set.
    ///
    /// A `worker_count` of 0 means one worker per logical CPU.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Spawn`] if a worker thread could not be
    /// created during the automatic start.
    pub fn new(auto_start: bool, worker_count: usize) -> Result<Self> {
        ThreadPoolBuilder::new()
            .auto_start(auto_start)
            .worker_count(worker_count)
            .build()
    }

    /// Builds a stopped thread pool from a configuration(builder).
    pub(crate) fn from_builder(builder: ThreadPoolBuilder) -> Self {
        Self {
            share: Arc::new(PoolShared {
                state: Mutex::new(PoolState {
                    stopped: true,
                    epoch: 0,
                    waiters: 0,
                    pending: 0,
                    next_job_id: 0,
                    queue: JobQueue::default(),
                    workers: Vec::new(),
                }),
                job_available: Condvar::new(),
                drained: Condvar::new(),
                listeners: Arc::new(builder.task_listeners),
            }),
            spawner: builder.spawner,
        }
    }

    /// Spawns `worker_count` workers (0 = one per logical CPU) and
    /// starts dispatching queued jobs.
    ///
    /// Returns `Ok(false)` without doing anything if the pool is already
    /// running.
    ///
    /// # Errors
    ///
    /// If a worker thread cannot be created, the workers spawned so far
    /// are joined, the pool is left stopped and [`PoolError::Spawn`] is
    /// returned. Queued jobs are kept.
    pub fn start(&self, worker_count: usize) -> Result<bool> {
        let worker_count = resolve_worker_count(worker_count);
        let mut state = self.share.state.lock();
        if !state.stopped {
            return Ok(false);
        }

        state.stopped = false;
        state.epoch += 1;
        let epoch = state.epoch;
        for id in 0..worker_count {
            match Worker::spawn(id, epoch, &self.share, &*self.spawner) {
                Ok(worker) => state.workers.push(worker),
                Err(source) => {
                    state.stopped = true;
                    let spawned = mem::take(&mut state.workers);
                    self.share.job_available.notify_all();
                    // Release lock.
                    drop(state);
                    error!("failed to spawn worker {}: {}", id, source);
                    join_workers(spawned);
                    return Err(PoolError::Spawn { index: id, source });
                }
            }
        }

        debug!(
            "thread pool started with {} workers, {} jobs queued",
            worker_count,
            state.queue.len()
        );
        Ok(true)
    }

    /// Stops the pool and joins every worker.
    ///
    /// Jobs that are already running finish first. If `clear_queue` is
    /// set, the queued jobs are discarded; otherwise they are kept for
    /// the next [`start`](ThreadPool::start).
    ///
    /// Returns `false` if the pool was already stopped.
    pub fn stop(&self, clear_queue: bool) -> bool {
        let (workers, discarded) = {
            let mut state = self.share.state.lock();
            if state.stopped {
                return false;
            }
            state.stopped = true;
            let discarded = if clear_queue {
                state.clear_queue(&self.share.drained)
            } else {
                VecDeque::new()
            };
            debug!(
                "stopping thread pool, {} queued jobs discarded, {} kept",
                discarded.len(),
                state.queue.len()
            );
            self.share.job_available.notify_all();
            (mem::take(&mut state.workers), discarded)
        };

        drop(discarded);
        join_workers(workers);
        debug!("thread pool stopped");
        true
    }

    /// Adds a job to the end of the queue and wakes one worker.
    ///
    /// Returns the id given to the job. Ids increase in submission order
    /// and are the ones passed to the execute listeners.
    ///
    /// # Examples
    ///
    /// ```
    /// use jobpool::ThreadPool;
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    /// use std::sync::Arc;
    ///
    /// let thread_pool = ThreadPool::new(true, 4).unwrap();
    ///
    /// let sum = Arc::new(AtomicUsize::new(0));
    /// for _ in 0..10 {
    ///     let sum = sum.clone();
    ///     thread_pool.add_job(move || {
    ///         sum.fetch_add(1, Ordering::SeqCst);
    ///     });
    /// }
    ///
    /// // Block current thread until all jobs have finished.
    /// thread_pool.wait();
    /// assert_eq!(10, sum.load(Ordering::Relaxed));
    /// ```
    pub fn add_job<F>(&self, job: F) -> JobId
    where
        F: FnOnce() + Send + 'static,
    {
        self.share.add_job(Box::new(job))
    }

    /// Blocks until no job is queued or running.
    ///
    /// Returns immediately if nothing is pending. On a stopped pool with
    /// queued jobs this blocks until the pool is started again or the
    /// queue is cleared.
    pub fn wait(&self) {
        let mut state = self.share.state.lock();
        if state.pending == 0 {
            return;
        }

        state.waiters += 1;
        while state.pending > 0 {
            self.share.drained.wait(&mut state);
        }
        state.waiters -= 1;
    }

    /// Discards all queued jobs and returns how many were removed.
    /// Running jobs are not affected.
    pub fn clear_queue(&self) -> usize {
        self.share.clear_queue()
    }

    /// Returns `true` if the pool is stopped.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.share.is_stopped()
    }

    /// Counts queued and running jobs.
    #[must_use]
    pub fn pending_jobs(&self) -> usize {
        self.share.pending_jobs()
    }

    /// Counts jobs waiting for a worker.
    #[must_use]
    pub fn queued_jobs(&self) -> usize {
        self.share.queued_jobs()
    }

    /// Counts jobs currently being executed.
    #[must_use]
    pub fn running_jobs(&self) -> usize {
        self.share.running_jobs()
    }

    /// Counts the live worker threads of this pool.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.share
            .state
            .lock()
            .workers
            .iter()
            .filter(|worker| !worker.is_finished())
            .count()
    }

    /// Returns a handle that jobs can use to submit more work.
    #[must_use]
    pub fn handle(&self) -> PoolHandle {
        PoolHandle {
            share: self.share.clone(),
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.stop(true);
        // Jobs queued on a stopped pool may hold handles to it.
        self.share.clear_queue();
    }
}

/// A cloneable handle to a [`ThreadPool`].
///
/// It can add jobs and inspect the pool, but it can neither stop nor
/// wait on it, so it is safe to move into a job. A handle does not keep
/// the pool running: once the [`ThreadPool`] is dropped, jobs added
/// through the handle are queued but never run.
///
/// # Examples
///
/// ```
/// use jobpool::ThreadPool;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let thread_pool = ThreadPool::new(true, 2).unwrap();
/// let counter = Arc::new(AtomicUsize::new(0));
///
/// let handle = thread_pool.handle();
/// let children = counter.clone();
/// thread_pool.add_job(move || {
///     for _ in 0..10 {
///         let counter = children.clone();
///         handle.add_job(move || {
///             counter.fetch_add(1, Ordering::SeqCst);
///         });
///     }
/// });
///
/// thread_pool.wait();
/// assert_eq!(10, counter.load(Ordering::SeqCst));
/// ```
#[derive(Clone)]
pub struct PoolHandle {
    share: Arc<PoolShared>,
}

impl PoolHandle {
    /// See [`ThreadPool::add_job`].
    pub fn add_job<F>(&self, job: F) -> JobId
    where
        F: FnOnce() + Send + 'static,
    {
        self.share.add_job(Box::new(job))
    }

    /// See [`ThreadPool::clear_queue`].
    pub fn clear_queue(&self) -> usize {
        self.share.clear_queue()
    }

    /// See [`ThreadPool::is_stopped`].
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.share.is_stopped()
    }

    /// See [`ThreadPool::pending_jobs`].
    #[must_use]
    pub fn pending_jobs(&self) -> usize {
        self.share.pending_jobs()
    }

    /// See [`ThreadPool::queued_jobs`].
    #[must_use]
    pub fn queued_jobs(&self) -> usize {
        self.share.queued_jobs()
    }

    /// See [`ThreadPool::running_jobs`].
    #[must_use]
    pub fn running_jobs(&self) -> usize {
        self.share.running_jobs()
    }
}

/// Maps the worker count 0 to the number of logical CPUs.
pub(crate) fn resolve_worker_count(worker_count: usize) -> usize {
    if worker_count == 0 {
        usize::max(1, num_cpus::get())
    } else {
        worker_count
    }
}

fn join_workers(workers: Vec<Worker>) {
    for worker in workers {
        let id = worker.id;
        if worker.join().is_err() {
            error!("worker {} terminated abnormally", id);
        }
    }
}
