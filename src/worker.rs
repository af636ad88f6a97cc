use std::{
    io,
    sync::Arc,
    thread::{self, JoinHandle},
};

use log::{debug, trace};

use crate::thread_pool::{PoolShared, SpawnFn};

/// A worker holds the handle of a thread running [`run`].
pub(crate) struct Worker {
    pub(crate) id: usize,
    pub(crate) handle: JoinHandle<()>,
}

impl Worker {
    /// Spawns a worker thread that belongs to the generation `epoch`.
    pub(crate) fn spawn(
        id: usize,
        epoch: u64,
        shared: &Arc<PoolShared>,
        spawner: &SpawnFn,
    ) -> io::Result<Self> {
        let shared = Arc::clone(shared);
        let handle = spawner(id, Box::new(move || run(&shared, id, epoch)))?;
        Ok(Worker { id, handle })
    }

    #[inline]
    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Joins the worker thread, unless it is the calling thread.
    #[inline]
    pub(crate) fn join(self) -> thread::Result<()> {
        if self.handle.thread().id() != thread::current().id() {
            self.handle.join()?
        }
        Ok(())
    }
}

/// The worker loop: take the oldest task, run it outside the lock,
/// account for it, repeat until the pool stops or a newer generation
/// of workers replaces this one.
fn run(shared: &PoolShared, id: usize, epoch: u64) {
    debug!("worker {} started", id);

    loop {
        let task = {
            let mut state = shared.state.lock();
            while state.queue.is_empty() && !state.should_exit(epoch) {
                shared.job_available.wait(&mut state);
            }
            // Stopping takes precedence over queued work.
            if state.should_exit(epoch) {
                break;
            }
            match state.queue.pop() {
                Some(task) => task,
                None => continue,
            }
        };

        let job_id = task.id();
        trace!("worker {} starting job {}", id, job_id);
        let completed = task.run();

        let mut state = shared.state.lock();
        state.pending -= 1;
        trace!(
            "worker {} {} job {}, {} pending",
            id,
            if completed { "finished" } else { "gave up on" },
            job_id,
            state.pending
        );
        if state.pending == 0 && state.waiters > 0 {
            shared.drained.notify_all();
        }
    }

    debug!("worker {} stopped", id);
}
