use std::{any::Any, sync::Arc};

use crate::{
    error::Result,
    task::{JobId, TaskListeners},
    thread_pool::{default_spawner, SpawnFn},
    ThreadPool,
};

/// A builder of the [`ThreadPool`], which can be used to configure
/// the properties of a new thread pool.
///
/// # Examples
///
/// ```
/// use jobpool::ThreadPoolBuilder;
///
/// let thread_pool = ThreadPoolBuilder::default()
///     .worker_count(4)
///     .listener_before_execute(|id| println!("the job {} will be executed.", id))
///     .listener_after_execute(|id| println!("the job {} has been executed.", id))
///     .panic_handler(|id, _| eprintln!("the job {} panicked.", id))
///     .build()
///     .unwrap();
///
/// assert!(!thread_pool.is_stopped());
/// ```
pub struct ThreadPoolBuilder {
    pub(crate) worker_count: usize,
    pub(crate) auto_start: bool,
    pub(crate) task_listeners: TaskListeners,
    pub(crate) spawner: Arc<SpawnFn>,
}

impl Default for ThreadPoolBuilder {
    /// Creates a new builder with the default configuration.
    ///
    /// # Default Configuration
    /// - `worker_count`: 0, one worker per logical CPU
    /// - `auto_start`: `true`
    /// - `before_execute`: an empty closure `|_| ()`
    /// - `after_execute`: an empty closure `|_| ()`
    /// - `panic_handler`: none, panics are only logged
    fn default() -> Self {
        Self {
            worker_count: 0,
            auto_start: true,
            task_listeners: TaskListeners::default(),
            spawner: default_spawner(),
        }
    }
}

impl ThreadPoolBuilder {
    /// Creates the base configuration for the new thread pool.
    ///
    /// See: [`ThreadPoolBuilder::default`]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of workers spawned by the automatic start.
    ///
    /// 0 means one worker per logical CPU.
    #[must_use]
    pub fn worker_count(mut self, count: usize) -> Self {
        self.worker_count = count;
        self
    }

    /// Sets whether [`build`](ThreadPoolBuilder::build) starts the pool.
    /// A pool that is not started accepts jobs but does not run them
    /// until [`ThreadPool::start`] is called.
    #[must_use]
    pub fn auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    /// Sets the listener function that will be invoked on the worker
    /// thread before a job is executed.
    #[must_use]
    pub fn listener_before_execute<F>(mut self, listener: F) -> Self
    where
        F: Fn(JobId) + Send + Sync + 'static,
    {
        self.task_listeners.before_execute = Box::new(listener);
        self
    }

    /// Sets the listener function that will be invoked on the worker
    /// thread after a job has returned normally.
    #[must_use]
    pub fn listener_after_execute<F>(mut self, listener: F) -> Self
    where
        F: Fn(JobId) + Send + Sync + 'static,
    {
        self.task_listeners.after_execute = Box::new(listener);
        self
    }

    /// Sets the function that receives the id and the panic payload of
    /// a job that panicked.
    #[must_use]
    pub fn panic_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(JobId, &(dyn Any + Send)) + Send + Sync + 'static,
    {
        self.task_listeners.on_panic = Some(Box::new(handler));
        self
    }

    /// Replaces the function that creates worker threads.
    #[cfg(test)]
    pub(crate) fn spawner(mut self, spawner: Arc<SpawnFn>) -> Self {
        self.spawner = spawner;
        self
    }

    /// Creates a thread pool with the configuration, starting it if
    /// `auto_start` is set.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Spawn`](crate::PoolError::Spawn) if a worker
    /// thread could not be created.
    pub fn build(self) -> Result<ThreadPool> {
        let auto_start = self.auto_start;
        let worker_count = self.worker_count;
        let thread_pool = ThreadPool::from_builder(self);
        if auto_start {
            thread_pool.start(worker_count)?;
        }
        Ok(thread_pool)
    }
}

#[cfg(test)]
mod tests {
    use super::ThreadPoolBuilder;

    #[test]
    fn test_builder_defaults() {
        let builder = ThreadPoolBuilder::default();
        assert_eq!(0, builder.worker_count);
        assert!(builder.auto_start);
        assert!(builder.task_listeners.on_panic.is_none());
    }

    #[test]
    fn test_build_without_auto_start() {
        let thread_pool = ThreadPoolBuilder::new()
            .auto_start(false)
            .worker_count(3)
            .build()
            .unwrap();
        assert!(thread_pool.is_stopped());
        assert_eq!(0, thread_pool.worker_count());
    }

    #[test]
    fn test_build_with_auto_start() {
        let thread_pool = ThreadPoolBuilder::new().worker_count(3).build().unwrap();
        assert!(!thread_pool.is_stopped());
        assert_eq!(3, thread_pool.worker_count());
    }

    #[test]
    fn test_zero_workers_uses_cpu_count() {
        let thread_pool = ThreadPoolBuilder::new().build().unwrap();
        assert_eq!(num_cpus::get().max(1), thread_pool.worker_count());
    }
}
