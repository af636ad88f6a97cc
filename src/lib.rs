//! # Job Pool
//!
//! A fixed-size pool of worker threads that executes jobs, nullary
//! closures, in the order they were submitted. Producers add jobs from
//! any thread, workers take them from a shared FIFO queue, and
//! [`ThreadPool::wait`] blocks until everything submitted so far has
//! finished.
//!
//! The pool does not deliver results. A job that produces something
//! sends it on by itself, e.g. through a channel or a callback it
//! captured.
//!
//! # Build a thread pool
//!
//! [`ThreadPool::new`] creates a pool with a given number of workers.
//! Use the [`ThreadPoolBuilder`] to install execute listeners or a
//! panic handler.
//!
//! # Examples
//!
//! ```
//! use jobpool::ThreadPool;
//! use std::sync::mpsc;
//!
//! let thread_pool = ThreadPool::new(true, 4).unwrap();
//!
//! let (tx, rx) = mpsc::channel();
//! for input in [vec![0, 0, 1], vec![0, 1, 1], vec![1, 1, 1]] {
//!     let tx = tx.clone();
//!     thread_pool.add_job(move || {
//!         let sum: i32 = input.iter().sum();
//!         tx.send(sum).unwrap();
//!     });
//! }
//!
//! thread_pool.wait();
//! let mut sums: Vec<i32> = rx.try_iter().collect();
//! sums.sort();
//! assert_eq!(vec![1, 2, 3], sums);
//!
//! // Stop the pool and join all worker threads.
//! assert!(thread_pool.stop(true));
//! ```

mod builder;
mod error;
mod thread_pool;

pub(crate) mod queue;
pub(crate) mod task;
pub(crate) mod worker;

pub use builder::*;
pub use error::{PoolError, Result};
pub use task::{Job, JobId, PanicHandler};
pub use thread_pool::{PoolHandle, ThreadPool};
