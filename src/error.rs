use std::io;

use thiserror::Error;

/// An error returned from [`ThreadPool::start`] and the constructors.
///
/// [`ThreadPool::start`]: crate::ThreadPool::start
#[derive(Error, Debug)]
pub enum PoolError {
    /// The platform refused to create a worker thread.
    ///
    /// When this is returned, the workers that were already spawned by
    /// the same `start` call have been joined and the pool is stopped.
    #[error("failed to spawn worker {index}: {source}")]
    Spawn {
        /// Index of the worker that could not be spawned.
        index: usize,
        /// The underlying OS error.
        #[source]
        source: io::Error,
    },
}

/// Result type alias for pool operations.
pub type Result<T> = std::result::Result<T, PoolError>;

#[cfg(test)]
mod tests {
    use super::PoolError;
    use std::{error::Error, io};

    #[test]
    fn test_spawn_error_display() {
        let err = PoolError::Spawn {
            index: 3,
            source: io::Error::new(io::ErrorKind::WouldBlock, "no more threads"),
        };
        assert_eq!("failed to spawn worker 3: no more threads", err.to_string());
        assert!(err.source().is_some());
    }
}
