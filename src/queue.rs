use std::{collections::VecDeque, mem};

use crate::task::Task;

/// The FIFO sequence of tasks waiting for a worker.
///
/// Carries no synchronization of its own; it is only touched while the
/// pool's state mutex is held.
#[derive(Default)]
pub(crate) struct JobQueue {
    tasks: VecDeque<Task>,
}

impl JobQueue {
    pub(crate) fn push(&mut self, task: Task) {
        self.tasks.push_back(task);
    }

    /// Moves the oldest task out of the queue.
    pub(crate) fn pop(&mut self) -> Option<Task> {
        self.tasks.pop_front()
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.tasks.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Moves every queued task out of the queue.
    ///
    /// The caller decides where the tasks are dropped, which must not be
    /// under the pool mutex: their captures may call back into the pool.
    pub(crate) fn take_all(&mut self) -> VecDeque<Task> {
        mem::take(&mut self.tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::JobQueue;
    use crate::task::{Task, TaskListeners};
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    fn task(id: usize, listeners: &Arc<TaskListeners>) -> Task {
        Task::create(id, Box::new(|| ()), listeners.clone())
    }

    #[test]
    fn test_fifo_order() {
        let listeners = Arc::new(TaskListeners::default());
        let mut queue = JobQueue::default();
        for id in 0..4 {
            queue.push(task(id, &listeners));
        }
        assert_eq!(4, queue.len());

        let ids: Vec<_> = std::iter::from_fn(|| queue.pop().map(|t| t.id())).collect();
        assert_eq!(vec![0, 1, 2, 3], ids);
        assert!(queue.is_empty());
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_take_all_hands_out_jobs_without_running_them() {
        let listeners = Arc::new(TaskListeners::default());
        let runs = Arc::new(AtomicUsize::new(0));
        let mut queue = JobQueue::default();
        for id in 0..3 {
            let runs = runs.clone();
            queue.push(Task::create(
                id,
                Box::new(move || {
                    runs.fetch_add(1, Ordering::SeqCst);
                }),
                listeners.clone(),
            ));
        }

        let taken = queue.take_all();
        assert_eq!(3, taken.len());
        assert!(queue.is_empty());
        assert!(queue.take_all().is_empty());
        // Still owned by the caller.
        assert_eq!(4, Arc::strong_count(&runs));

        drop(taken);
        assert_eq!(0, runs.load(Ordering::SeqCst));
        assert_eq!(1, Arc::strong_count(&runs));
    }
}
