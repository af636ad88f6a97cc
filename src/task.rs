use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use log::error;

/// A boxed nullary callable submitted to the pool.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Identifier assigned to every submitted job, in submission order.
pub type JobId = usize;

/// A function that receives the payload of a panicking job.
pub type PanicHandler = dyn Fn(JobId, &(dyn Any + Send)) + Send + Sync + 'static;

pub(crate) type Listener = Box<dyn Fn(JobId) + Send + Sync>;

pub(crate) struct TaskListeners {
    pub(crate) before_execute: Listener,
    pub(crate) after_execute: Listener,
    pub(crate) on_panic: Option<Box<PanicHandler>>,
}

impl Default for TaskListeners {
    fn default() -> Self {
        Self {
            before_execute: Box::new(|_: JobId| {}),
            after_execute: Box::new(|_: JobId| {}),
            on_panic: None,
        }
    }
}

/// A queued job together with its id and the pool's listeners.
pub(crate) struct Task {
    id: JobId,
    job: Job,
    listeners: Arc<TaskListeners>,
}

impl Task {
    pub(crate) fn create(id: JobId, job: Job, listeners: Arc<TaskListeners>) -> Self {
        Self { id, job, listeners }
    }

    #[inline]
    pub(crate) fn id(&self) -> JobId {
        self.id
    }

    /// Runs the job on the current thread.
    ///
    /// A panic raised by the job (or by a listener) is caught here, so
    /// the calling worker survives it. Returns `false` if the job
    /// panicked.
    pub(crate) fn run(self) -> bool {
        let Task { id, job, listeners } = self;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            (listeners.before_execute)(id);
            job();
            (listeners.after_execute)(id);
        }));

        match outcome {
            Ok(()) => true,
            Err(payload) => {
                error!("job {} panicked: {}", id, panic_message(payload.as_ref()));
                if let Some(on_panic) = &listeners.on_panic {
                    // The sink is user code as well.
                    let handled = panic::catch_unwind(AssertUnwindSafe(|| {
                        on_panic(id, payload.as_ref());
                    }));
                    if handled.is_err() {
                        error!("panic handler panicked while handling job {}", id);
                    }
                }
                false
            }
        }
    }
}

/// Extracts a printable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        *msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "<non-string payload>"
    }
}

#[cfg(test)]
mod tests {
    use super::{panic_message, Task, TaskListeners};
    use std::any::Any;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };

    #[test]
    fn test_run_calls_listeners_in_order() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let (before, job, after) = (events.clone(), events.clone(), events.clone());
        let listeners = TaskListeners {
            before_execute: Box::new(move |id: usize| {
                before.lock().unwrap().push(format!("before {id}"));
            }),
            after_execute: Box::new(move |id: usize| {
                after.lock().unwrap().push(format!("after {id}"));
            }),
            on_panic: None,
        };

        let task = Task::create(
            7,
            Box::new(move || job.lock().unwrap().push("job".to_string())),
            Arc::new(listeners),
        );
        assert_eq!(7, task.id());
        assert!(task.run());
        assert_eq!(vec!["before 7", "job", "after 7"], *events.lock().unwrap());
    }

    #[test]
    fn test_run_catches_panic() {
        let seen = Arc::new(Mutex::new(None));
        let after_calls = Arc::new(AtomicUsize::new(0));
        let seen_by_handler = seen.clone();
        let after = after_calls.clone();
        let listeners = TaskListeners {
            after_execute: Box::new(move |_: usize| {
                after.fetch_add(1, Ordering::SeqCst);
            }),
            on_panic: Some(Box::new(move |id: usize, payload: &(dyn Any + Send)| {
                let msg = panic_message(payload).to_string();
                *seen_by_handler.lock().unwrap() = Some((id, msg));
            })),
            ..TaskListeners::default()
        };

        let task = Task::create(2, Box::new(|| panic!("boom")), Arc::new(listeners));
        assert!(!task.run());
        assert_eq!(Some((2, "boom".to_string())), *seen.lock().unwrap());
        assert_eq!(0, after_calls.load(Ordering::SeqCst));
    }

    #[test]
    fn test_panicking_handler_is_contained() {
        let listeners = TaskListeners {
            on_panic: Some(Box::new(|_: usize, _: &(dyn Any + Send)| panic!("handler"))),
            ..TaskListeners::default()
        };
        let task = Task::create(0, Box::new(|| panic!("job")), Arc::new(listeners));
        assert!(!task.run());
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!("owned", panic_message(payload.as_ref()));
        let payload: Box<dyn Any + Send> = Box::new(42_u32);
        assert_eq!("<non-string payload>", panic_message(payload.as_ref()));
    }
}
