#![forbid(unsafe_code)]

//! UI-thread executors.
//!
//! Property changes may be raised on any thread, but listeners of UI-facing
//! signals must only ever run on the thread that owns the UI. A
//! [`UiExecutor`] is the one primitive used to get there: `post` enqueues a
//! task for that thread, `schedule` runs inline when already on it.
//!
//! # Invariants
//!
//! 1. Posted tasks run in submission order on one logical thread.
//! 2. `schedule` never runs a task on a thread other than the UI thread.
//!
//! # Implementations
//!
//! | Executor | UI thread | Delivery |
//! |----------|-----------|----------|
//! | [`UiQueue`] | thread that created it | queued until [`UiQueue::run_pending`] |
//! | [`ImmediateExecutor`] | every thread | inline |

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError, mpsc};
use std::thread::{self, ThreadId};

use crate::logging::warn;

/// A unit of work marshaled onto the UI thread.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs callbacks on the UI-owning thread.
pub trait UiExecutor: Send + Sync {
    /// Whether the calling thread is the UI thread.
    fn is_ui_thread(&self) -> bool;

    /// Enqueue `task` for the UI thread.
    fn post(&self, task: Task);

    /// Run `task` now if on the UI thread, otherwise enqueue it.
    fn schedule(&self, task: Task) {
        if self.is_ui_thread() {
            task();
        } else {
            self.post(task);
        }
    }
}

/// Executor that runs everything inline on the calling thread.
///
/// Useful for headless hosts and tests where there is no UI loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateExecutor;

impl UiExecutor for ImmediateExecutor {
    fn is_ui_thread(&self) -> bool {
        true
    }

    fn post(&self, task: Task) {
        task();
    }
}

/// Channel-backed executor bound to the thread that created it.
///
/// Any thread may post; only the owning thread drains.
pub struct UiQueue {
    owner: ThreadId,
    sender: mpsc::Sender<Task>,
    receiver: Mutex<mpsc::Receiver<Task>>,
    pending: AtomicUsize,
}

impl Default for UiQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for UiQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UiQueue")
            .field("owner", &self.owner)
            .field("pending", &self.pending())
            .finish()
    }
}

impl UiQueue {
    /// Create a queue whose UI thread is the current thread.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            owner: thread::current().id(),
            sender,
            receiver: Mutex::new(receiver),
            pending: AtomicUsize::new(0),
        }
    }

    /// Number of tasks posted but not yet run.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Run queued tasks in FIFO order, including tasks posted while
    /// draining. Returns the number of tasks run.
    ///
    /// Calling this off the UI thread runs nothing.
    pub fn run_pending(&self) -> usize {
        if !self.is_ui_thread() {
            warn!("UiQueue::run_pending called off the UI thread; ignoring");
            return 0;
        }
        let mut ran = 0;
        loop {
            // Release the receiver before running so tasks may drain re-entrantly.
            let next = self
                .receiver
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .try_recv();
            match next {
                Ok(task) => {
                    self.pending.fetch_sub(1, Ordering::AcqRel);
                    task();
                    ran += 1;
                }
                Err(_) => return ran,
            }
        }
    }
}

impl UiExecutor for UiQueue {
    fn is_ui_thread(&self) -> bool {
        thread::current().id() == self.owner
    }

    fn post(&self, task: Task) {
        self.pending.fetch_add(1, Ordering::AcqRel);
        // The receiver lives in `self`, so the channel cannot be disconnected.
        if self.sender.send(task).is_err() {
            self.pending.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn immediate_runs_inline() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        ImmediateExecutor.post(Box::new(move || {
            h.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn schedule_on_owner_thread_is_inline() {
        let queue = UiQueue::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        queue.schedule(Box::new(move || {
            h.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn schedule_from_other_thread_is_queued() {
        let queue = Arc::new(UiQueue::new());
        let ran_on = Arc::new(Mutex::new(None));

        let q = Arc::clone(&queue);
        let r = Arc::clone(&ran_on);
        thread::spawn(move || {
            q.schedule(Box::new(move || {
                *r.lock().unwrap() = Some(thread::current().id());
            }));
        })
        .join()
        .unwrap();

        assert_eq!(queue.pending(), 1);
        assert!(ran_on.lock().unwrap().is_none());

        assert_eq!(queue.run_pending(), 1);
        assert_eq!(*ran_on.lock().unwrap(), Some(thread::current().id()));
    }

    #[test]
    fn run_pending_preserves_fifo_order() {
        let queue = UiQueue::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for i in 0..5 {
            let log = Arc::clone(&log);
            queue.post(Box::new(move || log.lock().unwrap().push(i)));
        }
        assert_eq!(queue.run_pending(), 5);
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn run_pending_off_owner_thread_runs_nothing() {
        let queue = Arc::new(UiQueue::new());
        queue.post(Box::new(|| {}));
        let q = Arc::clone(&queue);
        let ran = thread::spawn(move || q.run_pending()).join().unwrap();
        assert_eq!(ran, 0);
        assert_eq!(queue.pending(), 1);
    }
}
