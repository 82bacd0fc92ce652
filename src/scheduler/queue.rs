//! Pending-task queue with priority insertion.
//!
//! The queue also tracks which task the scheduler loop is executing, so that
//! [`TaskQueue::insert_front`] can signal that task's cancellation token in
//! the same critical section that reorders the queue. Dequeue and "mark
//! current" happen atomically in [`TaskQueue::take_next`]; a preemption can
//! therefore never slip between them and leave a task running unobserved.

use crate::scheduler::task::{BoxedTask, TaskDescriptor};
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Default soft capacity for producer-driven enqueues.
pub const DEFAULT_SOFT_CAPACITY: usize = 3;

/// Whether the scheduler loop is running a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Queue empty, waiting for work.
    Idle,
    /// A task is executing.
    Running,
}

/// Ordered sequence of pending tasks plus the currently executing one.
pub struct TaskQueue {
    inner: Mutex<QueueState>,
    available: Notify,
    soft_capacity: usize,
}

struct QueueState {
    pending: VecDeque<BoxedTask>,
    current: Option<CurrentTask>,
    next_seq: u64,
}

struct CurrentTask {
    seq: u64,
    descriptor: TaskDescriptor,
    cancel: CancellationToken,
    preempted: bool,
    urgent_ahead: usize,
}

/// A task handed to the scheduler loop together with its cancellation token.
pub(crate) struct Claimed {
    pub(crate) seq: u64,
    pub(crate) task: BoxedTask,
    pub(crate) cancel: CancellationToken,
}

/// How the current task's slot was released.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Release {
    /// A priority insertion cancelled the task.
    pub(crate) preempted: bool,
    /// Number of urgent tasks inserted ahead while it ran.
    pub(crate) urgent_ahead: usize,
}

impl TaskQueue {
    /// Create an empty queue with the default soft capacity.
    pub fn new() -> Self {
        Self::with_soft_capacity(DEFAULT_SOFT_CAPACITY)
    }

    /// Create an empty queue whose producer-side enqueues stop at `soft_capacity`.
    pub fn with_soft_capacity(soft_capacity: usize) -> Self {
        Self {
            inner: Mutex::new(QueueState {
                pending: VecDeque::new(),
                current: None,
                next_seq: 0,
            }),
            available: Notify::new(),
            soft_capacity,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a task to the tail.
    pub fn enqueue(&self, task: BoxedTask) {
        self.lock().pending.push_back(task);
        self.available.notify_one();
    }

    /// Append unless the soft capacity is reached; returns the task back otherwise.
    pub fn try_enqueue(&self, task: BoxedTask) -> Result<(), BoxedTask> {
        let mut guard = self.lock();
        if guard.pending.len() >= self.soft_capacity {
            return Err(task);
        }
        guard.pending.push_back(task);
        drop(guard);
        self.available.notify_one();
        Ok(())
    }

    /// Whether a producer may add another task.
    pub fn has_capacity(&self) -> bool {
        self.lock().pending.len() < self.soft_capacity
    }

    /// Push `task` ahead of everything pending and cancel the current task.
    ///
    /// Never blocked by the soft capacity.
    pub fn insert_front(&self, task: BoxedTask) {
        let mut guard = self.lock();
        let incoming = task.descriptor();
        guard.pending.push_front(task);
        if let Some(current) = guard.current.as_mut() {
            debug!(preempted = %current.descriptor, by = %incoming, "preempting current task");
            current.preempted = true;
            current.urgent_ahead += 1;
            current.cancel.cancel();
        }
        drop(guard);
        self.available.notify_one();
    }

    /// Remove and return the front task.
    pub fn dequeue(&self) -> Option<BoxedTask> {
        self.lock().pending.pop_front()
    }

    /// Cancel the current task without marking it preempted.
    ///
    /// Returns `false` when nothing is executing.
    pub fn cancel_current(&self) -> bool {
        match self.lock().current.as_ref() {
            Some(current) => {
                current.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Number of pending tasks (the current task is not counted).
    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Whether no task is pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Producer-side capacity bound.
    pub fn soft_capacity(&self) -> usize {
        self.soft_capacity
    }

    /// Ordered descriptors of the pending tasks.
    pub fn peek(&self) -> Vec<TaskDescriptor> {
        self.lock().pending.iter().map(|t| t.descriptor()).collect()
    }

    /// Descriptor of the executing task.
    pub fn current(&self) -> Option<TaskDescriptor> {
        self.lock().current.as_ref().map(|c| c.descriptor.clone())
    }

    /// Whether a task is executing.
    pub fn state(&self) -> LoopState {
        if self.lock().current.is_some() {
            LoopState::Running
        } else {
            LoopState::Idle
        }
    }

    /// Wait until a task is enqueued or inserted.
    pub async fn wait_for_work(&self) {
        self.available.notified().await;
    }

    /// Pop the front task and make it current under a child of `parent`.
    pub(crate) fn take_next(&self, parent: &CancellationToken) -> Option<Claimed> {
        let mut guard = self.lock();
        let task = guard.pending.pop_front()?;
        let seq = guard.next_seq;
        guard.next_seq += 1;
        let cancel = parent.child_token();
        guard.current = Some(CurrentTask {
            seq,
            descriptor: task.descriptor(),
            cancel: cancel.clone(),
            preempted: false,
            urgent_ahead: 0,
        });
        Some(Claimed { seq, task, cancel })
    }

    /// Clear the current slot if it still belongs to `seq`.
    pub(crate) fn release(&self, seq: u64) -> Release {
        let mut guard = self.lock();
        match guard.current.take() {
            Some(current) if current.seq == seq => Release {
                preempted: current.preempted,
                urgent_ahead: current.urgent_ahead,
            },
            other => {
                guard.current = other;
                Release::default()
            }
        }
    }

    /// Put a preempted task back behind the `urgent_ahead` tasks that displaced it.
    pub(crate) fn requeue(&self, task: BoxedTask, urgent_ahead: usize) {
        let mut guard = self.lock();
        let index = urgent_ahead.min(guard.pending.len());
        guard.pending.insert(index, task);
        drop(guard);
        self.available.notify_one();
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}
