use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

const PENDING: u8 = 0;
const RUNNING: u8 = 1;
const COMPLETED: u8 = 2;
const CANCELLED: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Running,
    Completed,
    Cancelled,
}

/// Handle to a deferred action that can be cancelled until its body starts.
///
/// `cancel` and `try_start` race on the same atomic, so exactly one of them
/// wins. Once a body has started, cancellation has no effect.
#[derive(Debug, Clone)]
pub struct ScopedTask {
    id: u64,
    state: Arc<AtomicU8>,
}

impl ScopedTask {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            state: Arc::new(AtomicU8::new(PENDING)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> TaskState {
        match self.state.load(Ordering::Acquire) {
            PENDING => TaskState::Pending,
            RUNNING => TaskState::Running,
            COMPLETED => TaskState::Completed,
            _ => TaskState::Cancelled,
        }
    }

    /// Returns `true` if this call moved the task to cancelled. Repeated calls
    /// and calls after the body started return `false`.
    pub fn cancel(&self) -> bool {
        self.transition(PENDING, CANCELLED)
    }

    /// Claims the task for its body. `false` means it was cancelled or
    /// already claimed and the body must not run.
    pub fn try_start(&self) -> bool {
        self.transition(PENDING, RUNNING)
    }

    pub fn complete(&self) {
        self.transition(RUNNING, COMPLETED);
    }

    pub fn is_cancelled(&self) -> bool {
        self.state() == TaskState::Cancelled
    }

    /// Completed or cancelled.
    pub fn is_resolved(&self) -> bool {
        matches!(self.state(), TaskState::Completed | TaskState::Cancelled)
    }

    fn transition(&self, from: u8, to: u8) -> bool {
        self.state
            .compare_exchange(from, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_before_start_blocks_body() {
        let task = ScopedTask::new(1);
        assert!(task.cancel());
        assert!(!task.cancel());
        assert!(!task.try_start());
        assert_eq!(task.state(), TaskState::Cancelled);
        assert!(task.is_resolved());
    }

    #[test]
    fn started_task_ignores_cancel() {
        let task = ScopedTask::new(2);
        assert!(task.try_start());
        assert!(!task.cancel());
        assert!(!task.is_resolved());
        task.complete();
        assert_eq!(task.state(), TaskState::Completed);
        assert!(task.is_resolved());
    }

    #[test]
    fn clones_share_state() {
        let task = ScopedTask::new(3);
        let other = task.clone();
        other.cancel();
        assert!(task.is_cancelled());
        assert_eq!(task.id(), other.id());
    }
}
