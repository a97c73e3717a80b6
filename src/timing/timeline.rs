use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use super::ScopedTask;

pub type DeferredBody = Box<dyn FnOnce() + Send + 'static>;

/// Host scheduling environment: runs a body after a delay unless its task
/// was cancelled first.
pub trait Timeline: Send + Sync {
    fn defer(&self, delay: Duration, task: ScopedTask, body: DeferredBody);

    /// Time elapsed on this timeline's clock.
    fn now(&self) -> Duration;
}

pub(crate) struct Entry {
    pub(crate) due: Duration,
    pub(crate) seq: u64,
    pub(crate) task: ScopedTask,
    pub(crate) body: DeferredBody,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.due, self.seq).cmp(&(other.due, other.seq))
    }
}

pub(crate) type EntryHeap = BinaryHeap<Reverse<Entry>>;

pub(crate) fn run_entry(entry: Entry) {
    if entry.task.is_cancelled() {
        tracing::trace!(task = entry.task.id(), "skipping cancelled task");
        return;
    }
    (entry.body)();
}

enum TimelineCommand {
    Defer(Entry),
    Shutdown,
}

/// Wall-clock timeline backed by a single timer thread.
pub struct ThreadTimeline {
    command_tx: Sender<TimelineCommand>,
    origin: Instant,
    seq: AtomicU64,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadTimeline {
    pub fn spawn() -> Self {
        let (command_tx, command_rx) = crossbeam::channel::unbounded();
        let origin = Instant::now();

        let thread = std::thread::Builder::new()
            .name("mrp-timeline".into())
            .spawn(move || timeline_thread(command_rx, origin))
            .ok();
        if thread.is_none() {
            tracing::error!("failed to spawn timeline thread, deferred actions will not run");
        }

        Self {
            command_tx,
            origin,
            seq: AtomicU64::new(0),
            thread: Mutex::new(thread),
        }
    }

    /// Stops the timer thread. Pending bodies are dropped without running.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(TimelineCommand::Shutdown);
        if let Some(handle) = self.thread.lock().take() {
            if handle.join().is_err() {
                tracing::error!("timeline thread panicked");
            }
        }
    }
}

impl Timeline for ThreadTimeline {
    fn defer(&self, delay: Duration, task: ScopedTask, body: DeferredBody) {
        let entry = Entry {
            due: self.now().saturating_add(delay),
            seq: self.seq.fetch_add(1, AtomicOrdering::Relaxed),
            task,
            body,
        };
        if self.command_tx.send(TimelineCommand::Defer(entry)).is_err() {
            tracing::warn!("timeline stopped, dropping deferred action");
        }
    }

    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

impl Drop for ThreadTimeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn timeline_thread(command_rx: Receiver<TimelineCommand>, origin: Instant) {
    let mut pending = EntryHeap::new();

    loop {
        let now = origin.elapsed();
        while pending.peek().is_some_and(|Reverse(e)| e.due <= now) {
            if let Some(Reverse(entry)) = pending.pop() {
                run_entry(entry);
            }
        }

        let command = match pending.peek() {
            Some(Reverse(next)) if origin.checked_add(next.due).is_some() => {
                command_rx.recv_deadline(origin + next.due)
            }
            _ => command_rx
                .recv()
                .map_err(|_| RecvTimeoutError::Disconnected),
        };

        match command {
            Ok(TimelineCommand::Defer(entry)) => pending.push(Reverse(entry)),
            Ok(TimelineCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
    }

    if !pending.is_empty() {
        tracing::debug!(dropped = pending.len(), "timeline stopped with pending actions");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn runs_bodies_in_due_order() {
        let timeline = ThreadTimeline::spawn();
        let (tx, rx) = crossbeam::channel::unbounded();

        for (id, delay_ms) in [(1u64, 60u64), (2, 20), (3, 40)] {
            let tx = tx.clone();
            timeline.defer(
                Duration::from_millis(delay_ms),
                ScopedTask::new(id),
                Box::new(move || {
                    let _ = tx.send(id);
                }),
            );
        }

        let order: Vec<u64> = (0..3)
            .map(|_| rx.recv_timeout(Duration::from_secs(2)).unwrap())
            .collect();
        assert_eq!(order, vec![2, 3, 1]);
    }

    #[test]
    fn cancelled_task_never_runs() {
        let timeline = ThreadTimeline::spawn();
        let fired = Arc::new(AtomicUsize::new(0));

        let task = ScopedTask::new(7);
        let counter = fired.clone();
        timeline.defer(
            Duration::from_millis(30),
            task.clone(),
            Box::new(move || {
                counter.fetch_add(1, AtomicOrdering::SeqCst);
            }),
        );
        assert!(task.cancel());

        std::thread::sleep(Duration::from_millis(120));
        assert_eq!(fired.load(AtomicOrdering::SeqCst), 0);
    }

    #[test]
    fn shutdown_drops_pending_bodies() {
        let timeline = ThreadTimeline::spawn();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        timeline.defer(
            Duration::from_millis(50),
            ScopedTask::new(1),
            Box::new(move || {
                counter.fetch_add(1, AtomicOrdering::SeqCst);
            }),
        );
        timeline.shutdown();
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(fired.load(AtomicOrdering::SeqCst), 0);
    }
}
