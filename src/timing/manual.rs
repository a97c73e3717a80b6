use std::cmp::Reverse;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use super::timeline::{Entry, EntryHeap, run_entry};
use super::{DeferredBody, ScopedTask, Timeline};

/// Virtual-clock timeline. Nothing runs until the owner calls
/// [`ManualTimeline::advance`], which fires due bodies on the calling thread.
#[derive(Default)]
pub struct ManualTimeline {
    now: Mutex<Duration>,
    pending: Mutex<EntryHeap>,
    seq: AtomicU64,
}

impl ManualTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock forward by `by`, running every body due on the way in
    /// due order. Returns how many bodies ran or were skipped as cancelled.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.now.lock().saturating_add(by);
        let mut fired = 0;

        loop {
            let next = {
                let mut pending = self.pending.lock();
                if pending.peek().is_some_and(|Reverse(e)| e.due <= target) {
                    pending.pop()
                } else {
                    None
                }
            };
            let Some(Reverse(entry)) = next else {
                break;
            };
            *self.now.lock() = entry.due;
            run_entry(entry);
            fired += 1;
        }

        *self.now.lock() = target;
        fired
    }

    pub fn advance_secs(&self, secs: f64) -> usize {
        self.advance(Duration::from_secs_f64(secs))
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    /// Due time of the earliest queued body.
    pub fn next_due(&self) -> Option<Duration> {
        self.pending.lock().peek().map(|Reverse(e)| e.due)
    }
}

impl Timeline for ManualTimeline {
    fn defer(&self, delay: Duration, task: ScopedTask, body: DeferredBody) {
        let entry = Entry {
            due: self.now().saturating_add(delay),
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            task,
            body,
        };
        self.pending.lock().push(Reverse(entry));
    }

    fn now(&self) -> Duration {
        *self.now.lock()
    }
}
