use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::timing::ScopedTask;

/// A single sounding voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NoteKey {
    pub note: i32,
    pub channel: u8,
}

impl NoteKey {
    pub fn new(note: i32, channel: u8) -> Self {
        Self { note, channel }
    }
}

/// The deferred note-off owned by a registry entry.
#[derive(Debug, Clone)]
pub struct PendingNoteOff {
    pub task: ScopedTask,
}

pub(crate) type NoteMap = HashMap<NoteKey, PendingNoteOff>;

/// Pending note-offs by key, shared between the handler and the deferred
/// bodies it schedules. Every read-modify-write happens under one lock.
#[derive(Debug, Clone, Default)]
pub struct ActiveNotes {
    inner: Arc<Mutex<NoteMap>>,
}

impl ActiveNotes {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, NoteMap> {
        self.inner.lock()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn contains(&self, key: &NoteKey) -> bool {
        self.inner.lock().contains_key(key)
    }

    pub fn keys(&self) -> Vec<NoteKey> {
        let mut keys: Vec<NoteKey> = self.inner.lock().keys().copied().collect();
        keys.sort();
        keys
    }
}

/// Removes `key` only if it still maps to `task`.
pub(crate) fn remove_if_owned(notes: &mut NoteMap, key: &NoteKey, task: &ScopedTask) {
    if notes.get(key).is_some_and(|p| p.task.id() == task.id()) {
        notes.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_if_owned_ignores_replaced_entries() {
        let notes = ActiveNotes::new();
        let key = NoteKey::new(60, 15);
        let old = ScopedTask::new(1);
        let new = ScopedTask::new(2);

        notes.lock().insert(key, PendingNoteOff { task: new.clone() });
        remove_if_owned(&mut notes.lock(), &key, &old);
        assert!(notes.contains(&key));

        remove_if_owned(&mut notes.lock(), &key, &new);
        assert!(notes.is_empty());
    }
}
