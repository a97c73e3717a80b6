use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use super::{Envelope, Number, Transport};
use crate::error::TransportError;

/// Keeps every dispatched envelope in order instead of sending it anywhere.
///
/// Useful for dry runs and for asserting on exact send sequences.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    sent: Mutex<Vec<Envelope>>,
    failing: AtomicBool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every dispatch is rejected and nothing is recorded.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Envelope> {
        self.sent.lock().clone()
    }

    /// `(address, payload)` pairs, without timestamps.
    pub fn messages(&self) -> Vec<(String, Vec<Number>)> {
        self.sent
            .lock()
            .iter()
            .map(|e| (e.address.clone(), e.payload.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.lock().is_empty()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

impl Transport for MemoryTransport {
    fn dispatch(&self, envelope: &Envelope) -> Result<(), TransportError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::Rejected(envelope.address.clone()));
        }
        self.sent.lock().push(envelope.clone());
        Ok(())
    }
}
