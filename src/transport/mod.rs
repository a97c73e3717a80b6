mod envelope;
mod memory;
mod osc;

use std::sync::Arc;
use std::time::Duration;

pub use envelope::{Envelope, Number};
pub use memory::MemoryTransport;
pub use osc::OscClient;

use crate::error::TransportError;

/// Delivers finished envelopes. Fire-and-forget: no retry, no acknowledgment.
pub trait Transport: Send + Sync {
    fn dispatch(&self, envelope: &Envelope) -> Result<(), TransportError>;
}

/// Stamps outgoing messages with `now + look_ahead` and hands them to the
/// transport.
#[derive(Clone)]
pub struct MessageSender {
    transport: Arc<dyn Transport>,
    look_ahead: Duration,
}

impl MessageSender {
    pub fn new(transport: Arc<dyn Transport>, look_ahead: Duration) -> Self {
        Self {
            transport,
            look_ahead,
        }
    }

    pub fn look_ahead(&self) -> Duration {
        self.look_ahead
    }

    pub fn send(&self, address: &str, payload: Vec<Number>) -> Result<(), TransportError> {
        let envelope = Envelope::stamped(address, payload, self.look_ahead)?;
        tracing::debug!(address, payload = ?envelope.payload, "send");
        self.transport.dispatch(&envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    #[test]
    fn send_stamps_now_plus_look_ahead() {
        let memory = Arc::new(MemoryTransport::new());
        let sender = MessageSender::new(memory.clone(), Duration::from_millis(250));

        let before = SystemTime::now();
        sender.send("/mrp/midi", vec![Number::Int(0x9F)]).unwrap();
        let after = SystemTime::now();

        let sent = memory.sent();
        assert_eq!(sent.len(), 1);
        let at = sent[0].send_at;
        assert!(at >= before + Duration::from_millis(250));
        assert!(at <= after + Duration::from_millis(250));
    }

    #[test]
    fn transport_failure_reaches_caller() {
        let memory = Arc::new(MemoryTransport::new());
        memory.set_failing(true);
        let sender = MessageSender::new(memory.clone(), Duration::ZERO);

        let err = sender.send("/mrp/allnotesoff", vec![]).unwrap_err();
        assert!(matches!(err, TransportError::Rejected(ref addr) if addr == "/mrp/allnotesoff"));
        assert!(memory.sent().is_empty());
    }

    #[test]
    fn overflowing_look_ahead_fails_without_dispatch() {
        let memory = Arc::new(MemoryTransport::new());
        let sender = MessageSender::new(memory.clone(), Duration::MAX);

        let err = sender.send("/mrp/midi", vec![Number::Int(0x9F)]).unwrap_err();
        assert!(matches!(err, TransportError::Timestamp(_)));
        assert!(memory.sent().is_empty());
    }
}
