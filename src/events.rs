use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{HandlerError, Result};
use crate::scheduler::MrpHandler;
use crate::transport::Number;

/// Events this handler answers to.
pub const SEND_EVENT: &str = "send";

/// Address/payload pair pushed through another component's transport.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    pub address: String,
    pub payload: Vec<Number>,
}

impl RawMessage {
    pub fn new(address: impl Into<String>, payload: Vec<Number>) -> Self {
        Self {
            address: address.into(),
            payload,
        }
    }
}

pub trait Hook: Send + Sync {
    fn handle(&self, event: &str, message: RawMessage) -> Result<()>;
}

/// Host-side registry routing named events to the components that asked
/// for them.
#[derive(Default)]
pub struct Environment {
    hooks: RwLock<HashMap<String, Vec<Arc<dyn Hook>>>>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_hook(&self, event: &str, hook: Arc<dyn Hook>) {
        self.hooks
            .write()
            .entry(event.to_string())
            .or_default()
            .push(hook);
    }

    pub fn hook_count(&self, event: &str) -> usize {
        self.hooks.read().get(event).map_or(0, Vec::len)
    }

    /// Delivers `message` to every hook registered for `event`, stopping at
    /// the first error. Returns how many hooks ran.
    pub fn emit(&self, event: &str, message: RawMessage) -> Result<usize> {
        let hooks: Vec<Arc<dyn Hook>> = self.hooks.read().get(event).cloned().unwrap_or_default();
        for hook in &hooks {
            hook.handle(event, message.clone())?;
        }
        Ok(hooks.len())
    }
}

impl MrpHandler {
    /// Registers this handler for the events it serves.
    pub fn setup(self: &Arc<Self>, env: &Environment) {
        for event in [SEND_EVENT] {
            env.register_hook(event, self.clone());
        }
        tracing::info!(name = self.name(), "handler registered");
    }
}

impl Hook for MrpHandler {
    fn handle(&self, event: &str, message: RawMessage) -> Result<()> {
        match event {
            SEND_EVENT => Ok(self.send(&message.address, message.payload)?),
            other => Err(HandlerError::UnknownEvent(other.to_string())),
        }
    }
}
