//! Timed note and control messages for a magnetic resonator piano, sent as
//! OSC bundles.

pub mod config;
pub mod error;
pub mod events;
pub mod pattern;
pub mod scheduler;
pub mod timing;
pub mod transport;

pub use config::{HandlerConfig, NoteSettings};
pub use error::{ConfigError, HandlerError, PatternError, Result, TransportError};
pub use events::{Environment, Hook, RawMessage, SEND_EVENT};
pub use pattern::{
    Args, CyclicReducer, Param, Pattern, PatternMap, PatternReducer, ReduceControls, Value,
};
pub use scheduler::{ActiveNotes, MrpHandler, NoteKey, NotePattern, PendingNoteOff, QualityPattern};
pub use timing::{ManualTimeline, ScopedTask, TaskState, ThreadTimeline, Timeline};
pub use transport::{Envelope, MemoryTransport, MessageSender, Number, OscClient, Transport};
