//! Error types for the MRP sender.

use thiserror::Error;

use crate::pattern::Param;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("OSC encode error: {0}")]
    Encode(String),

    #[error("Invalid timetag: {0}")]
    Timestamp(String),

    #[error("Transport rejected message to {0}")]
    Rejected(String),
}

impl From<rosc::OscError> for TransportError {
    fn from(e: rosc::OscError) -> Self {
        TransportError::Encode(format!("{e:?}"))
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PatternError {
    #[error("{param} is not numeric: {value}")]
    NotNumeric { param: Param, value: String },

    #[error("{param} out of range: {value}")]
    OutOfRange { param: Param, value: String },

    #[error("Divisor must be a positive number, got {0}")]
    InvalidDivisor(f64),

    #[error("Missing parameter: {0}")]
    Missing(Param),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("Config serialize error: {0}")]
    Serialize(#[from] ron::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum HandlerError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Unknown event: {0}")]
    UnknownEvent(String),
}

pub type Result<T> = std::result::Result<T, HandlerError>;
