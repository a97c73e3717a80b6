use std::fmt;
use std::time::{Duration, SystemTime};

use rosc::{OscBundle, OscMessage, OscPacket, OscTime, OscType};
use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// Wire scalar carried in a message payload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Number {
    Int(i32),
    Float(f32),
}

impl From<Number> for OscType {
    fn from(n: Number) -> Self {
        match n {
            Number::Int(v) => OscType::Int(v),
            Number::Float(v) => OscType::Float(v),
        }
    }
}

impl From<i32> for Number {
    fn from(v: i32) -> Self {
        Number::Int(v)
    }
}

impl From<f32> for Number {
    fn from(v: f32) -> Self {
        Number::Float(v)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(v) => write!(f, "{v}"),
            Number::Float(v) => write!(f, "{v}"),
        }
    }
}

/// A single timed message, built once and consumed by a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub address: String,
    pub payload: Vec<Number>,
    pub send_at: SystemTime,
}

impl Envelope {
    pub fn stamped(
        address: &str,
        payload: Vec<Number>,
        look_ahead: Duration,
    ) -> Result<Self, TransportError> {
        let send_at = SystemTime::now().checked_add(look_ahead).ok_or_else(|| {
            TransportError::Timestamp(format!("look-ahead of {look_ahead:?} overflows the clock"))
        })?;
        Ok(Self {
            address: address.to_string(),
            payload,
            send_at,
        })
    }

    /// Bundle holding just this message, timetagged with `send_at`.
    pub fn to_packet(&self) -> Result<OscPacket, TransportError> {
        let timetag = OscTime::try_from(self.send_at)
            .map_err(|e| TransportError::Timestamp(format!("{e:?}")))?;
        Ok(OscPacket::Bundle(OscBundle {
            timetag,
            content: vec![OscPacket::Message(OscMessage {
                addr: self.address.clone(),
                args: self.payload.iter().copied().map(OscType::from).collect(),
            })],
        }))
    }

    pub fn encode(&self) -> Result<Vec<u8>, TransportError> {
        Ok(rosc::encoder::encode(&self.to_packet()?)?)
    }
}
