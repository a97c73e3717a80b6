use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::PatternError;
use crate::transport::Number;

/// Parameter name of a pattern invocation.
///
/// Equality, hashing and ordering all follow the textual name, so a
/// `BTreeMap<Param, _>` behaves like a map keyed by the names as strings and
/// `Named("note")` is the same key as `Note`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Param {
    Address,
    Channel,
    Duration,
    Note,
    Quality,
    Value,
    Named(String),
}

impl Param {
    pub fn as_str(&self) -> &str {
        match self {
            Param::Address => "address",
            Param::Channel => "channel",
            Param::Duration => "duration",
            Param::Note => "note",
            Param::Quality => "quality",
            Param::Value => "value",
            Param::Named(name) => name,
        }
    }

    /// Maps a name onto the closed set where possible.
    pub fn from_name(name: &str) -> Self {
        match name {
            "address" => Param::Address,
            "channel" => Param::Channel,
            "duration" => Param::Duration,
            "note" => Param::Note,
            "quality" => Param::Quality,
            "value" => Param::Value,
            other => Param::Named(other.to_string()),
        }
    }
}

impl PartialEq for Param {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for Param {}

impl Hash for Param {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl Ord for Param {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl PartialOrd for Param {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A concrete scalar produced by pattern reduction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
    Rest,
}

impl Value {
    pub fn is_rest(&self) -> bool {
        matches!(self, Value::Rest)
    }

    /// Integer coercion: floats truncate toward zero, text must parse as an
    /// integer (or a number, which is then truncated).
    pub fn to_int(&self, param: &Param) -> Result<i64, PatternError> {
        match self {
            Value::Int(v) => Ok(*v),
            Value::Float(v) if v.is_finite() => Ok(v.trunc() as i64),
            Value::Text(text) => {
                let text = text.trim();
                text.parse::<i64>()
                    .ok()
                    .or_else(|| {
                        text.parse::<f64>()
                            .ok()
                            .filter(|v| v.is_finite())
                            .map(|v| v.trunc() as i64)
                    })
                    .ok_or_else(|| self.not_numeric(param))
            }
            _ => Err(self.not_numeric(param)),
        }
    }

    pub fn to_float(&self, param: &Param) -> Result<f64, PatternError> {
        match self {
            Value::Int(v) => Ok(*v as f64),
            Value::Float(v) => Ok(*v),
            Value::Text(text) => text
                .trim()
                .parse::<f64>()
                .map_err(|_| self.not_numeric(param)),
            Value::Rest => Err(self.not_numeric(param)),
        }
    }

    /// Converts into a wire scalar without changing its kind.
    pub fn to_number(&self, param: &Param) -> Result<Number, PatternError> {
        match self {
            Value::Int(v) => i32::try_from(*v)
                .map(Number::Int)
                .map_err(|_| PatternError::OutOfRange {
                    param: param.clone(),
                    value: v.to_string(),
                }),
            Value::Float(v) => Ok(Number::Float(*v as f32)),
            Value::Text(_) | Value::Rest => Err(self.not_numeric(param)),
        }
    }

    fn not_numeric(&self, param: &Param) -> PatternError {
        PatternError::NotNumeric {
            param: param.clone(),
            value: self.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "{v:?}"),
            Value::Rest => f.write_str("rest"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Rest, Into::into)
    }
}

/// A patternable argument: a fixed value, a sequence stepped once per tick,
/// or a chord that fans out into one message per member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Pattern {
    Value(Value),
    Sequence(Vec<Value>),
    Chord(Vec<Value>),
}

impl Pattern {
    pub fn rest() -> Self {
        Pattern::Value(Value::Rest)
    }

    pub fn sequence<T: Into<Value>>(values: impl IntoIterator<Item = T>) -> Self {
        Pattern::Sequence(values.into_iter().map(Into::into).collect())
    }

    pub fn chord<T: Into<Value>>(values: impl IntoIterator<Item = T>) -> Self {
        Pattern::Chord(values.into_iter().map(Into::into).collect())
    }

    /// Only a literal rest counts; a sequence may still step onto a value.
    pub fn is_rest(&self) -> bool {
        matches!(self, Pattern::Value(Value::Rest))
    }
}

impl From<Value> for Pattern {
    fn from(v: Value) -> Self {
        Pattern::Value(v)
    }
}

macro_rules! pattern_from_scalar {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Pattern {
                fn from(v: $ty) -> Self {
                    Pattern::Value(v.into())
                }
            }
        )*
    };
}

pattern_from_scalar!(i64, i32, f64, &str, String);

pub type PatternMap = BTreeMap<Param, Pattern>;

/// One concrete argument set yielded by a reducer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args(BTreeMap<Param, Value>);

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, param: Param, value: Value) {
        self.0.insert(param, value);
    }

    pub fn get(&self, param: &Param) -> Option<&Value> {
        self.0.get(param)
    }

    pub fn remove(&mut self, param: &Param) -> Option<Value> {
        self.0.remove(param)
    }

    /// Absent parameters read as rests.
    pub fn is_rest(&self, param: &Param) -> bool {
        self.get(param).is_none_or(Value::is_rest)
    }

    pub fn require(&self, param: &Param) -> Result<&Value, PatternError> {
        self.get(param)
            .ok_or_else(|| PatternError::Missing(param.clone()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Param, &Value)> {
        self.0.iter()
    }

    /// Remaining values in key-sorted order as wire scalars.
    pub fn to_numbers(&self) -> Result<Vec<Number>, PatternError> {
        self.0
            .iter()
            .map(|(param, value)| value.to_number(param))
            .collect()
    }
}

impl FromIterator<(Param, Value)> for Args {
    fn from_iter<I: IntoIterator<Item = (Param, Value)>>(iter: I) -> Self {
        Args(iter.into_iter().collect())
    }
}
