use crate::error::Error;
use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};

pub use batch::CloudEventBatch;
pub use event::{CloudEvent, CloudEventBuilder, Data, DataKind, StructuredData};

pub mod batch;
pub mod event;

/// UTC instant with nanosecond precision, per RFC 3339 semantics
pub type Timestamp = DateTime<Utc>;

/// The CloudEvents specification revision produced by [`CloudEventBuilder`] by default.
pub const SPEC_VERSION: &str = "1.0";

/// Context attribute names owned by the envelope itself. Extension
/// attributes must never shadow these.
pub const RESERVED_ATTRIBUTES: [&str; 4] = ["id", "source", "specversion", "type"];

pub(crate) fn is_reserved(name: &str) -> bool {
    RESERVED_ATTRIBUTES.contains(&name)
}

/// The value of an optional/extension context attribute.
///
/// Exactly one variant is populated; there is no implicit default and no
/// coercion between variants (`Boolean(false)` is distinct from unset).
#[derive(Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub enum AttributeValue {
    Boolean(bool),
    Integer(i32),
    String(String),
    Bytes(Vec<u8>),
    Uri(String),
    UriRef(String),
    Timestamp(Timestamp),
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Display, Serialize, Deserialize)]
pub enum AttributeKind {
    #[display("boolean")]
    Boolean,
    #[display("integer")]
    Integer,
    #[display("string")]
    String,
    #[display("bytes")]
    Bytes,
    #[display("URI")]
    Uri,
    #[display("URI-reference")]
    UriRef,
    #[display("timestamp")]
    Timestamp,
}

impl AttributeValue {
    /// A URI-typed value. No normalization is performed at this layer.
    pub fn uri<S: Into<String>>(uri: S) -> Self {
        AttributeValue::Uri(uri.into())
    }

    /// A URI-reference-typed value, possibly relative.
    pub fn uri_ref<S: Into<String>>(uri_ref: S) -> Self {
        AttributeValue::UriRef(uri_ref.into())
    }

    pub fn kind(&self) -> AttributeKind {
        match self {
            AttributeValue::Boolean(_) => AttributeKind::Boolean,
            AttributeValue::Integer(_) => AttributeKind::Integer,
            AttributeValue::String(_) => AttributeKind::String,
            AttributeValue::Bytes(_) => AttributeKind::Bytes,
            AttributeValue::Uri(_) => AttributeKind::Uri,
            AttributeValue::UriRef(_) => AttributeKind::UriRef,
            AttributeValue::Timestamp(_) => AttributeKind::Timestamp,
        }
    }

    pub fn as_boolean(&self) -> Result<bool, Error> {
        match self {
            AttributeValue::Boolean(v) => Ok(*v),
            _ => Err(self.mismatch(AttributeKind::Boolean)),
        }
    }

    pub fn as_integer(&self) -> Result<i32, Error> {
        match self {
            AttributeValue::Integer(v) => Ok(*v),
            _ => Err(self.mismatch(AttributeKind::Integer)),
        }
    }

    pub fn as_string(&self) -> Result<&str, Error> {
        match self {
            AttributeValue::String(v) => Ok(v),
            _ => Err(self.mismatch(AttributeKind::String)),
        }
    }

    pub fn as_bytes(&self) -> Result<&[u8], Error> {
        match self {
            AttributeValue::Bytes(v) => Ok(v),
            _ => Err(self.mismatch(AttributeKind::Bytes)),
        }
    }

    pub fn as_uri(&self) -> Result<&str, Error> {
        match self {
            AttributeValue::Uri(v) => Ok(v),
            _ => Err(self.mismatch(AttributeKind::Uri)),
        }
    }

    pub fn as_uri_ref(&self) -> Result<&str, Error> {
        match self {
            AttributeValue::UriRef(v) => Ok(v),
            _ => Err(self.mismatch(AttributeKind::UriRef)),
        }
    }

    pub fn as_timestamp(&self) -> Result<Timestamp, Error> {
        match self {
            AttributeValue::Timestamp(v) => Ok(*v),
            _ => Err(self.mismatch(AttributeKind::Timestamp)),
        }
    }

    fn mismatch(&self, requested: AttributeKind) -> Error {
        Error::TypeMismatch {
            requested,
            actual: self.kind(),
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Boolean(v)
    }
}

impl From<i32> for AttributeValue {
    fn from(v: i32) -> Self {
        AttributeValue::Integer(v)
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::String(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::String(v.to_owned())
    }
}

impl From<Vec<u8>> for AttributeValue {
    fn from(v: Vec<u8>) -> Self {
        AttributeValue::Bytes(v)
    }
}

impl From<&[u8]> for AttributeValue {
    fn from(v: &[u8]) -> Self {
        AttributeValue::Bytes(v.to_owned())
    }
}

impl From<Timestamp> for AttributeValue {
    fn from(v: Timestamp) -> Self {
        AttributeValue::Timestamp(v)
    }
}
