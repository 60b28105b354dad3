use crate::types::{AttributeKind, DataKind};
use derive_more::Display;
use itertools::Itertools;
use std::{fmt, io};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Event validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Attribute name '{0}' is reserved for a required context attribute")]
    ReservedAttributeName(String),

    #[error("Attribute holds a {actual} value, not {requested}")]
    TypeMismatch {
        requested: AttributeKind,
        actual: AttributeKind,
    },

    #[error("Event does not carry a {requested} payload")]
    WrongDataKind {
        requested: DataKind,
        actual: Option<DataKind>,
    },

    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(Malformed),

    #[error("Unrecognized attribute value tag ({0})")]
    UnknownAttributeVariant(u32),

    #[error("Unrecognized data payload tag ({0})")]
    UnknownDataVariant(u32),

    #[error("Event at batch index {index} failed to decode")]
    BatchEvent {
        index: usize,
        #[source]
        source: Box<Error>,
    },

    #[error(
        "Encountered an IO error while reading the input stream ({})",
        .0.kind()
    )]
    Io(#[from] io::Error),
}

impl From<Malformed> for Error {
    fn from(value: Malformed) -> Self {
        Error::MalformedEnvelope(value)
    }
}

/// How decoded bytes failed to produce a structurally complete envelope.
#[derive(Clone, Eq, PartialEq, Debug, Display)]
pub enum Malformed {
    #[display("input ends inside a varint")]
    TruncatedVarint,

    #[display("varint exceeds 64 bits")]
    OverlongVarint,

    #[display("field number {_0} is out of range")]
    FieldNumberRange(u64),

    #[display("invalid wire type {_1} for field {_0}")]
    UnexpectedWireType(u32, u8),

    #[display("length-delimited field of {_0} bytes overruns the remaining {_1} bytes")]
    TruncatedField(usize, usize),

    #[display("field {_0} is not valid UTF-8")]
    InvalidUtf8(u32),

    #[display("unexpected field {_1} in {_0}")]
    UnexpectedField(&'static str, u32),

    #[display("attribute '{_0}' carries no value variant")]
    EmptyAttribute(String),

    #[display("timestamp ({_0}s, {_1}ns) is out of range")]
    InvalidTimestamp(i64, i32),

    #[display("{_0}")]
    Validation(ValidationErrors),
}

/// The construction rules violated by a single event, in declaration order.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ValidationErrors(pub Vec<ValidationRule>);

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.iter().join("; "))
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Display)]
pub enum ValidationRule {
    #[display("'id' must be non-empty")]
    EmptyId,
    #[display("'source' must be non-empty")]
    EmptySource,
    #[display("'specversion' must be non-empty")]
    EmptySpecVersion,
    #[display("'type' must be non-empty")]
    EmptyType,
    #[display("attribute '{_0}' shadows the required attribute of the same name")]
    ReservedAttribute(String),
}
