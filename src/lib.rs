#![doc = include_str!("../README.md")]

pub use crate::codec::{
    decode_batch, decode_event, encode_batch, encode_event, EventStreamCodec,
};
pub use crate::error::{Error, Malformed, ValidationErrors, ValidationRule};
pub use crate::types::*;

pub mod codec;
pub mod error;
pub mod types;
