//! Binary codec for the CloudEvents envelope.
//!
//! The wire layout follows the CloudEvents protobuf schema bit-for-bit:
//! field numbers, map-entry encoding, and oneof rules match, so bytes
//! produced here decode in any conforming implementation and vice versa.
//! Decoding accepts fields in any order and applies the same validation as
//! [`CloudEvent::new`]. Field numbers outside the schema are rejected;
//! nothing is preserved opaquely or silently dropped.

use self::wire::field;
use crate::{
    error::{Error, Malformed},
    types::{
        AttributeValue, CloudEvent, CloudEventBatch, Data, StructuredData, Timestamp,
    },
};
use bytes::{Buf, Bytes, BytesMut};
use chrono::DateTime;
use fxhash::FxHashMap;
use itertools::Itertools;
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, warn};

pub(crate) mod wire;

/// Encodes a single envelope. Attributes are written in name order so the
/// output is reproducible, though decoders accept any order.
pub fn encode_event(event: &CloudEvent) -> Vec<u8> {
    let mut buf = BytesMut::new();
    encode_event_into(event, &mut buf);
    buf.to_vec()
}

/// Decodes a single envelope from a complete in-memory buffer.
pub fn decode_event(bytes: &[u8]) -> Result<CloudEvent, Error> {
    decode_event_buf(Bytes::copy_from_slice(bytes))
}

/// Encodes a batch, preserving event order. An empty batch encodes to an
/// empty buffer.
pub fn encode_batch(batch: &CloudEventBatch) -> Vec<u8> {
    let mut buf = BytesMut::new();
    for event in batch {
        let mut body = BytesMut::new();
        encode_event_into(event, &mut body);
        wire::put_bytes(&mut buf, field::BATCH_EVENTS, &body);
    }
    buf.to_vec()
}

/// Decodes a batch. A failure on any contained event fails the whole batch
/// with the offending event's index attached.
pub fn decode_batch(bytes: &[u8]) -> Result<CloudEventBatch, Error> {
    let mut buf = Bytes::copy_from_slice(bytes);
    let mut events = Vec::new();
    while buf.has_remaining() {
        let (field, wire_type) = wire::get_key(&mut buf)?;
        match field {
            field::BATCH_EVENTS => {
                let frame = wire::get_message(&mut buf, field, wire_type)?;
                let event = decode_event_buf(frame).map_err(|e| Error::BatchEvent {
                    index: events.len(),
                    source: Box::new(e),
                })?;
                events.push(event);
            }
            tag => return Err(Malformed::UnexpectedField("batch", tag).into()),
        }
    }
    Ok(CloudEventBatch::new(events))
}

fn encode_event_into(event: &CloudEvent, buf: &mut BytesMut) {
    wire::put_string(buf, field::ID, event.id());
    wire::put_string(buf, field::SOURCE, event.source());
    wire::put_string(buf, field::SPEC_VERSION, event.spec_version());
    wire::put_string(buf, field::TYPE, event.event_type());

    for (name, value) in event
        .attributes()
        .iter()
        .sorted_by_key(|(name, _)| name.as_str())
    {
        let mut entry = BytesMut::new();
        wire::put_string(&mut entry, field::ENTRY_KEY, name);
        let mut body = BytesMut::new();
        encode_attribute_value(value, &mut body);
        wire::put_bytes(&mut entry, field::ENTRY_VALUE, &body);
        wire::put_bytes(buf, field::ATTRIBUTES, &entry);
    }

    // Oneof members are written even when they hold the proto3 default
    match event.data() {
        None => {}
        Some(Data::Binary(bytes)) => wire::put_bytes(buf, field::DATA_BINARY, bytes),
        Some(Data::Text(text)) => wire::put_string(buf, field::DATA_TEXT, text),
        Some(Data::Structured(data)) => {
            let mut body = BytesMut::new();
            if !data.type_url.is_empty() {
                wire::put_string(&mut body, field::ANY_TYPE_URL, &data.type_url);
            }
            if !data.value.is_empty() {
                wire::put_bytes(&mut body, field::ANY_VALUE, &data.value);
            }
            wire::put_bytes(buf, field::DATA_STRUCTURED, &body);
        }
    }
}

fn encode_attribute_value(value: &AttributeValue, buf: &mut BytesMut) {
    match value {
        AttributeValue::Boolean(v) => {
            wire::put_varint_field(buf, field::ATTR_BOOLEAN, u64::from(*v));
        }
        AttributeValue::Integer(v) => {
            // int32 sign-extends to 64 bits on the wire
            wire::put_varint_field(buf, field::ATTR_INTEGER, *v as i64 as u64);
        }
        AttributeValue::String(v) => wire::put_string(buf, field::ATTR_STRING, v),
        AttributeValue::Bytes(v) => wire::put_bytes(buf, field::ATTR_BYTES, v),
        AttributeValue::Uri(v) => wire::put_string(buf, field::ATTR_URI, v),
        AttributeValue::UriRef(v) => wire::put_string(buf, field::ATTR_URI_REF, v),
        AttributeValue::Timestamp(ts) => {
            let mut body = BytesMut::new();
            let seconds = ts.timestamp();
            let nanos = ts.timestamp_subsec_nanos();
            if seconds != 0 {
                wire::put_varint_field(&mut body, field::TS_SECONDS, seconds as u64);
            }
            if nanos != 0 {
                wire::put_varint_field(&mut body, field::TS_NANOS, u64::from(nanos));
            }
            wire::put_bytes(buf, field::ATTR_TIMESTAMP, &body);
        }
    }
}

fn decode_event_buf(mut buf: Bytes) -> Result<CloudEvent, Error> {
    // Proto3 semantics: absent scalar fields decode to their defaults and
    // are rejected by validation afterwards
    let mut id = String::new();
    let mut source = String::new();
    let mut spec_version = String::new();
    let mut ty = String::new();
    let mut attributes = FxHashMap::default();
    let mut data: Option<Data> = None;

    while buf.has_remaining() {
        let (field, wire_type) = wire::get_key(&mut buf)?;
        match field {
            field::ID => id = wire::get_string(&mut buf, field, wire_type)?,
            field::SOURCE => source = wire::get_string(&mut buf, field, wire_type)?,
            field::SPEC_VERSION => {
                spec_version = wire::get_string(&mut buf, field, wire_type)?;
            }
            field::TYPE => ty = wire::get_string(&mut buf, field, wire_type)?,
            field::ATTRIBUTES => {
                let entry = wire::get_message(&mut buf, field, wire_type)?;
                let (name, value) = decode_attribute_entry(entry)?;
                attributes.insert(name, value);
            }
            field::DATA_BINARY => {
                let bytes = wire::get_bytes(&mut buf, field, wire_type)?;
                set_data(&mut data, Data::Binary(bytes.to_vec()));
            }
            field::DATA_TEXT => {
                let text = wire::get_string(&mut buf, field, wire_type)?;
                set_data(&mut data, Data::Text(text));
            }
            field::DATA_STRUCTURED => {
                let body = wire::get_message(&mut buf, field, wire_type)?;
                set_data(&mut data, Data::Structured(decode_structured(body)?));
            }
            tag => return Err(Error::UnknownDataVariant(tag)),
        }
    }

    let event =
        CloudEvent::new(id, source, spec_version, ty, attributes, data).map_err(|e| match e {
            Error::Validation(rules) => Malformed::Validation(rules).into(),
            other => other,
        })?;
    debug!(id = %event.id(), ty = %event.event_type(), "Decoded envelope");
    Ok(event)
}

fn set_data(slot: &mut Option<Data>, value: Data) {
    // Proto3 oneof: the last field on the wire wins
    if let Some(previous) = slot.replace(value) {
        warn!(previous = %previous.kind(), "Duplicate data payload field, keeping the later one");
    }
}

fn decode_attribute_entry(mut buf: Bytes) -> Result<(String, AttributeValue), Error> {
    let mut name = String::new();
    let mut value: Option<AttributeValue> = None;

    while buf.has_remaining() {
        let (field, wire_type) = wire::get_key(&mut buf)?;
        match field {
            field::ENTRY_KEY => name = wire::get_string(&mut buf, field, wire_type)?,
            field::ENTRY_VALUE => {
                let body = wire::get_message(&mut buf, field, wire_type)?;
                value = decode_attribute_value(body)?;
            }
            tag => return Err(Malformed::UnexpectedField("attributes entry", tag).into()),
        }
    }

    match value {
        Some(value) => Ok((name, value)),
        None => Err(Malformed::EmptyAttribute(name).into()),
    }
}

fn decode_attribute_value(mut buf: Bytes) -> Result<Option<AttributeValue>, Error> {
    let mut value: Option<AttributeValue> = None;

    while buf.has_remaining() {
        let (field, wire_type) = wire::get_key(&mut buf)?;
        let next = match field {
            field::ATTR_BOOLEAN => {
                AttributeValue::Boolean(wire::get_varint_field(&mut buf, field, wire_type)? != 0)
            }
            field::ATTR_INTEGER => {
                // int32 keeps the low 32 bits of the 64-bit varint
                AttributeValue::Integer(wire::get_varint_field(&mut buf, field, wire_type)? as i32)
            }
            field::ATTR_STRING => {
                AttributeValue::String(wire::get_string(&mut buf, field, wire_type)?)
            }
            field::ATTR_BYTES => {
                AttributeValue::Bytes(wire::get_bytes(&mut buf, field, wire_type)?.to_vec())
            }
            field::ATTR_URI => AttributeValue::Uri(wire::get_string(&mut buf, field, wire_type)?),
            field::ATTR_URI_REF => {
                AttributeValue::UriRef(wire::get_string(&mut buf, field, wire_type)?)
            }
            field::ATTR_TIMESTAMP => {
                let body = wire::get_message(&mut buf, field, wire_type)?;
                AttributeValue::Timestamp(decode_timestamp(body)?)
            }
            tag => return Err(Error::UnknownAttributeVariant(tag)),
        };
        if let Some(previous) = value.replace(next) {
            warn!(previous = %previous.kind(), "Duplicate attribute value field, keeping the later one");
        }
    }

    Ok(value)
}

fn decode_timestamp(mut buf: Bytes) -> Result<Timestamp, Error> {
    let mut seconds = 0_i64;
    let mut nanos = 0_i32;

    while buf.has_remaining() {
        let (field, wire_type) = wire::get_key(&mut buf)?;
        match field {
            field::TS_SECONDS => {
                seconds = wire::get_varint_field(&mut buf, field, wire_type)? as i64;
            }
            field::TS_NANOS => {
                nanos = wire::get_varint_field(&mut buf, field, wire_type)? as i32;
            }
            tag => return Err(Malformed::UnexpectedField("timestamp", tag).into()),
        }
    }

    u32::try_from(nanos)
        .ok()
        .and_then(|nanos| DateTime::from_timestamp(seconds, nanos))
        .ok_or_else(|| Malformed::InvalidTimestamp(seconds, nanos).into())
}

fn decode_structured(mut buf: Bytes) -> Result<StructuredData, Error> {
    let mut data = StructuredData::default();

    while buf.has_remaining() {
        let (field, wire_type) = wire::get_key(&mut buf)?;
        match field {
            field::ANY_TYPE_URL => {
                data.type_url = wire::get_string(&mut buf, field, wire_type)?;
            }
            field::ANY_VALUE => {
                data.value = wire::get_bytes(&mut buf, field, wire_type)?.to_vec();
            }
            tag => return Err(Malformed::UnexpectedField("structured data", tag).into()),
        }
    }

    Ok(data)
}

/// A length-delimited CloudEvent stream codec.
///
/// Protobuf messages are not self-delimiting, so each envelope on a byte
/// stream is framed by a varint byte length. Works with
/// [`FramedRead`](tokio_util::codec::FramedRead) and
/// [`FramedWrite`](tokio_util::codec::FramedWrite).
#[derive(Copy, Clone, Debug, Default)]
pub struct EventStreamCodec;

impl Decoder for EventStreamCodec {
    type Item = CloudEvent;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Peek the length prefix without consuming until the frame is whole
        let mut len = 0_u64;
        for idx in 0..10 {
            let Some(&byte) = src.get(idx) else {
                // Not enough data for the length prefix
                return Ok(None);
            };
            len |= u64::from(byte & 0x7f) << (7 * idx as u32);
            if byte & 0x80 == 0 {
                let header = idx + 1;
                let len = len as usize;
                if src.len() < header + len {
                    // Not enough data for the frame
                    src.reserve(header + len - src.len());
                    return Ok(None);
                }
                src.advance(header);
                let frame = src.split_to(len).freeze();
                return decode_event_buf(frame).map(Some);
            }
        }
        Err(Malformed::OverlongVarint.into())
    }
}

impl Encoder<&CloudEvent> for EventStreamCodec {
    type Error = Error;

    fn encode(&mut self, event: &CloudEvent, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let mut body = BytesMut::new();
        encode_event_into(event, &mut body);
        wire::put_varint(dst, body.len() as u64);
        dst.extend_from_slice(&body);
        Ok(())
    }
}
