use crate::error::{Error, Malformed};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Largest protobuf field number (29 bits).
const MAX_FIELD_NUMBER: u64 = (1 << 29) - 1;

#[derive(Copy, Clone, Eq, PartialEq, Debug, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub(crate) enum WireType {
    Varint = 0,
    Fixed64 = 1,
    LengthDelimited = 2,
    StartGroup = 3,
    EndGroup = 4,
    Fixed32 = 5,
}

/// Field numbers fixed by the schema. Never reuse or renumber these; a
/// removed field reserves its number instead.
pub(crate) mod field {
    // CloudEvent
    pub const ID: u32 = 1;
    pub const SOURCE: u32 = 2;
    pub const SPEC_VERSION: u32 = 3;
    pub const TYPE: u32 = 4;
    pub const ATTRIBUTES: u32 = 5;
    // data oneof
    pub const DATA_BINARY: u32 = 6;
    pub const DATA_TEXT: u32 = 7;
    pub const DATA_STRUCTURED: u32 = 8;

    // attributes map entry
    pub const ENTRY_KEY: u32 = 1;
    pub const ENTRY_VALUE: u32 = 2;

    // attribute value oneof
    pub const ATTR_BOOLEAN: u32 = 1;
    pub const ATTR_INTEGER: u32 = 2;
    pub const ATTR_STRING: u32 = 3;
    pub const ATTR_BYTES: u32 = 4;
    pub const ATTR_URI: u32 = 5;
    pub const ATTR_URI_REF: u32 = 6;
    pub const ATTR_TIMESTAMP: u32 = 7;

    // timestamp message
    pub const TS_SECONDS: u32 = 1;
    pub const TS_NANOS: u32 = 2;

    // structured data message
    pub const ANY_TYPE_URL: u32 = 1;
    pub const ANY_VALUE: u32 = 2;

    // batch
    pub const BATCH_EVENTS: u32 = 1;
}

pub(crate) fn put_varint(buf: &mut BytesMut, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf.put_u8(byte);
            return;
        }
        buf.put_u8(byte | 0x80);
    }
}

pub(crate) fn put_key(buf: &mut BytesMut, field: u32, wire_type: WireType) {
    put_varint(buf, (u64::from(field) << 3) | u64::from(u8::from(wire_type)));
}

pub(crate) fn put_varint_field(buf: &mut BytesMut, field: u32, value: u64) {
    put_key(buf, field, WireType::Varint);
    put_varint(buf, value);
}

pub(crate) fn put_bytes(buf: &mut BytesMut, field: u32, bytes: &[u8]) {
    put_key(buf, field, WireType::LengthDelimited);
    put_varint(buf, bytes.len() as u64);
    buf.put_slice(bytes);
}

pub(crate) fn put_string(buf: &mut BytesMut, field: u32, s: &str) {
    put_bytes(buf, field, s.as_bytes());
}

pub(crate) fn get_varint(buf: &mut Bytes) -> Result<u64, Error> {
    let mut value = 0_u64;
    for shift in (0..64).step_by(7) {
        if !buf.has_remaining() {
            return Err(Malformed::TruncatedVarint.into());
        }
        let byte = buf.get_u8();
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(Malformed::OverlongVarint.into())
}

pub(crate) fn get_key(buf: &mut Bytes) -> Result<(u32, WireType), Error> {
    let key = get_varint(buf)?;
    let field = key >> 3;
    if field == 0 || field > MAX_FIELD_NUMBER {
        return Err(Malformed::FieldNumberRange(field).into());
    }
    let wire_bits = (key & 0x7) as u8;
    let wire_type = WireType::try_from(wire_bits)
        .map_err(|_| Malformed::UnexpectedWireType(field as u32, wire_bits))?;
    Ok((field as u32, wire_type))
}

fn expect_wire_type(field: u32, actual: WireType, expected: WireType) -> Result<(), Error> {
    if actual == expected {
        Ok(())
    } else {
        Err(Malformed::UnexpectedWireType(field, actual.into()).into())
    }
}

pub(crate) fn get_varint_field(
    buf: &mut Bytes,
    field: u32,
    wire_type: WireType,
) -> Result<u64, Error> {
    expect_wire_type(field, wire_type, WireType::Varint)?;
    get_varint(buf)
}

pub(crate) fn get_bytes(buf: &mut Bytes, field: u32, wire_type: WireType) -> Result<Bytes, Error> {
    expect_wire_type(field, wire_type, WireType::LengthDelimited)?;
    let len = get_varint(buf)? as usize;
    if buf.remaining() < len {
        return Err(Malformed::TruncatedField(len, buf.remaining()).into());
    }
    Ok(buf.split_to(len))
}

pub(crate) fn get_string(buf: &mut Bytes, field: u32, wire_type: WireType) -> Result<String, Error> {
    let bytes = get_bytes(buf, field, wire_type)?;
    String::from_utf8(bytes.to_vec()).map_err(|_| Malformed::InvalidUtf8(field).into())
}

/// Reads a length-delimited sub-message as its own buffer.
pub(crate) fn get_message(
    buf: &mut Bytes,
    field: u32,
    wire_type: WireType,
) -> Result<Bytes, Error> {
    get_bytes(buf, field, wire_type)
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn roundtrip(value: u64) -> u64 {
        let mut buf = BytesMut::new();
        put_varint(&mut buf, value);
        let mut bytes = buf.freeze();
        let decoded = get_varint(&mut bytes).unwrap();
        assert!(!bytes.has_remaining());
        decoded
    }

    #[test]
    fn varint_roundtrip() {
        for value in [0, 1, 127, 128, 300, u64::from(u32::MAX), u64::MAX] {
            assert_eq!(roundtrip(value), value);
        }
    }

    #[test]
    fn varint_truncated() {
        let mut bytes = Bytes::from_static(&[0x80, 0x80]);
        assert!(matches!(
            get_varint(&mut bytes),
            Err(Error::MalformedEnvelope(Malformed::TruncatedVarint))
        ));
    }

    #[test]
    fn varint_overlong() {
        let mut bytes = Bytes::from_static(&[0xff; 11]);
        assert!(matches!(
            get_varint(&mut bytes),
            Err(Error::MalformedEnvelope(Malformed::OverlongVarint))
        ));
    }

    #[test]
    fn key_rejects_field_zero() {
        let mut buf = BytesMut::new();
        put_varint(&mut buf, 0x02); // field 0, wire type 2
        assert!(matches!(
            get_key(&mut buf.freeze()),
            Err(Error::MalformedEnvelope(Malformed::FieldNumberRange(0)))
        ));
    }

    #[test]
    fn key_rejects_invalid_wire_type() {
        let mut buf = BytesMut::new();
        put_varint(&mut buf, (1 << 3) | 7);
        assert!(matches!(
            get_key(&mut buf.freeze()),
            Err(Error::MalformedEnvelope(Malformed::UnexpectedWireType(1, 7)))
        ));
    }

    #[test]
    fn length_delimited_overrun() {
        let mut buf = BytesMut::new();
        put_key(&mut buf, 1, WireType::LengthDelimited);
        put_varint(&mut buf, 10);
        buf.put_slice(b"abc");
        let mut bytes = buf.freeze();
        let (field, wire_type) = get_key(&mut bytes).unwrap();
        assert!(matches!(
            get_bytes(&mut bytes, field, wire_type),
            Err(Error::MalformedEnvelope(Malformed::TruncatedField(10, 3)))
        ));
    }
}
