use bytes::BytesMut;
use chrono::{TimeZone, Utc};
use cloudevents_codec::*;
use fxhash::FxHashMap;
use pretty_assertions::assert_eq;
use test_log::test;
use tokio_stream::StreamExt;
use tokio_util::codec::{Encoder, FramedRead};

fn event(id: &str) -> CloudEvent {
    CloudEvent::new(id, "/sensors/1", "1.0", "temperature.updated", FxHashMap::default(), None)
        .unwrap()
}

#[test]
fn concrete_scenario() {
    let attributes: FxHashMap<String, AttributeValue> =
        [("priority".to_owned(), AttributeValue::Integer(3))]
            .into_iter()
            .collect();
    let event = CloudEvent::new(
        "123",
        "/sensors/1",
        "1.0",
        "temperature.updated",
        attributes,
        Some(Data::Text("42C".to_owned())),
    )
    .unwrap();

    let bytes = encode_event(&event);
    let decoded = decode_event(&bytes).unwrap();

    assert_eq!(decoded, event);
    assert_eq!(decoded.id(), "123");
    assert_eq!(decoded.source(), "/sensors/1");
    assert_eq!(decoded.spec_version(), "1.0");
    assert_eq!(decoded.event_type(), "temperature.updated");
    assert_eq!(decoded.attribute("priority").unwrap().as_integer().unwrap(), 3);
    assert_eq!(decoded.as_text().unwrap(), "42C");
}

#[test]
fn attribute_variant_fidelity() {
    let ts = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
    let event = CloudEvent::builder()
        .id("1")
        .source("/s")
        .event_type("t")
        .attribute("flag", AttributeValue::Boolean(true))
        .attribute("off", AttributeValue::Boolean(false))
        .attribute("count", AttributeValue::Integer(-42))
        .attribute("label", AttributeValue::String("hello".to_owned()))
        .attribute("blob", AttributeValue::Bytes(vec![0x00, 0xff, 0x7f]))
        .attribute("link", AttributeValue::uri("mqtt://broker/topic"))
        .attribute("rel", AttributeValue::uri_ref("/sensors/1"))
        .attribute("when", AttributeValue::Timestamp(ts))
        .build()
        .unwrap();

    let decoded = decode_event(&encode_event(&event)).unwrap();
    assert_eq!(decoded, event);

    // Discriminants survive alongside values
    assert_eq!(decoded.attribute("flag").unwrap().as_boolean().unwrap(), true);
    assert_eq!(decoded.attribute("off").unwrap().as_boolean().unwrap(), false);
    assert_eq!(decoded.attribute("count").unwrap().as_integer().unwrap(), -42);
    assert_eq!(decoded.attribute("label").unwrap().as_string().unwrap(), "hello");
    assert_eq!(
        decoded.attribute("blob").unwrap().as_bytes().unwrap(),
        [0x00, 0xff, 0x7f]
    );
    assert_eq!(
        decoded.attribute("link").unwrap().as_uri().unwrap(),
        "mqtt://broker/topic"
    );
    assert_eq!(
        decoded.attribute("rel").unwrap().as_uri_ref().unwrap(),
        "/sensors/1"
    );
    // Sub-second precision is not truncated
    assert_eq!(decoded.attribute("when").unwrap().as_timestamp().unwrap(), ts);
}

#[test]
fn epoch_timestamp() {
    let epoch = Utc.timestamp_opt(0, 0).unwrap();
    let event = event("1")
        .with_attribute("when", AttributeValue::Timestamp(epoch))
        .unwrap();
    let decoded = decode_event(&encode_event(&event)).unwrap();
    assert_eq!(
        decoded.attribute("when").unwrap().as_timestamp().unwrap(),
        epoch
    );
}

#[test]
fn payload_less_event() {
    let event = event("1");
    let decoded = decode_event(&encode_event(&event)).unwrap();
    assert_eq!(decoded, event);
    assert!(!decoded.has_data());
}

#[test]
fn binary_payload() {
    let event = CloudEvent::builder()
        .id("1")
        .source("/s")
        .event_type("t")
        .binary_data(vec![0xde, 0xad, 0xbe, 0xef])
        .build()
        .unwrap();
    let decoded = decode_event(&encode_event(&event)).unwrap();
    assert_eq!(decoded.as_binary().unwrap(), [0xde, 0xad, 0xbe, 0xef]);
}

#[test]
fn structured_payload() {
    let event = CloudEvent::builder()
        .id("1")
        .source("/s")
        .event_type("t")
        .structured_data("type.example.com/sensor.Reading", vec![0x08, 0x2a])
        .build()
        .unwrap();
    let decoded = decode_event(&encode_event(&event)).unwrap();
    assert_eq!(
        decoded.as_structured().unwrap(),
        &StructuredData {
            type_url: "type.example.com/sensor.Reading".to_owned(),
            value: vec![0x08, 0x2a],
        }
    );
}

#[test]
fn batch_preserves_order() {
    let batch = CloudEventBatch::new(vec![event("b"), event("a"), event("c")]);
    let decoded = decode_batch(&encode_batch(&batch)).unwrap();
    assert_eq!(decoded, batch);
    let ids: Vec<_> = decoded.iter().map(|e| e.id()).collect();
    assert_eq!(ids, ["b", "a", "c"]);
}

#[test]
fn empty_batch() {
    let batch = CloudEventBatch::default();
    let bytes = encode_batch(&batch);
    assert!(bytes.is_empty());
    let decoded = decode_batch(&bytes).unwrap();
    assert!(decoded.is_empty());
}

#[test(tokio::test)]
async fn event_stream_framing() {
    let first = event("1")
        .with_attribute("priority", AttributeValue::Integer(3))
        .unwrap();
    let second = CloudEvent::builder()
        .id("2")
        .source("/s")
        .event_type("t")
        .text_data("42C")
        .build()
        .unwrap();

    let mut codec = EventStreamCodec::default();
    let mut buf = BytesMut::new();
    codec.encode(&first, &mut buf).unwrap();
    codec.encode(&second, &mut buf).unwrap();
    let stream = buf.freeze();

    let mut reader = FramedRead::new(&stream[..], EventStreamCodec::default());
    assert_eq!(reader.next().await.unwrap().unwrap(), first);
    assert_eq!(reader.next().await.unwrap().unwrap(), second);
    assert!(reader.next().await.is_none());
}
