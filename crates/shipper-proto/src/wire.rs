//! JSON wire envelope.
//!
//! Every event travels on the bus, and is stored in the index, as
//!
//! ```json
//! {"timestamp":"1234567890000","type":"HostMsg","msg":{"subtype":"HOST ALERT", ...}}
//! ```
//!
//! `timestamp` is epoch milliseconds as a string and `type` discriminates
//! the shape of `msg`.

use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::event::{Event, EventKind, EventPayload, HostEvent, ServiceEvent};

#[derive(Serialize)]
#[serde(untagged)]
enum MsgRef<'a> {
    Host(&'a HostEvent),
    Service(&'a ServiceEvent),
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    timestamp: String,
    #[serde(rename = "type")]
    kind: &'static str,
    msg: MsgRef<'a>,
}

#[derive(Deserialize)]
struct Envelope {
    timestamp: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    msg: serde_json::Value,
}

/// Encodes an event as a JSON envelope value.
///
/// # Errors
///
/// Returns [`CodecError::Unrecognized`] for unmodeled events.
pub fn to_value(event: &Event) -> Result<serde_json::Value, CodecError> {
    let (kind, msg) = match &event.payload {
        EventPayload::Host(host) => (EventKind::Host, MsgRef::Host(host)),
        EventPayload::Service(service) => (EventKind::Service, MsgRef::Service(service)),
        EventPayload::Unrecognized { label } => {
            return Err(CodecError::Unrecognized(label.clone()));
        }
    };

    let envelope = EnvelopeRef {
        timestamp: event.timestamp_millis().to_string(),
        kind: kind.wire_tag().unwrap_or_default(),
        msg,
    };
    Ok(serde_json::to_value(envelope)?)
}

/// Encodes an event as JSON bytes.
///
/// # Errors
///
/// Returns [`CodecError::Unrecognized`] for unmodeled events.
pub fn encode(event: &Event) -> Result<Vec<u8>, CodecError> {
    Ok(serde_json::to_vec(&to_value(event)?)?)
}

/// Decodes JSON bytes into an event.
///
/// Envelopes with a missing or unknown `type` decode to
/// [`EventPayload::Unrecognized`] carrying the tag.
///
/// # Errors
///
/// Returns an error if the bytes are not an envelope, the timestamp is not
/// epoch milliseconds, or `msg` does not match its `type`.
pub fn decode(bytes: &[u8]) -> Result<Event, CodecError> {
    let envelope: Envelope = serde_json::from_slice(bytes)?;

    let timestamp = envelope
        .timestamp
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .ok_or_else(|| CodecError::Timestamp(envelope.timestamp.clone()))?;

    let payload = match EventKind::from_wire_tag(&envelope.kind) {
        EventKind::Host => EventPayload::Host(serde_json::from_value(envelope.msg)?),
        EventKind::Service => EventPayload::Service(serde_json::from_value(envelope.msg)?),
        EventKind::Unrecognized => EventPayload::Unrecognized {
            label: envelope.kind,
        },
    };

    Ok(Event { timestamp, payload })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use serde_json::json;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap_or_default()
    }

    fn host_event() -> Event {
        Event::host(
            ts(1_234_567_890),
            HostEvent {
                subtype: "HOST ALERT".to_string(),
                host_name: "webhost".to_string(),
                state: "UP".to_string(),
                state_type: "HARD".to_string(),
                state_count: 1,
                message: "PING OK".to_string(),
            },
        )
    }

    #[test]
    fn host_envelope_layout() {
        let value = to_value(&host_event()).unwrap_or_default();
        assert_eq!(
            value,
            json!({
                "timestamp": "1234567890000",
                "type": "HostMsg",
                "msg": {
                    "subtype": "HOST ALERT",
                    "hostName": "webhost",
                    "state": "UP",
                    "stateType": "HARD",
                    "stateCount": 1,
                    "message": "PING OK"
                }
            })
        );
    }

    #[test]
    fn service_envelope_decodes() {
        let bytes = br#"{
            "timestamp": "1500000000000",
            "type": "ServiceMsg",
            "msg": {
                "subtype": "SERVICE ALERT",
                "hostName": "db01",
                "serviceName": "MySQL",
                "state": "CRITICAL",
                "stateType": "SOFT",
                "stateCount": 3,
                "message": "connection refused"
            }
        }"#;

        let event = decode(bytes);
        assert!(event.is_ok(), "decode failed: {event:?}");
        if let Ok(event) = event {
            assert_eq!(event.timestamp, ts(1_500_000_000));
            let EventPayload::Service(service) = event.payload else {
                panic!("expected service payload");
            };
            assert_eq!(service.service_name, "MySQL");
            assert_eq!(service.state_count, 3);
        }
    }

    #[test]
    fn decode_inverts_encode() {
        let event = host_event();
        let bytes = encode(&event).unwrap_or_default();
        assert_eq!(decode(&bytes).ok(), Some(event));
    }

    #[test]
    fn unknown_type_decodes_as_unrecognized() {
        let event = decode(br#"{"timestamp":"0","type":"DowntimeMsg","msg":{}}"#);
        assert!(matches!(
            event.map(|e| e.payload),
            Ok(EventPayload::Unrecognized { label }) if label == "DowntimeMsg"
        ));

        let untyped = decode(br#"{"timestamp":"0"}"#);
        assert!(matches!(
            untyped.map(|e| e.kind()),
            Ok(EventKind::Unrecognized)
        ));
    }

    #[test]
    fn mismatched_msg_is_an_error() {
        let result = decode(br#"{"timestamp":"0","type":"HostMsg","msg":{"hostName":"h"}}"#);
        assert!(matches!(result, Err(CodecError::Json(_))));
    }

    #[test]
    fn bad_timestamp_is_an_error() {
        let result = decode(br#"{"timestamp":"yesterday","type":"HostMsg","msg":{}}"#);
        assert!(matches!(result, Err(CodecError::Timestamp(t)) if t == "yesterday"));
    }

    #[test]
    fn unrecognized_events_cannot_be_encoded() {
        let event = Event {
            timestamp: ts(0),
            payload: EventPayload::Unrecognized {
                label: "EXTERNAL COMMAND".to_string(),
            },
        };
        assert!(matches!(encode(&event), Err(CodecError::Unrecognized(_))));
    }
}
