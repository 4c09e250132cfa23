//! Icinga log line parsing.
//!
//! Lines have the shape `[<epoch seconds>] <LABEL>: <body>`. Host and
//! service labels carry a `;`-delimited body; every other label is
//! recognized and skipped.
//!
//! ```text
//! [1234567890] CURRENT HOST STATE: www;DOWN;SOFT;1;<Terminated by signal 15>
//! [1234567890] SERVICE ALERT: db01;MySQL;UNKNOWN;SOFT;1;ERROR: General time-out
//! [1234567890] HOST FLAPPING ALERT: m6play02;STARTED; appears to have started flapping
//! ```

use chrono::{DateTime, Utc};

use crate::error::ParseError;
use crate::event::{Event, EventPayload, HostEvent, ServiceEvent};

/// Label of periodic host state dumps.
pub const CURRENT_HOST_STATE: &str = "CURRENT HOST STATE";
/// Label of host state changes.
pub const HOST_ALERT: &str = "HOST ALERT";
/// Label of periodic service state dumps.
pub const CURRENT_SERVICE_STATE: &str = "CURRENT SERVICE STATE";
/// Label of service state changes.
pub const SERVICE_ALERT: &str = "SERVICE ALERT";

const HOST_FIELDS: usize = 5;
const SERVICE_FIELDS: usize = 6;

/// Outcome of parsing a well-formed line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    /// A host or service event.
    Event(Event),
    /// A recognized line whose label is not modeled.
    Skipped {
        /// The event-type label, e.g. `EXTERNAL COMMAND`.
        label: String,
    },
}

/// Stateless parser for Icinga log lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineParser;

impl LineParser {
    /// Creates a new line parser.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Parses one raw line (without its trailing newline).
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] when the header, timestamp or a host/service
    /// body is malformed. Unmodeled labels are not errors.
    pub fn parse(&self, line: &str) -> Result<ParsedLine, ParseError> {
        let (header, body) = line.split_once(':').ok_or(ParseError::MissingHeader)?;
        let (raw_timestamp, label) = header
            .trim_start()
            .split_once(' ')
            .ok_or(ParseError::MissingHeader)?;
        let label = label.trim();
        let body = body.trim_start();

        let timestamp = parse_timestamp(raw_timestamp)?;

        let payload = match label {
            CURRENT_HOST_STATE | HOST_ALERT => EventPayload::Host(parse_host(label, body)?),
            CURRENT_SERVICE_STATE | SERVICE_ALERT => {
                EventPayload::Service(parse_service(label, body)?)
            }
            _ => {
                return Ok(ParsedLine::Skipped {
                    label: label.to_string(),
                });
            }
        };

        Ok(ParsedLine::Event(Event { timestamp, payload }))
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, ParseError> {
    let digits = raw.trim_matches(|c: char| c == '[' || c == ']');
    digits
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .ok_or_else(|| ParseError::BadTimestamp(raw.to_string()))
}

/// Splits `body` into exactly `n` fields; the last field keeps any further `;`.
fn split_fields(body: &str, n: usize) -> Result<Vec<&str>, String> {
    let fields: Vec<&str> = body.splitn(n, ';').collect();
    if fields.len() < n {
        return Err(format!("expected {n} fields, found {}", fields.len()));
    }
    Ok(fields)
}

fn parse_count(raw: &str) -> Result<u64, String> {
    raw.parse::<u64>()
        .map_err(|e| format!("invalid state count {raw:?}: {e}"))
}

fn parse_host(label: &str, body: &str) -> Result<HostEvent, ParseError> {
    let f = split_fields(body, HOST_FIELDS).map_err(ParseError::BadHostBody)?;
    let state_count = parse_count(f[3]).map_err(ParseError::BadHostBody)?;

    Ok(HostEvent {
        subtype: label.to_string(),
        host_name: f[0].to_string(),
        state: f[1].to_string(),
        state_type: f[2].to_string(),
        state_count,
        message: f[4].to_string(),
    })
}

fn parse_service(label: &str, body: &str) -> Result<ServiceEvent, ParseError> {
    let f = split_fields(body, SERVICE_FIELDS).map_err(ParseError::BadServiceBody)?;
    let state_count = parse_count(f[4]).map_err(ParseError::BadServiceBody)?;

    Ok(ServiceEvent {
        subtype: label.to_string(),
        host_name: f[0].to_string(),
        service_name: f[1].to_string(),
        state: f[2].to_string(),
        state_type: f[3].to_string(),
        state_count,
        message: f[5].to_string(),
    })
}
