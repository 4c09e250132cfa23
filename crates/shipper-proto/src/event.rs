//! Monitoring event types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A host state change or alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostEvent {
    /// The log label this event came from, e.g. `HOST ALERT`.
    pub subtype: String,
    /// Name of the host.
    pub host_name: String,
    /// Host state, e.g. `UP` or `DOWN`.
    pub state: String,
    /// `SOFT` or `HARD`.
    pub state_type: String,
    /// Check attempt counter.
    pub state_count: u64,
    /// Plugin output.
    pub message: String,
}

/// A service state change or alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEvent {
    /// The log label this event came from, e.g. `SERVICE ALERT`.
    pub subtype: String,
    /// Name of the host the service runs on.
    pub host_name: String,
    /// Name of the service.
    pub service_name: String,
    /// Service state, e.g. `OK` or `CRITICAL`.
    pub state: String,
    /// `SOFT` or `HARD`.
    pub state_type: String,
    /// Check attempt counter.
    pub state_count: u64,
    /// Plugin output.
    pub message: String,
}

/// The structured content of an [`Event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    /// A host record.
    Host(HostEvent),
    /// A service record.
    Service(ServiceEvent),
    /// A label that is recognized as an event but not modeled.
    Unrecognized {
        /// The label or wire tag that was not modeled.
        label: String,
    },
}

/// Broad category of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Host events.
    Host,
    /// Service events.
    Service,
    /// Anything else.
    Unrecognized,
}

impl EventKind {
    /// Returns the tag used for this kind in the wire envelope.
    ///
    /// Unrecognized events have no tag.
    #[must_use]
    pub const fn wire_tag(self) -> Option<&'static str> {
        match self {
            Self::Host => Some("HostMsg"),
            Self::Service => Some("ServiceMsg"),
            Self::Unrecognized => None,
        }
    }

    /// Maps a wire tag back to a kind.
    #[must_use]
    pub fn from_wire_tag(tag: &str) -> Self {
        match tag {
            "HostMsg" => Self::Host,
            "ServiceMsg" => Self::Service,
            _ => Self::Unrecognized,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_tag().unwrap_or("Unrecognized"))
    }
}

/// A timestamped monitoring event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// When Icinga logged the event.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub payload: EventPayload,
}

impl Event {
    /// Creates a host event.
    #[must_use]
    pub const fn host(timestamp: DateTime<Utc>, host: HostEvent) -> Self {
        Self {
            timestamp,
            payload: EventPayload::Host(host),
        }
    }

    /// Creates a service event.
    #[must_use]
    pub const fn service(timestamp: DateTime<Utc>, service: ServiceEvent) -> Self {
        Self {
            timestamp,
            payload: EventPayload::Service(service),
        }
    }

    /// Returns the broad category of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match &self.payload {
            EventPayload::Host(_) => EventKind::Host,
            EventPayload::Service(_) => EventKind::Service,
            EventPayload::Unrecognized { .. } => EventKind::Unrecognized,
        }
    }

    /// Milliseconds since the Unix epoch.
    #[must_use]
    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}
