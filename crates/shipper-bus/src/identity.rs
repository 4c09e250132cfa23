//! Stable client identities.
//!
//! A client identity is a configured name suffixed with the machine's host
//! name, so producers or consumers sharing a name on different machines
//! never collide on the bus. The same identity, scoped by an optional queue
//! group, names the durable cursor a consumer resumes from.

use std::fmt;

use crate::error::{BusError, Result};

/// A per-machine client identity, `<name>_<hostname>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentity {
    name: String,
    host: String,
}

impl ClientIdentity {
    /// Builds an identity from explicit parts.
    #[must_use]
    pub fn from_parts(name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
        }
    }

    /// Builds an identity for this machine.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Identity`] if the name is empty or the host name
    /// cannot be read.
    pub fn for_this_host(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(BusError::Identity("client name cannot be empty".to_string()));
        }
        let host = hostname::get()
            .map_err(|e| BusError::Identity(e.to_string()))?
            .to_string_lossy()
            .to_string();
        Ok(Self::from_parts(name, host))
    }

    /// The client id used when connecting.
    #[must_use]
    pub fn client_id(&self) -> String {
        format!("{}_{}", self.name, self.host)
    }

    /// The durable cursor name: the client id followed by the queue group.
    ///
    /// Characters the bus does not accept in durable names (`.`, `*`, `>`,
    /// path separators and whitespace) are replaced with `_`.
    #[must_use]
    pub fn durable_name(&self, queue_group: Option<&str>) -> String {
        let raw = format!("{}{}", self.client_id(), queue_group.unwrap_or_default());
        sanitize_name(&raw)
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.name, self.host)
    }
}

/// Replaces characters that are not allowed in stream or durable names.
pub(crate) fn sanitize_name(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '.' | '*' | '>' | '/' | '\\' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect()
}
