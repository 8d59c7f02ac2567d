//! Keyspace - Identifiers, Cursors and Scan Pages

use crate::constants::SCAN_SENTINEL_CURSOR;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Unique identifier for a backend connection
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct ConnectionId(pub Arc<str>);

impl ConnectionId {
    /// Create a new ConnectionId from a string
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// Get the underlying string reference
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ConnectionId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One logical database on one connection; the unit the key cache is kept per
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct KeySpaceId {
    pub connection: ConnectionId,
    pub database: u32,
}

impl KeySpaceId {
    pub fn new(connection: impl Into<ConnectionId>, database: u32) -> Self {
        Self {
            connection: connection.into(),
            database,
        }
    }
}

impl std::fmt::Display for KeySpaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/db{}", self.connection, self.database)
    }
}

/// Opaque continuation token of a SCAN enumeration.
///
/// Never compared or ordered, only handed back to the backend. The
/// completion sentinel never becomes a `ScanCursor`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanCursor(Arc<str>);

impl ScanCursor {
    /// Normalize a cursor received from the backend; the sentinel maps to `None`
    pub fn from_wire(raw: &str) -> Option<Self> {
        if raw == SCAN_SENTINEL_CURSOR || raw.is_empty() {
            None
        } else {
            Some(Self(raw.into()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A key as sent by the backend: text, or raw bytes when not valid UTF-8
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum WireKey {
    Text(String),
    Bytes(Vec<u8>),
}

impl From<WireKey> for String {
    fn from(key: WireKey) -> Self {
        match key {
            WireKey::Text(text) => text,
            WireKey::Bytes(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        }
    }
}

fn deserialize_keys<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let keys = Option::<Vec<WireKey>>::deserialize(deserializer)?;
    Ok(keys
        .unwrap_or_default()
        .into_iter()
        .map(String::from)
        .collect())
}

/// One bounded batch of keys plus the next cursor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanPage {
    #[serde(default, deserialize_with = "deserialize_keys")]
    pub keys: Vec<String>,
    /// Raw cursor, `"0"` when the enumeration is complete
    pub cursor: String,
}

impl ScanPage {
    pub fn new(keys: Vec<String>, cursor: impl Into<String>) -> Self {
        Self {
            keys,
            cursor: cursor.into(),
        }
    }

    /// The resume token, or `None` once the enumeration is complete
    pub fn next_cursor(&self) -> Option<ScanCursor> {
        ScanCursor::from_wire(&self.cursor)
    }
}
