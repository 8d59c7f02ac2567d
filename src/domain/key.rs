//! Key - Key Types and Typed Value Payloads
//!
//! Values are a closed set of kinds; anything the client cannot edit is
//! carried as [`KeyValue::Unsupported`] instead of an untyped blob.

use serde::{Deserialize, Serialize};

/// Key type as reported by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyKind {
    String,
    Hash,
    List,
    Set,
    ZSet,
    Stream,
    Json,
    #[default]
    Unknown,
}

impl KeyKind {
    /// Get short display name for the type
    pub fn short_name(&self) -> &'static str {
        match self {
            KeyKind::String => "STR",
            KeyKind::Hash => "HASH",
            KeyKind::List => "LIST",
            KeyKind::Set => "SET",
            KeyKind::ZSet => "ZSET",
            KeyKind::Stream => "STREAM",
            KeyKind::Json => "JSON",
            KeyKind::Unknown => "?",
        }
    }

    /// Parse from a `TYPE` command response
    pub fn from_type_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "string" => KeyKind::String,
            "hash" => KeyKind::Hash,
            "list" => KeyKind::List,
            "set" => KeyKind::Set,
            "zset" => KeyKind::ZSet,
            "stream" => KeyKind::Stream,
            "json" | "rejson" | "rejson-rl" | "rejson-rl2" => KeyKind::Json,
            _ => KeyKind::Unknown,
        }
    }
}

/// One field of a hash value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashField {
    pub field: String,
    pub value: String,
}

/// One member of a sorted set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredMember {
    pub member: String,
    pub score: f64,
}

/// A typed value payload, used when creating keys
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum KeyValue {
    String {
        value: String,
    },
    List {
        items: Vec<String>,
    },
    Hash {
        fields: Vec<HashField>,
    },
    Set {
        members: Vec<String>,
    },
    #[serde(rename = "zset")]
    ZSet {
        members: Vec<ScoredMember>,
    },
    Stream {
        /// Entry id, `*` lets the server assign one
        id: String,
        fields: Vec<HashField>,
    },
    Json {
        value: serde_json::Value,
    },
    /// A type the client knows by name only
    Unsupported {
        type_name: String,
    },
}

impl KeyValue {
    /// The kind this payload creates
    pub fn kind(&self) -> KeyKind {
        match self {
            KeyValue::String { .. } => KeyKind::String,
            KeyValue::List { .. } => KeyKind::List,
            KeyValue::Hash { .. } => KeyKind::Hash,
            KeyValue::Set { .. } => KeyKind::Set,
            KeyValue::ZSet { .. } => KeyKind::ZSet,
            KeyValue::Stream { .. } => KeyKind::Stream,
            KeyValue::Json { .. } => KeyKind::Json,
            KeyValue::Unsupported { .. } => KeyKind::Unknown,
        }
    }

    /// Whether a key can be created from this payload
    pub fn is_creatable(&self) -> bool {
        match self {
            KeyValue::String { .. } | KeyValue::Json { .. } => true,
            KeyValue::List { items } => !items.is_empty(),
            KeyValue::Hash { fields } => !fields.is_empty(),
            KeyValue::Set { members } => !members.is_empty(),
            KeyValue::ZSet { members } => !members.is_empty(),
            KeyValue::Stream { fields, .. } => !fields.is_empty(),
            KeyValue::Unsupported { .. } => false,
        }
    }

    /// Shorthand for a string payload
    pub fn string(value: impl Into<String>) -> Self {
        KeyValue::String {
            value: value.into(),
        }
    }
}

/// Time-to-live requested for a new key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum KeyTtl {
    /// No expiry (`-1` on the wire)
    #[default]
    Persistent,
    /// Expire after the given number of seconds
    Seconds(u64),
}

impl From<i64> for KeyTtl {
    fn from(value: i64) -> Self {
        if value < 0 {
            KeyTtl::Persistent
        } else {
            KeyTtl::Seconds(value as u64)
        }
    }
}

impl From<KeyTtl> for i64 {
    fn from(value: KeyTtl) -> Self {
        match value {
            KeyTtl::Persistent => -1,
            KeyTtl::Seconds(secs) => i64::try_from(secs).unwrap_or(i64::MAX),
        }
    }
}

/// Everything needed to create a key, besides where
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewKey {
    pub key: String,
    #[serde(default)]
    pub ttl: KeyTtl,
    pub value: KeyValue,
}

impl NewKey {
    pub fn new(key: impl Into<String>, value: KeyValue) -> Self {
        Self {
            key: key.into(),
            ttl: KeyTtl::Persistent,
            value,
        }
    }

    pub fn with_ttl(mut self, ttl: KeyTtl) -> Self {
        self.ttl = ttl;
        self
    }
}
