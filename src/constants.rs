//! Key-Space Constants
//!
//! Centralized protocol and paging constants shared by the bridge, the cache
//! and the tree projection.

/// Keys requested per SCAN page
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

/// Cursor that starts an enumeration and, when returned, ends it
pub const SCAN_SENTINEL_CURSOR: &str = "0";

/// Pattern used by a fresh reload
pub const MATCH_ALL_PATTERN: &str = "*";

/// Delimiter splitting key names into tree levels
pub const DEFAULT_DELIMITER: &str = ":";

/// Id prefix that keeps group nodes apart from leaves with the same path
pub const GROUP_ID_PREFIX: &str = "group__";

/// Invocation timeout
pub const INVOKE_TIMEOUT_SECS: u64 = 30;

// ==================== Backend Methods ====================

/// Fetch one SCAN page
pub const METHOD_KEY_LOAD: &str = "key:load";

/// Rename a key
pub const METHOD_KEY_RENAME: &str = "client:key-name-update";

/// Create a key with a typed value
pub const METHOD_KEY_CREATE: &str = "client:key-create";

/// Delete a key
pub const METHOD_KEY_DELETE: &str = "client:key-delete";

// ==================== Backend Topics ====================

/// Pushed by the backend after a key was created, renamed or deleted
pub const TOPIC_KEYSPACE_MUTATED: &str = "keyspace:mutated";
