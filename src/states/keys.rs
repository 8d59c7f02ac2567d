//! Keys State
//!
//! Per (connection, database) key state and its pure transition function.
//!
//! ```text
//!        Reset{pattern, epoch}         PageLoaded{keep_loading: false}
//!   Idle ─────────────────────▶ Loading ──────────────────────────────▶ Idle
//!     │     LoadStarted            │    LoadFailed (cursor cleared)
//!     └────────────────────────────┘
//! ```
//!
//! Every reset installs a fresh epoch handed out by the owner of the state;
//! page results carry the epoch they were requested under and are dropped
//! when it no longer matches.

use crate::constants::MATCH_ALL_PATTERN;
use crate::domain::ScanCursor;
use ahash::AHashSet;

/// Cached keys of one (connection, database) pair
#[derive(Debug, Clone)]
pub struct DbKeyState {
    /// Known keys, in merge order, without duplicates
    keys: Vec<String>,
    /// Membership index over `keys`
    index: AHashSet<String>,
    /// Resume token; `None` when never started or exhausted
    cursor: Option<ScanCursor>,
    /// A page request is in flight
    is_loading: bool,
    /// Match pattern of the current enumeration pass
    pattern: String,
    /// Epoch of the current pass, set by every reset
    epoch: u64,
}

impl Default for DbKeyState {
    fn default() -> Self {
        Self {
            keys: Vec::new(),
            index: AHashSet::new(),
            cursor: None,
            is_loading: false,
            pattern: MATCH_ALL_PATTERN.to_string(),
            epoch: 0,
        }
    }
}

/// State transitions
#[derive(Debug, Clone, PartialEq)]
pub enum KeyAction {
    /// Start a new enumeration pass; clears keys and cursor.
    ///
    /// `epoch` must never have been used by an earlier pass of the same pair,
    /// including passes issued before the pair was disposed.
    Reset { pattern: String, epoch: u64 },
    /// A continuation page was requested
    LoadStarted,
    /// A page arrived for the pass tagged `epoch`
    PageLoaded {
        epoch: u64,
        keys: Vec<String>,
        cursor: Option<ScanCursor>,
        /// More pages of the same load follow
        keep_loading: bool,
    },
    /// A page request of the pass tagged `epoch` failed
    LoadFailed { epoch: u64 },
    KeyRenamed { old_name: String, new_name: String },
    KeyAdded { key: String },
    KeyDeleted { key: String },
}

impl DbKeyState {
    // ==================== Getters ====================

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn cursor(&self) -> Option<&ScanCursor> {
        self.cursor.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains(key)
    }

    /// Whether `load_more` would fetch a page
    pub fn can_load_more(&self) -> bool {
        self.cursor.is_some() && !self.is_loading
    }

    // ==================== Transitions ====================

    /// Apply one action in place.
    ///
    /// Returns `false` when the action was stale or had no effect.
    pub fn apply(&mut self, action: KeyAction) -> bool {
        match action {
            KeyAction::Reset { pattern, epoch } => {
                self.keys.clear();
                self.index.clear();
                self.cursor = None;
                self.pattern = pattern;
                self.epoch = epoch;
                self.is_loading = true;
                true
            }
            KeyAction::LoadStarted => {
                if self.is_loading {
                    return false;
                }
                self.is_loading = true;
                true
            }
            KeyAction::PageLoaded {
                epoch,
                keys,
                cursor,
                keep_loading,
            } => {
                if epoch != self.epoch {
                    return false;
                }
                self.merge(keys);
                self.cursor = cursor;
                self.is_loading = keep_loading && self.cursor.is_some();
                true
            }
            KeyAction::LoadFailed { epoch } => {
                if epoch != self.epoch {
                    return false;
                }
                self.cursor = None;
                self.is_loading = false;
                true
            }
            KeyAction::KeyRenamed { old_name, new_name } => self.rename(&old_name, new_name),
            KeyAction::KeyAdded { key } => {
                if self.index.contains(&key) {
                    self.keys.retain(|k| *k != key);
                } else {
                    self.index.insert(key.clone());
                }
                self.keys.insert(0, key);
                true
            }
            KeyAction::KeyDeleted { key } => {
                if !self.index.remove(&key) {
                    return false;
                }
                self.keys.retain(|k| *k != key);
                true
            }
        }
    }

    /// Set union preserving first-seen order
    fn merge(&mut self, keys: Vec<String>) {
        for key in keys {
            if self.index.insert(key.clone()) {
                self.keys.push(key);
            }
        }
    }

    fn rename(&mut self, old_name: &str, new_name: String) -> bool {
        let Some(position) = self.keys.iter().position(|k| k == old_name) else {
            return false;
        };
        if old_name == new_name {
            return false;
        }

        self.index.remove(old_name);
        if self.index.contains(&new_name) {
            self.keys.retain(|k| *k != new_name);
        } else {
            self.index.insert(new_name.clone());
        }

        // Removing a duplicate before `position` shifts it left by one
        let position = self.keys.iter().position(|k| k == old_name).unwrap_or(position);
        self.keys[position] = new_name;
        true
    }
}

/// Pure transition: `(state, action) -> state`
pub fn reduce(mut state: DbKeyState, action: KeyAction) -> DbKeyState {
    state.apply(action);
    state
}
