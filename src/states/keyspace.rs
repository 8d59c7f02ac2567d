//! Key-Space Cache
//!
//! Owns the [`DbKeyState`] of every (connection, database) pair and drives
//! it through the backend: paginated loads and confirmed point mutations.
//!
//! ```text
//! reload / load_more / load_all          update_key / add_key / delete_key
//!        │                                         │
//!        ▼ Reset / LoadStarted                     ▼ backend call
//!   DbKeyState ◀── PageLoaded{epoch} ──        confirmed?
//!        │                                         │ yes
//!        ▼                                         ▼ KeyRenamed / KeyAdded / KeyDeleted
//!   CacheEvent::KeysChanged ──▶ UI          CacheEvent::Operation*
//! ```
//!
//! State locks are only taken between awaits; a page that arrives after a
//! reset or dispose is dropped. Epochs come from one counter shared by all
//! pairs, so a pair re-created after a dispose never reuses an old epoch.

use crate::constants::{MATCH_ALL_PATTERN, SCAN_SENTINEL_CURSOR};
use crate::domain::{ConnectionId, KeySpaceId, KeyspaceConfig, NewKey, ScanCursor};
use crate::error::{Error, Result};
use crate::services::KeyspaceBackend;
use crate::states::keys::{DbKeyState, KeyAction};
use ahash::AHashMap;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Cache operations reported on the event channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOperation {
    Reload,
    LoadMore,
    LoadAll,
    Rename,
    Create,
    Delete,
}

impl KeyOperation {
    pub fn label(&self) -> &'static str {
        match self {
            KeyOperation::Reload => "reload",
            KeyOperation::LoadMore => "load more",
            KeyOperation::LoadAll => "load all",
            KeyOperation::Rename => "rename",
            KeyOperation::Create => "create",
            KeyOperation::Delete => "delete",
        }
    }
}

/// Events for the UI layer
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEvent {
    /// The state of a pair changed; take a new snapshot
    KeysChanged { space: KeySpaceId },
    OperationSucceeded {
        space: KeySpaceId,
        operation: KeyOperation,
    },
    /// Operation failed with a human-readable message
    OperationFailed {
        space: KeySpaceId,
        operation: KeyOperation,
        message: String,
    },
}

/// What a load call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Nothing to do: no cursor held or a load already in flight
    Skipped,
    /// At least one page was merged
    Merged,
    /// The pass was superseded by a reset or dispose; its result was dropped
    Discarded,
}

/// A load that was admitted and is waiting on the backend
struct Pass {
    epoch: u64,
    cursor: String,
    pattern: String,
}

/// Per (connection, database) key cache
pub struct KeySpaceCache {
    backend: Arc<dyn KeyspaceBackend>,
    states: Mutex<AHashMap<KeySpaceId, DbKeyState>>,
    /// Last epoch handed to a reset
    epochs: AtomicU64,
    page_size: u32,
    /// Event sender (for internal use)
    tx: Sender<CacheEvent>,
    /// Event receiver (for the UI layer)
    rx: Receiver<CacheEvent>,
}

impl KeySpaceCache {
    pub fn new(backend: Arc<dyn KeyspaceBackend>, page_size: u32) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            backend,
            states: Mutex::new(AHashMap::new()),
            epochs: AtomicU64::new(0),
            page_size: page_size.max(1),
            tx,
            rx,
        }
    }

    pub fn from_config(backend: Arc<dyn KeyspaceBackend>, config: &KeyspaceConfig) -> Self {
        Self::new(backend, config.page_size)
    }

    /// Get the event receiver for the UI layer
    pub fn events(&self) -> Receiver<CacheEvent> {
        self.rx.clone()
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    // ==================== Snapshots ====================

    /// Copy of the pair's state; an untouched pair reads as empty
    pub fn snapshot(&self, space: &KeySpaceId) -> DbKeyState {
        self.states.lock().get(space).cloned().unwrap_or_default()
    }

    pub fn keys(&self, space: &KeySpaceId) -> Vec<String> {
        self.states
            .lock()
            .get(space)
            .map(|state| state.keys().to_vec())
            .unwrap_or_default()
    }

    /// Pairs that currently hold state
    pub fn spaces(&self) -> Vec<KeySpaceId> {
        self.states.lock().keys().cloned().collect()
    }

    // ==================== Lifecycle ====================

    /// Drop the state of one pair
    pub fn dispose(&self, space: &KeySpaceId) {
        if self.states.lock().remove(space).is_some() {
            tracing::debug!(space = %space, "Key space disposed");
            self.publish(CacheEvent::KeysChanged {
                space: space.clone(),
            });
        }
    }

    /// Drop every pair of a connection that is being torn down
    pub fn dispose_connection(&self, connection: &ConnectionId) {
        let removed: Vec<KeySpaceId> = {
            let mut states = self.states.lock();
            let removed: Vec<KeySpaceId> = states
                .keys()
                .filter(|space| &space.connection == connection)
                .cloned()
                .collect();
            for space in &removed {
                states.remove(space);
            }
            removed
        };

        tracing::info!(connection = %connection, pairs = removed.len(), "Connection key spaces disposed");
        for space in removed {
            self.publish(CacheEvent::KeysChanged { space });
        }
    }

    // ==================== Loading ====================

    /// Start a fresh match-all pass and fetch its first page
    pub async fn reload(&self, space: &KeySpaceId) -> Result<LoadOutcome> {
        let pass = {
            let mut states = self.states.lock();
            let state = states.entry(space.clone()).or_default();
            state.apply(KeyAction::Reset {
                pattern: MATCH_ALL_PATTERN.to_string(),
                epoch: self.epochs.fetch_add(1, Ordering::Relaxed) + 1,
            });
            Pass {
                epoch: state.epoch(),
                cursor: SCAN_SENTINEL_CURSOR.to_string(),
                pattern: state.pattern().to_string(),
            }
        };
        self.publish(CacheEvent::KeysChanged {
            space: space.clone(),
        });

        tracing::info!(space = %space, epoch = pass.epoch, "Reloading keys");
        self.run_pass(space, pass, KeyOperation::Reload, false).await
    }

    /// Fetch and merge the next page, if a cursor is held and nothing is loading
    pub async fn load_more(&self, space: &KeySpaceId) -> Result<LoadOutcome> {
        let Some(pass) = self.begin_continuation(space) else {
            return Ok(LoadOutcome::Skipped);
        };
        self.run_pass(space, pass, KeyOperation::LoadMore, false).await
    }

    /// Fetch and merge pages until the backend reports the enumeration complete.
    ///
    /// There is no page cap; a backend that never returns the completion
    /// sentinel keeps this looping.
    pub async fn load_all(&self, space: &KeySpaceId) -> Result<LoadOutcome> {
        let Some(pass) = self.begin_continuation(space) else {
            return Ok(LoadOutcome::Skipped);
        };
        self.run_pass(space, pass, KeyOperation::LoadAll, true).await
    }

    fn begin_continuation(&self, space: &KeySpaceId) -> Option<Pass> {
        let pass = {
            let mut states = self.states.lock();
            let state = states.entry(space.clone()).or_default();
            let cursor = state.cursor().map(ScanCursor::as_str)?.to_string();
            if !state.apply(KeyAction::LoadStarted) {
                return None;
            }
            Pass {
                epoch: state.epoch(),
                cursor,
                pattern: state.pattern().to_string(),
            }
        };
        self.publish(CacheEvent::KeysChanged {
            space: space.clone(),
        });
        Some(pass)
    }

    async fn run_pass(
        &self,
        space: &KeySpaceId,
        mut pass: Pass,
        operation: KeyOperation,
        until_complete: bool,
    ) -> Result<LoadOutcome> {
        let mut pages = 0usize;

        loop {
            let fetched = self
                .backend
                .scan_page(space, &pass.cursor, &pass.pattern, self.page_size)
                .await;

            let page = match fetched {
                Ok(page) => page,
                Err(e) => {
                    let applied = self.update(space, KeyAction::LoadFailed { epoch: pass.epoch });
                    tracing::warn!(space = %space, operation = operation.label(), error = %e, "Key load failed");
                    if applied {
                        self.publish(CacheEvent::KeysChanged {
                            space: space.clone(),
                        });
                    }
                    self.fail(space, operation, &e);
                    return Err(e);
                }
            };

            let next = page.next_cursor();
            let count = page.keys.len();
            let applied = self.update(
                space,
                KeyAction::PageLoaded {
                    epoch: pass.epoch,
                    keys: page.keys,
                    cursor: next.clone(),
                    keep_loading: until_complete,
                },
            );
            if !applied {
                tracing::debug!(space = %space, epoch = pass.epoch, "Dropping page of a superseded pass");
                return Ok(LoadOutcome::Discarded);
            }

            pages += 1;
            tracing::debug!(space = %space, count, more = next.is_some(), "Keys page merged");
            self.publish(CacheEvent::KeysChanged {
                space: space.clone(),
            });

            match next {
                Some(cursor) if until_complete => pass.cursor = cursor.as_str().to_string(),
                _ => break,
            }
        }

        tracing::info!(space = %space, operation = operation.label(), pages, "Keys loaded");
        self.succeed(space, operation);
        Ok(LoadOutcome::Merged)
    }

    // ==================== Mutations ====================

    /// Rename a key; the cache changes only after the backend confirmed it
    pub async fn update_key(&self, space: &KeySpaceId, old_name: &str, new_name: &str) -> Result<()> {
        let operation = KeyOperation::Rename;
        if new_name.is_empty() {
            let err = Error::invalid("new key name must not be empty");
            self.fail(space, operation, &err);
            return Err(err);
        }

        if let Err(e) = self.backend.rename_key(space, old_name, new_name).await {
            tracing::warn!(space = %space, old_name, new_name, error = %e, "Rename failed");
            self.fail(space, operation, &e);
            return Err(e);
        }

        tracing::info!(space = %space, old_name, new_name, "Key renamed");
        self.confirm(
            space,
            operation,
            KeyAction::KeyRenamed {
                old_name: old_name.to_string(),
                new_name: new_name.to_string(),
            },
        );
        Ok(())
    }

    /// Create a key; on success it is shown first
    pub async fn add_key(&self, space: &KeySpaceId, key: NewKey) -> Result<()> {
        let operation = KeyOperation::Create;
        if key.key.is_empty() || !key.value.is_creatable() {
            let err = Error::invalid(format!(
                "cannot create {} key '{}' from this value",
                key.value.kind().short_name(),
                key.key
            ));
            self.fail(space, operation, &err);
            return Err(err);
        }

        if let Err(e) = self.backend.create_key(space, &key).await {
            tracing::warn!(space = %space, key = %key.key, error = %e, "Create failed");
            self.fail(space, operation, &e);
            return Err(e);
        }

        tracing::info!(space = %space, key = %key.key, kind = key.value.kind().short_name(), "Key created");
        self.confirm(space, operation, KeyAction::KeyAdded { key: key.key });
        Ok(())
    }

    pub async fn delete_key(&self, space: &KeySpaceId, key: &str) -> Result<()> {
        let operation = KeyOperation::Delete;
        if let Err(e) = self.backend.delete_key(space, key).await {
            tracing::warn!(space = %space, key, error = %e, "Delete failed");
            self.fail(space, operation, &e);
            return Err(e);
        }

        tracing::info!(space = %space, key, "Key deleted");
        self.confirm(
            space,
            operation,
            KeyAction::KeyDeleted {
                key: key.to_string(),
            },
        );
        Ok(())
    }

    // ==================== Internals ====================

    /// Apply an action to an existing pair; a disposed pair ignores it
    fn update(&self, space: &KeySpaceId, action: KeyAction) -> bool {
        self.states
            .lock()
            .get_mut(space)
            .is_some_and(|state| state.apply(action))
    }

    fn confirm(&self, space: &KeySpaceId, operation: KeyOperation, action: KeyAction) {
        if self.update(space, action) {
            self.publish(CacheEvent::KeysChanged {
                space: space.clone(),
            });
        }
        self.succeed(space, operation);
    }

    fn succeed(&self, space: &KeySpaceId, operation: KeyOperation) {
        self.publish(CacheEvent::OperationSucceeded {
            space: space.clone(),
            operation,
        });
    }

    fn fail(&self, space: &KeySpaceId, operation: KeyOperation, error: &Error) {
        self.publish(CacheEvent::OperationFailed {
            space: space.clone(),
            operation,
            message: error.to_string(),
        });
    }

    fn publish(&self, event: CacheEvent) {
        // The cache holds a receiver itself, so sending cannot fail
        let _ = self.tx.send(event);
    }
}

impl std::fmt::Debug for KeySpaceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySpaceCache")
            .field("pairs", &self.states.lock().len())
            .field("page_size", &self.page_size)
            .finish()
    }
}
