//! Keyspace Backend
//!
//! The typed operations the key cache needs from the backend, and their
//! implementation as bridge invocations.

use crate::constants::{METHOD_KEY_CREATE, METHOD_KEY_DELETE, METHOD_KEY_LOAD, METHOD_KEY_RENAME};
use crate::domain::{KeySpaceId, KeyTtl, KeyValue, NewKey, ScanPage};
use crate::error::Result;
use crate::services::bridge::IpcBridge;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Backend operations on one key space
pub trait KeyspaceBackend: Send + Sync + 'static {
    /// Fetch one page of keys starting at `cursor`
    fn scan_page<'a>(
        &'a self,
        space: &'a KeySpaceId,
        cursor: &'a str,
        pattern: &'a str,
        count: u32,
    ) -> BoxFuture<'a, Result<ScanPage>>;

    fn rename_key<'a>(
        &'a self,
        space: &'a KeySpaceId,
        old_name: &'a str,
        new_name: &'a str,
    ) -> BoxFuture<'a, Result<()>>;

    fn create_key<'a>(&'a self, space: &'a KeySpaceId, key: &'a NewKey) -> BoxFuture<'a, Result<()>>;

    fn delete_key<'a>(&'a self, space: &'a KeySpaceId, key: &'a str) -> BoxFuture<'a, Result<()>>;
}

// ==================== Wire Params ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanParams {
    pub connection_id: String,
    pub database_index: u32,
    pub cursor: String,
    pub count: u32,
    #[serde(default = "default_pattern")]
    pub pattern: String,
}

fn default_pattern() -> String {
    crate::constants::MATCH_ALL_PATTERN.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenameParams {
    pub connection_id: String,
    pub database_index: u32,
    pub current_name: String,
    pub new_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateParams {
    pub connection_id: String,
    pub database_index: u32,
    pub key: String,
    #[serde(default)]
    pub ttl: KeyTtl,
    pub value: KeyValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteParams {
    pub connection_id: String,
    pub database_index: u32,
    pub key: String,
}

/// What happened to a key, as pushed on `keyspace:mutated`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationOp {
    Create,
    Rename,
    Delete,
}

/// Payload of the `keyspace:mutated` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyspaceMutated {
    pub connection_id: String,
    pub database_index: u32,
    /// The affected key; the new name for a rename
    pub key: String,
    pub op: MutationOp,
}

// ==================== Bridge Implementation ====================

/// [`KeyspaceBackend`] speaking to the backend process through the bridge
#[derive(Clone, Debug)]
pub struct BridgeBackend {
    bridge: Arc<IpcBridge>,
}

impl BridgeBackend {
    pub fn new(bridge: Arc<IpcBridge>) -> Self {
        Self { bridge }
    }

    pub fn bridge(&self) -> &Arc<IpcBridge> {
        &self.bridge
    }
}

impl KeyspaceBackend for BridgeBackend {
    fn scan_page<'a>(
        &'a self,
        space: &'a KeySpaceId,
        cursor: &'a str,
        pattern: &'a str,
        count: u32,
    ) -> BoxFuture<'a, Result<ScanPage>> {
        Box::pin(async move {
            let params = ScanParams {
                connection_id: space.connection.as_str().to_string(),
                database_index: space.database,
                cursor: cursor.to_string(),
                count,
                pattern: pattern.to_string(),
            };
            self.bridge.invoke(METHOD_KEY_LOAD, params).await
        })
    }

    fn rename_key<'a>(
        &'a self,
        space: &'a KeySpaceId,
        old_name: &'a str,
        new_name: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let params = RenameParams {
                connection_id: space.connection.as_str().to_string(),
                database_index: space.database,
                current_name: old_name.to_string(),
                new_name: new_name.to_string(),
            };
            let _: Value = self.bridge.invoke(METHOD_KEY_RENAME, params).await?;
            Ok(())
        })
    }

    fn create_key<'a>(&'a self, space: &'a KeySpaceId, key: &'a NewKey) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let params = CreateParams {
                connection_id: space.connection.as_str().to_string(),
                database_index: space.database,
                key: key.key.clone(),
                ttl: key.ttl,
                value: key.value.clone(),
            };
            let _: Value = self.bridge.invoke(METHOD_KEY_CREATE, params).await?;
            Ok(())
        })
    }

    fn delete_key<'a>(&'a self, space: &'a KeySpaceId, key: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let params = DeleteParams {
                connection_id: space.connection.as_str().to_string(),
                database_index: space.database,
                key: key.to_string(),
            };
            let _: Value = self.bridge.invoke(METHOD_KEY_DELETE, params).await?;
            Ok(())
        })
    }
}
