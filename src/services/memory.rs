//! In-Memory Backend
//!
//! A simulated backend process living in the same address space. It accepts
//! the bridge's outbound frames as a [`Transport`], answers invocations against
//! an in-memory key store and pushes replies and events back as inbound frames.
//!
//! ```text
//! IpcBridge ──send(frame)──▶ MemoryBackend ──handle──▶ store
//!     ▲                            │
//!     └──run_inbound◀── inbound ◀──┘  reply{id} / event{keyspace:mutated}
//! ```

use crate::constants::{
    METHOD_KEY_CREATE, METHOD_KEY_DELETE, METHOD_KEY_LOAD, METHOD_KEY_RENAME,
    SCAN_SENTINEL_CURSOR, TOPIC_KEYSPACE_MUTATED,
};
use crate::domain::{KeyKind, KeyTtl, KeyValue, ScanPage};
use crate::error::{Error, Result};
use crate::services::backend::{
    CreateParams, DeleteParams, KeyspaceMutated, MutationOp, RenameParams, ScanParams,
};
use crate::services::bridge::Transport;
use crate::services::envelope::{Envelope, EventPayload, Inbound, InvokePayload, ReplyPayload};
use ahash::AHashMap;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// One stored key
#[derive(Debug, Clone)]
struct StoredKey {
    value: KeyValue,
    ttl: KeyTtl,
}

type Database = BTreeMap<String, StoredKey>;

#[derive(Default)]
struct Store {
    databases: AHashMap<(String, u32), Database>,
}

impl Store {
    fn database(&mut self, connection_id: &str, database_index: u32) -> &mut Database {
        self.databases
            .entry((connection_id.to_string(), database_index))
            .or_default()
    }
}

/// Simulated backend process
#[derive(Clone)]
pub struct MemoryBackend {
    store: Arc<Mutex<Store>>,
    inbound: mpsc::UnboundedSender<String>,
}

impl MemoryBackend {
    /// Create a backend; the receiver yields the frames it pushes to the UI
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (inbound, rx) = mpsc::unbounded_channel();
        let backend = Self {
            store: Arc::new(Mutex::new(Store::default())),
            inbound,
        };
        (backend, rx)
    }

    /// Insert string keys with an empty value, replacing existing ones
    pub fn seed<I, S>(&self, connection_id: &str, database_index: u32, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut store = self.store.lock();
        let database = store.database(connection_id, database_index);
        for key in keys {
            database.insert(
                key.into(),
                StoredKey {
                    value: KeyValue::string(""),
                    ttl: KeyTtl::Persistent,
                },
            );
        }
    }

    /// Names currently stored in one database, in byte order
    pub fn key_names(&self, connection_id: &str, database_index: u32) -> Vec<String> {
        self.store
            .lock()
            .database(connection_id, database_index)
            .keys()
            .cloned()
            .collect()
    }

    /// Kind and TTL of one stored key
    pub fn describe(
        &self,
        connection_id: &str,
        database_index: u32,
        key: &str,
    ) -> Option<(KeyKind, KeyTtl)> {
        self.store
            .lock()
            .database(connection_id, database_index)
            .get(key)
            .map(|stored| (stored.value.kind(), stored.ttl))
    }

    // ==================== Dispatch ====================

    fn handle_frame(&self, frame: &str) -> Result<()> {
        let envelope: Envelope = serde_json::from_str(frame).map_err(|e| Error::Protocol {
            message: format!("backend received malformed frame: {e}"),
        })?;

        match envelope {
            Envelope::Invoke(invoke) => {
                let id = invoke.id;
                let reply = match self.handle_invoke(invoke) {
                    Ok(result) => ReplyPayload::ok(id, result),
                    Err(e) => ReplyPayload::err(id, e.to_string()),
                };
                self.push(&Inbound::Reply(reply))
            }
            Envelope::Event(event) => {
                tracing::debug!(topic = %event.name, "Backend received UI event");
                Ok(())
            }
        }
    }

    fn handle_invoke(&self, invoke: InvokePayload) -> Result<Value> {
        tracing::debug!(id = invoke.id, method = %invoke.method, "Backend handling invocation");
        match invoke.method.as_str() {
            METHOD_KEY_LOAD => {
                let page = self.scan(params(invoke.params)?);
                Ok(serde_json::to_value(page)?)
            }
            METHOD_KEY_RENAME => {
                self.rename(params(invoke.params)?)?;
                Ok(Value::Null)
            }
            METHOD_KEY_CREATE => {
                self.create(params(invoke.params)?)?;
                Ok(Value::Null)
            }
            METHOD_KEY_DELETE => {
                self.delete(params(invoke.params)?)?;
                Ok(Value::Null)
            }
            other => Err(Error::backend(format!("ERR unknown method '{other}'"))),
        }
    }

    fn push(&self, inbound: &Inbound) -> Result<()> {
        let frame = serde_json::to_string(inbound)?;
        self.inbound.send(frame).map_err(|_| Error::Transport {
            message: "UI side stopped receiving".to_string(),
        })
    }

    fn notify(&self, connection_id: &str, database_index: u32, key: &str, op: MutationOp) {
        let data = KeyspaceMutated {
            connection_id: connection_id.to_string(),
            database_index,
            key: key.to_string(),
            op,
        };
        let pushed = serde_json::to_value(data).map_err(Error::from).and_then(|data| {
            self.push(&Inbound::Event(EventPayload {
                name: TOPIC_KEYSPACE_MUTATED.to_string(),
                data,
            }))
        });
        if let Err(e) = pushed {
            tracing::warn!(error = %e, "Failed to push mutation event");
        }
    }

    // ==================== Operations ====================

    /// The cursor is the decimal offset into the matching keys
    fn scan(&self, params: ScanParams) -> ScanPage {
        let mut store = self.store.lock();
        let database = store.database(&params.connection_id, params.database_index);

        let offset = params.cursor.parse::<usize>().unwrap_or(0);
        let count = params.count.max(1) as usize;
        let matching: Vec<&String> = database
            .keys()
            .filter(|key| glob_match(&params.pattern, key))
            .collect();

        let keys: Vec<String> = matching
            .iter()
            .skip(offset)
            .take(count)
            .map(|key| (*key).clone())
            .collect();
        let next = offset + keys.len();
        let cursor = if next >= matching.len() {
            SCAN_SENTINEL_CURSOR.to_string()
        } else {
            next.to_string()
        };

        ScanPage::new(keys, cursor)
    }

    fn rename(&self, params: RenameParams) -> Result<()> {
        {
            let mut store = self.store.lock();
            let database = store.database(&params.connection_id, params.database_index);
            if database.contains_key(&params.new_name) {
                return Err(Error::backend("ERR target key name already exists"));
            }
            let stored = database
                .remove(&params.current_name)
                .ok_or_else(|| Error::backend("ERR no such key"))?;
            database.insert(params.new_name.clone(), stored);
        }

        self.notify(
            &params.connection_id,
            params.database_index,
            &params.new_name,
            MutationOp::Rename,
        );
        Ok(())
    }

    fn create(&self, params: CreateParams) -> Result<()> {
        if !params.value.is_creatable() {
            return Err(Error::backend(format!(
                "ERR cannot create a {} key from this value",
                params.value.kind().short_name()
            )));
        }

        {
            let mut store = self.store.lock();
            let database = store.database(&params.connection_id, params.database_index);
            if database.contains_key(&params.key) {
                return Err(Error::backend("ERR key already exists"));
            }
            database.insert(
                params.key.clone(),
                StoredKey {
                    value: params.value,
                    ttl: params.ttl,
                },
            );
        }

        self.notify(
            &params.connection_id,
            params.database_index,
            &params.key,
            MutationOp::Create,
        );
        Ok(())
    }

    fn delete(&self, params: DeleteParams) -> Result<()> {
        {
            let mut store = self.store.lock();
            let database = store.database(&params.connection_id, params.database_index);
            if database.remove(&params.key).is_none() {
                return Err(Error::backend("ERR no such key"));
            }
        }

        self.notify(
            &params.connection_id,
            params.database_index,
            &params.key,
            MutationOp::Delete,
        );
        Ok(())
    }
}

impl Transport for MemoryBackend {
    fn send(&self, frame: String) -> BoxFuture<'static, Result<()>> {
        let result = self.handle_frame(&frame);
        Box::pin(async move { result })
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("databases", &self.store.lock().databases.len())
            .finish()
    }
}

fn params<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| Error::backend(format!("ERR invalid params: {e}")))
}

/// Match a key against a SCAN `MATCH` pattern (`*`, `?` and `\` escapes)
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                star = Some((p, t));
                p += 1;
                continue;
            }
            Some('?') => {
                p += 1;
                t += 1;
                continue;
            }
            Some('\\') if p + 1 < pattern.len() && pattern[p + 1] == text[t] => {
                p += 2;
                t += 1;
                continue;
            }
            Some(c) if *c != '\\' && *c == text[t] => {
                p += 1;
                t += 1;
                continue;
            }
            _ => {}
        }

        // Backtrack to the last star and let it swallow one more char
        match star {
            Some((star_p, star_t)) => {
                p = star_p + 1;
                t = star_t + 1;
                star = Some((star_p, star_t + 1));
            }
            None => return false,
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::envelope::Envelope;
    use serde_json::json;

    fn invoke_frame(id: u64, method: &str, params: Value) -> String {
        serde_json::to_string(&Envelope::Invoke(InvokePayload {
            id,
            method: method.to_string(),
            params,
        }))
        .expect("serialize")
    }

    fn next_inbound(rx: &mut mpsc::UnboundedReceiver<String>) -> Inbound {
        let frame = rx.try_recv().expect("frame pushed");
        serde_json::from_str(&frame).expect("valid inbound")
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match("*", "anything"));
        assert!(glob_match("*", ""));
        assert!(glob_match("user:*", "user:1"));
        assert!(!glob_match("user:*", "session:1"));
        assert!(glob_match("u?er:*:name", "user:42:name"));
        assert!(glob_match("*:name", "a:b:name"));
        assert!(glob_match(r"key\*", "key*"));
        assert!(!glob_match(r"key\*", "keys"));
    }

    #[test]
    fn test_scan_pages_until_sentinel() {
        let (backend, mut rx) = MemoryBackend::new();
        backend.seed("local", 0, ["a", "b", "c"]);

        let params = |cursor: &str| {
            json!({"connection_id": "local", "database_index": 0, "cursor": cursor, "count": 2, "pattern": "*"})
        };

        accept(&backend, invoke_frame(1, METHOD_KEY_LOAD, params("0")));
        let Inbound::Reply(reply) = next_inbound(&mut rx) else {
            panic!("expected reply");
        };
        let page: ScanPage = serde_json::from_value(reply.result.expect("result")).expect("page");
        assert_eq!(page.keys, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(page.cursor, "2");

        accept(&backend, invoke_frame(2, METHOD_KEY_LOAD, params("2")));
        let Inbound::Reply(reply) = next_inbound(&mut rx) else {
            panic!("expected reply");
        };
        let page: ScanPage = serde_json::from_value(reply.result.expect("result")).expect("page");
        assert_eq!(page.keys, vec!["c".to_string()]);
        assert!(page.next_cursor().is_none());
    }

    #[test]
    fn test_rename_pushes_event_then_reply() {
        let (backend, mut rx) = MemoryBackend::new();
        backend.seed("local", 0, ["old"]);

        accept(
            &backend,
            invoke_frame(
                5,
                METHOD_KEY_RENAME,
                json!({"connection_id": "local", "database_index": 0, "current_name": "old", "new_name": "new"}),
            ),
        );

        // Event is pushed first, then the reply
        let Inbound::Event(event) = next_inbound(&mut rx) else {
            panic!("expected event");
        };
        assert_eq!(event.name, TOPIC_KEYSPACE_MUTATED);
        let mutated: KeyspaceMutated = serde_json::from_value(event.data).expect("payload");
        assert_eq!(mutated.key, "new");
        assert_eq!(mutated.op, MutationOp::Rename);

        let Inbound::Reply(reply) = next_inbound(&mut rx) else {
            panic!("expected reply");
        };
        assert_eq!(reply.id, 5);
        assert!(reply.error.is_none());
        assert_eq!(backend.key_names("local", 0), vec!["new".to_string()]);
        assert_eq!(
            backend.describe("local", 0, "new"),
            Some((KeyKind::String, KeyTtl::Persistent))
        );
    }

    #[test]
    fn test_failures_become_error_replies() {
        let (backend, mut rx) = MemoryBackend::new();
        backend.seed("local", 0, ["taken"]);

        accept(
            &backend,
            invoke_frame(
                1,
                METHOD_KEY_DELETE,
                json!({"connection_id": "local", "database_index": 0, "key": "missing"}),
            ),
        );
        let Inbound::Reply(reply) = next_inbound(&mut rx) else {
            panic!("expected reply");
        };
        assert_eq!(reply.error.as_deref(), Some("ERR no such key"));

        accept(
            &backend,
            invoke_frame(
                2,
                METHOD_KEY_CREATE,
                json!({"connection_id": "local", "database_index": 0, "key": "taken", "value": {"kind": "string", "value": "x"}}),
            ),
        );
        let Inbound::Reply(reply) = next_inbound(&mut rx) else {
            panic!("expected reply");
        };
        assert_eq!(reply.error.as_deref(), Some("ERR key already exists"));

        accept(&backend, invoke_frame(3, "server:shutdown", Value::Null));
        let Inbound::Reply(reply) = next_inbound(&mut rx) else {
            panic!("expected reply");
        };
        assert!(reply.error.expect("error").contains("unknown method"));
    }

    #[test]
    fn test_malformed_frame_is_a_protocol_error() {
        let (backend, _rx) = MemoryBackend::new();
        let result = futures::executor::block_on(backend.send("{".to_string()));
        assert!(matches!(result, Err(Error::Protocol { .. })));
    }

    fn accept(backend: &MemoryBackend, frame: String) {
        futures::executor::block_on(backend.send(frame)).expect("send accepted");
    }
}
