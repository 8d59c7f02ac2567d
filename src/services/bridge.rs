//! IPC Bridge
//!
//! Request/response and publish/subscribe between the UI side and the backend
//! process, over one narrow string transport.
//!
//! ## Pattern
//!
//! ```text
//! invoke("key:load", params)
//!       │  id = 7, pending[7] = oneshot
//!       ▼
//! Transport::send(frame) ───────────────▶ backend
//!                                            │
//! deliver(frame) ◀─────── reply{id: 7} ──────┘
//!       │  pending.remove(7).send(reply)
//!       ▼
//! Result returned to caller
//! ```
//!
//! Any number of invocations may be outstanding; replies are matched by id and
//! may arrive in any order. Inbound events fan out to every listener of their
//! topic.

use crate::error::{Error, Result};
use crate::services::envelope::{
    Envelope, EventPayload, Inbound, InvokePayload, ReplyPayload, RequestId,
};
use ahash::AHashMap;
use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// The single outbound entry point to the backend process
pub trait Transport: Send + Sync + 'static {
    /// Hand one serialized frame to the backend
    fn send(&self, frame: String) -> BoxFuture<'static, Result<()>>;
}

/// Transport that forwards frames into a channel, e.g. towards a writer task
/// attached to the backend's stdin
#[derive(Clone, Debug)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Transport for ChannelTransport {
    fn send(&self, frame: String) -> BoxFuture<'static, Result<()>> {
        let result = self.tx.send(frame).map_err(|_| Error::Transport {
            message: "backend channel closed".to_string(),
        });
        Box::pin(async move { result })
    }
}

/// Bridge tuning
#[derive(Clone, Debug, Default)]
pub struct BridgeOptions {
    /// Fail an invocation that got no reply within this time
    pub invoke_timeout: Option<Duration>,
}

type Listener = Arc<dyn Fn(&Value) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    by_topic: AHashMap<String, Vec<(u64, Listener)>>,
}

/// Handle returned by [`IpcBridge::on`]; the owner must call
/// [`Subscription::unsubscribe`] when it no longer wants events
#[must_use = "listeners stay registered until unsubscribed"]
pub struct Subscription {
    topic: String,
    id: u64,
    listeners: Weak<RwLock<Listeners>>,
}

impl Subscription {
    /// Topic this subscription listens on
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Remove this listener; other listeners of the topic are untouched
    pub fn unsubscribe(self) {
        let Some(listeners) = self.listeners.upgrade() else {
            return;
        };
        let mut listeners = listeners.write();
        if let Some(entries) = listeners.by_topic.get_mut(&self.topic) {
            entries.retain(|(id, _)| *id != self.id);
            if entries.is_empty() {
                listeners.by_topic.remove(&self.topic);
            }
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("id", &self.id)
            .finish()
    }
}

/// Bridge to the backend process.
///
/// Constructed once at startup and shared through `Arc`; [`IpcBridge::dispose`]
/// ends its life.
pub struct IpcBridge {
    transport: Arc<dyn Transport>,
    options: BridgeOptions,
    next_request_id: AtomicU64,
    pending: Mutex<AHashMap<RequestId, oneshot::Sender<ReplyPayload>>>,
    listeners: Arc<RwLock<Listeners>>,
    closed: AtomicBool,
}

/// Frees the pending slot however the invocation ends
struct PendingSlot<'a> {
    bridge: &'a IpcBridge,
    id: RequestId,
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        self.bridge.pending.lock().remove(&self.id);
    }
}

impl IpcBridge {
    /// Create a bridge over the given transport
    pub fn new(transport: impl Transport, options: BridgeOptions) -> Arc<Self> {
        Arc::new(Self {
            transport: Arc::new(transport),
            options,
            next_request_id: AtomicU64::new(0),
            pending: Mutex::new(AHashMap::new()),
            listeners: Arc::new(RwLock::new(Listeners::default())),
            closed: AtomicBool::new(false),
        })
    }

    // ==================== Request / Response ====================

    /// Invoke a backend method and wait for its reply.
    ///
    /// A reply carrying an error fails with [`Error::Backend`]; otherwise the
    /// result is deserialized into `T`.
    pub async fn invoke<P, T>(&self, method: &str, params: P) -> Result<T>
    where
        P: Serialize,
        T: DeserializeOwned,
    {
        if self.is_closed() {
            return Err(Error::Closed);
        }

        let id = self.next_request_id.fetch_add(1, Ordering::SeqCst) + 1;
        let frame = serde_json::to_string(&Envelope::Invoke(InvokePayload {
            id,
            method: method.to_string(),
            params: serde_json::to_value(params)?,
        }))?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);
        let _slot = PendingSlot { bridge: self, id };

        tracing::debug!(id, method, "Invoking backend method");

        self.transport.send(frame).await.map_err(|e| match e {
            Error::Transport { .. } | Error::Closed => e,
            other => Error::Transport {
                message: other.to_string(),
            },
        })?;

        let reply = match self.options.invoke_timeout {
            Some(limit) => tokio::time::timeout(limit, rx).await.map_err(|_| {
                tracing::warn!(id, method, "Invocation timed out");
                Error::Timeout {
                    message: format!("{method} got no reply within {}s", limit.as_secs_f32()),
                }
            })?,
            None => rx.await,
        }
        .map_err(|_| Error::Closed)?;

        if let Some(message) = reply.error {
            tracing::debug!(id, method, error = %message, "Backend returned error");
            return Err(Error::Backend { message });
        }

        Ok(serde_json::from_value(reply.result.unwrap_or(Value::Null))?)
    }

    // ==================== Publish / Subscribe ====================

    /// Send a one-way event to the backend
    pub async fn emit<D: Serialize>(&self, topic: &str, data: D) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }

        let frame = serde_json::to_string(&Envelope::Event(EventPayload {
            name: topic.to_string(),
            data: serde_json::to_value(data)?,
        }))?;

        self.transport.send(frame).await
    }

    /// Listen for inbound events on a topic
    pub fn on<F>(&self, topic: &str, callback: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let mut listeners = self.listeners.write();
        listeners.next_id += 1;
        let id = listeners.next_id;
        listeners
            .by_topic
            .entry(topic.to_string())
            .or_default()
            .push((id, Arc::new(callback)));

        Subscription {
            topic: topic.to_string(),
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Listen for events whose data deserializes into `T`; other payloads are dropped
    pub fn on_typed<T, F>(&self, topic: &str, callback: F) -> Subscription
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        let owned_topic = topic.to_string();
        self.on(topic, move |data| match T::deserialize(data) {
            Ok(value) => callback(value),
            Err(e) => {
                tracing::warn!(topic = %owned_topic, error = %e, "Dropping malformed event payload");
            }
        })
    }

    // ==================== Inbound ====================

    /// Handle one frame pushed by the backend.
    ///
    /// Malformed frames are logged and dropped, never surfaced to callers.
    pub fn deliver(&self, frame: &str) {
        let inbound: Inbound = match serde_json::from_str(frame) {
            Ok(inbound) => inbound,
            Err(e) => {
                tracing::warn!(error = %e, len = frame.len(), "Dropping malformed inbound frame");
                return;
            }
        };

        match inbound {
            Inbound::Reply(reply) => {
                let sender = self.pending.lock().remove(&reply.id);
                match sender {
                    Some(tx) => {
                        let _ = tx.send(reply);
                    }
                    None => tracing::debug!(id = reply.id, "Reply for unknown or expired request"),
                }
            }
            Inbound::Event(event) => self.dispatch(&event.name, &event.data),
        }
    }

    fn dispatch(&self, topic: &str, data: &Value) {
        // Snapshot so listeners may (un)subscribe while being called
        let listeners: Vec<Listener> = match self.listeners.read().by_topic.get(topic) {
            Some(entries) => entries.iter().map(|(_, l)| l.clone()).collect(),
            None => return,
        };

        for listener in listeners {
            if std::panic::catch_unwind(AssertUnwindSafe(|| (*listener)(data))).is_err() {
                tracing::error!(topic, "Event listener panicked");
            }
        }
    }

    /// Feed inbound frames from a channel until it closes or the bridge is disposed
    pub async fn run_inbound(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<String>) {
        while let Some(frame) = rx.recv().await {
            if self.is_closed() {
                break;
            }
            self.deliver(&frame);
        }
        tracing::debug!("Inbound pump stopped");
    }

    // ==================== Lifecycle ====================

    /// Fail all pending calls, drop all listeners and refuse new work
    pub fn dispose(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let pending = std::mem::take(&mut *self.pending.lock());
        self.listeners.write().by_topic.clear();
        tracing::info!(pending = pending.len(), "Bridge disposed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of invocations waiting for a reply
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Number of listeners on a topic
    pub fn listener_count(&self, topic: &str) -> usize {
        self.listeners
            .read()
            .by_topic
            .get(topic)
            .map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for IpcBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpcBridge")
            .field("options", &self.options)
            .field("pending", &self.pending_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    struct FailingTransport;

    impl Transport for FailingTransport {
        fn send(&self, _frame: String) -> BoxFuture<'static, Result<()>> {
            Box::pin(async {
                Err(Error::Transport {
                    message: "pipe broken".into(),
                })
            })
        }
    }

    async fn next_invoke(rx: &mut mpsc::UnboundedReceiver<String>) -> InvokePayload {
        let frame = rx.recv().await.expect("frame sent");
        match serde_json::from_str::<Envelope>(&frame).expect("valid envelope") {
            Envelope::Invoke(invoke) => invoke,
            other => panic!("expected invoke, got {other:?}"),
        }
    }

    fn reply_frame(reply: ReplyPayload) -> String {
        serde_json::to_string(&Inbound::Reply(reply)).expect("serialize reply")
    }

    #[tokio::test]
    async fn test_invoke_resolves_result() {
        let (transport, mut rx) = ChannelTransport::new();
        let bridge = IpcBridge::new(transport, BridgeOptions::default());

        let call = {
            let bridge = bridge.clone();
            tokio::spawn(async move {
                bridge
                    .invoke::<_, Vec<String>>("key:load", json!({"cursor": "0"}))
                    .await
            })
        };

        let invoke = next_invoke(&mut rx).await;
        assert_eq!(invoke.method, "key:load");
        assert_eq!(invoke.params["cursor"], "0");
        bridge.deliver(&reply_frame(ReplyPayload::ok(invoke.id, json!(["a", "b"]))));

        let keys = call.await.expect("join").expect("invoke ok");
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(bridge.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_invoke_error_reply() {
        let (transport, mut rx) = ChannelTransport::new();
        let bridge = IpcBridge::new(transport, BridgeOptions::default());

        let call = {
            let bridge = bridge.clone();
            tokio::spawn(async move { bridge.invoke::<_, Value>("client:key-delete", ()).await })
        };

        let invoke = next_invoke(&mut rx).await;
        bridge.deliver(&reply_frame(ReplyPayload::err(invoke.id, "ERR no such key")));

        let err = call.await.expect("join").expect_err("invoke fails");
        assert!(matches!(err, Error::Backend { ref message } if message == "ERR no such key"));
    }

    #[tokio::test]
    async fn test_concurrent_invokes_matched_by_id() {
        let (transport, mut rx) = ChannelTransport::new();
        let bridge = IpcBridge::new(transport, BridgeOptions::default());

        let first = {
            let bridge = bridge.clone();
            tokio::spawn(async move { bridge.invoke::<_, String>("echo", "first").await })
        };
        let second = {
            let bridge = bridge.clone();
            tokio::spawn(async move { bridge.invoke::<_, String>("echo", "second").await })
        };

        let a = next_invoke(&mut rx).await;
        let b = next_invoke(&mut rx).await;
        assert_ne!(a.id, b.id);
        assert_eq!(bridge.pending_count(), 2);

        // Answer in reverse order
        bridge.deliver(&reply_frame(ReplyPayload::ok(b.id, b.params.clone())));
        bridge.deliver(&reply_frame(ReplyPayload::ok(a.id, a.params.clone())));

        assert_eq!(first.await.expect("join").expect("first"), "first");
        assert_eq!(second.await.expect("join").expect("second"), "second");
    }

    #[tokio::test]
    async fn test_transport_failure_surfaces_and_frees_slot() {
        let bridge = IpcBridge::new(FailingTransport, BridgeOptions::default());
        let err = bridge
            .invoke::<_, Value>("key:load", ())
            .await
            .expect_err("transport fails");
        assert!(matches!(err, Error::Transport { .. }));
        assert_eq!(bridge.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_invoke_timeout() {
        let (transport, _rx) = ChannelTransport::new();
        let bridge = IpcBridge::new(
            transport,
            BridgeOptions {
                invoke_timeout: Some(Duration::from_millis(20)),
            },
        );
        let err = bridge
            .invoke::<_, Value>("key:load", ())
            .await
            .expect_err("no reply");
        assert!(matches!(err, Error::Timeout { .. }));
        assert_eq!(bridge.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_dispose_fails_pending_calls() {
        let (transport, mut rx) = ChannelTransport::new();
        let bridge = IpcBridge::new(transport, BridgeOptions::default());

        let call = {
            let bridge = bridge.clone();
            tokio::spawn(async move { bridge.invoke::<_, Value>("key:load", ()).await })
        };
        let _ = next_invoke(&mut rx).await;

        bridge.dispose();

        let err = call.await.expect("join").expect_err("closed");
        assert!(matches!(err, Error::Closed));
        assert!(matches!(bridge.emit("x", ()).await, Err(Error::Closed)));
    }

    #[tokio::test]
    async fn test_emit_sends_event_envelope() {
        let (transport, mut rx) = ChannelTransport::new();
        let bridge = IpcBridge::new(transport, BridgeOptions::default());

        bridge.emit("ui:ready", json!({"window": 1})).await.expect("emit");

        let frame = rx.recv().await.expect("frame");
        let envelope: Envelope = serde_json::from_str(&frame).expect("parse");
        assert_eq!(
            envelope,
            Envelope::Event(EventPayload {
                name: "ui:ready".into(),
                data: json!({"window": 1}),
            })
        );
    }

    #[test]
    fn test_listeners_are_additive_and_unsubscribe_individually() {
        let (transport, _rx) = ChannelTransport::new();
        let bridge = IpcBridge::new(transport, BridgeOptions::default());
        let hits = Arc::new(AtomicUsize::new(0));

        let first = {
            let hits = hits.clone();
            bridge.on("keyspace:mutated", move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };
        let second = {
            let hits = hits.clone();
            bridge.on("keyspace:mutated", move |_| {
                hits.fetch_add(10, Ordering::SeqCst);
            })
        };

        let frame = r#"{"type":"event","payload":{"name":"keyspace:mutated","data":{}}}"#;
        bridge.deliver(frame);
        assert_eq!(hits.load(Ordering::SeqCst), 11);

        first.unsubscribe();
        bridge.deliver(frame);
        assert_eq!(hits.load(Ordering::SeqCst), 21);
        assert_eq!(bridge.listener_count("keyspace:mutated"), 1);

        second.unsubscribe();
        assert_eq!(bridge.listener_count("keyspace:mutated"), 0);
    }

    #[test]
    fn test_panicking_listener_does_not_stop_dispatch() {
        let (transport, _rx) = ChannelTransport::new();
        let bridge = IpcBridge::new(transport, BridgeOptions::default());
        let hits = Arc::new(AtomicUsize::new(0));

        let _bad = bridge.on("topic", |_| panic!("listener bug"));
        let _good = {
            let hits = hits.clone();
            bridge.on("topic", move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };

        bridge.deliver(r#"{"type":"event","payload":{"name":"topic","data":1}}"#);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_malformed_frames_are_dropped() {
        let (transport, _rx) = ChannelTransport::new();
        let bridge = IpcBridge::new(transport, BridgeOptions::default());
        let hits = Arc::new(AtomicUsize::new(0));
        let _sub = {
            let hits = hits.clone();
            bridge.on("topic", move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };

        bridge.deliver("not json");
        bridge.deliver(r#"{"type":"mystery","payload":{}}"#);
        bridge.deliver(r#"{"type":"reply","payload":{"id":999,"result":1}}"#);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_typed_listener_skips_bad_payload() {
        #[derive(serde::Deserialize)]
        struct Mutated {
            key: String,
        }

        let (transport, _rx) = ChannelTransport::new();
        let bridge = IpcBridge::new(transport, BridgeOptions::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let _sub = {
            let seen = seen.clone();
            bridge.on_typed("keyspace:mutated", move |event: Mutated| {
                seen.lock().push(event.key);
            })
        };

        bridge.deliver(r#"{"type":"event","payload":{"name":"keyspace:mutated","data":{"key":"a"}}}"#);
        bridge.deliver(r#"{"type":"event","payload":{"name":"keyspace:mutated","data":42}}"#);
        assert_eq!(*seen.lock(), vec!["a".to_string()]);
    }
}
