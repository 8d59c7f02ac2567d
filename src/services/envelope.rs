//! Bridge Envelopes
//!
//! Wire frames exchanged with the backend process. Every frame is a JSON
//! object `{"type": ..., "payload": ...}`:
//!
//! ```text
//! UI → backend   {"type":"invoke","payload":{"id":7,"method":"key:load","params":{..}}}
//! UI → backend   {"type":"event","payload":{"name":"ui:ready","data":null}}
//! backend → UI   {"type":"reply","payload":{"id":7,"result":{..}}}
//! backend → UI   {"type":"reply","payload":{"id":8,"error":"ERR no such key"}}
//! backend → UI   {"type":"event","payload":{"name":"keyspace:mutated","data":{..}}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Correlation id of one invocation
pub type RequestId = u64;

/// Request half of an invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokePayload {
    pub id: RequestId,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// A push notification on a topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    pub name: String,
    #[serde(default)]
    pub data: Value,
}

/// Answer to an invocation; `error` wins over `result`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyPayload {
    pub id: RequestId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReplyPayload {
    pub fn ok(id: RequestId, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: RequestId, error: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Frames sent by the UI side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum Envelope {
    Invoke(InvokePayload),
    Event(EventPayload),
}

/// Frames sent by the backend side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum Inbound {
    Reply(ReplyPayload),
    Event(EventPayload),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_invoke_wire_shape() {
        let envelope = Envelope::Invoke(InvokePayload {
            id: 3,
            method: "key:load".into(),
            params: json!({"cursor": "0"}),
        });
        let value = serde_json::to_value(&envelope).expect("serialize");
        assert_eq!(
            value,
            json!({"type": "invoke", "payload": {"id": 3, "method": "key:load", "params": {"cursor": "0"}}})
        );
    }

    #[test]
    fn test_reply_error_omits_result() {
        let frame = serde_json::to_string(&Inbound::Reply(ReplyPayload::err(9, "boom")))
            .expect("serialize");
        assert_eq!(frame, r#"{"type":"reply","payload":{"id":9,"error":"boom"}}"#);
    }

    #[test]
    fn test_event_without_data() {
        let inbound: Inbound =
            serde_json::from_str(r#"{"type":"event","payload":{"name":"ping"}}"#).expect("parse");
        assert_eq!(
            inbound,
            Inbound::Event(EventPayload {
                name: "ping".into(),
                data: Value::Null,
            })
        );
    }
}
