//! Service Layer
//!
//! The bridge to the backend process, the typed keyspace operations built on
//! it, an in-process simulated backend and the tokio runtime helper.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      KeySpaceCache                           │
//! └──────────────────────────────────────────────────────────────┘
//!                            │ KeyspaceBackend
//!                            ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │  BridgeBackend ──▶ IpcBridge ──▶ Transport ──▶ backend       │
//! │                       ▲                          │           │
//! │                       └──── deliver(frame) ◀─────┘           │
//! └──────────────────────────────────────────────────────────────┘
//! ```

mod backend;
mod bridge;
mod envelope;
mod memory;
mod runtime;

pub use backend::*;
pub use bridge::*;
pub use envelope::*;
pub use memory::*;
pub use runtime::*;
