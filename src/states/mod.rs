//! State Management Layer
//!
//! Key-space state and tree view state, independent of any UI framework.
//! Follows a unidirectional data flow pattern:
//!
//! ```text
//! UI Action → KeySpaceCache → backend call → KeyAction → DbKeyState → CacheEvent → UI Refresh
//! ```

mod keys;
mod keyspace;
mod tree_view;

pub use keys::*;
pub use keyspace::*;
pub use tree_view::*;
