//! Keyspace Browser Core
//!
//! Client-side core of a desktop key-value store browser: the IPC bridge to
//! the backend process, the paginated per (connection, database) key cache,
//! the key tree projection and the tree view state.

pub mod constants;
pub mod domain;
pub mod error;
pub mod helpers;
pub mod services;
pub mod states;
pub mod tree;
pub mod views;

pub use error::{Error, Result};
