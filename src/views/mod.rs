//! View Models
//!
//! UI-facing state that combines the cache, the tree projection and the tree
//! view state. Rendering itself lives outside this crate.

mod key_browser;

pub use key_browser::*;
