//! Helper Utilities
//!
//! Common utilities used across the crate.

mod fs;
mod logging;

pub use fs::*;
pub use logging::*;
