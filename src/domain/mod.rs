//! Domain - Pure Data Structures and Protocol Types
//!
//! These types don't depend on the runtime and represent the business domain.

pub mod config;
pub mod key;
pub mod keyspace;

pub use config::*;
pub use key::*;
pub use keyspace::*;
