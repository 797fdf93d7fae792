//! Error handling
//!
//! Defines error types and handling for the object store.

pub mod handlers;
pub mod types;

pub use types::*;
