//! Local disk object storage
//!
//! Key resolution, filesystem primitives and the object store built on them.

pub mod filesystem;
pub mod interface;
pub mod operations;
pub mod permissions;
pub mod resolver;
pub mod results;

// Re-export the types callers need to use the store
pub use interface::ObjectStorage;
pub use operations::LocalStorage;
pub use resolver::PathResolver;
pub use results::StoredObject;
