//! quicksave common types, identities, and errors.
//!
//! This crate provides foundational types shared across the quicksave crates:
//! - Stable node identity and type tags
//! - Snapshot identifiers
//! - Common error types
//! - Schema versioning for JSON reports

pub mod error;
pub mod id;
pub mod schema;

pub use error::{Error, Result};
pub use id::{SnapshotId, StableId, TypeTag};
pub use schema::SCHEMA_VERSION;
