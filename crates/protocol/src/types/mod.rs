//! Typed request and response messages for every broker operation.
//!
//! Wire names are `snake_case`, matching the Rust field names. Optional
//! fields are omitted when unset so that encoding and decoding are exact
//! inverses. Fields that only exist from a given protocol version, or only
//! behind the alpha flag, are listed in [`crate::gating`] rather than here.

mod binding;
mod catalog;
mod instance;
mod last_operation;

pub use binding::*;
pub use catalog::*;
pub use instance::*;
pub use last_operation::*;

/// Free-form JSON object (parameters, context, credentials, metadata).
pub type JsonObject = serde_json::Map<String, serde_json::Value>;
