//! Core type definitions for bucketon.
//!
//! This crate defines the fundamental types shared by the record model and
//! the bucketing engine:
//! - Bucket keys, including the reserved `"nil"` and `"__other__"` keys
//! - Derived keys (a key plus an optional human-readable label)
//! - The error taxonomy for configuration and collection failures
//!
//! Key-derivation failures have their own [`KeyError`] type because they are
//! recovered per object and never surface from a bucketing call.

mod key;

pub use key::{BucketKey, DerivedKey, KeyError};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a registration or a bucketing call.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The behavior name was empty or blank.
    #[error("bucket name '{0}' is not valid")]
    InvalidBucketName(String),

    /// A condition or ordering specification had an unrecognized shape.
    #[error("invalid conditions: {0}")]
    InvalidConditions(String),

    /// An option key was not recognized or had the wrong type.
    #[error("invalid option: {0}")]
    InvalidOption(String),

    /// The collection did not satisfy the array/iterable contract.
    #[error("invalid object array: {0}")]
    InvalidObjectArray(String),

    /// An element of the collection is not a recognized record.
    #[error("invalid object: {0}")]
    InvalidObject(String),

    #[error("no bucketing behavior '{name}' registered on '{host_type}'")]
    UnknownBehavior { host_type: String, name: String },

    /// A behavior file could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
