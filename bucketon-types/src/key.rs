//! Bucket keys and the per-object key derivation result.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Identifier of a bucket.
///
/// A key is never empty: empty input is normalized to the `"nil"` sentinel,
/// the same bucket that catches objects whose key could not be derived.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct BucketKey(String);

impl BucketKey {
    /// Sentinel for objects whose key is absent, empty or failed to derive.
    pub const NIL: &'static str = "nil";
    /// Overflow bucket produced when a bucket cap folds the remainder.
    pub const OTHER: &'static str = "__other__";

    /// Creates a key, mapping an empty string to `"nil"`.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        if key.is_empty() {
            Self::nil()
        } else {
            Self(key)
        }
    }

    #[must_use]
    pub fn nil() -> Self {
        Self(Self::NIL.to_string())
    }

    #[must_use]
    pub fn other() -> Self {
        Self(Self::OTHER.to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.0 == Self::NIL
    }

    #[must_use]
    pub fn is_other(&self) -> bool {
        self.0 == Self::OTHER
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for BucketKey {
    fn from(key: String) -> Self {
        Self::new(key)
    }
}

impl From<&str> for BucketKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<BucketKey> for String {
    fn from(key: BucketKey) -> Self {
        key.0
    }
}

impl AsRef<str> for BucketKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for BucketKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for BucketKey {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for BucketKey {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// The outcome of deriving a grouping key from one object.
///
/// `key` may be empty here; the engine normalizes it when it becomes a
/// [`BucketKey`]. `label` is the optional human-readable name of the bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DerivedKey {
    pub key: String,
    pub label: Option<String>,
}

impl DerivedKey {
    /// A key without a label.
    #[must_use]
    pub fn bare(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: None,
        }
    }

    /// A `(key, label)` pair.
    #[must_use]
    pub fn labeled(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: Some(label.into()),
        }
    }

    /// The sentinel pair used when derivation fails.
    #[must_use]
    pub fn nil() -> Self {
        Self::labeled(BucketKey::NIL, BucketKey::NIL)
    }

    /// Whether the key is empty.
    #[must_use]
    pub fn is_falsy(&self) -> bool {
        self.key.is_empty()
    }
}

impl From<String> for DerivedKey {
    fn from(key: String) -> Self {
        Self::bare(key)
    }
}

impl From<&str> for DerivedKey {
    fn from(key: &str) -> Self {
        Self::bare(key)
    }
}

/// Why a key could not be derived for one object.
///
/// These never abort a bucketing call: the object lands in the `"nil"` bucket.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("missing field: {0}")]
    MissingField(String),

    #[error("field '{field}' is not {expected}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
    },

    #[error("field '{field}' holds an unparseable timestamp: {value}")]
    InvalidTimestamp { field: String, value: String },

    /// The key is reserved for the overflow bucket.
    #[error("derived key '{0}' is reserved")]
    ReservedKey(String),

    /// Raised by caller-supplied key functions.
    #[error("{0}")]
    Custom(String),
}
