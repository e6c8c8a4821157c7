use bucketon_types::KeyError;
use serde_json::Value;

/// An object that can be placed into buckets.
///
/// Implementations must be side-effect free: the engine may read the same
/// field many times while deriving keys.
pub trait Record {
    /// The host type this record belongs to (e.g. `"task"`).
    fn record_type(&self) -> &str;

    /// A stable identifier, used for diagnostics only.
    fn record_id(&self) -> &str;

    /// Whether this object is a well-formed instance of a recognized record
    /// type. Bucketing aborts with `InvalidObject` when any element fails
    /// this check.
    fn is_recognized_record(&self) -> bool {
        true
    }

    /// Reads the named attribute.
    ///
    /// Returns `KeyError::MissingField` when the record has no such
    /// attribute. A present attribute holding `null` is returned as
    /// `Value::Null`.
    fn field(&self, name: &str) -> Result<Value, KeyError>;
}

impl<R: Record + ?Sized> Record for &R {
    fn record_type(&self) -> &str {
        (**self).record_type()
    }

    fn record_id(&self) -> &str {
        (**self).record_id()
    }

    fn is_recognized_record(&self) -> bool {
        (**self).is_recognized_record()
    }

    fn field(&self, name: &str) -> Result<Value, KeyError> {
        (**self).field(name)
    }
}
