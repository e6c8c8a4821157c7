//! The bucketing engine.
//!
//! One pass over the collection: derive a key per record, route failures to
//! the `"nil"` bucket, aggregate, then order and validate the key listing.

use crate::condition::{self, KeyFn};
use crate::config::{AggregationMode, BehaviorConfig, CollectionMode};
use crate::ordering::{self, KeyListing, OrderFn};
use bucketon_model::{Entity, Record};
use bucketon_types::{BucketKey, DerivedKey, Error, KeyError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::debug;

/// Grouped and ordered records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketingResult<T> {
    /// Deduplicated; every key is present in `buckets`.
    pub ordered_keys: Vec<BucketKey>,
    pub buckets: HashMap<BucketKey, Vec<T>>,
    /// Human-readable labels, for keys whose derivation produced one.
    pub labels: HashMap<BucketKey, String>,
}

impl<T> Default for BucketingResult<T> {
    fn default() -> Self {
        Self {
            ordered_keys: Vec::new(),
            buckets: HashMap::new(),
            labels: HashMap::new(),
        }
    }
}

impl<T> BucketingResult<T> {
    pub fn get(&self, key: &str) -> Option<&[T]> {
        self.buckets.get(key).map(Vec::as_slice)
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    /// Buckets in `ordered_keys` order.
    pub fn iter(&self) -> impl Iterator<Item = (&BucketKey, &[T])> {
        self.ordered_keys
            .iter()
            .filter_map(|key| self.buckets.get(key).map(|items| (key, items.as_slice())))
    }

    /// Number of emitted buckets.
    pub fn len(&self) -> usize {
        self.ordered_keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered_keys.is_empty()
    }
}

/// A behavior whose condition and ordering have been compiled.
pub struct CompiledBehavior {
    config: BehaviorConfig,
    key_fn: KeyFn,
    order_fn: OrderFn,
}

impl fmt::Debug for CompiledBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledBehavior")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CompiledBehavior {
    /// Compiles the config. Malformed specs fail here, not per record.
    pub fn compile(config: BehaviorConfig) -> Result<Self> {
        let key_fn = condition::compile(config.condition.as_ref())?;
        let order_fn = ordering::compile(config.ordering.as_ref())?;
        Ok(Self {
            config,
            key_fn,
            order_fn,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &BehaviorConfig {
        &self.config
    }

    /// Derives one record's key, substituting the `"nil"` pair on failure.
    ///
    /// A derived `"__other__"` counts as a failure: that key belongs to the
    /// overflow bucket.
    pub fn derive(&self, record: &dyn Record) -> DerivedKey {
        let derived = (self.key_fn)(record).and_then(|derived| {
            if derived.key == BucketKey::OTHER {
                Err(KeyError::ReservedKey(derived.key))
            } else {
                Ok(derived)
            }
        });
        match derived {
            Ok(derived) => derived,
            Err(e) => {
                debug!(
                    behavior = %self.config.name,
                    record_id = %record.record_id(),
                    error = %e,
                    "Key derivation failed, routing record to nil bucket"
                );
                DerivedKey::nil()
            }
        }
    }

    /// Buckets a collection of records.
    ///
    /// Fails with `InvalidObject` before any bucketing when an element is not
    /// a recognized record.
    pub fn run<T, I>(&self, collection: I) -> Result<BucketingResult<T>>
    where
        T: Record,
        I: IntoIterator<Item = T>,
    {
        let items: Vec<T> = collection.into_iter().collect();
        if let Some((index, item)) = items
            .iter()
            .enumerate()
            .find(|(_, item)| !item.is_recognized_record())
        {
            return Err(Error::InvalidObject(format!(
                "element {index} ('{}') is not a recognized record",
                item.record_id()
            )));
        }

        let total = items.len();
        let mut natural: Vec<BucketKey> = Vec::new();
        let mut buckets: HashMap<BucketKey, Vec<T>> = HashMap::new();
        let mut labels: HashMap<BucketKey, String> = HashMap::new();

        for item in items {
            let derived = self.derive(&item);
            let key = BucketKey::new(derived.key);
            // last label wins when records sharing a key disagree
            if let Some(label) = derived.label.filter(|l| !l.is_empty()) {
                labels.insert(key.clone(), label);
            }

            match buckets.entry(key) {
                Entry::Vacant(slot) => {
                    natural.push(slot.key().clone());
                    slot.insert(vec![item]);
                }
                Entry::Occupied(mut slot) => match self.config.aggregation {
                    AggregationMode::Collect => slot.get_mut().push(item),
                    AggregationMode::Overwrite => *slot.get_mut() = vec![item],
                },
            }
        }

        let sizes = natural.iter().map(|key| buckets.get(key).map_or(0, Vec::len));
        let proposed = (self.order_fn)(&KeyListing::with_sizes(&natural, sizes));
        let proposed_len = proposed.len();
        let mut seen = HashSet::new();
        let mut ordered_keys: Vec<BucketKey> = proposed
            .into_iter()
            .filter(|key| buckets.contains_key(key) && seen.insert(key.clone()))
            .collect();
        if ordered_keys.len() < proposed_len {
            debug!(
                behavior = %self.config.name,
                dropped = proposed_len - ordered_keys.len(),
                "Dropped ordering keys absent from the data"
            );
        }

        if let Some(cap) = self.config.bucket_cap() {
            if ordered_keys.len() > cap {
                let overflow = ordered_keys.split_off(cap);
                if self.config.include_other {
                    fold_into_other(&overflow, &mut ordered_keys, &mut buckets, &mut labels);
                }
            }
        }

        debug!(
            behavior = %self.config.name,
            records = total,
            buckets = ordered_keys.len(),
            "Bucketing complete"
        );

        Ok(BucketingResult {
            ordered_keys,
            buckets,
            labels,
        })
    }

    /// Buckets a JSON collection of serialized [`Entity`] values.
    pub fn run_json(&self, collection: &Value) -> Result<BucketingResult<Entity>> {
        let entities = entities_from_json(collection, self.config.collection)?;
        self.run(entities)
    }
}

fn fold_into_other<T>(
    overflow: &[BucketKey],
    ordered_keys: &mut Vec<BucketKey>,
    buckets: &mut HashMap<BucketKey, Vec<T>>,
    labels: &mut HashMap<BucketKey, String>,
) {
    let mut folded = Vec::new();
    for key in overflow {
        if let Some(items) = buckets.remove(key) {
            folded.extend(items);
        }
        labels.remove(key);
    }

    let other = BucketKey::other();
    ordered_keys.push(other.clone());
    buckets.insert(other, folded);
}

/// Buckets a collection with an ad-hoc config.
pub fn bucket<'a, R, I>(collection: I, config: &BehaviorConfig) -> Result<BucketingResult<&'a R>>
where
    R: Record + 'a,
    I: IntoIterator<Item = &'a R>,
{
    CompiledBehavior::compile(config.clone())?.run(collection)
}

/// Buckets a JSON collection of serialized entities with an ad-hoc config.
///
/// The collection must be an array, or (unless the config asks for
/// `strict_array`) an object whose values are the entities.
pub fn bucket_json(collection: &Value, config: &BehaviorConfig) -> Result<BucketingResult<Entity>> {
    CompiledBehavior::compile(config.clone())?.run_json(collection)
}

fn entities_from_json(collection: &Value, mode: CollectionMode) -> Result<Vec<Entity>> {
    let elements: Vec<&Value> = match (collection, mode) {
        (Value::Array(items), _) => items.iter().collect(),
        (Value::Object(map), CollectionMode::Iterable) => map.values().collect(),
        (other, CollectionMode::Iterable) => {
            return Err(Error::InvalidObjectArray(format!(
                "expected an array or map of records, got {}",
                kind(other)
            )));
        }
        (other, CollectionMode::StrictArray) => {
            return Err(Error::InvalidObjectArray(format!(
                "expected an array of records, got {}",
                kind(other)
            )));
        }
    };

    elements
        .into_iter()
        .enumerate()
        .map(|(index, element)| {
            Entity::deserialize(element)
                .map_err(|e| Error::InvalidObject(format!("element {index}: {e}")))
        })
        .collect()
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "a map",
    }
}
