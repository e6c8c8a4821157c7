//! Behavior configuration and the option-map parser.

use crate::condition::ConditionSpec;
use crate::ordering::OrderingSpec;
use bucketon_types::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::num::NonZeroUsize;

/// What a bucket keeps when several records share its key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMode {
    #[default]
    /// Every record, in input order.
    Collect,
    /// Only the last record seen.
    Overwrite,
}

/// How strictly a dynamic (JSON) collection is checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionMode {
    #[default]
    /// Arrays, or objects whose values are the records.
    Iterable,
    /// Arrays only.
    StrictArray,
}

/// A named bucketing behavior.
#[derive(Debug, Clone, Default)]
pub struct BehaviorConfig {
    pub name: String,
    pub condition: Option<ConditionSpec>,
    pub ordering: Option<OrderingSpec>,
    /// Maximum number of emitted bucket keys.
    pub max_buckets: Option<NonZeroUsize>,
    /// Alias cap on emitted bucket keys; the smaller of the two applies.
    pub bucket_limit: Option<NonZeroUsize>,
    /// Fold buckets cut off by the cap into `"__other__"`.
    pub include_other: bool,
    pub aggregation: AggregationMode,
    pub collection: CollectionMode,
}

impl BehaviorConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_condition(mut self, condition: ConditionSpec) -> Self {
        self.condition = Some(condition);
        self
    }

    #[must_use]
    pub fn with_ordering(mut self, ordering: OrderingSpec) -> Self {
        self.ordering = Some(ordering);
        self
    }

    /// Sets `max_buckets`. Zero clears the cap.
    #[must_use]
    pub fn with_max_buckets(mut self, max: usize) -> Self {
        self.max_buckets = NonZeroUsize::new(max);
        self
    }

    /// Sets `bucket_limit`. Zero clears the cap.
    #[must_use]
    pub fn with_bucket_limit(mut self, limit: usize) -> Self {
        self.bucket_limit = NonZeroUsize::new(limit);
        self
    }

    #[must_use]
    pub fn with_include_other(mut self, include_other: bool) -> Self {
        self.include_other = include_other;
        self
    }

    #[must_use]
    pub fn with_aggregation(mut self, aggregation: AggregationMode) -> Self {
        self.aggregation = aggregation;
        self
    }

    #[must_use]
    pub fn with_collection(mut self, collection: CollectionMode) -> Self {
        self.collection = collection;
        self
    }

    /// The effective cap on emitted bucket keys, if any.
    pub fn bucket_cap(&self) -> Option<usize> {
        match (self.max_buckets, self.bucket_limit) {
            (Some(a), Some(b)) => Some(a.min(b).get()),
            (a, b) => a.or(b).map(NonZeroUsize::get),
        }
    }

    /// Builds a config from an option map such as
    /// `{"conditions": "status", "bucket_order": ["sort"]}`.
    ///
    /// Unknown option keys are rejected with `InvalidOption`; malformed
    /// condition or ordering shapes with `InvalidConditions`.
    pub fn from_options(name: impl Into<String>, options: &Value) -> Result<Self> {
        let options = match options {
            Value::Null => BehaviorOptions::default(),
            Value::Object(_) => BehaviorOptions::deserialize(options)
                .map_err(|e| Error::InvalidOption(e.to_string()))?,
            other => {
                return Err(Error::InvalidOption(format!(
                    "options must be a map, got {other}"
                )));
            }
        };

        Ok(Self {
            name: name.into(),
            condition: ConditionSpec::from_value(&options.conditions)?,
            ordering: OrderingSpec::from_value(&options.bucket_order)?,
            max_buckets: options.max_buckets,
            bucket_limit: options.bucket_limit,
            include_other: options.include_other.unwrap_or(false),
            aggregation: options.aggregation.unwrap_or_default(),
            collection: options.collection.unwrap_or_default(),
        })
    }
}

/// The recognized option keys.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct BehaviorOptions {
    #[serde(default)]
    conditions: Value,
    #[serde(default, alias = "ordering")]
    bucket_order: Value,
    #[serde(default)]
    max_buckets: Option<NonZeroUsize>,
    #[serde(default)]
    bucket_limit: Option<NonZeroUsize>,
    #[serde(default)]
    include_other: Option<bool>,
    #[serde(default)]
    aggregation: Option<AggregationMode>,
    #[serde(default)]
    collection: Option<CollectionMode>,
}
