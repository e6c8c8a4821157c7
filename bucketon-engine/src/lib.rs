//! Declarative group-by with ordering over in-memory records.
//!
//! A bucketing behavior is made of two declarative parts:
//!
//! - a [`ConditionSpec`] that derives a grouping key per record (a field, a
//!   formatted timestamp, a composite of either, or a caller-supplied
//!   function), and
//! - an [`OrderingSpec`] that turns the set of keys into a sequence.
//!
//! [`bucket`] runs a behavior ad hoc; [`BehaviorRegistry`] stores named
//! behaviors per host type for later [`invoke`](BehaviorRegistry::invoke).
//!
//! Records whose key cannot be derived (missing field, bad timestamp, a
//! failing literal) are placed in the `"nil"` bucket and never fail the
//! call. Configuration mistakes and unrecognized records fail loudly.

mod condition;
mod config;
mod engine;
mod file;
mod ordering;
mod registry;

pub use condition::{compile as compile_condition, Combinator, ConditionSpec, KeyFn, KeyResult};
pub use config::{AggregationMode, BehaviorConfig, CollectionMode};
pub use engine::{bucket, bucket_json, BucketingResult, CompiledBehavior};
pub use ordering::{compile as compile_ordering, KeyListing, OrderFn, OrderStep, OrderingSpec};
pub use registry::BehaviorRegistry;

pub use bucketon_model::{Entity, Record};
pub use bucketon_types::{BucketKey, DerivedKey, Error, KeyError, Result};
