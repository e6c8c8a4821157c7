//! Ordering resolver: turns an [`OrderingSpec`] into an [`OrderFn`].
//!
//! Every ordering starts from the natural key listing, which is the order in
//! which keys first appeared in the input collection. The listing also
//! carries each bucket's size, so an ordering can rank buckets by content.

use bucketon_types::{BucketKey, Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::{Ordering, Reverse};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// The natural key listing handed to an ordering.
#[derive(Debug, Clone, Default)]
pub struct KeyListing<'a> {
    keys: &'a [BucketKey],
    sizes: HashMap<&'a str, usize>,
}

impl<'a> KeyListing<'a> {
    /// A listing with no size information; every bucket reports size 0.
    pub fn new(keys: &'a [BucketKey]) -> Self {
        Self {
            keys,
            sizes: HashMap::new(),
        }
    }

    /// A listing whose `sizes` are given in key order.
    pub fn with_sizes(keys: &'a [BucketKey], sizes: impl IntoIterator<Item = usize>) -> Self {
        Self {
            keys,
            sizes: keys.iter().map(BucketKey::as_str).zip(sizes).collect(),
        }
    }

    pub fn keys(&self) -> &'a [BucketKey] {
        self.keys
    }

    /// Number of records in the bucket; 0 for keys not in the data.
    pub fn size(&self, key: &str) -> usize {
        self.sizes.get(key).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> std::slice::Iter<'a, BucketKey> {
        self.keys.iter()
    }
}

/// A compiled ordering over the natural key listing.
pub type OrderFn = Arc<dyn Fn(&KeyListing<'_>) -> Vec<BucketKey> + Send + Sync>;

fn order_fn<F>(f: F) -> OrderFn
where
    F: Fn(&KeyListing<'_>) -> Vec<BucketKey> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A named transform applied to the key listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStep {
    /// Lexicographic ascending.
    Sort,
    Reverse,
    /// Drop repeated keys, keeping the first occurrence.
    Uniq,
    /// Numeric keys ascending, then the remaining keys lexicographically.
    SortNumeric,
    /// Move `"nil"` to the front.
    NilFirst,
    /// Move `"nil"` to the back.
    NilLast,
    /// Largest bucket first; ties keep their current order.
    SizeDesc,
    /// Smallest bucket first; ties keep their current order.
    SizeAsc,
}

impl OrderStep {
    pub fn apply(self, keys: &mut Vec<BucketKey>, listing: &KeyListing<'_>) {
        match self {
            Self::Sort => keys.sort(),
            Self::Reverse => keys.reverse(),
            Self::Uniq => {
                let mut seen = HashSet::new();
                keys.retain(|k| seen.insert(k.clone()));
            }
            Self::SortNumeric => keys.sort_by(numeric_cmp),
            Self::NilFirst => keys.sort_by_key(|k| !k.is_nil()),
            Self::NilLast => keys.sort_by_key(BucketKey::is_nil),
            Self::SizeDesc => keys.sort_by_key(|k| Reverse(listing.size(k.as_str()))),
            Self::SizeAsc => keys.sort_by_key(|k| listing.size(k.as_str())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sort => "sort",
            Self::Reverse => "reverse",
            Self::Uniq => "uniq",
            Self::SortNumeric => "sort_numeric",
            Self::NilFirst => "nil_first",
            Self::NilLast => "nil_last",
            Self::SizeDesc => "size_desc",
            Self::SizeAsc => "size_asc",
        }
    }
}

impl fmt::Display for OrderStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStep {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sort" => Ok(Self::Sort),
            "reverse" => Ok(Self::Reverse),
            "uniq" => Ok(Self::Uniq),
            "sort_numeric" => Ok(Self::SortNumeric),
            "nil_first" => Ok(Self::NilFirst),
            "nil_last" => Ok(Self::NilLast),
            "size_desc" => Ok(Self::SizeDesc),
            "size_asc" => Ok(Self::SizeAsc),
            other => Err(Error::InvalidConditions(format!(
                "unsupported ordering step '{other}'"
            ))),
        }
    }
}

fn numeric_cmp(a: &BucketKey, b: &BucketKey) -> Ordering {
    let na = a.as_str().parse::<f64>().ok().filter(|n| n.is_finite());
    let nb = b.as_str().parse::<f64>().ok().filter(|n| n.is_finite());
    match (na, nb) {
        (Some(x), Some(y)) => x.total_cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// Declarative description of how bucket keys are ordered.
#[derive(Clone, Default)]
pub enum OrderingSpec {
    /// The natural key listing.
    #[default]
    Default,
    /// A caller-supplied function over the natural key listing and bucket
    /// sizes. It may return keys that do not exist in the data; those are
    /// dropped by the engine.
    Literal(OrderFn),
    /// Named steps applied left to right.
    Pipeline(Vec<String>),
}

impl fmt::Debug for OrderingSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("Default"),
            Self::Literal(_) => f.write_str("Literal(<fn>)"),
            Self::Pipeline(steps) => f.debug_tuple("Pipeline").field(steps).finish(),
        }
    }
}

impl OrderingSpec {
    pub fn literal<F>(f: F) -> Self
    where
        F: Fn(&KeyListing<'_>) -> Vec<BucketKey> + Send + Sync + 'static,
    {
        Self::Literal(order_fn(f))
    }

    /// A literal that always proposes the given listing.
    pub fn fixed<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<BucketKey>,
    {
        let keys: Vec<BucketKey> = keys.into_iter().map(Into::into).collect();
        Self::literal(move |_| keys.clone())
    }

    pub fn pipeline<I, S>(steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Pipeline(steps.into_iter().map(Into::into).collect())
    }

    /// Parses the declarative option form.
    ///
    /// - `null` → natural order
    /// - `"sort"` → single-step pipeline
    /// - `["sort", "reverse"]` → pipeline
    /// - `{"keys": ["high", "medium", "low"]}` → fixed listing
    pub fn from_value(value: &Value) -> Result<Option<Self>> {
        match value {
            Value::Null => Ok(None),
            Value::String(step) => Ok(Some(Self::pipeline([step.as_str()]))),
            Value::Array(items) => Ok(Some(Self::Pipeline(strings(items, value)?))),
            Value::Object(map) => match (map.get("keys"), map.len()) {
                (Some(Value::Array(items)), 1) => Ok(Some(Self::fixed(strings(items, value)?))),
                _ => Err(invalid(value)),
            },
            Value::Bool(_) | Value::Number(_) => Err(invalid(value)),
        }
    }
}

fn invalid(value: &Value) -> Error {
    Error::InvalidConditions(format!("unsupported bucket ordering: {value}"))
}

fn strings(items: &[Value], whole: &Value) -> Result<Vec<String>> {
    items
        .iter()
        .map(|item| item.as_str().map(str::to_string).ok_or_else(|| invalid(whole)))
        .collect()
}

/// Compiles an ordering into an [`OrderFn`].
///
/// Unknown pipeline steps are rejected here rather than at bucketing time.
pub fn compile(spec: Option<&OrderingSpec>) -> Result<OrderFn> {
    match spec {
        None | Some(OrderingSpec::Default) => Ok(order_fn(|listing| listing.keys().to_vec())),
        Some(OrderingSpec::Literal(f)) => Ok(Arc::clone(f)),
        Some(OrderingSpec::Pipeline(names)) => {
            let steps = names
                .iter()
                .map(|name| name.parse::<OrderStep>())
                .collect::<Result<Vec<_>>>()?;
            Ok(order_fn(move |listing| {
                let mut keys = listing.keys().to_vec();
                for step in &steps {
                    step.apply(&mut keys, listing);
                }
                keys
            }))
        }
    }
}
