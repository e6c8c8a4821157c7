//! Behavior files: declare bucketing behaviors in TOML.
//!
//! ```toml
//! [[behavior]]
//! host = "task"
//! name = "horizon"
//! conditions = { field = "due_at", format = "%y%m%d" }
//! bucket_order = ["sort"]
//! max_buckets = 5
//! include_other = true
//! ```
//!
//! Every key besides `host` and `name` is a behavior option. Unlike the
//! runtime registry calls, a file is applied all-or-nothing: every entry is
//! validated before any is registered.

use crate::config::BehaviorConfig;
use crate::engine::CompiledBehavior;
use crate::registry::BehaviorRegistry;
use bucketon_types::{Error, Result};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use tracing::info;

#[derive(Debug, Deserialize)]
struct BehaviorFile {
    #[serde(default, rename = "behavior")]
    behaviors: Vec<toml::Table>,
}

impl BehaviorRegistry {
    /// Loads behaviors from a TOML file. Returns the number registered.
    pub fn load_file(&self, path: &Path) -> Result<usize> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        let count = self.load_str(&contents)?;
        info!(path = %path.display(), count, "Loaded bucketing behaviors");
        Ok(count)
    }

    /// Loads behaviors from TOML text. Returns the number registered.
    pub fn load_str(&self, contents: &str) -> Result<usize> {
        let file: BehaviorFile =
            toml::from_str(contents).map_err(|e| Error::Config(e.to_string()))?;

        let mut parsed = Vec::with_capacity(file.behaviors.len());
        for (index, table) in file.behaviors.into_iter().enumerate() {
            let Value::Object(mut options) = serde_json::to_value(table)? else {
                return Err(Error::Config(format!("behavior {index} is not a table")));
            };
            let host = take_string(&mut options, "host", index)?;
            let name = take_string(&mut options, "name", index)?;
            if name.trim().is_empty() {
                return Err(Error::InvalidBucketName(name));
            }
            let config = BehaviorConfig::from_options(name.as_str(), &Value::Object(options))?;
            parsed.push((host, CompiledBehavior::compile(config)?));
        }

        let count = parsed.len();
        for (host, compiled) in parsed {
            self.insert(&host, compiled);
        }
        Ok(count)
    }
}

fn take_string(options: &mut serde_json::Map<String, Value>, key: &str, index: usize) -> Result<String> {
    match options.remove(key) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(Error::Config(format!(
            "behavior {index}: '{key}' must be a string, got {other}"
        ))),
        None => Err(Error::Config(format!("behavior {index}: missing '{key}'"))),
    }
}
