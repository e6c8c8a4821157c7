//! Per-host-type store of named bucketing behaviors.
//!
//! Behaviors are compiled when they are registered, so a malformed
//! configuration fails at registration and never at invocation.

use crate::config::BehaviorConfig;
use crate::engine::{BucketingResult, CompiledBehavior};
use bucketon_model::{Entity, Record};
use bucketon_types::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{info, warn};

type HostBehaviors = HashMap<String, Arc<CompiledBehavior>>;

/// Registry keyed by host type, then behavior name.
///
/// Writes take the lock exclusively; invocations hold a shared guard only
/// long enough to clone the compiled behavior.
#[derive(Debug, Default)]
pub struct BehaviorRegistry {
    hosts: RwLock<HashMap<String, HostBehaviors>>,
}

impl BehaviorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, HostBehaviors>> {
        self.hosts.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, HostBehaviors>> {
        self.hosts.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers (or replaces) a behavior on a host type.
    pub fn register(&self, host_type: &str, name: &str, mut config: BehaviorConfig) -> Result<()> {
        if name.trim().is_empty() {
            return Err(Error::InvalidBucketName(name.to_string()));
        }
        config.name = name.to_string();
        self.insert(host_type, CompiledBehavior::compile(config)?);
        Ok(())
    }

    /// Stores an already compiled behavior under its own name.
    pub(crate) fn insert(&self, host_type: &str, compiled: CompiledBehavior) {
        let name = compiled.name().to_string();
        let replaced = self
            .write()
            .entry(host_type.to_string())
            .or_default()
            .insert(name.clone(), Arc::new(compiled))
            .is_some();

        if replaced {
            warn!(host_type = %host_type, behavior = %name, "Bucketing behavior replaced");
        } else {
            info!(host_type = %host_type, behavior = %name, "Bucketing behavior registered");
        }
    }

    /// Registers a behavior from an option map, e.g.
    /// `{"conditions": "status", "bucket_order": ["sort"]}`.
    pub fn register_options(&self, host_type: &str, name: &str, options: &Value) -> Result<()> {
        if name.trim().is_empty() {
            return Err(Error::InvalidBucketName(name.to_string()));
        }
        let config = BehaviorConfig::from_options(name, options)?;
        self.register(host_type, name, config)
    }

    /// Looks up a compiled behavior.
    pub fn behavior(&self, host_type: &str, name: &str) -> Option<Arc<CompiledBehavior>> {
        self.read()
            .get(host_type)
            .and_then(|behaviors| behaviors.get(name))
            .cloned()
    }

    fn lookup(&self, host_type: &str, name: &str) -> Result<Arc<CompiledBehavior>> {
        self.behavior(host_type, name)
            .ok_or_else(|| Error::UnknownBehavior {
                host_type: host_type.to_string(),
                name: name.to_string(),
            })
    }

    /// Runs a registered behavior over a collection of records.
    pub fn invoke<'a, R, I>(
        &self,
        host_type: &str,
        name: &str,
        collection: I,
    ) -> Result<BucketingResult<&'a R>>
    where
        R: Record + 'a,
        I: IntoIterator<Item = &'a R>,
    {
        self.lookup(host_type, name)?.run(collection)
    }

    /// Runs a registered behavior over a JSON collection of entities.
    pub fn invoke_json(
        &self,
        host_type: &str,
        name: &str,
        collection: &Value,
    ) -> Result<BucketingResult<Entity>> {
        self.lookup(host_type, name)?.run_json(collection)
    }

    /// Sorted names of the behaviors registered on a host type.
    pub fn behavior_names(&self, host_type: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .read()
            .get(host_type)
            .map(|behaviors| behaviors.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Copies the parent's behaviors onto a derived host type.
    ///
    /// Behaviors the child already defines are kept. The copy is a snapshot:
    /// later registrations on either side do not propagate. Returns the
    /// number of behaviors copied.
    pub fn inherit(&self, parent: &str, child: &str) -> usize {
        let mut hosts = self.write();
        let inherited: Vec<(String, Arc<CompiledBehavior>)> = hosts
            .get(parent)
            .map(|behaviors| {
                behaviors
                    .iter()
                    .map(|(name, b)| (name.clone(), Arc::clone(b)))
                    .collect()
            })
            .unwrap_or_default();

        let target = hosts.entry(child.to_string()).or_default();
        let mut copied = 0;
        for (name, behavior) in inherited {
            if !target.contains_key(&name) {
                target.insert(name, behavior);
                copied += 1;
            }
        }
        info!(parent = %parent, child = %child, copied, "Bucketing behaviors inherited");
        copied
    }
}
