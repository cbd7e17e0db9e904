//! The remote-method manifest.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use trellis_core::Value;

/// Method names an addon-backed class exposes across the context boundary,
/// grouped by the identity of the calling context.
///
/// This is the complete set of remotely reachable methods: a proxy refuses
/// anything not listed for its context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteManifest {
    groups: BTreeMap<String, Vec<String>>,
}

impl RemoteManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add methods for a calling context, keeping first-seen order and
    /// skipping duplicates.
    pub fn add<I, S>(&mut self, context: impl Into<String>, methods: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let group = self.groups.entry(context.into()).or_default();
        for method in methods {
            let method = method.into();
            if !group.contains(&method) {
                group.push(method);
            }
        }
    }

    /// Union another manifest into this one.
    pub fn merge(&mut self, other: &RemoteManifest) {
        for (context, methods) in &other.groups {
            self.add(context.clone(), methods.iter().cloned());
        }
    }

    /// Methods callable from a context, in declaration order.
    pub fn methods_for(&self, context: &str) -> &[String] {
        self.groups.get(context).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn exposes(&self, context: &str, method: &str) -> bool {
        self.methods_for(context).iter().any(|m| m == method)
    }

    /// Every exposed method, across all contexts.
    pub fn all_methods(&self) -> Vec<String> {
        let mut all: Vec<String> = Vec::new();
        for method in self.groups.values().flatten() {
            if !all.contains(method) {
                all.push(method.clone());
            }
        }
        all
    }

    pub fn contexts(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.groups.values().all(Vec::is_empty)
    }

    /// Parse the data form `{context: [method, ...]}`.
    pub fn from_value(value: &Value) -> Result<Self, String> {
        let groups = value
            .as_map()
            .ok_or_else(|| format!("expected a map of method lists, found {}", value.type_name()))?;

        let mut manifest = RemoteManifest::new();
        for (context, methods) in groups {
            let methods = methods
                .as_array()
                .ok_or_else(|| format!("methods for `{}` must be an array", context))?;
            let names = methods
                .iter()
                .map(|m| {
                    m.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| format!("method names for `{}` must be strings", context))
                })
                .collect::<Result<Vec<_>, _>>()?;
            manifest.add(context.clone(), names);
        }
        Ok(manifest)
    }
}
