//! Runtime configuration.

use serde::Deserialize;

/// Settings shared by every instance an [`InstanceFactory`](crate::InstanceFactory) builds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReactiveConfig {
    /// How deeply `set` calls may nest through hooks before failing.
    pub max_hook_depth: usize,
    /// Prefix of generated instance ids (`<prefix>-<n>`).
    pub id_prefix: String,
}

impl Default for ReactiveConfig {
    fn default() -> Self {
        Self {
            max_hook_depth: 64,
            id_prefix: "trellis".to_string(),
        }
    }
}
