//! The addon registry: target name to its single addon instance.

use std::collections::BTreeMap;

use tracing::debug;
use trellis_config::{ClassDescriptor, RemoteManifest};

use crate::addon::Addon;
use crate::error::{BridgeError, Result};

/// One registered target.
pub struct AddonRegistration {
    target: String,
    manifest: RemoteManifest,
    addon: Box<dyn Addon>,
}

impl AddonRegistration {
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn manifest(&self) -> &RemoteManifest {
        &self.manifest
    }

    /// Whether `origin` may call `method` on this target.
    pub fn exposes(&self, origin: &str, method: &str) -> bool {
        self.manifest.exposes(origin, method)
    }

    pub(crate) fn addon_mut(&mut self) -> &mut dyn Addon {
        self.addon.as_mut()
    }
}

impl std::fmt::Debug for AddonRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddonRegistration")
            .field("target", &self.target)
            .field("manifest", &self.manifest)
            .finish()
    }
}

/// Target name to addon. A name is registered at most once: a second
/// registration fails and the first stays in place.
#[derive(Debug, Default)]
pub struct AddonRegistry {
    entries: BTreeMap<String, AddonRegistration>,
}

impl AddonRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a target exposing the methods of `manifest`.
    pub fn register<A>(&mut self, target: &str, manifest: RemoteManifest, addon: A) -> Result<()>
    where
        A: Addon + 'static,
    {
        if self.entries.contains_key(target) {
            return Err(BridgeError::AlreadyRegistered(target.to_string()));
        }
        debug!(target, methods = ?manifest.all_methods(), "registered addon");
        self.entries.insert(
            target.to_string(),
            AddonRegistration {
                target: target.to_string(),
                manifest,
                addon: Box::new(addon),
            },
        );
        Ok(())
    }

    /// Register a target using a compiled class's remote manifest.
    pub fn register_class<A>(
        &mut self,
        target: &str,
        class: &ClassDescriptor,
        addon: A,
    ) -> Result<()>
    where
        A: Addon + 'static,
    {
        self.register(target, class.remote().clone(), addon)
    }

    pub fn resolve(&self, target: &str) -> Option<&AddonRegistration> {
        self.entries.get(target)
    }

    pub(crate) fn resolve_mut(&mut self, target: &str) -> Option<&mut AddonRegistration> {
        self.entries.get_mut(target)
    }

    pub fn contains(&self, target: &str) -> bool {
        self.entries.contains_key(target)
    }

    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
