//! Compiled class cache.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;
use trellis_core::Value;

use crate::compile::{compose, ClassDescriptor};
use crate::declarations::Declarations;
use crate::error::{CompileError, Result};

/// Compiles each class once and hands out the shared descriptor.
///
/// Registering a name that is already compiled returns the cached
/// descriptor without recompiling.
#[derive(Debug, Default)]
pub struct ClassRegistry {
    classes: BTreeMap<String, Arc<ClassDescriptor>>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile and cache a class. `parents` are registered class names,
    /// root to leaf.
    pub fn register(
        &mut self,
        name: &str,
        parents: &[&str],
        declarations: Declarations,
    ) -> Result<Arc<ClassDescriptor>> {
        if let Some(existing) = self.classes.get(name) {
            debug!(class = name, "class already compiled");
            return Ok(Arc::clone(existing));
        }

        let parents = parents
            .iter()
            .map(|parent| self.lookup(name, parent))
            .collect::<Result<Vec<_>>>()?;

        let descriptor = Arc::new(compose(name, &parents, &declarations)?);
        self.classes.insert(name.to_string(), Arc::clone(&descriptor));
        Ok(descriptor)
    }

    /// Compile and cache a class from the data form of its declarations.
    pub fn register_value(
        &mut self,
        name: &str,
        parents: &[&str],
        declarations: &Value,
    ) -> Result<Arc<ClassDescriptor>> {
        let declarations = Declarations::from_value(name, declarations, |mixin| self.get(mixin))?;
        self.register(name, parents, declarations)
    }

    pub fn get(&self, name: &str) -> Option<Arc<ClassDescriptor>> {
        self.classes.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    fn lookup(&self, class: &str, name: &str) -> Result<Arc<ClassDescriptor>> {
        self.get(name).ok_or_else(|| CompileError::UnknownClass {
            class: class.to_string(),
            name: name.to_string(),
        })
    }
}
