//! Effect factories keyed by name.
//!
//! The [`EffectRegistry`] maps an effect kind such as `"video"` to a factory
//! that builds the effect inside a group. Registering a name again replaces
//! the earlier factory.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::effect::Effect;
use crate::error::EffectError;
use crate::group::EffectGroup;

/// Builds an effect in a group from caller options.
pub type EffectFactory =
    Arc<dyn Fn(&Arc<EffectGroup>, &Value) -> Result<Arc<Effect>, EffectError> + Send + Sync>;

/// Registry of effect factories.
///
/// # Example
///
/// ```
/// use caspar_effects::{Effect, EffectRegistry};
///
/// let mut registry = EffectRegistry::new();
/// registry.register("still", |group, options| {
///     Ok(Effect::create(group, "still", options.clone()))
/// });
/// assert!(registry.contains("still"));
/// assert!(registry.get("video").is_none());
/// ```
#[derive(Clone, Default)]
pub struct EffectRegistry {
    factories: HashMap<String, EffectFactory>,
}

impl EffectRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` under `name`, returning `true` when it replaced
    /// an earlier factory.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> bool
    where
        F: Fn(&Arc<EffectGroup>, &Value) -> Result<Arc<Effect>, EffectError>
            + Send
            + Sync
            + 'static,
    {
        self.factories
            .insert(name.into(), Arc::new(factory))
            .is_some()
    }

    /// Removes the factory for `name`, returning `true` if one existed.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.factories.remove(name).is_some()
    }

    /// Looks up a factory by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<EffectFactory> {
        self.factories.get(name).cloned()
    }

    /// Returns `true` when a factory is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Builds an effect of kind `name` in `group`.
    ///
    /// Returns `Ok(None)` when no factory is registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns whatever error the factory raises.
    pub fn create(
        &self,
        name: &str,
        group: &Arc<EffectGroup>,
        options: &Value,
    ) -> Result<Option<Arc<Effect>>, EffectError> {
        self.factories
            .get(name)
            .map(|factory| factory(group, options))
            .transpose()
    }

    /// Registered names in ascending order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of registered factories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Returns `true` when no factories are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for EffectRegistry {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("EffectRegistry")
            .field("factories", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests;
