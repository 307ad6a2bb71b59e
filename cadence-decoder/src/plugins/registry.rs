//! Ordered plugin registry
//!
//! Registration order is precedence order: within each matching phase the
//! selector tries plugins in the order they were registered.

use super::symphonia::SymphoniaPlugin;
use super::DecoderPlugin;
use std::sync::Arc;
use tracing::{debug, warn};

/// Read-only list of codec plugins
#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn DecoderPlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in codec plugin
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for plugin in SymphoniaPlugin::all() {
            registry.register(Arc::new(plugin));
        }
        registry
    }

    /// Append a plugin (lowest precedence so far)
    ///
    /// A plugin whose name is already registered is ignored.
    pub fn register(&mut self, plugin: Arc<dyn DecoderPlugin>) {
        if self.by_name(plugin.name()).is_some() {
            warn!("Decoder plugin '{}' registered twice, ignoring", plugin.name());
            return;
        }
        debug!(
            "Registered decoder plugin '{}' (stream={}, file={})",
            plugin.name(),
            plugin.supports_stream(),
            plugin.supports_file()
        );
        self.plugins.push(plugin);
    }

    /// Builder-style variant of [`PluginRegistry::register`]
    pub fn with(mut self, plugin: Arc<dyn DecoderPlugin>) -> Self {
        self.register(plugin);
        self
    }

    /// Remove plugins listed by name (configuration `disabled_plugins`)
    pub fn without(mut self, names: &[String]) -> Self {
        for name in names {
            if self.by_name(name).is_none() {
                warn!("Cannot disable unknown decoder plugin '{}'", name);
            }
        }
        self.plugins
            .retain(|plugin| !names.iter().any(|name| name == plugin.name()));
        self
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn DecoderPlugin>> {
        self.plugins.iter()
    }

    pub fn by_name(&self, name: &str) -> Option<&Arc<dyn DecoderPlugin>> {
        self.plugins.iter().find(|plugin| plugin.name() == name)
    }

    /// Plugins advertising `mime_type`, in registry order
    pub fn from_mime_type<'a>(
        &'a self,
        mime_type: &'a str,
    ) -> impl Iterator<Item = &'a Arc<dyn DecoderPlugin>> + 'a {
        self.plugins
            .iter()
            .filter(move |plugin| plugin.handles_mime_type(mime_type))
    }

    /// Plugins advertising `suffix`, in registry order
    pub fn from_suffix<'a>(
        &'a self,
        suffix: &'a str,
    ) -> impl Iterator<Item = &'a Arc<dyn DecoderPlugin>> + 'a {
        self.plugins
            .iter()
            .filter(move |plugin| plugin.handles_suffix(suffix))
    }
}
