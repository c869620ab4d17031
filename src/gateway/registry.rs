//! Registry of available plugins, indexed by menu position and name.
//!
//! Populated once during server wiring, then read-only. Duplicate menu
//! numbers or names are registration errors, not runtime surprises.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use thiserror::Error;

use crate::plugins::Plugin;

#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("Menu number {0} is already registered")]
    DuplicateMenuNumber(u32),

    #[error("Plugin name '{0}' is already registered")]
    DuplicateName(String),

    #[error("Menu number must be positive")]
    ZeroMenuNumber,
}

/// Fixed set of registered plugins. BTreeMap keeps menu iteration in
/// stable ascending order for rendering the listing.
#[derive(Default)]
pub struct PluginRegistry {
    by_menu: BTreeMap<u32, Arc<dyn Plugin>>,
    name_index: HashMap<String, u32>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Arc<dyn Plugin>) -> Result<(), RegistryError> {
        let meta = plugin.metadata();
        if meta.menu_number == 0 {
            return Err(RegistryError::ZeroMenuNumber);
        }
        if self.by_menu.contains_key(&meta.menu_number) {
            return Err(RegistryError::DuplicateMenuNumber(meta.menu_number));
        }
        if self.name_index.contains_key(&meta.name) {
            return Err(RegistryError::DuplicateName(meta.name.clone()));
        }
        self.name_index.insert(meta.name.clone(), meta.menu_number);
        self.by_menu.insert(meta.menu_number, plugin);
        Ok(())
    }

    pub fn get_by_menu_number(&self, menu_number: u32) -> Option<Arc<dyn Plugin>> {
        self.by_menu.get(&menu_number).cloned()
    }

    pub fn get_by_name(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.name_index
            .get(name)
            .and_then(|n| self.by_menu.get(n))
            .cloned()
    }

    /// All plugins in ascending menu order.
    pub fn get_all_plugins(&self) -> Vec<Arc<dyn Plugin>> {
        self.by_menu.values().cloned().collect()
    }

    pub fn plugin_count(&self) -> usize {
        self.by_menu.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::{PluginMetadata, PluginResponse, PluginState};
    use crate::transport::NodeContext;
    use async_trait::async_trait;

    struct StubPlugin {
        metadata: PluginMetadata,
    }

    impl StubPlugin {
        fn new(name: &str, menu_number: u32) -> Arc<dyn Plugin> {
            Arc::new(Self {
                metadata: PluginMetadata {
                    name: name.to_string(),
                    description: "stub".to_string(),
                    menu_number,
                    commands: vec![],
                },
            })
        }
    }

    #[async_trait]
    impl Plugin for StubPlugin {
        fn metadata(&self) -> &PluginMetadata {
            &self.metadata
        }
        fn welcome_message(&self) -> String {
            format!("welcome to {}", self.metadata.name)
        }
        fn help_text(&self) -> String {
            "stub help".to_string()
        }
        async fn handle(
            &self,
            _message: &str,
            _context: &NodeContext,
            plugin_state: PluginState,
        ) -> PluginResponse {
            PluginResponse::with_state("ok", plugin_state)
        }
    }

    #[test]
    fn lookup_by_menu_and_name() {
        let mut registry = PluginRegistry::new();
        registry.register(StubPlugin::new("Alpha", 1)).unwrap();
        registry.register(StubPlugin::new("Beta", 2)).unwrap();
        assert_eq!(registry.plugin_count(), 2);
        assert_eq!(
            registry.get_by_menu_number(2).unwrap().metadata().name,
            "Beta"
        );
        assert_eq!(
            registry.get_by_name("Alpha").unwrap().metadata().menu_number,
            1
        );
        assert!(registry.get_by_menu_number(9).is_none());
        assert!(registry.get_by_name("Gamma").is_none());
    }

    #[test]
    fn duplicate_menu_number_rejected() {
        let mut registry = PluginRegistry::new();
        registry.register(StubPlugin::new("Alpha", 1)).unwrap();
        let err = registry.register(StubPlugin::new("Beta", 1)).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateMenuNumber(1));
    }

    #[test]
    fn duplicate_name_rejected() {
        let mut registry = PluginRegistry::new();
        registry.register(StubPlugin::new("Alpha", 1)).unwrap();
        let err = registry.register(StubPlugin::new("Alpha", 2)).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateName("Alpha".to_string()));
    }

    #[test]
    fn zero_menu_number_rejected() {
        let mut registry = PluginRegistry::new();
        let err = registry.register(StubPlugin::new("Alpha", 0)).unwrap_err();
        assert_eq!(err, RegistryError::ZeroMenuNumber);
    }

    #[test]
    fn listing_is_in_menu_order() {
        let mut registry = PluginRegistry::new();
        registry.register(StubPlugin::new("Third", 3)).unwrap();
        registry.register(StubPlugin::new("First", 1)).unwrap();
        registry.register(StubPlugin::new("Second", 2)).unwrap();
        let names: Vec<String> = registry
            .get_all_plugins()
            .iter()
            .map(|p| p.metadata().name.clone())
            .collect();
        assert_eq!(names, vec!["First", "Second", "Third"]);
    }
}
