//! Message routing - the menu/plugin state machine.
//!
//! A session is either at the menu or inside one plugin. The router turns an
//! inbound message plus that state into a reply, mutating the session:
//!
//! - At menu: an empty message or the universal help command re-renders
//!   the listing; a valid menu number enters that plugin; anything else
//!   is an invalid selection.
//! - In plugin: the universal exit command returns to the menu (wiping
//!   plugin state), the universal help command shows the plugin's help, and
//!   everything else is delegated to the plugin.
//!
//! Universal commands are matched case-insensitively and only they change
//! which plugin is active; plugins cannot switch a session elsewhere.

use log::{debug, error};

use crate::logutil::escape_log;
use crate::transport::NodeContext;

use super::registry::PluginRegistry;
use super::session::Session;

/// Stateless router; all conversational state lives in the [`Session`].
#[derive(Debug, Clone)]
pub struct MessageRouter {
    exit_command: String,
    help_command: String,
}

impl MessageRouter {
    pub fn new(exit_command: impl Into<String>, help_command: impl Into<String>) -> Self {
        Self {
            exit_command: exit_command.into(),
            help_command: help_command.into(),
        }
    }

    /// Route one message for one session, producing the reply text.
    pub async fn route(
        &self,
        message: &str,
        session: &mut Session,
        registry: &PluginRegistry,
        context: &NodeContext,
    ) -> String {
        let trimmed = message.trim();

        match session.active_plugin.clone() {
            None => self.route_at_menu(trimmed, session, registry),
            Some(plugin_name) => {
                self.route_in_plugin(trimmed, &plugin_name, session, registry, context)
                    .await
            }
        }
    }

    fn route_at_menu(
        &self,
        message: &str,
        session: &mut Session,
        registry: &PluginRegistry,
    ) -> String {
        // At the menu, help means the menu itself
        if message.is_empty() || message.eq_ignore_ascii_case(&self.help_command) {
            return self.render_menu(registry);
        }

        // Strict integer parse; anything else is an invalid selection
        match message.parse::<u32>() {
            Ok(selection) => match registry.get_by_menu_number(selection) {
                Some(plugin) => {
                    let name = plugin.metadata().name.clone();
                    debug!(
                        "Node {} entering plugin {}",
                        escape_log(&session.node_id),
                        name
                    );
                    session.enter_plugin(name);
                    plugin.welcome_message()
                }
                None => self.invalid_selection(registry),
            },
            Err(_) => self.invalid_selection(registry),
        }
    }

    async fn route_in_plugin(
        &self,
        message: &str,
        plugin_name: &str,
        session: &mut Session,
        registry: &PluginRegistry,
        context: &NodeContext,
    ) -> String {
        if message.eq_ignore_ascii_case(&self.exit_command) {
            session.exit_to_menu();
            return format!("Returned to menu.\n\n{}", self.render_menu(registry));
        }

        let Some(plugin) = registry.get_by_name(plugin_name) else {
            // Unreachable with an immutable registry; degrade instead of crashing
            error!(
                "Active plugin '{}' for node {} not found in registry; resetting session",
                plugin_name,
                escape_log(&session.node_id)
            );
            session.exit_to_menu();
            return format!("Service error. Returned to menu.\n\n{}", self.render_menu(registry));
        };

        if message.eq_ignore_ascii_case(&self.help_command) {
            return format!(
                "{}\n{} - Return to menu",
                plugin.help_text(),
                self.exit_command
            );
        }

        let state = std::mem::take(&mut session.plugin_state);
        let response = plugin.handle(message, context, state).await;
        session.plugin_state = response.plugin_state;
        response.message
    }

    /// Render the numbered service listing.
    pub fn render_menu(&self, registry: &PluginRegistry) -> String {
        let mut lines = vec!["Available Services:".to_string()];
        for plugin in registry.get_all_plugins() {
            let meta = plugin.metadata();
            lines.push(format!(
                "{}. {} - {}",
                meta.menu_number, meta.name, meta.description
            ));
        }
        lines.push("\nSend number to select".to_string());
        lines.join("\n")
    }

    fn invalid_selection(&self, registry: &PluginRegistry) -> String {
        format!(
            "Invalid selection.\n\n{}",
            self.render_menu(registry)
        )
    }
}
