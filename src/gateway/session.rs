//! Per-node conversational state and its lifecycle.
//!
//! Each radio node gets exactly one [`Session`]: either "at the menu" or
//! inside one plugin, with a state bag owned by that plugin. The
//! [`SessionManager`] owns every session and exposes only whole operations
//! (get-or-create, remove, sweep); the raw map never leaks to callers.
//!
//! Example with multiple nodes:
//!
//! ```text
//! Node !abc -> sends "2"     -> enters Chat plugin
//! Node !xyz -> sends "3"     -> enters Weather plugin
//! Node !abc -> sends "hello" -> handled by Chat (still in Chat)
//! Node !xyz -> sends "!exit" -> returns to menu (!abc unaffected)
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use log::{debug, info};

use crate::logutil::escape_log;
use crate::plugins::PluginState;

/// Conversational state for one node.
#[derive(Debug, Clone)]
pub struct Session {
    pub node_id: String,
    /// `None` means the node is at the menu
    pub active_plugin: Option<String>,
    /// Owned by whichever plugin is active; opaque to the router
    pub plugin_state: PluginState,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    pub fn new(node_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Session {
            node_id: node_id.into(),
            active_plugin: None,
            plugin_state: PluginState::new(),
            created_at: now,
            last_activity: now,
        }
    }

    pub fn is_at_menu(&self) -> bool {
        self.active_plugin.is_none()
    }

    /// Enter a plugin with a fresh state bag.
    pub fn enter_plugin(&mut self, name: impl Into<String>) {
        self.active_plugin = Some(name.into());
        self.plugin_state = PluginState::new();
    }

    /// Return to the menu. Plugin state is wiped so nothing leaks into the
    /// next plugin the node selects.
    pub fn exit_to_menu(&mut self) {
        self.active_plugin = None;
        self.plugin_state.clear();
    }

    pub fn update_activity(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Whether the session has been idle strictly longer than `timeout`.
    pub fn is_inactive(&self, timeout: Duration) -> bool {
        Utc::now() - self.last_activity > timeout
    }
}

/// Owns all sessions: creation, lookup, LRU eviction under a cap, and
/// timeout-based expiry. All operations are total over the (possibly empty)
/// session map.
#[derive(Debug)]
pub struct SessionManager {
    sessions: HashMap<String, Session>,
    timeout: Duration,
    max_sessions: usize,
}

impl SessionManager {
    /// `max_sessions` of 0 means unlimited.
    pub fn new(timeout_minutes: u32, max_sessions: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            timeout: Duration::minutes(timeout_minutes as i64),
            max_sessions,
        }
    }

    /// Get or create the session for a node. Creation while at or above the
    /// cap first evicts the least recently active session. Every call,
    /// hit or create, refreshes `last_activity`.
    pub fn get_session(&mut self, node_id: &str) -> &mut Session {
        if !self.sessions.contains_key(node_id) {
            if self.max_sessions > 0 {
                while self.sessions.len() >= self.max_sessions {
                    if self.evict_oldest().is_none() {
                        break;
                    }
                }
            }
            debug!("Creating session for node {}", escape_log(node_id));
        }
        let session = self
            .sessions
            .entry(node_id.to_string())
            .or_insert_with(|| Session::new(node_id));
        session.update_activity();
        session
    }

    /// Evict the least recently active session. Ties break toward the
    /// lexicographically smallest node id so the choice is deterministic.
    fn evict_oldest(&mut self) -> Option<String> {
        let oldest = self
            .sessions
            .values()
            .min_by(|a, b| {
                a.last_activity
                    .cmp(&b.last_activity)
                    .then_with(|| a.node_id.cmp(&b.node_id))
            })
            .map(|s| s.node_id.clone())?;
        self.sessions.remove(&oldest);
        info!(
            "Evicted oldest session for node {} (max sessions reached)",
            escape_log(&oldest)
        );
        Some(oldest)
    }

    /// Lookup without creation or activity refresh.
    pub fn get_existing_session(&self, node_id: &str) -> Option<&Session> {
        self.sessions.get(node_id)
    }

    /// Remove a session; returns whether one existed.
    pub fn remove_session(&mut self, node_id: &str) -> bool {
        self.sessions.remove(node_id).is_some()
    }

    /// Remove every session idle longer than the timeout. Snapshot first,
    /// then delete, so the sweep sees one consistent view of the map.
    pub fn cleanup_expired_sessions(&mut self) -> usize {
        let expired: Vec<String> = self
            .sessions
            .values()
            .filter(|s| s.is_inactive(self.timeout))
            .map(|s| s.node_id.clone())
            .collect();
        for node_id in &expired {
            self.sessions.remove(node_id);
            debug!("Expired session for node {}", escape_log(node_id));
        }
        expired.len()
    }

    pub fn active_session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn list_sessions(&self) -> Vec<&Session> {
        self.sessions.values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_on_first_access() {
        let mut mgr = SessionManager::new(60, 0);
        assert!(mgr.get_existing_session("!a").is_none());
        mgr.get_session("!a");
        assert_eq!(mgr.active_session_count(), 1);
        assert!(mgr.get_existing_session("!a").is_some());
    }

    #[test]
    fn sessions_start_at_menu() {
        let mut mgr = SessionManager::new(60, 0);
        let session = mgr.get_session("!a");
        assert!(session.is_at_menu());
        assert!(session.plugin_state.is_empty());
    }

    #[test]
    fn exit_to_menu_wipes_plugin_state() {
        let mut session = Session::new("!a");
        session.enter_plugin("Weather");
        session
            .plugin_state
            .insert("k".to_string(), serde_json::json!(1));
        assert!(!session.is_at_menu());
        session.exit_to_menu();
        assert!(session.is_at_menu());
        assert!(session.plugin_state.is_empty());
    }

    #[test]
    fn eviction_removes_least_recently_active() {
        let mut mgr = SessionManager::new(60, 2);
        mgr.get_session("!old");
        mgr.get_session("!mid");
        // Make !old clearly the oldest
        mgr.sessions.get_mut("!old").unwrap().last_activity =
            Utc::now() - Duration::minutes(30);
        mgr.get_session("!new");
        assert_eq!(mgr.active_session_count(), 2);
        assert!(mgr.get_existing_session("!old").is_none());
        assert!(mgr.get_existing_session("!new").is_some());
    }

    #[test]
    fn eviction_never_removes_the_new_session() {
        let mut mgr = SessionManager::new(60, 1);
        mgr.get_session("!a");
        mgr.get_session("!b");
        assert_eq!(mgr.active_session_count(), 1);
        assert!(mgr.get_existing_session("!b").is_some());
    }

    #[test]
    fn eviction_tie_break_is_deterministic() {
        let mut mgr = SessionManager::new(60, 2);
        mgr.get_session("!bbb");
        mgr.get_session("!aaa");
        let ts = Utc::now() - Duration::minutes(5);
        mgr.sessions.get_mut("!aaa").unwrap().last_activity = ts;
        mgr.sessions.get_mut("!bbb").unwrap().last_activity = ts;
        mgr.get_session("!ccc");
        // Equal timestamps: lexicographically smallest id goes first
        assert!(mgr.get_existing_session("!aaa").is_none());
        assert!(mgr.get_existing_session("!bbb").is_some());
    }

    #[test]
    fn cleanup_removes_only_expired_and_is_idempotent() {
        let mut mgr = SessionManager::new(10, 0);
        mgr.get_session("!fresh");
        mgr.get_session("!stale");
        mgr.sessions.get_mut("!stale").unwrap().last_activity =
            Utc::now() - Duration::minutes(11);
        assert_eq!(mgr.cleanup_expired_sessions(), 1);
        assert_eq!(mgr.cleanup_expired_sessions(), 0);
        assert!(mgr.get_existing_session("!fresh").is_some());
    }

    #[test]
    fn get_existing_does_not_refresh_activity() {
        let mut mgr = SessionManager::new(60, 0);
        mgr.get_session("!a");
        let stale = Utc::now() - Duration::minutes(30);
        mgr.sessions.get_mut("!a").unwrap().last_activity = stale;
        let seen = mgr.get_existing_session("!a").unwrap().last_activity;
        assert_eq!(seen, stale);
    }

    #[test]
    fn remove_session_reports_existence() {
        let mut mgr = SessionManager::new(60, 0);
        mgr.get_session("!a");
        assert!(mgr.remove_session("!a"));
        assert!(!mgr.remove_session("!a"));
    }
}
