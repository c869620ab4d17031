//! Node filtering - allowlist/denylist enforcement.
//!
//! Filtering precedence is fixed:
//! 1. Denylist always blocks (checked first)
//! 2. If `require_allowlist` is set, the node must be allowlisted
//! 3. Otherwise allow
//!
//! An empty allowlist with `require_allowlist = false` means allow everyone
//! except denied nodes; with `require_allowlist = true` it means reject all.

use std::collections::HashSet;

use log::warn;

use crate::config::SecurityConfig;
use crate::logutil::escape_log;

/// Allow/deny decision per node identifier. Pure beyond logging.
#[derive(Debug, Clone, Default)]
pub struct NodeFilter {
    allowlist: HashSet<String>,
    denylist: HashSet<String>,
    require_allowlist: bool,
}

impl NodeFilter {
    pub fn new(
        allowlist: impl IntoIterator<Item = String>,
        denylist: impl IntoIterator<Item = String>,
        require_allowlist: bool,
    ) -> Self {
        Self {
            allowlist: allowlist.into_iter().collect(),
            denylist: denylist.into_iter().collect(),
            require_allowlist,
        }
    }

    pub fn from_config(security: &SecurityConfig) -> Self {
        Self::new(
            security.allowlist.iter().cloned(),
            security.denylist.iter().cloned(),
            security.require_allowlist,
        )
    }

    /// Whether a node may interact with the gateway.
    pub fn is_allowed(&self, node_id: &str) -> bool {
        if self.denylist.contains(node_id) {
            warn!(target: "security", "Node {} rejected: in denylist", escape_log(node_id));
            return false;
        }

        if self.require_allowlist && !self.allowlist.contains(node_id) {
            warn!(target: "security", "Node {} rejected: not in allowlist", escape_log(node_id));
            return false;
        }

        true
    }

    /// Snapshot of the allowlist. Callers cannot mutate the internal set.
    pub fn allowlist(&self) -> HashSet<String> {
        self.allowlist.clone()
    }

    /// Snapshot of the denylist.
    pub fn denylist(&self) -> HashSet<String> {
        self.denylist.clone()
    }

    pub fn require_allowlist(&self) -> bool {
        self.require_allowlist
    }
}
