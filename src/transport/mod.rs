//! # Transport Module
//!
//! The gateway never assumes a specific radio link. Everything it needs from
//! the mesh is behind [`MessageTransport`]: connect, disconnect, send one
//! text payload to one node, and receive inbound messages one at a time.
//!
//! Implementations:
//!
//! - [`tcp::TcpTransport`] - newline-delimited JSON frames to a radio host daemon
//! - [`mock::MockTransport`] - in-memory queues for tests and development

pub mod mock;
pub mod tcp;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use mock::MockTransport;
pub use tcp::TcpTransport;

/// GPS position reported by a node, when the radio shares one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsLocation {
    pub latitude: f64,
    pub longitude: f64,
}

/// Information about the node a message came from. The `node_id` is the
/// opaque key used everywhere (sessions, filtering, rate limiting); name and
/// location are advisory extras some plugins use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeContext {
    pub node_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GpsLocation>,
}

impl NodeContext {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            node_name: None,
            location: None,
        }
    }
}

/// An inbound message from the mesh.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub text: String,
    pub context: NodeContext,
}

/// Boundary to the physical mesh network.
///
/// `recv` yields inbound messages one at a time and returns `None` once the
/// transport has shut down; the server's receive loop ends there. Send
/// failures are reported as `false`, not errors - the mesh is lossy and the
/// gateway keeps running.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// Establish the link to the radio. Errors here are fatal at startup.
    async fn connect(&self) -> anyhow::Result<()>;

    /// Tear down the link. Idempotent.
    async fn disconnect(&self);

    /// Send one text payload to one node. Returns whether the transport
    /// accepted the frame.
    async fn send_message(&self, node_id: &str, text: &str) -> bool;

    /// Receive the next inbound message, or `None` when the transport closes.
    async fn recv(&self) -> Option<IncomingMessage>;

    /// Whether the link is currently up.
    fn is_connected(&self) -> bool;
}
