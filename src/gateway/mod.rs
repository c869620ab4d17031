//! # Gateway Core Module
//!
//! The session/routing/chunking heart of meshgate. Every inbound message
//! flows through the same pipeline:
//!
//! ```text
//! transport -> NodeFilter -> RateLimiter -> SessionManager
//!           -> MessageRouter -> ContentChunker -> transport
//! ```
//!
//! ## Components
//!
//! - [`filter`] - allowlist/denylist decisions per node
//! - [`rate_limit`] - sliding-window throttling per node
//! - [`session`] - per-node conversational state and lifecycle
//! - [`registry`] - the fixed set of plugins, by menu number and name
//! - [`router`] - the menu/plugin state machine
//! - [`chunker`] - splitting oversized replies for the radio
//! - [`server`] - the receive loop tying it all together

pub mod chunker;
pub mod filter;
pub mod rate_limit;
pub mod registry;
pub mod router;
pub mod server;
pub mod session;

pub use chunker::{ChunkerError, ContentChunker};
pub use filter::NodeFilter;
pub use rate_limit::{RateLimitResult, RateLimiter};
pub use registry::{PluginRegistry, RegistryError};
pub use router::MessageRouter;
pub use server::HandlerServer;
pub use session::{Session, SessionManager};
