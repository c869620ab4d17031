//! # Meshgate - Text Services Gateway for Mesh Radio Networks
//!
//! Meshgate bridges a low-bandwidth mesh radio network (Meshtastic-style) to
//! pluggable text services: gopherspace browsing, LLM chat, weather lookups,
//! and Wikipedia search. Each radio node carries its own conversational
//! session - a menu position or an active plugin - entirely independent of
//! every other node.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use meshgate::config::Config;
//! use meshgate::gateway::HandlerServer;
//! use meshgate::transport::TcpTransport;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let transport = Arc::new(TcpTransport::new(config.transport.clone()));
//!     let mut server = HandlerServer::new(config, transport)?;
//!     server.run().await
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`gateway`] - Sessions, routing, rate limiting, chunking, and the server loop
//! - [`plugins`] - The plugin capability trait and the built-in services
//! - [`transport`] - The radio boundary: trait, TCP adapter, test mock
//! - [`config`] - Configuration loading and validation
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  HandlerServer  │ ← receive loop + periodic cleanup
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │ filter → limit  │ ← per-node admission
//! │ → session →     │
//! │ router → chunk  │
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │   Transport     │ ← radio link (TCP adapter or mock)
//! └─────────────────┘
//! ```
//!
//! Plugins never raise errors toward the router: every failure mode inside a
//! plugin (network, timeout, parse) becomes a reply string, so one node's
//! broken lookup can never stall the mesh-facing loop.

pub mod config;
pub mod gateway;
pub mod logutil;
pub mod plugins;
pub mod transport;
