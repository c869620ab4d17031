//! # Handler Server - Core Application Controller
//!
//! Wires the pipeline around an external transport: every inbound message
//! flows filter -> rate limit -> session lookup -> router -> chunker ->
//! transport send. One receive loop processes messages sequentially, which
//! is what guarantees per-node ordering; a background task periodically
//! sweeps expired sessions and stale rate-limit bookkeeping.
//!
//! ## Usage
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
//! ## Error isolation
//!
//! Nothing that happens while handling one node's message can break another
//! node's session or stop the receive loop: filter and rate-limit rejections
//! are not errors, plugin failures arrive as reply strings, and the one
//! routing invariant violation (active plugin missing from the registry)
//! resets that session only.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::{debug, error, info, warn};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::logutil::escape_log;
use crate::plugins::{GopherPlugin, LlmPlugin, WeatherPlugin, WikipediaPlugin};
use crate::transport::{IncomingMessage, MessageTransport, NodeContext};

use super::chunker::ContentChunker;
use super::filter::NodeFilter;
use super::rate_limit::RateLimiter;
use super::registry::PluginRegistry;
use super::router::MessageRouter;
use super::session::SessionManager;

pub struct HandlerServer {
    config: Config,
    transport: Arc<dyn MessageTransport>,
    registry: Arc<PluginRegistry>,
    router: MessageRouter,
    filter: NodeFilter,
    chunker: ContentChunker,
    session_manager: Arc<Mutex<SessionManager>>,
    rate_limiter: Arc<Mutex<RateLimiter>>,
    cleanup_task: Option<JoinHandle<()>>,
    running: bool,
}

impl HandlerServer {
    /// Build a server with the built-in plugins. Configuration problems
    /// (chunk limit below marker overhead, colliding menu numbers) fail
    /// here, before any message is handled.
    pub fn new(config: Config, transport: Arc<dyn MessageTransport>) -> Result<Self> {
        config.validate()?;

        let mut registry = PluginRegistry::new();
        if config.gopher.enabled {
            registry.register(Arc::new(GopherPlugin::new(config.gopher.clone())))?;
        }
        if config.llm.enabled {
            registry.register(Arc::new(LlmPlugin::new(config.llm.clone())))?;
        }
        if config.weather.enabled {
            registry.register(Arc::new(WeatherPlugin::new(config.weather.clone())))?;
        }
        if config.wikipedia.enabled {
            registry.register(Arc::new(WikipediaPlugin::new(config.wikipedia.clone())))?;
        }

        Self::with_registry(config, transport, registry)
    }

    /// Build a server around an externally assembled registry.
    pub fn with_registry(
        config: Config,
        transport: Arc<dyn MessageTransport>,
        registry: PluginRegistry,
    ) -> Result<Self> {
        config.validate()?;
        let chunker = ContentChunker::new(config.gateway.max_message_size)?;
        let router = MessageRouter::new(
            config.gateway.exit_command.clone(),
            config.gateway.help_command.clone(),
        );
        let filter = NodeFilter::from_config(&config.security);
        let session_manager = SessionManager::new(
            config.gateway.session_timeout_minutes,
            config.gateway.max_sessions,
        );
        let rate_limiter = RateLimiter::from_config(&config.security);

        Ok(Self {
            config,
            transport,
            registry: Arc::new(registry),
            router,
            filter,
            chunker,
            session_manager: Arc::new(Mutex::new(session_manager)),
            rate_limiter: Arc::new(Mutex::new(rate_limiter)),
            cleanup_task: None,
            running: false,
        })
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Shared handle to the session manager (the cleanup task holds the
    /// other reference).
    pub fn session_manager(&self) -> Arc<Mutex<SessionManager>> {
        Arc::clone(&self.session_manager)
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Connect the transport and process inbound messages until it closes
    /// or [`stop`](Self::stop) is called.
    pub async fn run(&mut self) -> Result<()> {
        info!(
            "Starting {} with {} plugins",
            self.config.gateway.name,
            self.registry.plugin_count()
        );
        self.transport.connect().await?;
        self.spawn_cleanup_task();
        self.running = true;

        let transport = Arc::clone(&self.transport);
        while let Some(incoming) = transport.recv().await {
            self.process_message(incoming).await;
        }

        info!("Transport closed; shutting down");
        self.stop().await;
        Ok(())
    }

    /// Cancel the cleanup task and disconnect the transport. Idempotent.
    pub async fn stop(&mut self) {
        if let Some(task) = self.cleanup_task.take() {
            task.abort();
            // Wait for the sweep to actually stop so no pass runs after us
            let _ = task.await;
        }
        self.transport.disconnect().await;
        self.running = false;
        info!("{} stopped", self.config.gateway.name);
    }

    /// Process one inbound message end to end, sending the (possibly
    /// chunked) reply out the transport.
    async fn process_message(&self, incoming: IncomingMessage) {
        debug!(
            "<- {}: {}",
            escape_log(&incoming.context.node_id),
            escape_log(&incoming.text)
        );
        let node_id = incoming.context.node_id.clone();
        if let Some(reply) = self
            .handle_single_message(&incoming.text, incoming.context)
            .await
        {
            self.send_reply(&node_id, &reply).await;
        }
    }

    /// Run one message through filter -> rate limit -> session -> router.
    /// Returns `None` when the message is silently dropped (filtered node).
    pub async fn handle_single_message(
        &self,
        text: &str,
        context: NodeContext,
    ) -> Option<String> {
        if !self.filter.is_allowed(&context.node_id) {
            return None;
        }

        let result = self.rate_limiter.lock().await.check(&context.node_id);
        if !result.allowed {
            let retry_secs = result
                .retry_after
                .map(|d| d.as_secs() + u64::from(d.subsec_nanos() > 0))
                .unwrap_or(0);
            return Some(format!("Rate limited. Try again in {}s", retry_secs));
        }

        // The session lock is held across routing (including plugin I/O):
        // that is the per-node serialization the design relies on.
        let mut manager = self.session_manager.lock().await;
        let session = manager.get_session(&context.node_id);
        let reply = self
            .router
            .route(text, session, &self.registry, &context)
            .await;
        Some(reply)
    }

    /// Chunk and send one reply, in order, to one node.
    async fn send_reply(&self, node_id: &str, reply: &str) {
        let chunks = match self.chunker.split(reply) {
            Ok(chunks) => chunks,
            Err(e) => {
                error!("Failed to chunk reply for {}: {}", escape_log(node_id), e);
                vec!["Response too large to deliver.".to_string()]
            }
        };
        for chunk in &chunks {
            if !self.transport.send_message(node_id, chunk).await {
                warn!("Send to {} failed; dropping remaining chunks", escape_log(node_id));
                break;
            }
        }
    }

    /// Periodic sweep of expired sessions and stale rate-limit state. The
    /// task owns clones of the shared handles and is aborted on stop.
    fn spawn_cleanup_task(&mut self) {
        let sessions = Arc::clone(&self.session_manager);
        let rate_limiter = Arc::clone(&self.rate_limiter);
        let period = Duration::from_secs(self.config.gateway.cleanup_interval_seconds);
        let inactive = Duration::from_secs(self.config.security.rate_limit_inactive_seconds);

        self.cleanup_task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            interval.tick().await; // first tick fires immediately; skip it
            loop {
                interval.tick().await;
                let expired = sessions.lock().await.cleanup_expired_sessions();
                let stale = rate_limiter.lock().await.cleanup_inactive(inactive);
                if expired > 0 || stale > 0 {
                    info!(
                        "Cleanup pass: {} sessions expired, {} rate-limit entries dropped",
                        expired, stale
                    );
                }
            }
        }));
    }

    #[cfg(test)]
    pub(crate) fn cleanup_task_handle(&self) -> Option<&JoinHandle<()>> {
        self.cleanup_task.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    fn test_config() -> Config {
        let mut config = Config::default();
        // Built-in HTTP plugins stay registered but are never called in
        // these tests; menu traffic exercises the pipeline.
        config.gateway.cleanup_interval_seconds = 1;
        config
    }

    fn server_with(transport: &MockTransport) -> HandlerServer {
        HandlerServer::new(test_config(), Arc::new(transport.clone()))
            .expect("server should initialize")
    }

    #[tokio::test]
    async fn builtin_plugins_registered() {
        let transport = MockTransport::new();
        let server = server_with(&transport);
        assert_eq!(server.registry().plugin_count(), 4);
    }

    #[tokio::test]
    async fn not_running_until_started() {
        let transport = MockTransport::new();
        let server = server_with(&transport);
        assert!(!server.is_running());
        assert_eq!(
            server.session_manager().lock().await.active_session_count(),
            0
        );
    }

    #[tokio::test]
    async fn empty_message_is_menu() {
        let transport = MockTransport::new();
        let server = server_with(&transport);
        let reply = server
            .handle_single_message("", NodeContext::new("!test123"))
            .await
            .unwrap();
        assert!(reply.contains("Available Services:"));
        assert!(reply.contains("Send number to select"));
    }

    #[tokio::test]
    async fn denied_node_is_dropped_silently() {
        let transport = MockTransport::new();
        let mut config = test_config();
        config.security.denylist = vec!["!bad".to_string()];
        let server = HandlerServer::new(config, Arc::new(transport.clone())).unwrap();
        assert!(server
            .handle_single_message("", NodeContext::new("!bad"))
            .await
            .is_none());
        // And no session was created for it
        assert_eq!(
            server.session_manager().lock().await.active_session_count(),
            0
        );
    }

    #[tokio::test]
    async fn rate_limit_notice_after_burst() {
        let transport = MockTransport::new();
        let mut config = test_config();
        config.security.rate_limit_messages = 2;
        let server = HandlerServer::new(config, Arc::new(transport.clone())).unwrap();
        let ctx = || NodeContext::new("!chatty");
        assert!(server.handle_single_message("", ctx()).await.is_some());
        assert!(server.handle_single_message("", ctx()).await.is_some());
        let reply = server.handle_single_message("", ctx()).await.unwrap();
        assert!(reply.starts_with("Rate limited. Try again in"));
    }

    #[tokio::test]
    async fn long_reply_is_sent_as_ordered_chunks() {
        let transport = MockTransport::new();
        let mut config = test_config();
        config.gateway.max_message_size = 30; // force chunking of the menu
        let server = HandlerServer::new(config, Arc::new(transport.clone())).unwrap();
        server
            .process_message(IncomingMessage {
                text: String::new(),
                context: NodeContext::new("!test123"),
            })
            .await;
        let sent = transport.sent_messages();
        assert!(sent.len() > 1);
        for (i, (node, chunk)) in sent.iter().enumerate() {
            assert_eq!(node, "!test123");
            assert!(chunk.len() <= 30);
            assert!(chunk.starts_with(&format!("[{}/{}] ", i + 1, sent.len())));
        }
    }

    #[tokio::test]
    async fn stop_cancels_cleanup_and_disconnects() {
        let transport = MockTransport::new();
        let mut server = server_with(&transport);
        transport.connect().await.unwrap();
        server.spawn_cleanup_task();
        assert!(server.cleanup_task_handle().is_some());
        server.stop().await;
        assert!(server.cleanup_task_handle().is_none());
        assert!(!transport.is_connected());
        assert!(!server.is_running());
    }
}
