//! Test utilities & fixtures shared by the integration tests.

use std::sync::Arc;

use meshgate::config::Config;
use meshgate::gateway::HandlerServer;
use meshgate::transport::MockTransport;

/// Config with fast timers suitable for tests. Built-in plugins stay
/// registered; menu-level traffic never touches the network.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.gateway.cleanup_interval_seconds = 1;
    config
}

/// Server wired to the given mock transport with default test config.
#[allow(dead_code)] // not every integration test file uses every helper
pub fn test_server(transport: &MockTransport) -> HandlerServer {
    HandlerServer::new(test_config(), Arc::new(transport.clone()))
        .expect("server should initialize")
}

/// Server with a caller-adjusted config.
#[allow(dead_code)]
pub fn test_server_with(config: Config, transport: &MockTransport) -> HandlerServer {
    HandlerServer::new(config, Arc::new(transport.clone())).expect("server should initialize")
}
