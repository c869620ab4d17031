//! Per-node throttling through the full pipeline.

mod common;

use common::{test_config, test_server_with};
use meshgate::transport::{MockTransport, NodeContext};

#[tokio::test]
async fn burst_over_limit_gets_throttle_notice() {
    let transport = MockTransport::new();
    let mut config = test_config();
    config.security.rate_limit_messages = 2;
    config.security.rate_limit_window_seconds = 60;
    let server = test_server_with(config, &transport);
    let ctx = || NodeContext::new("!chatty");

    let first = server.handle_single_message("", ctx()).await.unwrap();
    assert!(first.contains("Available Services:"));
    server.handle_single_message("", ctx()).await.unwrap();

    let third = server.handle_single_message("", ctx()).await.unwrap();
    assert!(third.starts_with("Rate limited. Try again in"));
    assert!(!third.contains("Available Services:"));
}

#[tokio::test]
async fn throttled_node_does_not_affect_others() {
    let transport = MockTransport::new();
    let mut config = test_config();
    config.security.rate_limit_messages = 1;
    let server = test_server_with(config, &transport);

    server
        .handle_single_message("", NodeContext::new("!loud"))
        .await
        .unwrap();
    let blocked = server
        .handle_single_message("", NodeContext::new("!loud"))
        .await
        .unwrap();
    assert!(blocked.starts_with("Rate limited"));

    let other = server
        .handle_single_message("", NodeContext::new("!quiet"))
        .await
        .unwrap();
    assert!(other.contains("Available Services:"));
}

#[tokio::test]
async fn disabled_rate_limiting_allows_everything() {
    let transport = MockTransport::new();
    let mut config = test_config();
    config.security.rate_limit_enabled = false;
    config.security.rate_limit_messages = 1; // would block immediately if enabled
    let server = test_server_with(config, &transport);

    for _ in 0..5 {
        let reply = server
            .handle_single_message("", NodeContext::new("!abc"))
            .await
            .unwrap();
        assert!(!reply.starts_with("Rate limited"));
    }
}

#[tokio::test]
async fn throttling_does_not_disturb_session_state() {
    let transport = MockTransport::new();
    let mut config = test_config();
    config.security.rate_limit_messages = 2;
    let server = test_server_with(config, &transport);
    let ctx = || NodeContext::new("!abc");

    let _ = server.handle_single_message("", ctx()).await; // menu
    let _ = server.handle_single_message("3", ctx()).await; // enter Weather
    let blocked = server.handle_single_message("!exit", ctx()).await.unwrap();
    assert!(blocked.starts_with("Rate limited"));

    // Throttled message never reached the router: still inside the plugin
    let manager = server.session_manager();
    let guard = manager.lock().await;
    let session = guard.get_existing_session("!abc").unwrap();
    assert_eq!(session.active_plugin.as_deref(), Some("Weather"));
}
