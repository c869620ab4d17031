//! End-to-end menu navigation through the full pipeline.

mod common;

use common::{test_server, test_server_with};
use meshgate::transport::{MockTransport, NodeContext};

#[tokio::test]
async fn empty_message_lists_all_four_services() {
    let transport = MockTransport::new();
    let server = test_server(&transport);

    let reply = server
        .handle_single_message("", NodeContext::new("!abc"))
        .await
        .expect("menu reply");

    assert!(reply.contains("Available Services:"));
    assert!(reply.contains("1. Gopher"));
    assert!(reply.contains("2. Chat"));
    assert!(reply.contains("3. Weather"));
    assert!(reply.contains("4. Wikipedia"));
    assert!(reply.contains("Send number to select"));
}

#[tokio::test]
async fn help_at_menu_lists_services() {
    let transport = MockTransport::new();
    let server = test_server(&transport);

    let reply = server
        .handle_single_message("!help", NodeContext::new("!abc"))
        .await
        .unwrap();

    assert!(reply.contains("Available Services:"));
    assert!(!reply.contains("Invalid selection"));
}

#[tokio::test]
async fn selecting_a_service_enters_it() {
    let transport = MockTransport::new();
    let server = test_server(&transport);

    let _ = server.handle_single_message("", NodeContext::new("!abc")).await;
    let reply = server
        .handle_single_message("2", NodeContext::new("!abc"))
        .await
        .expect("welcome reply");

    assert!(reply.contains("Chat"));
    let manager = server.session_manager();
    let guard = manager.lock().await;
    let session = guard.get_existing_session("!abc").expect("session exists");
    assert!(!session.is_at_menu());
    assert_eq!(session.active_plugin.as_deref(), Some("Chat"));
}

#[tokio::test]
async fn exit_returns_to_menu_and_clears_state() {
    let transport = MockTransport::new();
    let server = test_server(&transport);

    let _ = server.handle_single_message("", NodeContext::new("!abc")).await;
    let _ = server.handle_single_message("2", NodeContext::new("!abc")).await;
    let reply = server
        .handle_single_message("!exit", NodeContext::new("!abc"))
        .await
        .expect("exit reply");

    assert!(reply.contains("Returned to menu"));
    let manager = server.session_manager();
    let guard = manager.lock().await;
    let session = guard.get_existing_session("!abc").unwrap();
    assert!(session.is_at_menu());
    assert!(session.plugin_state.is_empty());
}

#[tokio::test]
async fn invalid_selection_reports_error_and_stays_at_menu() {
    let transport = MockTransport::new();
    let server = test_server(&transport);

    let _ = server.handle_single_message("", NodeContext::new("!abc")).await;
    let reply = server
        .handle_single_message("999", NodeContext::new("!abc"))
        .await
        .unwrap();

    assert!(reply.contains("Invalid selection"));
    let manager = server.session_manager();
    let guard = manager.lock().await;
    assert!(guard.get_existing_session("!abc").unwrap().is_at_menu());
}

#[tokio::test]
async fn sessions_are_independent_between_nodes() {
    let transport = MockTransport::new();
    let server = test_server(&transport);

    // Node A enters plugin 1; node B just looks at the menu
    let _ = server.handle_single_message("", NodeContext::new("!nodeA")).await;
    let _ = server.handle_single_message("1", NodeContext::new("!nodeA")).await;
    let _ = server.handle_single_message("", NodeContext::new("!nodeB")).await;

    let manager = server.session_manager();
    let guard = manager.lock().await;
    assert!(!guard.get_existing_session("!nodeA").unwrap().is_at_menu());
    assert!(guard.get_existing_session("!nodeB").unwrap().is_at_menu());
}

#[tokio::test]
async fn full_scenario_menu_enter_exit() {
    let transport = MockTransport::new();
    let server = test_server(&transport);
    let ctx = || NodeContext::new("!abc");

    let menu = server.handle_single_message("", ctx()).await.unwrap();
    for n in 1..=4 {
        assert!(menu.contains(&format!("{}.", n)), "menu missing entry {}", n);
    }

    let welcome = server.handle_single_message("2", ctx()).await.unwrap();
    assert!(welcome.contains("Chat"));

    let exit = server.handle_single_message("!ExIt", ctx()).await.unwrap();
    assert!(exit.contains("Returned to menu"));

    let manager = server.session_manager();
    let guard = manager.lock().await;
    assert!(guard.get_existing_session("!abc").unwrap().is_at_menu());
}

#[tokio::test]
async fn run_loop_replies_over_transport() {
    let transport = MockTransport::new();
    let mut server = test_server(&transport);

    let driver = transport.clone();
    let task = tokio::spawn(async move { server.run().await });

    driver.inject_message("", "!test123");
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    driver.close();
    task.await.unwrap().unwrap();

    let sent = transport.sent_messages();
    assert!(!sent.is_empty());
    assert_eq!(sent[0].0, "!test123");
    assert!(sent[0].1.contains("Available Services:"));
}

#[tokio::test]
async fn custom_exit_command_is_honored() {
    let transport = MockTransport::new();
    let mut config = common::test_config();
    config.gateway.exit_command = "!menu".to_string();
    let server = test_server_with(config, &transport);
    let ctx = || NodeContext::new("!abc");

    let _ = server.handle_single_message("1", ctx()).await;
    let reply = server.handle_single_message("!MENU", ctx()).await.unwrap();
    assert!(reply.contains("Returned to menu"));
}
