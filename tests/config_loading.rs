//! Configuration file loading, generation, and validation at startup.

use meshgate::config::Config;

#[tokio::test]
async fn generated_default_config_loads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let path = path.to_str().unwrap();

    Config::create_default(path).await.unwrap();
    let config = Config::load(path).await.unwrap();

    assert_eq!(config.gateway.name, "Meshgate");
    assert_eq!(config.gateway.exit_command, "!exit");
    assert_eq!(config.transport.port, 4403);
    assert!(config.security.rate_limit_enabled);
}

#[tokio::test]
async fn missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nope.toml");
    assert!(Config::load(path.to_str().unwrap()).await.is_err());
}

#[tokio::test]
async fn sparse_file_fills_in_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    tokio::fs::write(
        &path,
        "[gateway]\nname = \"TestGate\"\nsession_timeout_minutes = 5\n\n[logging]\nlevel = \"debug\"\n",
    )
    .await
    .unwrap();

    let config = Config::load(path.to_str().unwrap()).await.unwrap();
    assert_eq!(config.gateway.name, "TestGate");
    assert_eq!(config.gateway.session_timeout_minutes, 5);
    // Unspecified sections and keys come from defaults
    assert_eq!(config.gateway.max_message_size, 200);
    assert_eq!(config.security.rate_limit_messages, 10);
    assert_eq!(config.transport.host, "127.0.0.1");
    assert!(config.wikipedia.enabled);
}

#[tokio::test]
async fn invalid_settings_fail_at_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    tokio::fs::write(
        &path,
        "[gateway]\nname = \"TestGate\"\nsession_timeout_minutes = 5\nmax_message_size = 4\n\n[logging]\nlevel = \"info\"\n",
    )
    .await
    .unwrap();

    let err = Config::load(path.to_str().unwrap()).await.unwrap_err();
    assert!(err.to_string().contains("max_message_size"));
}
