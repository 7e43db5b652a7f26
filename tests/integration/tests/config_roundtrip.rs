//! Config save/load roundtrip integration tests.
//!
//! These tests verify that configuration can be serialized, written to disk,
//! and loaded back with identical field values.

use agentdeck_core::config::{Config, LogLevel};
use agentdeck_core::types::PermissionMode;
use std::path::Path;
use tempfile::TempDir;

#[test]
fn test_config_save_and_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("agentdeck.json5");

    let config = Config::default();
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded.server.port, config.server.port);
    assert_eq!(loaded.server.cors_origins, config.server.cors_origins);
    assert_eq!(loaded.relay.event_buffer, config.relay.event_buffer);
    assert_eq!(loaded.cache.ttl_secs, config.cache.ttl_secs);
    assert_eq!(
        loaded.agent.default_permission_mode,
        config.agent.default_permission_mode
    );
}

#[test]
fn test_config_modify_and_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("agentdeck.json5");

    let mut config = Config::default();
    config.server.port = 9090;
    config.agent.default_permission_mode = PermissionMode::Plan;
    config.agent.env.insert("ANTHROPIC_MODEL".into(), "opus".into());
    config.relay.turn_gate_timeout_secs = 0;
    config.logging.level = LogLevel::Debug;
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded.server.port, 9090);
    assert_eq!(loaded.agent.default_permission_mode, PermissionMode::Plan);
    assert_eq!(loaded.agent.env["ANTHROPIC_MODEL"], "opus");
    assert_eq!(loaded.relay.turn_gate_timeout_secs, 0);
    assert_eq!(loaded.logging.level, LogLevel::Debug);
}

#[test]
fn test_hand_written_json5() {
    let config = Config::parse(
        r#"{
            // trailing commas and comments are fine
            server: { port: 8100, cors_origins: ["http://localhost:3000"], },
            agent: { command: "claude", extra_args: ["--debug"], replay_file: "demo.jsonl" },
        }"#,
    )
    .unwrap();
    assert_eq!(config.server.port, 8100);
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.agent.extra_args, vec!["--debug"]);
    assert!(config.agent.replay_file.is_some());
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_load_nonexistent() {
    let result = Config::load(Path::new("/nonexistent/agentdeck.json5"));
    assert!(result.is_err());
}

#[test]
fn test_config_parse_invalid() {
    let result = Config::parse("not valid json");
    assert!(result.is_err());
}
