// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Rollcall configuration system.

use figment::Jail;
use rollcall_config::diagnostic::ConfigError;
use rollcall_config::model::{PendingPolicy, RollcallConfig};
use rollcall_config::{load_and_validate_str, load_config, load_config_from_str};

#[test]
fn full_toml_deserializes() {
    let toml = r#"
[service]
name = "rollcall-test"
log_level = "debug"

[storage]
database_path = "/tmp/rollcall.db"
wal_mode = false

[ledger]
endpoint = "https://ledger.example.edu"
api_key = "secret"
max_attempts = 6
confirmation_timeout_ms = 20000
verify_sessions = false

[engine]
default_session_secs = 600
pending_policy = "optimistic"

[reconcile]
interval_secs = 10
provisional_timeout_secs = 60
max_resubmits = 2

[gateway]
host = "0.0.0.0"
port = 8080

[evidence]
enabled = true
ipfs_api_url = "http://ipfs.internal:5001"
gateway_urls = ["https://ipfs.io"]
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.service.name, "rollcall-test");
    assert_eq!(config.service.log_level, "debug");
    assert_eq!(config.storage.database_path, "/tmp/rollcall.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.ledger.endpoint, "https://ledger.example.edu");
    assert_eq!(config.ledger.api_key.as_deref(), Some("secret"));
    assert_eq!(config.ledger.max_attempts, 6);
    assert_eq!(config.ledger.confirmation_timeout_ms, 20_000);
    assert!(!config.ledger.verify_sessions);
    assert_eq!(config.engine.default_session_secs, 600);
    assert_eq!(config.engine.pending_policy, PendingPolicy::Optimistic);
    assert_eq!(config.reconcile.interval_secs, 10);
    assert_eq!(config.reconcile.provisional_timeout_secs, 60);
    assert_eq!(config.reconcile.max_resubmits, 2);
    assert_eq!(config.gateway.host, "0.0.0.0");
    assert_eq!(config.gateway.port, 8080);
    assert!(config.evidence.enabled);
    assert!(config.evidence.pinata_jwt.is_none());
    assert_eq!(config.evidence.ipfs_api_url, "http://ipfs.internal:5001");
    assert_eq!(config.evidence.gateway_urls, vec!["https://ipfs.io"]);
    assert_eq!(config.evidence.request_timeout_ms, 30_000);
}

#[test]
fn defaults_are_sensible() {
    let config = RollcallConfig::default();
    assert_eq!(config.service.name, "rollcall");
    assert_eq!(config.service.log_level, "info");
    assert!(config.storage.database_path.ends_with("rollcall.db"));
    assert!(config.storage.wal_mode);
    assert!(config.ledger.api_key.is_none());
    assert_eq!(config.ledger.confirmation_timeout_ms, 15_000);
    assert_eq!(config.engine.default_session_secs, 300);
    assert_eq!(config.engine.pending_policy, PendingPolicy::Report);
    assert_eq!(config.reconcile.provisional_timeout_secs, 120);
    assert_eq!(config.reconcile.max_resubmits, 1);
    assert_eq!(config.gateway.port, 3030);
    assert!(!config.evidence.enabled);
    assert_eq!(config.evidence.ipfs_api_url, "http://127.0.0.1:5001");
    assert_eq!(config.evidence.gateway_urls.len(), 3);
}

#[test]
fn missing_sections_use_defaults() {
    let config = load_config_from_str("[ledger]\nmax_attempts = 2\n").unwrap();
    assert_eq!(config.ledger.max_attempts, 2);
    assert_eq!(config.ledger.base_backoff_ms, 250);
    assert_eq!(config.engine.default_session_secs, 300);
}

#[test]
fn unknown_top_level_section_is_rejected() {
    let err = load_config_from_str("[blockchain]\nrpc = \"x\"\n").unwrap_err();
    assert!(err.to_string().contains("blockchain"), "got: {err}");
}

#[test]
fn unknown_key_gets_suggestion_and_span() {
    let errors = load_and_validate_str("[ledger]\nendpont = \"http://x\"\n").unwrap_err();
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key,
            suggestion,
            valid_keys,
            ..
        } => {
            assert_eq!(key, "endpont");
            assert_eq!(suggestion.as_deref(), Some("endpoint"));
            assert!(valid_keys.contains("confirmation_timeout_ms"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn wrong_type_is_reported_with_path() {
    let errors = load_and_validate_str("[gateway]\nport = \"eighty\"\n").unwrap_err();
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { key, .. } if key == "gateway.port")),
        "got: {errors:?}"
    );
}

#[test]
fn bad_pending_policy_is_rejected() {
    assert!(load_config_from_str("[engine]\npending_policy = \"eventually\"\n").is_err());
}

#[test]
fn semantic_errors_surface_through_load_and_validate() {
    let errors = load_and_validate_str("[ledger]\nmax_attempts = 0\n").unwrap_err();
    assert!(errors.iter().any(
        |e| matches!(e, ConfigError::Validation { key, .. } if key == "ledger.max_attempts")
    ));
}

#[test]
fn diagnostics_render_with_miette() {
    let errors = load_and_validate_str("[reconcile]\nbatch_sise = 5\n").unwrap_err();
    let handler = miette::GraphicalReportHandler::new_themed(miette::GraphicalTheme::unicode_nocolor());
    let mut out = String::new();
    handler
        .render_report(&mut out, &errors[0] as &dyn miette::Diagnostic)
        .unwrap();
    assert!(out.contains("batch_sise"));
    assert!(out.contains("batch_size"));
}

#[test]
fn env_overrides_file_and_maps_underscored_keys() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "rollcall.toml",
            "[ledger]\nendpoint = \"http://from-file:8545\"\napi_key = \"file-key\"\n",
        )?;
        jail.set_env("ROLLCALL_LEDGER_API_KEY", "env-key");
        jail.set_env("ROLLCALL_RECONCILE_MAX_RESUBMITS", "3");
        jail.set_env("ROLLCALL_ENGINE_PENDING_POLICY", "optimistic");
        jail.set_env("ROLLCALL_EVIDENCE_PINATA_JWT", "jwt-from-env");

        let config = load_config()?;
        assert_eq!(config.ledger.endpoint, "http://from-file:8545");
        assert_eq!(config.ledger.api_key.as_deref(), Some("env-key"));
        assert_eq!(config.reconcile.max_resubmits, 3);
        assert_eq!(config.engine.pending_policy, PendingPolicy::Optimistic);
        assert_eq!(config.evidence.pinata_jwt.as_deref(), Some("jwt-from-env"));
        Ok(())
    });
}

#[test]
fn explicit_path_is_loaded() {
    Jail::expect_with(|jail| {
        jail.create_file("custom.toml", "[gateway]\nport = 9191\n")?;
        let config = rollcall_config::load_and_validate_path(std::path::Path::new("custom.toml"))
            .map_err(|errors| format!("{errors:?}"))?;
        assert_eq!(config.gateway.port, 9191);
        Ok(())
    });
}
