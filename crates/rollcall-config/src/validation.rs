// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic checks that serde attributes cannot express.
//!
//! All problems are collected; validation does not stop at the first one.

use crate::diagnostic::ConfigError;
use crate::model::RollcallConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

pub fn validate_config(config: &RollcallConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.service.log_level.as_str()) {
        errors.push(ConfigError::invalid(
            "service.log_level",
            format!(
                "`{}` is not one of {}",
                config.service.log_level,
                LOG_LEVELS.join(", ")
            ),
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::invalid("storage.database_path", "must not be empty"));
    }

    validate_ledger(config, &mut errors);
    validate_engine(config, &mut errors);
    validate_reconcile(config, &mut errors);
    validate_evidence(config, &mut errors);

    let host = config.gateway.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::invalid("gateway.host", "must not be empty"));
    } else if host.parse::<std::net::IpAddr>().is_err()
        && !host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        errors.push(ConfigError::invalid(
            "gateway.host",
            format!("`{host}` is not an IP address or hostname"),
        ));
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn validate_ledger(config: &RollcallConfig, errors: &mut Vec<ConfigError>) {
    let ledger = &config.ledger;

    if !is_http_url(&ledger.endpoint) {
        errors.push(ConfigError::invalid(
            "ledger.endpoint",
            format!("`{}` must be an http(s) URL", ledger.endpoint),
        ));
    }
    if ledger.max_attempts == 0 {
        errors.push(ConfigError::invalid("ledger.max_attempts", "must be at least 1"));
    }
    if ledger.request_timeout_ms == 0 {
        errors.push(ConfigError::invalid("ledger.request_timeout_ms", "must be positive"));
    }
    if ledger.base_backoff_ms > ledger.max_backoff_ms {
        errors.push(ConfigError::invalid(
            "ledger.base_backoff_ms",
            format!(
                "{} exceeds ledger.max_backoff_ms ({})",
                ledger.base_backoff_ms, ledger.max_backoff_ms
            ),
        ));
    }
    if !(0.0..=1.0).contains(&ledger.jitter_pct) {
        errors.push(ConfigError::invalid(
            "ledger.jitter_pct",
            format!("{} is outside 0.0..=1.0", ledger.jitter_pct),
        ));
    }
    if ledger.poll_interval_ms == 0 {
        errors.push(ConfigError::invalid("ledger.poll_interval_ms", "must be positive"));
    } else if ledger.poll_interval_ms > ledger.confirmation_timeout_ms {
        errors.push(ConfigError::invalid(
            "ledger.poll_interval_ms",
            format!(
                "{} exceeds ledger.confirmation_timeout_ms ({})",
                ledger.poll_interval_ms, ledger.confirmation_timeout_ms
            ),
        ));
    }
}

fn validate_engine(config: &RollcallConfig, errors: &mut Vec<ConfigError>) {
    let engine = &config.engine;

    if engine.max_session_secs <= 0 {
        errors.push(ConfigError::invalid("engine.max_session_secs", "must be positive"));
    }
    if engine.default_session_secs <= 0 {
        errors.push(ConfigError::invalid("engine.default_session_secs", "must be positive"));
    } else if engine.default_session_secs > engine.max_session_secs {
        errors.push(ConfigError::invalid(
            "engine.default_session_secs",
            format!(
                "{} exceeds engine.max_session_secs ({})",
                engine.default_session_secs, engine.max_session_secs
            ),
        ));
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn validate_evidence(config: &RollcallConfig, errors: &mut Vec<ConfigError>) {
    let evidence = &config.evidence;

    for (key, url) in [
        ("evidence.pinata_url", &evidence.pinata_url),
        ("evidence.ipfs_api_url", &evidence.ipfs_api_url),
    ] {
        if !is_http_url(url) {
            errors.push(ConfigError::invalid(key, format!("`{url}` must be an http(s) URL")));
        }
    }
    if let Some(bad) = evidence.gateway_urls.iter().find(|url| !is_http_url(url)) {
        errors.push(ConfigError::invalid(
            "evidence.gateway_urls",
            format!("`{bad}` must be an http(s) URL"),
        ));
    }
    if evidence.request_timeout_ms == 0 {
        errors.push(ConfigError::invalid("evidence.request_timeout_ms", "must be positive"));
    }
    if evidence.pinata_jwt.as_deref().is_some_and(|jwt| jwt.trim().is_empty()) {
        errors.push(ConfigError::invalid("evidence.pinata_jwt", "must not be blank when set"));
    }
}

fn validate_reconcile(config: &RollcallConfig, errors: &mut Vec<ConfigError>) {
    let reconcile = &config.reconcile;

    if reconcile.interval_secs == 0 {
        errors.push(ConfigError::invalid("reconcile.interval_secs", "must be positive"));
    }
    if reconcile.batch_size == 0 {
        errors.push(ConfigError::invalid("reconcile.batch_size", "must be positive"));
    }
    // A provisional record is owned by its submitter until the submission
    // and the confirmation wait have both run out.
    let owned = config.ledger.submit_budget() + config.ledger.confirmation_timeout();
    let owned_secs = owned.as_secs() + u64::from(owned.subsec_nanos() > 0);
    if reconcile.provisional_timeout_secs < 0 || (reconcile.provisional_timeout_secs as u64) < owned_secs {
        errors.push(ConfigError::invalid(
            "reconcile.provisional_timeout_secs",
            format!(
                "{} is shorter than a submitter's worst case of {owned_secs}s \
                 (ledger retries plus ledger.confirmation_timeout_ms)",
                reconcile.provisional_timeout_secs
            ),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(errors: &[ConfigError]) -> Vec<String> {
        errors
            .iter()
            .filter_map(|e| match e {
                ConfigError::Validation { key, .. } => Some(key.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&RollcallConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_problem() {
        let mut config = RollcallConfig::default();
        config.storage.database_path = " ".into();
        config.ledger.max_attempts = 0;
        config.engine.default_session_secs = 0;
        let errors = validate_config(&config).unwrap_err();
        let keys = keys(&errors);
        assert!(keys.contains(&"storage.database_path".to_string()));
        assert!(keys.contains(&"ledger.max_attempts".to_string()));
        assert!(keys.contains(&"engine.default_session_secs".to_string()));
    }

    #[test]
    fn rejects_non_http_endpoint() {
        let mut config = RollcallConfig::default();
        config.ledger.endpoint = "ws://node:8546".into();
        assert_eq!(keys(&validate_config(&config).unwrap_err()), vec!["ledger.endpoint"]);
    }

    #[test]
    fn rejects_default_session_longer_than_max() {
        let mut config = RollcallConfig::default();
        config.engine.default_session_secs = 7200;
        config.engine.max_session_secs = 3600;
        assert_eq!(
            keys(&validate_config(&config).unwrap_err()),
            vec!["engine.default_session_secs"]
        );
    }

    #[test]
    fn provisional_timeout_must_cover_submit_retries() {
        let mut config = RollcallConfig::default();
        config.ledger.max_attempts = 10;
        config.ledger.request_timeout_ms = 10_000;
        config.ledger.max_backoff_ms = 5_000;
        config.ledger.jitter_pct = 0.0;
        // 11 requests + 9 sleeps + the confirmation wait = 110 + 45 + 15 s.
        assert_eq!(config.ledger.submit_budget().as_secs(), 155);
        config.reconcile.provisional_timeout_secs = 169;
        assert_eq!(
            keys(&validate_config(&config).unwrap_err()),
            vec!["reconcile.provisional_timeout_secs"]
        );
        config.reconcile.provisional_timeout_secs = 170;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn provisional_timeout_must_cover_confirmation_wait() {
        let mut config = RollcallConfig::default();
        config.ledger.confirmation_timeout_ms = 30_000;
        config.reconcile.provisional_timeout_secs = 20;
        assert_eq!(
            keys(&validate_config(&config).unwrap_err()),
            vec!["reconcile.provisional_timeout_secs"]
        );
    }

    #[test]
    fn evidence_urls_must_be_http() {
        let mut config = RollcallConfig::default();
        config.evidence.ipfs_api_url = "127.0.0.1:5001".into();
        config.evidence.gateway_urls.push("ipfs://gateway".into());
        config.evidence.pinata_jwt = Some("  ".into());
        let mut keys = keys(&validate_config(&config).unwrap_err());
        keys.sort();
        assert_eq!(
            keys,
            vec![
                "evidence.gateway_urls",
                "evidence.ipfs_api_url",
                "evidence.pinata_jwt"
            ]
        );
    }

    #[test]
    fn rejects_bad_host_and_log_level() {
        let mut config = RollcallConfig::default();
        config.gateway.host = "bad host!".into();
        config.service.log_level = "verbose".into();
        let keys = keys(&validate_config(&config).unwrap_err());
        assert!(keys.contains(&"gateway.host".to_string()));
        assert!(keys.contains(&"service.log_level".to_string()));
    }
}
