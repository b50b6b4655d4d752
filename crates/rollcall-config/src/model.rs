// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Rollcall attendance engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Rollcall configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RollcallConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Local cache settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Ledger node connection, retry, and confirmation settings.
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Session issuance and scan handling.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Background reconciliation settings.
    #[serde(default)]
    pub reconcile: ReconcileConfig,

    /// HTTP gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Evidence pinning for confirmed records.
    #[serde(default)]
    pub evidence: EvidenceConfig,
}

/// Service identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Name used in logs and health responses.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "rollcall".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Local cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("rollcall").join("rollcall.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("rollcall.db"))
        .to_string_lossy()
        .to_string()
}

fn default_wal_mode() -> bool {
    true
}

/// Ledger node configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LedgerConfig {
    /// Base URL of the ledger gateway node.
    #[serde(default = "default_ledger_endpoint")]
    pub endpoint: String,

    /// Bearer key for the ledger gateway. `None` sends no auth header.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Upper bound for a single request to the node.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Attempts for transient failures, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First backoff delay; doubles per attempt.
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,

    /// Backoff ceiling.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Random spread applied to each delay, as a fraction of it (0.0 to 1.0).
    #[serde(default = "default_jitter_pct")]
    pub jitter_pct: f64,

    /// How long a submitter waits for a receipt before handing the record
    /// over to reconciliation.
    #[serde(default = "default_confirmation_timeout_ms")]
    pub confirmation_timeout_ms: u64,

    /// Receipt polling interval while awaiting confirmation.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Ask the ledger whether a session is valid before accepting a mark.
    #[serde(default = "default_verify_sessions")]
    pub verify_sessions: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_ledger_endpoint(),
            api_key: None,
            request_timeout_ms: default_request_timeout_ms(),
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            jitter_pct: default_jitter_pct(),
            confirmation_timeout_ms: default_confirmation_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            verify_sessions: default_verify_sessions(),
        }
    }
}

impl LedgerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_millis(self.confirmation_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Longest a single submission can take before the submitter records
    /// its result: every attempt timing out, the extra attempt after a
    /// sequence refresh, and a full jittered backoff between attempts.
    pub fn submit_budget(&self) -> Duration {
        let attempts = u64::from(self.max_attempts);
        let jittered_backoff = (self.max_backoff_ms as f64 * (1.0 + self.jitter_pct.max(0.0))).ceil() as u64;
        let requests = attempts.saturating_add(1).saturating_mul(self.request_timeout_ms);
        let sleeps = attempts.saturating_sub(1).saturating_mul(jittered_backoff);
        Duration::from_millis(requests.saturating_add(sleeps))
    }
}

fn default_ledger_endpoint() -> String {
    "http://127.0.0.1:8545".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_max_attempts() -> u32 {
    4
}

fn default_base_backoff_ms() -> u64 {
    250
}

fn default_max_backoff_ms() -> u64 {
    5_000
}

fn default_jitter_pct() -> f64 {
    0.2
}

fn default_confirmation_timeout_ms() -> u64 {
    15_000
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_verify_sessions() -> bool {
    true
}

/// What a scan reports when the ledger has not confirmed in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingPolicy {
    /// Report `ConfirmationPending` and let the caller poll.
    #[default]
    Report,
    /// Report `Recorded`; reconciliation settles the record later.
    Optimistic,
}

/// Session issuance and scan handling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Session length when the caller does not specify one.
    #[serde(default = "default_session_secs")]
    pub default_session_secs: i64,

    /// Longest session a caller may request.
    #[serde(default = "default_max_session_secs")]
    pub max_session_secs: i64,

    /// Outcome reported for submissions still unconfirmed at the timeout.
    #[serde(default)]
    pub pending_policy: PendingPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_session_secs: default_session_secs(),
            max_session_secs: default_max_session_secs(),
            pending_policy: PendingPolicy::default(),
        }
    }
}

fn default_session_secs() -> i64 {
    300
}

fn default_max_session_secs() -> i64 {
    86_400
}

/// Background reconciliation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReconcileConfig {
    /// Run the reconciliation loop inside `serve`.
    #[serde(default = "default_reconcile_enabled")]
    pub enabled: bool,

    /// Seconds between passes.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Age after which a provisional record is re-checked against the ledger.
    #[serde(default = "default_provisional_timeout_secs")]
    pub provisional_timeout_secs: i64,

    /// Re-submissions attempted before a stuck record is rejected.
    #[serde(default = "default_max_resubmits")]
    pub max_resubmits: u32,

    /// Ledger records and stale provisional records handled per pass.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            enabled: default_reconcile_enabled(),
            interval_secs: default_interval_secs(),
            provisional_timeout_secs: default_provisional_timeout_secs(),
            max_resubmits: default_max_resubmits(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_reconcile_enabled() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    30
}

fn default_provisional_timeout_secs() -> i64 {
    120
}

fn default_max_resubmits() -> u32 {
    1
}

fn default_batch_size() -> u32 {
    500
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Host address to bind.
    #[serde(default = "default_gateway_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_gateway_port")]
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
        }
    }
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    3030
}

/// Content-addressed evidence pinning.
///
/// With a `pinata_jwt` documents go to the Pinata pinning API, otherwise to
/// the `add` endpoint of a local IPFS node.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EvidenceConfig {
    /// Pin a document for every confirmed record.
    #[serde(default)]
    pub enabled: bool,

    /// Pinata API token. Prefer `ROLLCALL_EVIDENCE_PINATA_JWT` over the file.
    #[serde(default)]
    pub pinata_jwt: Option<String>,

    #[serde(default = "default_pinata_url")]
    pub pinata_url: String,

    /// IPFS node HTTP API, used when no Pinata token is set.
    #[serde(default = "default_ipfs_api_url")]
    pub ipfs_api_url: String,

    /// Gateways tried in order when reading a document back.
    #[serde(default = "default_gateway_urls")]
    pub gateway_urls: Vec<String>,

    #[serde(default = "default_evidence_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            pinata_jwt: None,
            pinata_url: default_pinata_url(),
            ipfs_api_url: default_ipfs_api_url(),
            gateway_urls: default_gateway_urls(),
            request_timeout_ms: default_evidence_timeout_ms(),
        }
    }
}

impl EvidenceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn default_pinata_url() -> String {
    "https://api.pinata.cloud".to_string()
}

fn default_ipfs_api_url() -> String {
    "http://127.0.0.1:5001".to_string()
}

fn default_gateway_urls() -> Vec<String> {
    vec![
        "https://gateway.pinata.cloud".to_string(),
        "https://ipfs.io".to_string(),
        "http://127.0.0.1:8080".to_string(),
    ]
}

fn default_evidence_timeout_ms() -> u64 {
    30_000
}
