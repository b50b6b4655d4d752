// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Rollcall attendance engine.
//!
//! TOML files are merged over compiled defaults in XDG order, then
//! `ROLLCALL_*` environment variables are applied. Unknown keys are rejected
//! and rendered as miette diagnostics with typo suggestions.
//!
//! ```no_run
//! use rollcall_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("ledger: {}", config.ledger.endpoint);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

use std::path::Path;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{
    EngineConfig, EvidenceConfig, GatewayConfig, LedgerConfig, PendingPolicy, ReconcileConfig, RollcallConfig,
    ServiceConfig, StorageConfig,
};

/// Loads configuration from the standard hierarchy and validates it.
pub fn load_and_validate() -> Result<RollcallConfig, Vec<ConfigError>> {
    finish(loader::load_config(), collect_toml_sources)
}

/// Loads configuration from one explicit file plus env overrides, and validates it.
pub fn load_and_validate_path(path: &Path) -> Result<RollcallConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_path(path), || {
        std::fs::read_to_string(path)
            .map(|content| vec![(path.display().to_string(), content)])
            .unwrap_or_default()
    })
}

/// Loads configuration from an inline TOML string and validates it.
pub fn load_and_validate_str(toml_content: &str) -> Result<RollcallConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_str(toml_content), || {
        vec![("<inline>".to_string(), toml_content.to_string())]
    })
}

fn finish(
    loaded: Result<RollcallConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<(String, String)>,
) -> Result<RollcallConfig, Vec<ConfigError>> {
    match loaded {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(err, &sources())),
    }
}

/// Reads every config file that exists, for source spans in diagnostics.
fn collect_toml_sources() -> Vec<(String, String)> {
    let mut sources = Vec::new();

    for path in loader::config_paths() {
        if let Ok(content) = std::fs::read_to_string(&path) {
            let shown = if path.is_relative() {
                std::env::current_dir()
                    .map(|d| d.join(&path).display().to_string())
                    .unwrap_or_else(|_| path.display().to_string())
            } else {
                path.display().to_string()
            };
            sources.push((shown, content));
        }
    }

    sources
}
