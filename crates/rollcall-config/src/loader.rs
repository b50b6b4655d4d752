// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered config loading with Figment.
//!
//! Merge order, later wins: compiled defaults, `/etc/rollcall/rollcall.toml`,
//! `~/.config/rollcall/rollcall.toml`, `./rollcall.toml`, then `ROLLCALL_*`
//! environment variables.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::RollcallConfig;

const SYSTEM_CONFIG: &str = "/etc/rollcall/rollcall.toml";
const LOCAL_CONFIG: &str = "rollcall.toml";

/// Candidate config files, lowest precedence first.
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(SYSTEM_CONFIG)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("rollcall").join("rollcall.toml"));
    }
    paths.push(PathBuf::from(LOCAL_CONFIG));
    paths
}

/// Builds the full layered Figment without extracting it.
pub fn build_figment() -> Figment {
    let mut figment = Figment::new().merge(Serialized::defaults(RollcallConfig::default()));
    for path in config_paths() {
        figment = figment.merge(Toml::file(path));
    }
    figment.merge(env_provider())
}

pub fn load_config() -> Result<RollcallConfig, figment::Error> {
    build_figment().extract()
}

/// Defaults plus one TOML string. No files, no environment.
pub fn load_config_from_str(toml_content: &str) -> Result<RollcallConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RollcallConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Defaults, one explicit file, then environment overrides.
pub fn load_config_from_path(path: &Path) -> Result<RollcallConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RollcallConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Maps `ROLLCALL_SECTION_KEY` to `section.key`.
///
/// Only the first underscore after a known section prefix becomes a dot, so
/// `ROLLCALL_LEDGER_API_KEY` lands on `ledger.api_key`.
pub(crate) fn env_provider() -> Env {
    Env::prefixed("ROLLCALL_").map(|key| map_env_key(key.as_str()).into())
}

const SECTIONS: &[&str] = &[
    "service",
    "storage",
    "ledger",
    "engine",
    "reconcile",
    "gateway",
    "evidence",
];

pub(crate) fn map_env_key(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_split_on_section_only() {
        assert_eq!(map_env_key("ledger_api_key"), "ledger.api_key");
        assert_eq!(
            map_env_key("reconcile_provisional_timeout_secs"),
            "reconcile.provisional_timeout_secs"
        );
        assert_eq!(map_env_key("GATEWAY_PORT"), "gateway.port");
        assert_eq!(map_env_key("EVIDENCE_PINATA_JWT"), "evidence.pinata_jwt");
        assert_eq!(map_env_key("unknown_thing"), "unknown_thing");
    }

    #[test]
    fn local_file_has_highest_file_precedence() {
        let paths = config_paths();
        assert_eq!(paths.first(), Some(&PathBuf::from(SYSTEM_CONFIG)));
        assert_eq!(paths.last(), Some(&PathBuf::from(LOCAL_CONFIG)));
    }
}
