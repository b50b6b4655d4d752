// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! IPFS pinning for confirmed attendance evidence.
//!
//! | step     | request                                                  |
//! |----------|----------------------------------------------------------|
//! | pin      | `POST {pinata}/pinning/pinJSONToIPFS` -> `{"IpfsHash"}`  |
//! | fallback | `POST {node}/api/v0/add?pin=true` multipart, NDJSON back |
//! | fetch    | `GET {gateway}/ipfs/{cid}` for each gateway in order     |
//!
//! Pinata is only tried when a token is configured. Any Pinata failure
//! falls through to the local node.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::multipart::{Form, Part};
use rollcall_config::EvidenceConfig;
use rollcall_core::{EvidenceDocument, EvidenceStore, RollcallError};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

#[derive(Deserialize)]
struct PinataResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
}

struct Pinata {
    url: String,
    auth: HeaderValue,
}

/// [`EvidenceStore`] backed by Pinata and/or an IPFS node over `reqwest`.
pub struct IpfsEvidenceStore {
    client: reqwest::Client,
    pinata: Option<Pinata>,
    ipfs_api_url: String,
    gateway_urls: Vec<String>,
}

impl IpfsEvidenceStore {
    pub fn new(config: &EvidenceConfig) -> Result<Self, RollcallError> {
        let pinata = match config.pinata_jwt.as_deref() {
            Some(jwt) => {
                let mut auth = HeaderValue::from_str(&format!("Bearer {jwt}"))
                    .map_err(|e| RollcallError::Config(format!("invalid Pinata token: {e}")))?;
                auth.set_sensitive(true);
                Some(Pinata {
                    url: config.pinata_url.trim_end_matches('/').to_string(),
                    auth,
                })
            }
            None => None,
        };

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| evidence_error("failed to build HTTP client", e))?;

        Ok(Self {
            client,
            pinata,
            ipfs_api_url: config.ipfs_api_url.trim_end_matches('/').to_string(),
            gateway_urls: config
                .gateway_urls
                .iter()
                .map(|url| url.trim_end_matches('/').to_string())
                .collect(),
        })
    }

    async fn pin_with_pinata(
        &self,
        pinata: &Pinata,
        document: &EvidenceDocument,
    ) -> Result<String, RollcallError> {
        let body = serde_json::json!({
            "pinataContent": document,
            "pinataMetadata": {
                "name": format!("attendance_{}_{}", document.session_code, document.student_id),
            },
        });
        let response = self
            .client
            .post(format!("{}/pinning/pinJSONToIPFS", pinata.url))
            .header(AUTHORIZATION, pinata.auth.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| evidence_error("Pinata request failed", e))?
            .error_for_status()
            .map_err(|e| evidence_error("Pinata refused the pin", e))?;
        let pinned: PinataResponse = response
            .json()
            .await
            .map_err(|e| evidence_error("unreadable Pinata response", e))?;
        Ok(pinned.ipfs_hash)
    }

    async fn pin_with_node(&self, document: &EvidenceDocument) -> Result<String, RollcallError> {
        let bytes = serde_json::to_vec(document)
            .map_err(|e| evidence_error("failed to encode evidence", e))?;
        let part = Part::bytes(bytes)
            .file_name("data.json")
            .mime_str("application/json")
            .map_err(|e| evidence_error("invalid multipart part", e))?;
        let text = self
            .client
            .post(format!("{}/api/v0/add?pin=true", self.ipfs_api_url))
            .multipart(Form::new().part("file", part))
            .send()
            .await
            .map_err(|e| evidence_error("IPFS node request failed", e))?
            .error_for_status()
            .map_err(|e| evidence_error("IPFS node refused the add", e))?
            .text()
            .await
            .map_err(|e| evidence_error("unreadable IPFS node response", e))?;

        last_cid(&text).ok_or_else(|| RollcallError::Evidence {
            message: format!("no CID in IPFS add response: {}", text.trim()),
            source: None,
        })
    }
}

#[async_trait]
impl EvidenceStore for IpfsEvidenceStore {
    async fn pin(&self, document: &EvidenceDocument) -> Result<String, RollcallError> {
        if let Some(pinata) = &self.pinata {
            match self.pin_with_pinata(pinata, document).await {
                Ok(cid) => {
                    info!(cid = %cid, session = %document.session_code, "evidence pinned via Pinata");
                    return Ok(cid);
                }
                Err(e) => info!(error = %e, "Pinata pin failed, falling back to IPFS node"),
            }
        }
        let cid = self.pin_with_node(document).await?;
        info!(cid = %cid, session = %document.session_code, "evidence pinned via IPFS node");
        Ok(cid)
    }

    async fn fetch(&self, cid: &str) -> Result<Option<EvidenceDocument>, RollcallError> {
        if cid.is_empty() || !cid.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(RollcallError::InvalidInput(format!("`{cid}` is not a CID")));
        }
        for gateway in &self.gateway_urls {
            let url = format!("{gateway}/ipfs/{cid}");
            let response = match self.client.get(&url).send().await {
                Ok(response) if response.status().is_success() => response,
                Ok(response) => {
                    debug!(%url, status = %response.status(), "gateway miss");
                    continue;
                }
                Err(e) => {
                    debug!(%url, error = %e, "gateway unreachable");
                    continue;
                }
            };
            match response.json::<EvidenceDocument>().await {
                Ok(document) => return Ok(Some(document)),
                Err(e) => warn!(%url, error = %e, "gateway returned a non-evidence body"),
            }
        }
        Ok(None)
    }
}

/// The CID from the last NDJSON line carrying `Hash` or `Cid`.
///
/// Older nodes answer `{"Hash":"Qm.."}`, newer ones `{"Cid":{"/":"bafy.."}}`
/// or `{"Cid":"bafy.."}`.
fn last_cid(ndjson: &str) -> Option<String> {
    ndjson
        .lines()
        .filter_map(|line| serde_json::from_str::<Value>(line.trim()).ok())
        .filter_map(|line| {
            if let Some(hash) = line.get("Hash").and_then(Value::as_str) {
                if !hash.is_empty() {
                    return Some(hash.to_string());
                }
            }
            match line.get("Cid")? {
                Value::String(cid) => Some(cid.clone()),
                Value::Object(link) => link.get("/").and_then(Value::as_str).map(str::to_string),
                _ => None,
            }
        })
        .last()
}

fn evidence_error(context: &str, e: impl std::error::Error + Send + Sync + 'static) -> RollcallError {
    RollcallError::Evidence {
        message: format!("{context}: {e}"),
        source: Some(Box::new(e)),
    }
}
