// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory [`EvidenceStore`] with a failure switch.

use std::collections::HashMap;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use rollcall_core::{EvidenceDocument, EvidenceStore, RollcallError};

#[derive(Default)]
struct EvidenceState {
    documents: HashMap<String, EvidenceDocument>,
    failing: bool,
    pins: u32,
}

/// Content-addressed map keyed by a hash of the serialized document.
#[derive(Default)]
pub struct MockEvidence {
    state: Mutex<EvidenceState>,
}

impl MockEvidence {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every pin fails as an unreachable pinning service would.
    pub async fn set_failing(&self, failing: bool) {
        self.state.lock().await.failing = failing;
    }

    /// Pin calls made so far, failed ones included.
    pub async fn pins(&self) -> u32 {
        self.state.lock().await.pins
    }

    pub async fn pinned(&self) -> usize {
        self.state.lock().await.documents.len()
    }
}

#[async_trait]
impl EvidenceStore for MockEvidence {
    async fn pin(&self, document: &EvidenceDocument) -> Result<String, RollcallError> {
        let mut state = self.state.lock().await;
        state.pins += 1;
        if state.failing {
            return Err(RollcallError::Evidence {
                message: "pinning service unreachable".into(),
                source: None,
            });
        }
        let bytes = serde_json::to_vec(document).map_err(|e| RollcallError::Evidence {
            message: e.to_string(),
            source: Some(Box::new(e)),
        })?;
        let cid = format!("bafy{}", hex::encode(&Sha256::digest(&bytes)[..16]));
        state.documents.insert(cid.clone(), document.clone());
        Ok(cid)
    }

    async fn fetch(&self, cid: &str) -> Result<Option<EvidenceDocument>, RollcallError> {
        Ok(self.state.lock().await.documents.get(cid).cloned())
    }
}
