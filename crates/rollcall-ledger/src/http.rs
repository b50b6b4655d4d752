// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON-over-HTTP transport to a ledger gateway node.
//!
//! | call                 | request                              |
//! |----------------------|--------------------------------------|
//! | state-changing call  | `POST /v1/{action}` -> `{"txHash"}`  |
//! | receipt              | `GET /v1/receipts/{hash}` (404 = unmined) |
//! | read-only query      | `POST /v1/query/{name}`              |
//! | sequence refresh     | `POST /v1/sequence/refresh`          |
//!
//! HTTP 409 is a sequence conflict, 422 with `{"reason"}` is a contract
//! revert, and 429/5xx are transient.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use rollcall_config::LedgerConfig;
use rollcall_core::{
    HealthStatus, LedgerCall, LedgerQuery, LedgerTransport, QueryValue, RollcallError,
    TransportError, TxReceipt,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendResponse {
    tx_hash: String,
}

#[derive(Deserialize)]
struct RevertBody {
    reason: String,
}

/// [`LedgerTransport`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpLedgerTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpLedgerTransport {
    pub fn new(config: &LedgerConfig) -> Result<Self, RollcallError> {
        Self::with_endpoint(
            &config.endpoint,
            config.api_key.as_deref(),
            config.request_timeout(),
        )
    }

    pub fn with_endpoint(
        endpoint: &str,
        api_key: Option<&str>,
        request_timeout: Duration,
    ) -> Result<Self, RollcallError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = api_key {
            let mut value = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| RollcallError::Config(format!("invalid ledger API key: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(request_timeout)
            .build()
            .map_err(|e| RollcallError::Ledger {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, TransportError>
    where
        B: serde::Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(request_error)?;
        decode(response).await
    }
}

#[async_trait]
impl LedgerTransport for HttpLedgerTransport {
    async fn send(&self, call: &LedgerCall) -> Result<String, TransportError> {
        let response: SendResponse = self
            .post_json(&format!("v1/{}", call.name()), call)
            .await?;
        Ok(response.tx_hash)
    }

    async fn receipt(&self, tx_hash: &str) -> Result<Option<TxReceipt>, TransportError> {
        let response = self
            .client
            .get(self.url(&format!("v1/receipts/{tx_hash}")))
            .send()
            .await
            .map_err(request_error)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        decode(response).await.map(Some)
    }

    async fn query(&self, query: &LedgerQuery) -> Result<QueryValue, TransportError> {
        self.post_json(&format!("v1/query/{}", query.name()), query)
            .await
    }

    async fn refresh_sequence(&self) -> Result<(), TransportError> {
        let response = self
            .client
            .post(self.url("v1/sequence/refresh"))
            .send()
            .await
            .map_err(request_error)?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(status_error(status, &body))
        }
    }

    async fn health_check(&self) -> HealthStatus {
        match self.client.get(self.url("health")).send().await {
            Ok(response) if response.status().is_success() => HealthStatus::Healthy,
            Ok(response) => HealthStatus::Degraded(format!("ledger node returned {}", response.status())),
            Err(e) => HealthStatus::Unhealthy(format!("ledger node unreachable: {e}")),
        }
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, TransportError> {
    let status = response.status();
    let body = response.text().await.map_err(request_error)?;
    debug!(status = %status, bytes = body.len(), "ledger response received");
    if !status.is_success() {
        return Err(status_error(status, &body));
    }
    serde_json::from_str(&body).map_err(|e| TransportError::Malformed(format!("{e}: {body}")))
}

/// Classifies a non-success HTTP status.
fn status_error(status: StatusCode, body: &str) -> TransportError {
    match status.as_u16() {
        409 => TransportError::SequenceConflict(body.to_string()),
        422 => TransportError::Reverted(
            serde_json::from_str::<RevertBody>(body)
                .map(|b| b.reason)
                .unwrap_or_else(|_| body.to_string()),
        ),
        429 | 500..=599 => TransportError::Busy(format!("{status}: {body}")),
        _ => TransportError::Malformed(format!("unexpected status {status}: {body}")),
    }
}

/// Classifies a failure before any status was received.
fn request_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::TimedOut
    } else if e.is_connect() {
        TransportError::Unreachable(e.to_string())
    } else if e.is_decode() {
        TransportError::Malformed(e.to_string())
    } else {
        // The request may have been written before the failure.
        TransportError::Busy(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport(server: &MockServer, key: Option<&str>) -> HttpLedgerTransport {
        HttpLedgerTransport::with_endpoint(&server.uri(), key, Duration::from_secs(5)).unwrap()
    }

    fn mark() -> LedgerCall {
        LedgerCall::MarkAttendance {
            session_code: "abc123".into(),
            student_id: "stu1".into(),
            class_id: "CLS1".into(),
        }
    }

    #[tokio::test]
    async fn send_posts_action_with_bearer_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/markAttendance"))
            .and(header("authorization", "Bearer k-123"))
            .and(body_partial_json(serde_json::json!({
                "action": "markAttendance",
                "sessionCode": "abc123",
                "studentId": "stu1",
                "classId": "CLS1"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"txHash": "0xaa"})))
            .expect(1)
            .mount(&server)
            .await;

        let tx = transport(&server, Some("k-123")).send(&mark()).await.unwrap();
        assert_eq!(tx, "0xaa");
    }

    #[tokio::test]
    async fn status_codes_are_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/markAttendance"))
            .respond_with(
                ResponseTemplate::new(422)
                    .set_body_json(serde_json::json!({"reason": "Attendance already marked for this session"})),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/markAttendance"))
            .respond_with(ResponseTemplate::new(409).set_body_string("nonce too low"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/markAttendance"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/markAttendance"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad"))
            .mount(&server)
            .await;

        let t = transport(&server, None);
        assert_eq!(
            t.send(&mark()).await,
            Err(TransportError::Reverted(
                "Attendance already marked for this session".into()
            ))
        );
        assert_eq!(
            t.send(&mark()).await,
            Err(TransportError::SequenceConflict("nonce too low".into()))
        );
        assert!(matches!(t.send(&mark()).await, Err(TransportError::Busy(_))));
        assert!(matches!(t.send(&mark()).await, Err(TransportError::Malformed(_))));
    }

    #[tokio::test]
    async fn receipt_404_means_unmined() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/receipts/0xaa"))
            .respond_with(ResponseTemplate::new(404))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/receipts/0xaa"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "txHash": "0xaa",
                "blockHeight": 12,
                "timestamp": 1700000000
            })))
            .mount(&server)
            .await;

        let t = transport(&server, None);
        assert_eq!(t.receipt("0xaa").await.unwrap(), None);
        let receipt = t.receipt("0xaa").await.unwrap().unwrap();
        assert_eq!(receipt.block_height, 12);
        assert!(receipt.revert.is_none());
    }

    #[tokio::test]
    async fn query_decodes_tagged_value() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/query/getRecordByIndex"))
            .and(body_partial_json(serde_json::json!({"query": "getRecordByIndex", "index": 3})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "type": "record",
                "value": {
                    "sessionCode": "abc123",
                    "classId": "CLS1",
                    "studentId": "stu1",
                    "timestamp": 1700000100,
                    "verified": true
                }
            })))
            .mount(&server)
            .await;

        let value = transport(&server, None)
            .query(&LedgerQuery::GetRecordByIndex { index: 3 })
            .await
            .unwrap();
        match value {
            QueryValue::Record(Some(record)) => {
                assert_eq!(record.student_id, "stu1");
                assert!(record.verified);
                assert!(record.tx_hash.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn garbage_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/query/getTotalRecords"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let result = transport(&server, None)
            .query(&LedgerQuery::GetTotalRecords)
            .await;
        assert!(matches!(result, Err(TransportError::Malformed(_))));
    }

    #[tokio::test]
    async fn unreachable_node() {
        // Nothing listens on port 9 on test hosts.
        let t = HttpLedgerTransport::with_endpoint("http://127.0.0.1:9", None, Duration::from_secs(2))
            .unwrap();
        let err = t.send(&mark()).await.unwrap_err();
        assert!(err.is_transient(), "got {err:?}");
        assert!(matches!(t.health_check().await, HealthStatus::Unhealthy(_)));
    }

    #[tokio::test]
    async fn refresh_and_health() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/sequence/refresh"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let t = transport(&server, None);
        t.refresh_sequence().await.unwrap();
        assert_eq!(t.health_check().await, HealthStatus::Healthy);
    }
}
