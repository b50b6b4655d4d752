// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway API.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rollcall_core::{
    AttendanceRecord, HealthStatus, MarkOutcome, RecordFilter, RecordState, RollcallError,
    Session, SessionStatus,
};
use rollcall_engine::SessionCheck;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::server::GatewayState;

/// Request body for POST /v1/sessions.
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub class_id: String,
    #[serde(default)]
    pub duration_secs: Option<i64>,
}

/// A session plus the QR token students scan.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    #[serde(flatten)]
    pub session: Session,
    pub token: String,
    pub status: SessionStatus,
}

/// Response body for GET /v1/sessions/{code}.
#[derive(Debug, Serialize)]
pub struct SessionDetailResponse {
    #[serde(flatten)]
    pub session: SessionResponse,
    /// Local expiry and, when reachable, the ledger both say the session is open.
    pub valid: bool,
}

#[derive(Debug, Deserialize)]
pub struct SessionListQuery {
    #[serde(default)]
    pub class_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionResponse>,
}

/// Request body for POST /v1/attendance.
#[derive(Debug, Deserialize)]
pub struct MarkRequest {
    pub token: String,
    pub student_id: String,
}

/// Response body for POST /v1/attendance.
#[derive(Debug, Serialize)]
pub struct MarkResponse {
    /// Outcome label: recorded, already_recorded, expired, invalid, pending,
    /// rejected, or ledger_unavailable.
    pub outcome: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<AttendanceRecord>,
}

/// Query string for GET /v1/attendance.
#[derive(Debug, Default, Deserialize)]
pub struct RecordQuery {
    pub session_code: Option<String>,
    pub class_id: Option<String>,
    pub student_id: Option<String>,
    pub state: Option<RecordState>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct RecordListResponse {
    pub records: Vec<AttendanceRecord>,
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub storage: String,
    pub ledger: String,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// A [`RollcallError`] rendered as an HTTP error.
pub struct ApiError(pub RollcallError);

impl From<RollcallError> for ApiError {
    fn from(err: RollcallError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            RollcallError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            RollcallError::NotFound(_) => StatusCode::NOT_FOUND,
            RollcallError::LedgerUnavailable { .. } | RollcallError::Timeout { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            RollcallError::LedgerRejected { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            RollcallError::Ledger { .. } | RollcallError::Evidence { .. } => StatusCode::BAD_GATEWAY,
            _ => {
                error!(error = %self.0, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

fn session_response(state: &GatewayState, session: Session) -> SessionResponse {
    SessionResponse {
        token: session.token().to_string(),
        status: state.sessions.status(&session),
        session,
    }
}

/// POST /v1/sessions
///
/// Issues a session. Nothing is stored unless the ledger confirms it.
pub async fn post_session(
    State(state): State<GatewayState>,
    Json(body): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let session = state
        .sessions
        .create_session(&body.class_id, body.duration_secs)
        .await?;
    Ok((StatusCode::CREATED, Json(session_response(&state, session))))
}

/// GET /v1/sessions
pub async fn get_sessions(
    State(state): State<GatewayState>,
    Query(query): Query<SessionListQuery>,
) -> Result<Json<SessionListResponse>, ApiError> {
    let sessions = state
        .sessions
        .list_sessions(query.class_id.as_deref())
        .await?
        .into_iter()
        .map(|s| session_response(&state, s))
        .collect();
    Ok(Json(SessionListResponse { sessions }))
}

/// GET /v1/sessions/{code}
pub async fn get_session(
    State(state): State<GatewayState>,
    Path(code): Path<String>,
) -> Result<Json<SessionDetailResponse>, ApiError> {
    let (session, valid) = match state.sessions.check(&code).await? {
        SessionCheck::Unknown => {
            return Err(RollcallError::NotFound(format!("session `{code}`")).into());
        }
        SessionCheck::Expired(session) => (session, false),
        SessionCheck::Valid(session) => (session, true),
    };
    Ok(Json(SessionDetailResponse {
        session: session_response(&state, session),
        valid,
    }))
}

/// POST /v1/attendance
///
/// 200 recorded / already_recorded, 202 pending, 400 expired / invalid,
/// 503 rejected / ledger_unavailable.
pub async fn post_attendance(
    State(state): State<GatewayState>,
    Json(body): Json<MarkRequest>,
) -> Response {
    let outcome = match state
        .recorder
        .mark_attendance(&body.token, &body.student_id)
        .await
    {
        Ok(outcome) => outcome,
        Err(RollcallError::LedgerUnavailable { message }) => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(MarkResponse {
                    outcome: "ledger_unavailable".to_string(),
                    message,
                    record: None,
                }),
            )
                .into_response();
        }
        Err(e) => return ApiError(e).into_response(),
    };

    let label = outcome.label().to_string();
    let (status, message, record) = match outcome {
        MarkOutcome::Recorded(record) => (StatusCode::OK, "attendance recorded".to_string(), Some(record)),
        MarkOutcome::AlreadyRecorded(record) => (
            StatusCode::OK,
            "attendance was already recorded".to_string(),
            Some(record),
        ),
        MarkOutcome::ConfirmationPending(record) => (
            StatusCode::ACCEPTED,
            "submitted, verifying on ledger".to_string(),
            Some(record),
        ),
        MarkOutcome::Expired => (StatusCode::BAD_REQUEST, "session has expired".to_string(), None),
        MarkOutcome::Invalid(reason) => (StatusCode::BAD_REQUEST, reason, None),
        MarkOutcome::Rejected(reason) => (StatusCode::SERVICE_UNAVAILABLE, reason, None),
    };
    (
        status,
        Json(MarkResponse {
            outcome: label,
            message,
            record,
        }),
    )
        .into_response()
}

/// GET /v1/attendance
pub async fn get_attendance(
    State(state): State<GatewayState>,
    Query(query): Query<RecordQuery>,
) -> Result<Json<RecordListResponse>, ApiError> {
    if query.limit.is_some_and(|l| l <= 0) {
        return Err(RollcallError::InvalidInput("limit must be positive".into()).into());
    }
    let filter = RecordFilter {
        session_code: query.session_code,
        class_id: query.class_id,
        student_id: query.student_id,
        state: query.state,
        limit: query.limit,
    };
    let records = state.store.list_records(&filter).await?;
    Ok(Json(RecordListResponse { records }))
}

fn describe(status: &HealthStatus) -> String {
    match status {
        HealthStatus::Healthy => "healthy".to_string(),
        HealthStatus::Degraded(reason) => format!("degraded: {reason}"),
        HealthStatus::Unhealthy(reason) => format!("unhealthy: {reason}"),
    }
}

/// GET /health
///
/// 200 while the local cache is usable, even if the ledger is not; scans
/// then fail with 503 on their own.
pub async fn get_health(State(state): State<GatewayState>) -> (StatusCode, Json<HealthResponse>) {
    let storage = state
        .store
        .health_check()
        .await
        .unwrap_or_else(|e| HealthStatus::Unhealthy(e.to_string()));
    let ledger = state.ledger.health_check().await;

    let (code, status) = match (&storage, &ledger) {
        (HealthStatus::Unhealthy(_), _) => (StatusCode::SERVICE_UNAVAILABLE, "unhealthy"),
        (HealthStatus::Healthy, HealthStatus::Healthy) => (StatusCode::OK, "ok"),
        _ => (StatusCode::OK, "degraded"),
    };
    (
        code,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: state.health.start_time.elapsed().as_secs(),
            storage: describe(&storage),
            ledger: describe(&ledger),
        }),
    )
}

/// GET /metrics
///
/// Prometheus text exposition, or 404 when no recorder is installed.
pub async fn get_metrics(State(state): State<GatewayState>) -> Response {
    match &state.health.prometheus_render {
        Some(render) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "metrics not enabled".to_string(),
            }),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_duration_is_optional() {
        let req: CreateSessionRequest = serde_json::from_str(r#"{"class_id": "CLS1"}"#).unwrap();
        assert_eq!(req.class_id, "CLS1");
        assert!(req.duration_secs.is_none());
    }

    #[test]
    fn session_response_flattens_session() {
        let session = Session::new("abc".into(), "CLS1".into(), 100, 300);
        let resp = SessionResponse {
            token: session.token().to_string(),
            status: SessionStatus::Active,
            session,
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["session_code"], "abc");
        assert_eq!(json["expires_at"], 400);
        assert_eq!(json["token"], "CLS1|abc|400");
        assert_eq!(json["status"], "active");
    }

    #[test]
    fn api_errors_map_to_status_codes() {
        let cases = [
            (RollcallError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (RollcallError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                RollcallError::LedgerUnavailable {
                    message: "down".into(),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (RollcallError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).into_response().status(), status);
        }
    }

    #[test]
    fn mark_response_omits_missing_record() {
        let resp = MarkResponse {
            outcome: "expired".into(),
            message: "session has expired".into(),
            record: None,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(!json.contains("record"));
    }
}
