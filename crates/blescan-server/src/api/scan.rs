//! Scan control endpoints: the scan button and its explicit halves.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use blescan_core::{ControllerStatus, Notice, ScanOutcome, ScanReport};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::error::ApiResult;
use crate::state::SharedState;

/// Creates the scan router.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(get_scan))
        .route("/start", post(start_scan))
        .route("/stop", post(stop_scan))
        .route("/toggle", post(toggle_scan))
}

/// Outcome of a scan button press.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "scanning": true,
    "changed": true,
    "session_id": "01928c5e-7f3a-7d2b-9c4e-2a1b3c4d5e6f",
    "notices": [
        {"level": "info", "message": "Location permission granted"},
        {"level": "info", "message": "Scanning started"}
    ]
}))]
pub struct ScanResponse {
    /// Whether a scan runs after the press.
    #[schema(example = true)]
    pub scanning: bool,

    /// Whether the press started or stopped a session.
    #[schema(example = true)]
    pub changed: bool,

    /// Session started, stopped or already running.
    pub session_id: Option<Uuid>,

    /// Messages for the user, in order.
    pub notices: Vec<Notice>,
}

impl From<ScanReport> for ScanResponse {
    fn from(report: ScanReport) -> Self {
        let (changed, session_id) = match report.outcome {
            ScanOutcome::Started { session_id } => (true, Some(session_id)),
            ScanOutcome::Stopped { session_id } => (true, session_id),
            ScanOutcome::AlreadyScanning { session_id } => (false, session_id),
            ScanOutcome::NotScanning => (false, None),
        };

        Self {
            scanning: report.outcome.scanning(),
            changed,
            session_id,
            notices: report.notices,
        }
    }
}

/// Get the scanner state.
#[utoipa::path(
    get,
    path = "/api/scan",
    tag = "scan",
    operation_id = "getScanStatus",
    summary = "Get scanner state",
    responses(
        (status = 200, description = "Scanner state", body = ControllerStatus),
        (status = 503, description = "Bluetooth service unavailable", body = crate::api::ErrorResponse)
    )
)]
pub async fn get_scan(State(state): State<SharedState>) -> ApiResult<Json<ControllerStatus>> {
    Ok(Json(state.controller.status().await?))
}

/// Start scanning.
#[utoipa::path(
    post,
    path = "/api/scan/start",
    tag = "scan",
    operation_id = "startScan",
    summary = "Start a scan session",
    description = "Checks the required permissions, clears the result list and starts \
        scanning. If a permission is set to prompt, this request waits until the prompt \
        is answered via `POST /api/permissions/{name}` or times out.",
    responses(
        (status = 200, description = "Scanning (started now or already running)", body = ScanResponse),
        (status = 403, description = "A required permission was refused", body = crate::api::ErrorResponse),
        (status = 409, description = "Bluetooth is off", body = crate::api::ErrorResponse),
        (status = 503, description = "The adapter refused to scan", body = crate::api::ErrorResponse)
    )
)]
pub async fn start_scan(State(state): State<SharedState>) -> ApiResult<Json<ScanResponse>> {
    Ok(Json(state.controller.start_scan().await?.into()))
}

/// Stop scanning.
#[utoipa::path(
    post,
    path = "/api/scan/stop",
    tag = "scan",
    operation_id = "stopScan",
    summary = "Stop the scan session",
    description = "Stops the running session. The result list is kept.",
    responses(
        (status = 200, description = "Not scanning", body = ScanResponse),
        (status = 503, description = "The adapter failed to stop", body = crate::api::ErrorResponse)
    )
)]
pub async fn stop_scan(State(state): State<SharedState>) -> ApiResult<Json<ScanResponse>> {
    Ok(Json(state.controller.stop_scan().await?.into()))
}

/// Press the scan button.
#[utoipa::path(
    post,
    path = "/api/scan/toggle",
    tag = "scan",
    operation_id = "toggleScan",
    summary = "Toggle scanning",
    description = "Stops the session if one is running, otherwise starts one.",
    responses(
        (status = 200, description = "Toggled", body = ScanResponse),
        (status = 403, description = "A required permission was refused", body = crate::api::ErrorResponse),
        (status = 409, description = "Bluetooth is off", body = crate::api::ErrorResponse),
        (status = 503, description = "The adapter refused to scan", body = crate::api::ErrorResponse)
    )
)]
pub async fn toggle_scan(State(state): State<SharedState>) -> ApiResult<Json<ScanResponse>> {
    Ok(Json(state.controller.toggle_scan().await?.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_scanning_is_unchanged() {
        let id = Uuid::now_v7();
        let response = ScanResponse::from(ScanReport {
            outcome: ScanOutcome::AlreadyScanning {
                session_id: Some(id),
            },
            notices: vec![Notice::info("Already scanning")],
        });

        assert!(response.scanning);
        assert!(!response.changed);
        assert_eq!(response.session_id, Some(id));
    }

    #[test]
    fn test_stopped_is_a_change() {
        let response = ScanResponse::from(ScanReport {
            outcome: ScanOutcome::Stopped { session_id: None },
            notices: vec![],
        });

        assert!(!response.scanning);
        assert!(response.changed);
    }
}
