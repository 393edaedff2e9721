//! Radio control endpoints: the on and off buttons.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use blescan_core::{Notice, RadioOutcome};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::error::ApiResult;
use crate::state::SharedState;

/// Creates the radio router.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(get_radio))
        .route("/enable", post(enable_radio))
        .route("/disable", post(disable_radio))
}

/// Current radio state.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({"enabled": true, "backend": "bluez"}))]
pub struct RadioResponse {
    /// Whether the radio is powered.
    #[schema(example = true)]
    pub enabled: bool,

    /// Bluetooth backend in use.
    #[schema(example = "bluez")]
    pub backend: String,
}

/// Outcome of an on/off press.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "enabled": true,
    "changed": false,
    "notice": {"level": "info", "message": "Bluetooth already on"}
}))]
pub struct RadioChangeResponse {
    /// Power state after the press.
    #[schema(example = true)]
    pub enabled: bool,

    /// Whether the press changed anything.
    #[schema(example = false)]
    pub changed: bool,

    /// Message for the user.
    pub notice: Notice,
}

impl From<RadioOutcome> for RadioChangeResponse {
    fn from(outcome: RadioOutcome) -> Self {
        Self {
            enabled: outcome.enabled(),
            changed: outcome.is_change(),
            notice: outcome.notice(),
        }
    }
}

/// Get the radio state.
#[utoipa::path(
    get,
    path = "/api/radio",
    tag = "radio",
    operation_id = "getRadio",
    summary = "Get Bluetooth radio state",
    responses(
        (status = 200, description = "Radio state", body = RadioResponse),
        (status = 503, description = "Bluetooth service unavailable", body = crate::api::ErrorResponse)
    )
)]
pub async fn get_radio(State(state): State<SharedState>) -> ApiResult<Json<RadioResponse>> {
    Ok(Json(RadioResponse {
        enabled: state.controller.is_radio_enabled().await?,
        backend: state.controller.backend_name().to_string(),
    }))
}

/// Turn the radio on.
#[utoipa::path(
    post,
    path = "/api/radio/enable",
    tag = "radio",
    operation_id = "enableRadio",
    summary = "Turn Bluetooth on",
    description = "Powers the adapter. Pressing on when the radio is already on is \
        not an error: `changed` is false and the notice says so.",
    responses(
        (status = 200, description = "Radio is on", body = RadioChangeResponse),
        (status = 503, description = "Power change failed", body = crate::api::ErrorResponse)
    )
)]
pub async fn enable_radio(
    State(state): State<SharedState>,
) -> ApiResult<Json<RadioChangeResponse>> {
    Ok(Json(state.controller.enable_radio().await?.into()))
}

/// Turn the radio off.
#[utoipa::path(
    post,
    path = "/api/radio/disable",
    tag = "radio",
    operation_id = "disableRadio",
    summary = "Turn Bluetooth off",
    description = "Stops any running scan, then powers the adapter down. Results stay visible.",
    responses(
        (status = 200, description = "Radio is off", body = RadioChangeResponse),
        (status = 503, description = "Power change failed", body = crate::api::ErrorResponse)
    )
)]
pub async fn disable_radio(
    State(state): State<SharedState>,
) -> ApiResult<Json<RadioChangeResponse>> {
    Ok(Json(state.controller.disable_radio().await?.into()))
}
