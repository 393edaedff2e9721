//! OpenAPI specification generation for the blescan API.
//!
//! Served at `/api/openapi.json` and written to disk by the `gen-openapi` binary
//! for client generation.

use axum::Json;
use blescan_core::{
    ControllerStatus, Notice, NoticeLevel, PendingPrompt, Permission, PermissionPolicy,
    PermissionStatus, ResultRow, ScanFilter, ScanMode, ScanSettings, ViewEvent,
};
use utoipa::OpenApi;

use super::error::ErrorResponse;
use super::health::HealthResponse;
use super::permissions::{
    AnswerPromptRequest, AnswerPromptResponse, PermissionEntry, PermissionsResponse,
};
use super::radio::{RadioChangeResponse, RadioResponse};
use super::results::ResultsResponse;
use super::scan::ScanResponse;

/// Serve the OpenAPI specification as JSON.
pub async fn get_openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Returns the OpenAPI specification as pretty JSON.
///
/// # Errors
///
/// Returns an error if the document cannot be serialized.
pub fn get_openapi_json() -> Result<String, serde_json::Error> {
    ApiDoc::openapi().to_pretty_json()
}

/// Main OpenAPI document structure for blescan.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "blescan API",
        version = "0.1.0",
        description = r#"
# blescan API

A Bluetooth Low Energy scanner.

## Overview

1. **Radio**: turn the adapter on or off. Pressing a button for the state the
   radio is already in is not an error; the response says nothing changed.
2. **Scan**: start, stop or toggle a scan session. Each session starts with an
   empty list.
3. **Results**: one row per device address, updated in place as new
   advertisements arrive. `GET /api/results/events` streams row-level changes.
4. **Permissions**: scans need runtime permissions. With a `prompt` policy the
   scan start waits until a client answers the prompt.
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/", description = "Local blescan server")
    ),
    tags(
        (name = "system", description = "Health checks"),
        (name = "radio", description = "Bluetooth radio power"),
        (name = "scan", description = "Scan sessions"),
        (name = "results", description = "The per-device result list and its change feed"),
        (name = "permissions", description = "Runtime permissions and prompts")
    ),
    paths(
        super::health::health_check,
        super::radio::get_radio,
        super::radio::enable_radio,
        super::radio::disable_radio,
        super::scan::get_scan,
        super::scan::start_scan,
        super::scan::stop_scan,
        super::scan::toggle_scan,
        super::results::get_results,
        super::results::stream_events,
        super::permissions::get_permissions,
        super::permissions::answer_prompt,
    ),
    components(
        schemas(
            // Error types
            ErrorResponse,
            // Health types
            HealthResponse,
            // Radio types
            RadioResponse,
            RadioChangeResponse,
            Notice,
            NoticeLevel,
            // Scan types
            ScanResponse,
            ControllerStatus,
            ScanSettings,
            ScanMode,
            ScanFilter,
            // Result types
            ResultsResponse,
            ResultRow,
            ViewEvent,
            // Permission types
            PermissionsResponse,
            PermissionEntry,
            Permission,
            PermissionPolicy,
            PermissionStatus,
            PendingPrompt,
            AnswerPromptRequest,
            AnswerPromptResponse,
        )
    )
)]
pub struct ApiDoc;
