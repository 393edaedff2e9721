//! HTTP API routes and handlers.
//!
//! Endpoints are organized by domain:
//! - `health` - Service health checks
//! - `radio` - Bluetooth on/off
//! - `scan` - Scan sessions
//! - `results` - The result list and its SSE change feed
//! - `permissions` - Permission states and prompts
//! - `error` - API error types
//! - `openapi` - OpenAPI specification generation

use axum::routing::get;
use axum::Router;

use crate::state::SharedState;

pub mod error;
pub mod health;
pub mod openapi;
pub mod permissions;
pub mod radio;
pub mod results;
pub mod scan;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use openapi::get_openapi_json;

/// Creates the combined API router with all endpoints.
///
/// # Route Structure
///
/// ```text
/// /health                - Health check
/// /api
/// ├── /radio             - Radio state, enable, disable
/// ├── /scan              - Scan state, start, stop, toggle
/// ├── /results           - Result list and /events SSE feed
/// ├── /permissions       - Permission states and prompt answers
/// └── /openapi.json      - OpenAPI specification
/// ```
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .nest("/health", health::router())
        .nest(
            "/api",
            Router::new()
                .nest("/radio", radio::router())
                .nest("/scan", scan::router())
                .nest("/results", results::router())
                .nest("/permissions", permissions::router())
                .route("/openapi.json", get(openapi::get_openapi_spec)),
        )
        .with_state(state)
}
