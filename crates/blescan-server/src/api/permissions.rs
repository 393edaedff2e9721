//! Permission endpoints.
//!
//! With a `prompt` policy, a scan start waits on a pending prompt; a client
//! lists prompts here and answers them.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use blescan_core::{
    Config, Notice, PendingPrompt, Permission, PermissionError, PermissionGate,
    PermissionPolicy, PermissionStatus,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::api::error::{ApiError, ApiResult};
use crate::state::SharedState;

/// Creates the permissions router.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(get_permissions))
        .route("/{name}", post(answer_prompt))
}

/// One permission and its state.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "permission": "location",
    "label": "Location",
    "policy": "prompt",
    "status": "undetermined",
    "required": true
}))]
pub struct PermissionEntry {
    /// Machine name.
    pub permission: Permission,

    /// Display label.
    #[schema(example = "Location")]
    pub label: String,

    /// Configured policy.
    pub policy: PermissionPolicy,

    /// Current state.
    pub status: PermissionStatus,

    /// Whether scans require it.
    #[schema(example = true)]
    pub required: bool,
}

/// All permissions and the prompts waiting for an answer.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PermissionsResponse {
    /// Every known permission.
    pub permissions: Vec<PermissionEntry>,

    /// Prompts waiting for an answer.
    pub pending: Vec<PendingPrompt>,
}

/// Answer to a permission prompt.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({"granted": true}))]
pub struct AnswerPromptRequest {
    /// Whether the user grants the permission.
    #[schema(example = true)]
    pub granted: bool,
}

/// Result of answering a prompt.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "permission": "location",
    "granted": true,
    "notice": {"level": "info", "message": "Location permission granted"}
}))]
pub struct AnswerPromptResponse {
    /// The permission answered.
    pub permission: Permission,

    /// The answer given.
    #[schema(example = true)]
    pub granted: bool,

    /// Message for the user.
    pub notice: Notice,
}

/// List permissions and pending prompts.
#[utoipa::path(
    get,
    path = "/api/permissions",
    tag = "permissions",
    operation_id = "getPermissions",
    summary = "List permissions",
    responses(
        (status = 200, description = "Permission states", body = PermissionsResponse)
    )
)]
pub async fn get_permissions(State(state): State<SharedState>) -> Json<PermissionsResponse> {
    let required = &state.config.scan.required_permissions;
    let mut permissions = Vec::with_capacity(Permission::ALL.len());
    for permission in Permission::ALL {
        permissions.push(PermissionEntry {
            permission,
            label: permission.label().to_string(),
            policy: state.permissions.policy(permission),
            status: state.permissions.status(permission).await,
            required: required.contains(&permission),
        });
    }

    Json(PermissionsResponse {
        permissions,
        pending: state.permissions.pending(),
    })
}

/// Answer a pending prompt.
#[utoipa::path(
    post,
    path = "/api/permissions/{name}",
    tag = "permissions",
    operation_id = "answerPermissionPrompt",
    summary = "Grant or refuse a permission",
    description = "Answers the prompt a scan start is waiting on. The answer is remembered \
        for later scans; asking again after a refusal opens a prompt with a rationale. With \
        `permissions.remember_answers` set, the answer is also written to the config file \
        as a `grant` or `deny` policy before the prompt is released.",
    params(
        ("name" = String, Path, description = "Permission name", example = "location")
    ),
    request_body = AnswerPromptRequest,
    responses(
        (status = 200, description = "Prompt answered", body = AnswerPromptResponse),
        (status = 400, description = "Unknown permission", body = crate::api::ErrorResponse),
        (status = 404, description = "No prompt is waiting", body = crate::api::ErrorResponse),
        (status = 422, description = "Config file is invalid; the prompt stays pending", body = crate::api::ErrorResponse),
        (status = 500, description = "Config file could not be written", body = crate::api::ErrorResponse)
    )
)]
pub async fn answer_prompt(
    State(state): State<SharedState>,
    Path(name): Path<String>,
    Json(request): Json<AnswerPromptRequest>,
) -> ApiResult<Json<AnswerPromptResponse>> {
    let permission: Permission = name.parse().map_err(ApiError::from)?;
    if !state.permissions.is_pending(permission) {
        return Err(PermissionError::NoPendingPrompt(permission).into());
    }

    if state.config.permissions.remember_answers {
        if let Some(path) = &state.config_path {
            let policy = if request.granted {
                PermissionPolicy::Grant
            } else {
                PermissionPolicy::Deny
            };
            Config::persist_policy(path, permission, policy)?;
            info!(%permission, ?policy, path = %path.display(), "Remembered permission answer");
        }
    }

    state.permissions.answer(permission, request.granted)?;

    let notice = if request.granted {
        Notice::info(format!("{} permission granted", permission.label()))
    } else {
        Notice::warning(format!("{} permission refused", permission.label()))
    };

    Ok(Json(AnswerPromptResponse {
        permission,
        granted: request.granted,
        notice,
    }))
}
