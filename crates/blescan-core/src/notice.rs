//! Short user-facing messages about what an action did.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Severity of a [`Notice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    /// Informational, including "nothing to do" outcomes.
    Info,
    /// The action did not happen but nothing is broken.
    Warning,
    /// The action failed.
    Error,
}

/// A message for the user, e.g. "Bluetooth already on".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({"level": "info", "message": "Bluetooth already on"}))]
pub struct Notice {
    /// Severity.
    pub level: NoticeLevel,

    /// Text to show.
    #[schema(example = "Bluetooth already on")]
    pub message: String,
}

impl Notice {
    /// An informational notice.
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    /// A warning notice.
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    /// An error notice.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}
