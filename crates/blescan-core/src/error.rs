//! Unified error types for the blescan core library.
//!
//! This module provides a unified error type [`BlescanError`] that covers all failure
//! modes across the blescan system. Each module also has its own specific error types
//! (`ConfigError`, `BluetoothError`) for internal use.
//!
//! # Design Principles
//!
//! - **Specific variants**: Each error variant captures exactly one failure mode
//! - **Actionable messages**: Error messages guide users toward resolution
//! - **Context preservation**: Wrapped errors maintain their original context
//! - **HTTP-ready**: Error types include HTTP status codes and error codes
//!
//! A radio that is already in the requested state is *not* an error; see
//! [`crate::controller::RadioOutcome`].
//!
//! # Example
//!
//! ```rust
//! use blescan_core::error::{BlescanError, Result};
//!
//! fn require_radio(enabled: bool) -> Result<()> {
//!     if !enabled {
//!         return Err(BlescanError::RadioDisabled);
//!     }
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// The unified error type for all blescan operations.
#[derive(Debug, Error)]
pub enum BlescanError {
    // =========================================================================
    // BLUETOOTH ERRORS
    // =========================================================================
    /// No Bluetooth adapter was found on this system.
    #[error(
        "No Bluetooth adapter found. Ensure Bluetooth hardware is present and drivers are loaded."
    )]
    BluetoothAdapterNotFound,

    /// The Bluetooth service could not be reached.
    #[error("Bluetooth service unavailable: {0}")]
    BluetoothUnavailable(String),

    /// A scan was requested while the radio is off.
    #[error("Bluetooth is off. Turn it on before scanning.")]
    RadioDisabled,

    /// Turning the radio on or off failed.
    #[error("Failed to change Bluetooth power state: {0}")]
    RadioToggleFailed(String),

    /// The platform refused to start a scan.
    #[error("Bluetooth scan failed to start (code {code}): {message}")]
    ScanStartFailed {
        /// Platform failure code.
        code: i32,
        /// Platform failure description.
        message: String,
    },

    // =========================================================================
    // PERMISSION ERRORS
    // =========================================================================
    /// A runtime permission required for scanning was refused.
    #[error("{0} permission refused")]
    PermissionDenied(String),

    /// A permission name did not match any known permission.
    #[error("Unknown permission: '{0}'")]
    UnknownPermission(String),

    /// No prompt is waiting for the given permission.
    #[error("No pending prompt for permission '{0}'")]
    NoPendingPrompt(String),

    // =========================================================================
    // CONFIGURATION ERRORS
    // =========================================================================
    /// The configuration file exists but could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    ConfigParseError(String),

    /// The configuration was parsed but contains invalid values.
    #[error("Configuration validation failed: {0}")]
    ConfigValidationError(String),

    // =========================================================================
    // PERSISTENCE & I/O ERRORS
    // =========================================================================
    /// An error occurred while reading or writing the configuration file.
    #[error("Persistence error: {0}")]
    PersistenceError(String),

    /// A low-level I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A specialized [`Result`] type for blescan operations.
pub type Result<T> = std::result::Result<T, BlescanError>;

/// Short alias for [`BlescanError`].
pub type Error = BlescanError;

impl BlescanError {
    /// Returns `true` if this error is related to Bluetooth operations.
    #[inline]
    #[must_use]
    pub const fn is_bluetooth_error(&self) -> bool {
        matches!(
            self,
            Self::BluetoothAdapterNotFound
                | Self::BluetoothUnavailable(_)
                | Self::RadioDisabled
                | Self::RadioToggleFailed(_)
                | Self::ScanStartFailed { .. }
        )
    }

    /// Returns `true` if this error is related to runtime permissions.
    #[inline]
    #[must_use]
    pub const fn is_permission_error(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied(_) | Self::UnknownPermission(_) | Self::NoPendingPrompt(_)
        )
    }

    /// Returns `true` if this error is related to configuration.
    #[inline]
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigParseError(_) | Self::ConfigValidationError(_)
        )
    }

    /// Returns `true` if this error is related to I/O or persistence.
    #[inline]
    #[must_use]
    pub const fn is_io_error(&self) -> bool {
        matches!(self, Self::PersistenceError(_) | Self::IoError(_))
    }

    /// Returns an HTTP-appropriate status code for this error.
    #[inline]
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::UnknownPermission(_) => 400,

            Self::PermissionDenied(_) => 403,

            Self::NoPendingPrompt(_) => 404,

            // The request is fine but the radio state forbids it
            Self::RadioDisabled => 409,

            Self::ConfigParseError(_) | Self::ConfigValidationError(_) => 422,

            Self::PersistenceError(_) | Self::IoError(_) => 500,

            Self::BluetoothAdapterNotFound
            | Self::BluetoothUnavailable(_)
            | Self::RadioToggleFailed(_)
            | Self::ScanStartFailed { .. } => 503,
        }
    }

    /// Returns a machine-readable error code for API responses.
    #[inline]
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::BluetoothAdapterNotFound => "BLUETOOTH_ADAPTER_NOT_FOUND",
            Self::BluetoothUnavailable(_) => "BLUETOOTH_UNAVAILABLE",
            Self::RadioDisabled => "RADIO_DISABLED",
            Self::RadioToggleFailed(_) => "RADIO_TOGGLE_FAILED",
            Self::ScanStartFailed { .. } => "SCAN_START_FAILED",
            Self::PermissionDenied(_) => "PERMISSION_DENIED",
            Self::UnknownPermission(_) => "UNKNOWN_PERMISSION",
            Self::NoPendingPrompt(_) => "NO_PENDING_PROMPT",
            Self::ConfigParseError(_) => "CONFIG_PARSE_ERROR",
            Self::ConfigValidationError(_) => "CONFIG_VALIDATION_ERROR",
            Self::PersistenceError(_) => "PERSISTENCE_ERROR",
            Self::IoError(_) => "IO_ERROR",
        }
    }
}

// =============================================================================
// CONVERSIONS FROM MODULE-SPECIFIC ERRORS
// =============================================================================

impl From<crate::config::ConfigError> for BlescanError {
    fn from(err: crate::config::ConfigError) -> Self {
        use crate::config::ConfigError;
        match err {
            ConfigError::ReadError { path, source } => {
                Self::PersistenceError(format!("Failed to read {}: {}", path.display(), source))
            }
            ConfigError::WriteError { path, source } => {
                Self::PersistenceError(format!("Failed to write {}: {}", path.display(), source))
            }
            ConfigError::ParseError(e) => Self::ConfigParseError(e.to_string()),
            ConfigError::FileParseError(e) => Self::ConfigParseError(e.to_string()),
            ConfigError::SerializeError(e) => Self::ConfigParseError(e.to_string()),
            ConfigError::ValidationError { field, message } => {
                Self::ConfigValidationError(format!("{field}: {message}"))
            }
            ConfigError::MultipleValidationErrors(errors) => {
                let messages: Vec<String> = errors.into_iter().map(|e| e.to_string()).collect();
                Self::ConfigValidationError(messages.join("; "))
            }
        }
    }
}

impl From<crate::bluetooth::BluetoothError> for BlescanError {
    fn from(err: crate::bluetooth::BluetoothError) -> Self {
        use crate::bluetooth::BluetoothError;
        match err {
            BluetoothError::AdapterNotFound => Self::BluetoothAdapterNotFound,
            BluetoothError::AdapterPoweredOff => Self::RadioDisabled,
            BluetoothError::ScanFailed(failure) => Self::ScanStartFailed {
                code: failure.code,
                message: failure.message,
            },
            BluetoothError::SessionInitFailed { message } => Self::BluetoothUnavailable(message),
            BluetoothError::PowerChangeFailed { message } => Self::RadioToggleFailed(message),
            BluetoothError::Internal { message } => Self::BluetoothUnavailable(message),
        }
    }
}

impl From<crate::permissions::PermissionError> for BlescanError {
    fn from(err: crate::permissions::PermissionError) -> Self {
        use crate::permissions::PermissionError;
        match err {
            PermissionError::Unknown(name) => Self::UnknownPermission(name),
            PermissionError::NoPendingPrompt(permission) => {
                Self::NoPendingPrompt(permission.to_string())
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bluetooth::{BluetoothError, ScanFailure};
    use std::io::{Error as IoErr, ErrorKind};

    #[test]
    fn test_bluetooth_error_classification() {
        assert!(BlescanError::BluetoothAdapterNotFound.is_bluetooth_error());
        assert!(BlescanError::RadioDisabled.is_bluetooth_error());
        assert!(BlescanError::ScanStartFailed {
            code: 2,
            message: "registration failed".into()
        }
        .is_bluetooth_error());

        assert!(!BlescanError::PermissionDenied("Location".into()).is_bluetooth_error());
    }

    #[test]
    fn test_permission_error_classification() {
        assert!(BlescanError::PermissionDenied("Location".into()).is_permission_error());
        assert!(BlescanError::UnknownPermission("camera".into()).is_permission_error());
        assert!(!BlescanError::RadioDisabled.is_permission_error());
    }

    #[test]
    fn test_config_and_io_classification() {
        assert!(BlescanError::ConfigParseError("expected '='".into()).is_config_error());
        assert!(BlescanError::ConfigValidationError("bad port".into()).is_config_error());
        assert!(BlescanError::IoError(IoErr::new(ErrorKind::NotFound, "test")).is_io_error());
        assert!(!BlescanError::BluetoothAdapterNotFound.is_config_error());
    }

    #[test]
    fn test_http_status_codes() {
        assert_eq!(
            BlescanError::UnknownPermission("camera".into()).http_status_code(),
            400
        );
        assert_eq!(
            BlescanError::PermissionDenied("Location".into()).http_status_code(),
            403
        );
        assert_eq!(BlescanError::RadioDisabled.http_status_code(), 409);
        assert_eq!(
            BlescanError::ConfigValidationError("x".into()).http_status_code(),
            422
        );
        assert_eq!(
            BlescanError::ScanStartFailed {
                code: 1,
                message: "already started".into()
            }
            .http_status_code(),
            503
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            BlescanError::BluetoothAdapterNotFound.error_code(),
            "BLUETOOTH_ADAPTER_NOT_FOUND"
        );
        assert_eq!(BlescanError::RadioDisabled.error_code(), "RADIO_DISABLED");
        assert_eq!(
            BlescanError::PermissionDenied("Location".into()).error_code(),
            "PERMISSION_DENIED"
        );
    }

    #[test]
    fn test_from_bluetooth_error() {
        let err: BlescanError = BluetoothError::AdapterPoweredOff.into();
        assert!(matches!(err, BlescanError::RadioDisabled));

        let err: BlescanError =
            BluetoothError::ScanFailed(ScanFailure::new(ScanFailure::INTERNAL_ERROR, "boom"))
                .into();
        match err {
            BlescanError::ScanStartFailed { code, message } => {
                assert_eq!(code, 3);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_error_display_messages() {
        let err = BlescanError::PermissionDenied("Location".into());
        assert_eq!(err.to_string(), "Location permission refused");

        let err = BlescanError::ScanStartFailed {
            code: 6,
            message: "scanning too frequently".into(),
        };
        assert!(err.to_string().contains("code 6"));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<BlescanError>();
        assert_sync::<BlescanError>();
    }
}
