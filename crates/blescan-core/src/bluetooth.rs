//! Bluetooth Low Energy radio control and scanning.
//!
//! This module provides:
//! - The [`BluetoothBackend`] trait covering radio power and LE scanning
//! - Scan settings (mode and filter) and the events a scan delivers
//! - A BlueZ backend via `bluer` (feature `bluetooth`)
//! - An in-process [`MockBackend`] for tests and hardware-free runs
//!
//! A backend never touches the result list. It pushes [`ScanEvent`]s into the
//! channel it is handed and the controller consumes them in arrival order.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use utoipa::ToSchema;

use crate::types::{normalize_address, Observation};

#[cfg(feature = "bluetooth")]
pub mod bluez;
pub mod mock;

#[cfg(feature = "bluetooth")]
pub use bluez::BluezBackend;
pub use mock::{MockBackend, MockDevice};

/// Errors raised by a Bluetooth backend.
#[derive(Debug, Error)]
pub enum BluetoothError {
    /// No adapter is present, or the configured one does not exist.
    #[error("Bluetooth adapter not found")]
    AdapterNotFound,

    /// The adapter is powered off.
    #[error("Bluetooth adapter is powered off")]
    AdapterPoweredOff,

    /// The platform refused or aborted a scan.
    #[error("Scan failed: {0}")]
    ScanFailed(ScanFailure),

    /// Connecting to the Bluetooth service failed.
    #[error("Failed to open Bluetooth session: {message}")]
    SessionInitFailed {
        /// Underlying cause.
        message: String,
    },

    /// Changing the adapter power state failed.
    #[error("Failed to change adapter power: {message}")]
    PowerChangeFailed {
        /// Underlying cause.
        message: String,
    },

    /// Any other backend failure.
    #[error("Bluetooth error: {message}")]
    Internal {
        /// Underlying cause.
        message: String,
    },
}

/// Result alias for backend operations.
pub type BluetoothResult<T> = std::result::Result<T, BluetoothError>;

/// A terminal scan failure as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ScanFailure {
    /// Platform failure code.
    #[schema(example = 1)]
    pub code: i32,

    /// Human-readable description.
    #[schema(example = "scan already started")]
    pub message: String,
}

impl ScanFailure {
    /// A scan with the same callback is already running.
    pub const ALREADY_STARTED: i32 = 1;
    /// The scanner could not register the client.
    pub const REGISTRATION_FAILED: i32 = 2;
    /// Internal stack error.
    pub const INTERNAL_ERROR: i32 = 3;
    /// LE scanning is not supported by the hardware.
    pub const FEATURE_UNSUPPORTED: i32 = 4;

    /// Build a failure from a code and message.
    #[must_use]
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ScanFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "code {}: {}", self.code, self.message)
    }
}

/// Scan duty cycle. Backends map this onto whatever the platform offers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    /// Fewest reports, least power.
    LowPower,
    /// Middle ground.
    Balanced,
    /// Report every advertisement; suits short interactive scans.
    #[default]
    LowLatency,
}

/// Which advertisements a scan reports. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct ScanFilter {
    /// Only report these addresses.
    pub addresses: Vec<String>,

    /// Only report devices whose name starts with this prefix.
    #[schema(example = "Pixel")]
    pub name_prefix: Option<String>,

    /// Drop reports weaker than this RSSI (dBm).
    #[schema(example = -90)]
    pub min_rssi: Option<i16>,
}

impl ScanFilter {
    /// Returns `true` if the filter places no constraints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty() && self.name_prefix.is_none() && self.min_rssi.is_none()
    }

    /// Returns `true` if `observation` passes the filter.
    #[must_use]
    pub fn matches(&self, observation: &Observation) -> bool {
        if !self.addresses.is_empty()
            && !self
                .addresses
                .iter()
                .any(|a| normalize_address(a) == observation.address)
        {
            return false;
        }

        if let Some(prefix) = &self.name_prefix {
            match &observation.name {
                Some(name) if name.starts_with(prefix.as_str()) => {}
                _ => return false,
            }
        }

        self.min_rssi.map_or(true, |min| observation.rssi >= min)
    }
}

/// Settings for one scan session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct ScanSettings {
    /// Scan duty cycle.
    pub mode: ScanMode,

    /// Advertisement filter.
    pub filter: ScanFilter,
}

/// One item delivered by a running scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// An advertisement was received.
    Result(Observation),
    /// The scan ended with a failure. No further events follow.
    Failed(ScanFailure),
}

/// Radio and scan control surface of a Bluetooth stack.
///
/// Implementations must be cheap to share behind an `Arc`. `start_scan` hands
/// the backend the sending half of the session channel; the backend keeps it
/// until `stop_scan` or a failure and drops it afterwards, which ends the
/// consumer.
#[async_trait]
pub trait BluetoothBackend: Send + Sync {
    /// Short label for status output.
    fn name(&self) -> &'static str;

    /// Whether the radio is powered.
    async fn is_enabled(&self) -> BluetoothResult<bool>;

    /// Power the radio on or off.
    async fn set_enabled(&self, enabled: bool) -> BluetoothResult<()>;

    /// Start an LE scan, delivering events into `sink`.
    async fn start_scan(
        &self,
        settings: &ScanSettings,
        sink: mpsc::Sender<ScanEvent>,
    ) -> BluetoothResult<()>;

    /// Stop the running scan. Stopping an idle backend is a no-op.
    async fn stop_scan(&self) -> BluetoothResult<()>;
}
