//! # blescan-core
//!
//! Core logic for blescan, a Bluetooth Low Energy scanner.
//!
//! This crate provides:
//! - Radio power control and BLE scanning behind a backend trait
//! - An address-keyed result list where each device appears once and is
//!   updated in place as new advertisements arrive
//! - Runtime permission gating before a scan starts
//! - Configuration loading, saving, and validation
//!
//! ## Architecture
//!
//! - [`bluetooth`] - Backend trait plus BlueZ and mock implementations
//! - [`controller`] - Scan sessions, radio toggling, and view event publication
//! - [`results`] - The upsert-by-address result list
//! - [`permissions`] - Permission policies and prompts
//! - [`view`] - Rendered rows and incremental view events
//! - [`notice`] - User-facing status messages
//! - [`config`] - Application configuration
//! - [`error`] - Unified error types for the crate
//! - [`types`] - Shared types and address helpers

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

pub mod bluetooth;
pub mod config;
pub mod controller;
pub mod error;
pub mod notice;
pub mod permissions;
pub mod results;
pub mod types;
pub mod view;

// Re-export primary types for convenience
#[cfg(feature = "bluetooth")]
pub use bluetooth::BluezBackend;
pub use bluetooth::{
    BluetoothBackend, BluetoothError, BluetoothResult, MockBackend, MockDevice, ScanEvent,
    ScanFailure, ScanFilter, ScanMode, ScanSettings,
};
pub use config::{BackendKind, Config, ConfigError, ConfigResult};
pub use controller::{
    ControllerOptions, ControllerStatus, RadioOutcome, ScanController, ScanOutcome, ScanReport,
};
pub use error::{BlescanError, Error, Result};
pub use notice::{Notice, NoticeLevel};
pub use permissions::{
    PendingPrompt, Permission, PermissionError, PermissionGate, PermissionOutcome,
    PermissionPolicy, PermissionStatus, PolicyPermissions,
};
pub use results::{ScanResultList, Upsert};
pub use types::{is_valid_mac_address, normalize_address, Observation};
pub use view::{ResultRow, ViewEvent};
