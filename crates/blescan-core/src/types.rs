//! Shared types and OpenAPI schemas.
//!
//! Most API types live in their respective modules (bluetooth, view, notice).
//! This module holds the advertisement observation itself and address helpers.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

static MAC_ADDRESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9A-Fa-f]{2}:){5}[0-9A-Fa-f]{2}$").expect("MAC address regex is valid")
});

/// Returns `true` if `address` has the `XX:XX:XX:XX:XX:XX` form.
#[must_use]
pub fn is_valid_mac_address(address: &str) -> bool {
    MAC_ADDRESS_RE.is_match(address)
}

/// Canonical form of a device address used as the result list key.
#[must_use]
pub fn normalize_address(address: &str) -> String {
    address.trim().to_ascii_uppercase()
}

/// One BLE advertisement observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "address": "AA:BB:CC:DD:EE:FF",
    "name": "Pixel Buds",
    "rssi": -55,
    "seen_at_utc": "2025-01-15T03:30:00Z"
}))]
pub struct Observation {
    /// Device MAC address, upper case.
    #[schema(example = "AA:BB:CC:DD:EE:FF")]
    pub address: String,

    /// Advertised device name, if any.
    #[schema(example = "Pixel Buds")]
    pub name: Option<String>,

    /// Received signal strength in dBm.
    #[schema(example = -55)]
    pub rssi: i16,

    /// When the advertisement was received.
    pub seen_at_utc: DateTime<Utc>,
}

impl Observation {
    /// Create an observation stamped with the current time.
    #[must_use]
    pub fn new(address: &str, name: Option<String>, rssi: i16) -> Self {
        Self::at(address, name, rssi, Utc::now())
    }

    /// Create an observation with an explicit timestamp.
    #[must_use]
    pub fn at(address: &str, name: Option<String>, rssi: i16, seen_at_utc: DateTime<Utc>) -> Self {
        Self {
            address: normalize_address(address),
            name: name.filter(|n| !n.trim().is_empty()),
            rssi,
            seen_at_utc,
        }
    }

    /// Name to show for this device, `"unnamed"` when none was advertised.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("unnamed")
    }
}
