//! Application configuration management.
//!
//! Handles loading, saving, and validating blescan configuration including:
//! - HTTP server bind address
//! - Which Bluetooth backend and adapter to use
//! - Scan mode and filter
//! - Runtime permission policies
//! - Devices replayed by the mock backend
//!
//! Configuration is read from a TOML file and then overridden by environment
//! variables of the form `BLESCAN__SECTION__KEY` (e.g. `BLESCAN__SERVER__PORT=8080`).

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bluetooth::{MockDevice, ScanFilter, ScanMode, ScanSettings};
use crate::controller::ControllerOptions;
use crate::permissions::{Permission, PermissionPolicy};
use crate::types::is_valid_mac_address;

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "BLESCAN";

/// Errors raised while loading, saving or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read {}: {source}", path.display())]
    ReadError {
        /// File path.
        path: PathBuf,
        /// Underlying cause.
        #[source]
        source: std::io::Error,
    },

    /// The file could not be written.
    #[error("failed to write {}: {source}", path.display())]
    WriteError {
        /// File path.
        path: PathBuf,
        /// Underlying cause.
        #[source]
        source: std::io::Error,
    },

    /// The layered sources could not be parsed into a [`Config`].
    #[error("failed to parse configuration: {0}")]
    ParseError(#[from] config::ConfigError),

    /// The file alone is not valid TOML for a [`Config`].
    #[error("failed to parse configuration file: {0}")]
    FileParseError(#[from] toml::de::Error),

    /// The configuration could not be serialized to TOML.
    #[error("failed to serialize configuration: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// A field holds an invalid value.
    #[error("invalid {field}: {message}")]
    ValidationError {
        /// Dotted field path.
        field: String,
        /// What is wrong.
        message: String,
    },

    /// Several fields hold invalid values.
    #[error("{} validation errors", .0.len())]
    MultipleValidationErrors(Vec<ConfigError>),
}

/// Result alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,

    /// Bluetooth backend selection.
    pub bluetooth: BluetoothConfig,

    /// Scan behaviour.
    pub scan: ScanConfig,

    /// Runtime permission policies.
    pub permissions: PermissionsConfig,

    /// Mock backend settings.
    pub mock: MockConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind.
    pub host: IpAddr,

    /// Port to bind.
    pub port: u16,

    /// Origins allowed by CORS; empty allows any.
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 3000,
            cors_allowed_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Socket address to bind.
    #[must_use]
    pub const fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Which Bluetooth stack to drive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// BlueZ via D-Bus.
    #[default]
    Bluez,
    /// In-process simulation.
    Mock,
}

/// Bluetooth backend selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BluetoothConfig {
    /// Backend to use.
    pub backend: BackendKind,

    /// Adapter name such as `hci0`; the default adapter when unset.
    pub adapter: Option<String>,
}

/// Scan behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Scan duty cycle.
    pub mode: ScanMode,

    /// Advertisement filter.
    pub filter: ScanFilter,

    /// Permissions required before a scan starts.
    pub required_permissions: Vec<Permission>,

    /// Capacity of the scan event channel.
    pub channel_capacity: usize,

    /// Capacity of the view event broadcast.
    pub event_capacity: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        let defaults = ControllerOptions::default();
        Self {
            mode: defaults.settings.mode,
            filter: defaults.settings.filter,
            required_permissions: defaults.required_permissions,
            channel_capacity: defaults.channel_capacity,
            event_capacity: defaults.event_capacity,
        }
    }
}

impl ScanConfig {
    /// Scan settings for a session.
    #[must_use]
    pub fn settings(&self) -> ScanSettings {
        ScanSettings {
            mode: self.mode,
            filter: self.filter.clone(),
        }
    }

    /// Options for the scan controller.
    #[must_use]
    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            settings: self.settings(),
            required_permissions: self.required_permissions.clone(),
            channel_capacity: self.channel_capacity,
            event_capacity: self.event_capacity,
        }
    }
}

/// Runtime permission policies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionsConfig {
    /// Policy per permission; unlisted permissions are granted.
    pub policies: HashMap<Permission, PermissionPolicy>,

    /// Seconds to wait for a prompt answer before treating it as refused.
    pub prompt_timeout_secs: u64,

    /// Write prompt answers back to the config file as `grant` or `deny`
    /// policies, so they survive a restart.
    pub remember_answers: bool,
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            policies: HashMap::new(),
            prompt_timeout_secs: 30,
            remember_answers: false,
        }
    }
}

impl PermissionsConfig {
    /// Prompt timeout as a [`Duration`].
    #[must_use]
    pub const fn prompt_timeout(&self) -> Duration {
        Duration::from_secs(self.prompt_timeout_secs)
    }
}

/// Mock backend settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MockConfig {
    /// Whether the simulated radio starts powered.
    pub powered: bool,

    /// Milliseconds between replay rounds.
    pub interval_ms: u64,

    /// Simulated advertisers.
    pub devices: Vec<MockDevice>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            powered: true,
            interval_ms: 1000,
            devices: Vec::new(),
        }
    }
}

impl MockConfig {
    /// Replay interval as a [`Duration`].
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Config {
    /// Load `path` if it exists, layered with environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or environment cannot be parsed, or validation fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let layered = config::Config::builder()
            .add_source(
                config::File::from(path.as_ref())
                    .format(config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = layered.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Read `path` alone, without environment overrides. A missing file
    /// yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn read_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Record `policy` for `permission` in the file at `path`.
    ///
    /// Only the file's own contents are rewritten; environment overrides in
    /// effect for this process are not baked in.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, fails validation once
    /// updated, or cannot be written.
    pub fn persist_policy(
        path: impl AsRef<Path>,
        permission: Permission,
        policy: PermissionPolicy,
    ) -> ConfigResult<()> {
        let path = path.as_ref();
        let mut file = Self::read_file(path)?;
        file.permissions.policies.insert(permission, policy);
        file.validate()?;
        file.save(path)
    }

    /// Write the configuration to `path` as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::WriteError {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::WriteError {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Platform configuration file location.
    ///
    /// `BLESCAN_CONFIG` wins; otherwise `/etc/blescan/config.toml` on Linux and
    /// the per-user config directory elsewhere.
    #[must_use]
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var("BLESCAN_CONFIG") {
            return PathBuf::from(path);
        }
        #[cfg(target_os = "linux")]
        {
            PathBuf::from("/etc/blescan/config.toml")
        }
        #[cfg(not(target_os = "linux"))]
        {
            directories::ProjectDirs::from("", "", "blescan").map_or_else(
                || PathBuf::from("blescan.toml"),
                |dirs| dirs.config_dir().join("config.toml"),
            )
        }
    }

    /// Check every field, collecting all problems.
    ///
    /// # Errors
    ///
    /// Returns the single problem, or [`ConfigError::MultipleValidationErrors`].
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();
        let mut invalid = |field: &str, message: String| {
            errors.push(ConfigError::ValidationError {
                field: field.to_string(),
                message,
            });
        };

        if self.server.port == 0 {
            invalid("server.port", "must be between 1 and 65535".into());
        }
        if let Some(adapter) = &self.bluetooth.adapter {
            if adapter.trim().is_empty() {
                invalid("bluetooth.adapter", "must not be empty when set".into());
            }
        }
        for address in &self.scan.filter.addresses {
            if !is_valid_mac_address(address) {
                invalid(
                    "scan.filter.addresses",
                    format!("'{address}' is not in XX:XX:XX:XX:XX:XX format"),
                );
            }
        }
        if let Some(min_rssi) = self.scan.filter.min_rssi {
            if !(-127..=20).contains(&min_rssi) {
                invalid(
                    "scan.filter.min_rssi",
                    format!("{min_rssi} is outside -127..=20 dBm"),
                );
            }
        }
        if self.scan.channel_capacity == 0 {
            invalid("scan.channel_capacity", "must be at least 1".into());
        }
        if self.scan.event_capacity == 0 {
            invalid("scan.event_capacity", "must be at least 1".into());
        }
        if self.permissions.prompt_timeout_secs == 0 {
            invalid("permissions.prompt_timeout_secs", "must be at least 1".into());
        }
        if self.mock.interval_ms == 0 {
            invalid("mock.interval_ms", "must be at least 1".into());
        }
        for device in &self.mock.devices {
            if !is_valid_mac_address(&device.address) {
                invalid(
                    "mock.devices",
                    format!("'{}' is not in XX:XX:XX:XX:XX:XX format", device.address),
                );
            }
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ConfigError::MultipleValidationErrors(errors)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.bluetooth.backend, BackendKind::Bluez);
        assert_eq!(config.scan.mode, ScanMode::LowLatency);
        assert_eq!(config.scan.required_permissions, vec![Permission::Location]);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_read_file_rejects_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server\nport = 1").unwrap();

        assert!(matches!(
            Config::read_file(&path),
            Err(ConfigError::FileParseError(_))
        ));
    }

    #[test]
    fn test_read_file_of_directory_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Config::read_file(dir.path()),
            Err(ConfigError::ReadError { .. })
        ));
    }

    #[test]
    fn test_persist_policy_keeps_other_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[server]
port = 8123

[permissions]
remember_answers = true

[permissions.policies]
location = "prompt"
"#,
        )
        .unwrap();

        Config::persist_policy(&path, Permission::Location, PermissionPolicy::Grant).unwrap();

        let file = Config::read_file(&path).unwrap();
        assert_eq!(file.server.port, 8123);
        assert!(file.permissions.remember_answers);
        assert_eq!(
            file.permissions.policies.get(&Permission::Location),
            Some(&PermissionPolicy::Grant)
        );
    }

    #[test]
    fn test_persist_policy_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blescan").join("config.toml");

        Config::persist_policy(&path, Permission::BluetoothScan, PermissionPolicy::Deny).unwrap();

        let file = Config::read_file(&path).unwrap();
        assert_eq!(
            file.permissions.policies.get(&Permission::BluetoothScan),
            Some(&PermissionPolicy::Deny)
        );
    }

    #[test]
    fn test_persist_policy_refuses_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nport = 0\n").unwrap();

        let result = Config::persist_policy(&path, Permission::Location, PermissionPolicy::Grant);

        assert!(matches!(result, Err(ConfigError::ValidationError { .. })));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[server]\nport = 0\n");
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[server]
port = 8123

[bluetooth]
backend = "mock"

[scan]
mode = "balanced"

[scan.filter]
name_prefix = "Pixel"

[permissions.policies]
location = "prompt"

[[mock.devices]]
address = "AA:BB:CC:DD:EE:FF"
name = "Beacon"
rssi = -60
"#,
        )
        .unwrap();

        let config = Config::load_or_default(&path).unwrap();

        assert_eq!(config.server.port, 8123);
        assert_eq!(config.bluetooth.backend, BackendKind::Mock);
        assert_eq!(config.scan.mode, ScanMode::Balanced);
        assert_eq!(config.scan.filter.name_prefix.as_deref(), Some("Pixel"));
        assert_eq!(config.scan.channel_capacity, 256);
        assert_eq!(
            config.permissions.policies.get(&Permission::Location),
            Some(&PermissionPolicy::Prompt)
        );
        assert_eq!(config.mock.devices.len(), 1);
        assert!(config.mock.powered);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.server.port = 4000;
        config.bluetooth.adapter = Some("hci1".into());

        config.save(&path).unwrap();
        let loaded = Config::load_or_default(&path).unwrap();

        assert_eq!(loaded.server.port, 4000);
        assert_eq!(loaded.bluetooth.adapter.as_deref(), Some("hci1"));
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let mut config = Config::default();
        config.server.port = 0;
        config.scan.filter.addresses = vec!["not-a-mac".into()];
        config.scan.channel_capacity = 0;

        match config.validate() {
            Err(ConfigError::MultipleValidationErrors(errors)) => assert_eq!(errors.len(), 3),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_single_validation_error() {
        let mut config = Config::default();
        config.scan.filter.min_rssi = Some(50);

        match config.validate() {
            Err(ConfigError::ValidationError { field, .. }) => {
                assert_eq!(field, "scan.filter.min_rssi");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_controller_options_follow_scan_config() {
        let mut scan = ScanConfig::default();
        scan.mode = ScanMode::LowPower;
        scan.required_permissions = vec![];

        let options = scan.controller_options();
        assert_eq!(options.settings.mode, ScanMode::LowPower);
        assert!(options.required_permissions.is_empty());
    }
}
