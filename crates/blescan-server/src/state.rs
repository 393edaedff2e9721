//! Application state shared across handlers.

use std::path::PathBuf;
use std::sync::Arc;

use blescan_core::{
    BackendKind, BluetoothBackend, Config, MockBackend, PolicyPermissions, ScanController,
};
use chrono::{DateTime, Utc};
use tracing::info;

/// Shared handle passed to every handler.
pub type SharedState = Arc<AppState>;

/// Application state.
pub struct AppState {
    /// Configuration the server started with.
    pub config: Config,

    /// File the configuration was loaded from; remembered prompt answers go here.
    pub config_path: Option<PathBuf>,

    /// The scanner.
    pub controller: ScanController,

    /// Permission gate, kept concrete so prompts can be answered over HTTP.
    pub permissions: Arc<PolicyPermissions>,

    /// When the server started.
    pub started_at_utc: DateTime<Utc>,
}

impl AppState {
    /// Build state, connecting to the backend named in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the BlueZ backend cannot be opened, or if it was
    /// requested from a build without BlueZ support.
    pub async fn from_config(config: Config) -> anyhow::Result<Self> {
        let backend: Arc<dyn BluetoothBackend> = match config.bluetooth.backend {
            BackendKind::Mock => Arc::new(MockBackend::with_devices(
                config.mock.powered,
                config.mock.devices.clone(),
                config.mock.interval(),
            )),
            BackendKind::Bluez => connect_bluez(&config).await?,
        };
        info!(backend = backend.name(), "Bluetooth backend ready");
        Ok(Self::with_backend(config, backend))
    }

    /// Build state over an existing backend.
    #[must_use]
    pub fn with_backend(config: Config, backend: Arc<dyn BluetoothBackend>) -> Self {
        let permissions = Arc::new(PolicyPermissions::new(
            config.permissions.policies.clone(),
            config.permissions.prompt_timeout(),
        ));
        let controller = ScanController::new(
            backend,
            permissions.clone(),
            config.scan.controller_options(),
        );

        Self {
            config,
            config_path: None,
            controller,
            permissions,
            started_at_utc: Utc::now(),
        }
    }

    /// Remember where the configuration lives.
    #[must_use]
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }
}

#[cfg(feature = "bluetooth")]
async fn connect_bluez(config: &Config) -> anyhow::Result<Arc<dyn BluetoothBackend>> {
    let backend = blescan_core::BluezBackend::connect(config.bluetooth.adapter.as_deref())
        .await
        .map_err(|e| anyhow::anyhow!(e).context("Failed to open the BlueZ adapter"))?;
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "bluetooth"))]
#[allow(clippy::unused_async)]
async fn connect_bluez(_config: &Config) -> anyhow::Result<Arc<dyn BluetoothBackend>> {
    anyhow::bail!(
        "this build has no BlueZ support; set bluetooth.backend = \"mock\" or enable the `bluetooth` feature"
    )
}
