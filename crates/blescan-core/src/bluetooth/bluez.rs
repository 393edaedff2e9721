//! BlueZ backend built on `bluer`.
//!
//! Radio power maps to the adapter's `Powered` property. A scan is a BlueZ LE
//! discovery session; every device that is added or changes properties while
//! discovery runs is reported with its current name and RSSI.

use async_trait::async_trait;
use bluer::{Adapter, AdapterEvent, Address, DiscoveryFilter, DiscoveryTransport, Session};
use futures::StreamExt;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{
    BluetoothBackend, BluetoothError, BluetoothResult, ScanEvent, ScanFailure, ScanMode,
    ScanSettings,
};
use crate::types::Observation;

impl From<bluer::Error> for BluetoothError {
    fn from(err: bluer::Error) -> Self {
        match err.kind {
            bluer::ErrorKind::NotFound => Self::AdapterNotFound,
            bluer::ErrorKind::NotReady => Self::AdapterPoweredOff,
            _ => Self::Internal {
                message: err.to_string(),
            },
        }
    }
}

/// Backend talking to `bluetoothd` over D-Bus.
pub struct BluezBackend {
    // Keeps the D-Bus connection alive for the adapter handle.
    _session: Session,
    adapter: Adapter,
    discovery: Mutex<Option<JoinHandle<()>>>,
}

impl BluezBackend {
    /// Connect to BlueZ and open `adapter_name`, or the default adapter.
    ///
    /// # Errors
    ///
    /// Returns an error if `bluetoothd` is unreachable or the adapter does not exist.
    pub async fn connect(adapter_name: Option<&str>) -> BluetoothResult<Self> {
        let session = Session::new()
            .await
            .map_err(|e| BluetoothError::SessionInitFailed {
                message: e.to_string(),
            })?;

        let adapter = match adapter_name {
            Some(name) => session.adapter(name)?,
            None => session.default_adapter().await?,
        };

        info!(adapter = %adapter.name(), "Opened Bluetooth adapter");

        Ok(Self {
            _session: session,
            adapter,
            discovery: Mutex::new(None),
        })
    }

    fn discovery_filter(settings: &ScanSettings) -> DiscoveryFilter {
        let mut filter = DiscoveryFilter::default();
        filter.transport = DiscoveryTransport::Le;
        filter.rssi = settings.filter.min_rssi;
        filter.pattern.clone_from(&settings.filter.name_prefix);
        // Low power scans skip repeated advertisements from the same device.
        filter.duplicate_data = settings.mode != ScanMode::LowPower;
        filter
    }
}

/// Read the current name and RSSI of `address`.
///
/// Devices known from an earlier session but not currently in range have no
/// RSSI and are skipped.
async fn observe(adapter: &Adapter, address: Address) -> bluer::Result<Option<Observation>> {
    let device = adapter.device(address)?;
    let Some(rssi) = device.rssi().await? else {
        return Ok(None);
    };
    let name = device.name().await?;
    Ok(Some(Observation::new(&address.to_string(), name, rssi)))
}

#[async_trait]
impl BluetoothBackend for BluezBackend {
    fn name(&self) -> &'static str {
        "bluez"
    }

    async fn is_enabled(&self) -> BluetoothResult<bool> {
        Ok(self.adapter.is_powered().await?)
    }

    async fn set_enabled(&self, enabled: bool) -> BluetoothResult<()> {
        self.adapter
            .set_powered(enabled)
            .await
            .map_err(|e| BluetoothError::PowerChangeFailed {
                message: e.to_string(),
            })?;
        info!(adapter = %self.adapter.name(), enabled, "Adapter power changed");
        Ok(())
    }

    async fn start_scan(
        &self,
        settings: &ScanSettings,
        sink: mpsc::Sender<ScanEvent>,
    ) -> BluetoothResult<()> {
        let mut discovery = self.discovery.lock().await;
        if discovery.as_ref().is_some_and(|h| !h.is_finished()) {
            return Err(BluetoothError::ScanFailed(ScanFailure::new(
                ScanFailure::ALREADY_STARTED,
                "discovery already running",
            )));
        }

        if !self.adapter.is_powered().await? {
            return Err(BluetoothError::AdapterPoweredOff);
        }

        let scan_failed = |e: bluer::Error| {
            BluetoothError::ScanFailed(ScanFailure::new(
                ScanFailure::REGISTRATION_FAILED,
                e.to_string(),
            ))
        };

        self.adapter
            .set_discovery_filter(Self::discovery_filter(settings))
            .await
            .map_err(scan_failed)?;
        let events = self
            .adapter
            .discover_devices_with_changes()
            .await
            .map_err(scan_failed)?;

        let adapter = self.adapter.clone();
        *discovery = Some(tokio::spawn(async move {
            let mut events = Box::pin(events);
            while let Some(event) = events.next().await {
                let AdapterEvent::DeviceAdded(address) = event else {
                    continue;
                };
                match observe(&adapter, address).await {
                    Ok(Some(observation)) => {
                        if sink.send(ScanEvent::Result(observation)).await.is_err() {
                            debug!("Scan consumer gone, ending discovery");
                            return;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => debug!(%address, error = %e, "Skipping device"),
                }
            }

            warn!("BlueZ discovery stream ended");
            let _ = sink
                .send(ScanEvent::Failed(ScanFailure::new(
                    ScanFailure::INTERNAL_ERROR,
                    "discovery session ended",
                )))
                .await;
        }));

        info!(adapter = %self.adapter.name(), mode = ?settings.mode, "LE discovery started");
        Ok(())
    }

    async fn stop_scan(&self) -> BluetoothResult<()> {
        if let Some(handle) = self.discovery.lock().await.take() {
            // Dropping the event stream ends the BlueZ discovery session.
            handle.abort();
            info!(adapter = %self.adapter.name(), "LE discovery stopped");
        }
        Ok(())
    }
}
