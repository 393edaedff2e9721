//! In-process Bluetooth backend.
//!
//! Used by tests, and by the server when no BlueZ adapter is available.
//! Configured [`MockDevice`]s are replayed while a scan runs; tests can also
//! push observations and failures through the active scan directly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{
    BluetoothBackend, BluetoothError, BluetoothResult, ScanEvent, ScanFailure, ScanSettings,
};
use crate::types::Observation;

/// A simulated advertiser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockDevice {
    /// Device MAC address.
    pub address: String,

    /// Advertised name.
    #[serde(default)]
    pub name: Option<String>,

    /// Signal strength around which reports wobble.
    pub rssi: i16,
}

struct ActiveScan {
    sink: mpsc::Sender<ScanEvent>,
    replay: Option<JoinHandle<()>>,
}

/// Bluetooth backend without hardware.
pub struct MockBackend {
    enabled: AtomicBool,
    devices: Vec<MockDevice>,
    interval: Duration,
    active: Mutex<Option<ActiveScan>>,
    next_start_failure: Mutex<Option<ScanFailure>>,
}

impl MockBackend {
    /// A backend with the radio in the given state and nothing to replay.
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self::with_devices(enabled, Vec::new(), Duration::from_millis(500))
    }

    /// A backend that replays `devices` every `interval` while scanning.
    #[must_use]
    pub fn with_devices(enabled: bool, devices: Vec<MockDevice>, interval: Duration) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            devices,
            interval,
            active: Mutex::new(None),
            next_start_failure: Mutex::new(None),
        }
    }

    /// Deliver `observation` to the running scan.
    ///
    /// Returns `false` if no scan is running.
    pub async fn inject(&self, observation: Observation) -> bool {
        self.send(ScanEvent::Result(observation)).await
    }

    /// Make the running scan fail with `failure`.
    ///
    /// Returns `false` if no scan is running.
    pub async fn fail_active_scan(&self, failure: ScanFailure) -> bool {
        let sent = self.send(ScanEvent::Failed(failure)).await;
        if sent {
            self.clear_active().await;
        }
        sent
    }

    /// Make the next `start_scan` call fail with `failure`.
    pub async fn fail_next_start(&self, failure: ScanFailure) {
        *self.next_start_failure.lock().await = Some(failure);
    }

    /// Whether a scan is running.
    pub async fn is_scanning(&self) -> bool {
        self.active.lock().await.is_some()
    }

    async fn send(&self, event: ScanEvent) -> bool {
        let sink = match self.active.lock().await.as_ref() {
            Some(active) => active.sink.clone(),
            None => return false,
        };
        sink.send(event).await.is_ok()
    }

    async fn clear_active(&self) {
        if let Some(active) = self.active.lock().await.take() {
            if let Some(replay) = active.replay {
                replay.abort();
            }
        }
    }

    fn spawn_replay(&self, sink: mpsc::Sender<ScanEvent>) -> JoinHandle<()> {
        let devices = self.devices.clone();
        let interval = self.interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            let mut tick: u64 = 0;
            loop {
                ticker.tick().await;
                for (i, device) in devices.iter().enumerate() {
                    let observation = Observation::new(
                        &device.address,
                        device.name.clone(),
                        device.rssi - wobble(tick, i),
                    );
                    if sink.send(ScanEvent::Result(observation)).await.is_err() {
                        debug!("Mock replay stopped, consumer gone");
                        return;
                    }
                }
                tick = tick.wrapping_add(1);
            }
        })
    }
}

/// Deterministic 0..=5 dB variation so replayed rows visibly change.
fn wobble(tick: u64, index: usize) -> i16 {
    let step = tick.wrapping_mul(7).wrapping_add(index as u64 * 3) % 6;
    i16::try_from(step).unwrap_or(0)
}

#[async_trait]
impl BluetoothBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn is_enabled(&self) -> BluetoothResult<bool> {
        Ok(self.enabled.load(Ordering::SeqCst))
    }

    async fn set_enabled(&self, enabled: bool) -> BluetoothResult<()> {
        self.enabled.store(enabled, Ordering::SeqCst);
        if !enabled {
            self.clear_active().await;
        }
        info!(enabled, "Mock radio power changed");
        Ok(())
    }

    async fn start_scan(
        &self,
        settings: &ScanSettings,
        sink: mpsc::Sender<ScanEvent>,
    ) -> BluetoothResult<()> {
        if !self.enabled.load(Ordering::SeqCst) {
            return Err(BluetoothError::AdapterPoweredOff);
        }
        if let Some(failure) = self.next_start_failure.lock().await.take() {
            return Err(BluetoothError::ScanFailed(failure));
        }

        let mut active = self.active.lock().await;
        if active.is_some() {
            return Err(BluetoothError::ScanFailed(ScanFailure::new(
                ScanFailure::ALREADY_STARTED,
                "scan already started",
            )));
        }

        let replay = (!self.devices.is_empty()).then(|| self.spawn_replay(sink.clone()));
        *active = Some(ActiveScan { sink, replay });

        info!(mode = ?settings.mode, devices = self.devices.len(), "Mock scan started");
        Ok(())
    }

    async fn stop_scan(&self) -> BluetoothResult<()> {
        self.clear_active().await;
        debug!("Mock scan stopped");
        Ok(())
    }
}
