//! The scan controller: radio buttons, the scan button and the live result list.
//!
//! [`ScanController`] owns the [`ScanResultList`] for the current session.
//! A scan session feeds observations through a bounded channel into a single
//! consumer task, which is the only writer of the list. Every mutation is
//! published to subscribers as a [`ViewEvent`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, trace, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::bluetooth::{BluetoothBackend, BluetoothError, ScanEvent, ScanSettings};
use crate::error::{BlescanError, Result};
use crate::notice::Notice;
use crate::permissions::{Permission, PermissionGate, PermissionStatus};
use crate::results::{ScanResultList, Upsert};
use crate::types::Observation;
use crate::view::{ResultRow, ViewEvent};

/// Tunables for a [`ScanController`].
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// Settings applied to every scan session.
    pub settings: ScanSettings,

    /// Permissions checked (and requested) before each scan.
    pub required_permissions: Vec<Permission>,

    /// Capacity of the backend-to-consumer channel.
    pub channel_capacity: usize,

    /// Capacity of the view event broadcast.
    pub event_capacity: usize,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            settings: ScanSettings::default(),
            required_permissions: vec![Permission::Location],
            channel_capacity: 256,
            event_capacity: 256,
        }
    }
}

/// Result of an on/off button press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RadioOutcome {
    /// The radio changed to `enabled`.
    Changed {
        /// New power state.
        enabled: bool,
    },
    /// The radio was already `enabled`; nothing happened.
    Unchanged {
        /// Current power state.
        enabled: bool,
    },
}

impl RadioOutcome {
    /// Power state after the press.
    #[must_use]
    pub const fn enabled(self) -> bool {
        match self {
            Self::Changed { enabled } | Self::Unchanged { enabled } => enabled,
        }
    }

    /// Returns `true` if the radio state changed.
    #[must_use]
    pub const fn is_change(self) -> bool {
        matches!(self, Self::Changed { .. })
    }

    /// Informational notice describing the outcome.
    #[must_use]
    pub fn notice(self) -> Notice {
        let state = if self.enabled() { "on" } else { "off" };
        match self {
            Self::Changed { .. } => Notice::info(format!("Bluetooth turned {state}")),
            Self::Unchanged { .. } => Notice::info(format!("Bluetooth already {state}")),
        }
    }
}

/// What a scan button press did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScanOutcome {
    /// A new session started.
    Started {
        /// The new session.
        session_id: Uuid,
    },
    /// A session was already running; nothing happened.
    AlreadyScanning {
        /// The running session.
        session_id: Option<Uuid>,
    },
    /// The running session stopped.
    Stopped {
        /// The stopped session.
        session_id: Option<Uuid>,
    },
    /// Nothing was running; nothing happened.
    NotScanning,
}

impl ScanOutcome {
    /// Whether a scan runs after this outcome.
    #[must_use]
    pub const fn scanning(self) -> bool {
        matches!(self, Self::Started { .. } | Self::AlreadyScanning { .. })
    }
}

/// A [`ScanOutcome`] plus the notices raised on the way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    /// What happened.
    pub outcome: ScanOutcome,

    /// Notices in the order they were raised.
    pub notices: Vec<Notice>,
}

/// Snapshot of the controller state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ControllerStatus {
    /// Backend label (`bluez` or `mock`).
    pub backend: String,

    /// Whether the radio is powered.
    pub radio_enabled: bool,

    /// Whether a scan is running.
    pub scanning: bool,

    /// The running session, if any.
    pub session_id: Option<Uuid>,

    /// Distinct devices in the current list.
    pub result_count: usize,

    /// Settings used for scans.
    pub settings: ScanSettings,
}

struct Session {
    id: Uuid,
    consumer: JoinHandle<()>,
}

struct Inner {
    backend: Arc<dyn BluetoothBackend>,
    permissions: Arc<dyn PermissionGate>,
    options: ControllerOptions,
    results: RwLock<ScanResultList>,
    events: broadcast::Sender<ViewEvent>,
    active: Mutex<Option<Uuid>>,
    // Serializes start/stop and owns the consumer handle.
    session: tokio::sync::Mutex<Option<Session>>,
}

impl Inner {
    fn lock_active(&self) -> MutexGuard<'_, Option<Uuid>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn active_session(&self) -> Option<Uuid> {
        *self.lock_active()
    }

    /// Clear the active session if it is still `session_id`.
    fn end_session(&self, session_id: Uuid) -> bool {
        let mut active = self.lock_active();
        if *active == Some(session_id) {
            *active = None;
            true
        } else {
            false
        }
    }

    fn publish(&self, event: ViewEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn notify(&self, notice: Notice) {
        self.publish(ViewEvent::Notice { notice });
    }

    async fn record(&self, observation: Observation) -> Option<Upsert> {
        if !self.options.settings.filter.matches(&observation) {
            trace!(address = %observation.address, "Filtered out");
            return None;
        }

        let (upsert, row) = {
            let mut results = self.results.write().await;
            let upsert = results.upsert(observation);
            let row = results
                .get(upsert.index())
                .map(|o| ResultRow::render(upsert.index(), o))?;
            (upsert, row)
        };

        match upsert {
            Upsert::Inserted(index) => {
                info!(name = %row.name, address = %row.address, index, "Found BLE device");
                self.publish(ViewEvent::Inserted { row });
            }
            Upsert::Updated(index) => {
                trace!(address = %row.address, rssi = row.rssi_dbm, index, "Device updated");
                self.publish(ViewEvent::Changed { row });
            }
        }
        Some(upsert)
    }
}

/// Drain one session's channel into the result list.
async fn consume(inner: Arc<Inner>, session_id: Uuid, mut events: mpsc::Receiver<ScanEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            ScanEvent::Result(observation) => {
                inner.record(observation).await;
            }
            ScanEvent::Failed(failure) => {
                error!(
                    code = failure.code,
                    %session_id,
                    "Scan failed: {}",
                    failure.message
                );
                if inner.end_session(session_id) {
                    inner.publish(ViewEvent::ScanState {
                        scanning: false,
                        session_id: Some(session_id),
                    });
                    inner.notify(Notice::error(format!(
                        "Scan failed (code {})",
                        failure.code
                    )));
                }
                if let Err(e) = inner.backend.stop_scan().await {
                    debug!(error = %e, "Backend cleanup after scan failure");
                }
                return;
            }
        }
    }

    if inner.end_session(session_id) {
        warn!(%session_id, "Scan ended without a stop request");
        inner.publish(ViewEvent::ScanState {
            scanning: false,
            session_id: Some(session_id),
        });
    }
}

/// Handle to the scanner. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ScanController {
    inner: Arc<Inner>,
}

impl ScanController {
    /// Create a controller over `backend` and `permissions`.
    #[must_use]
    pub fn new(
        backend: Arc<dyn BluetoothBackend>,
        permissions: Arc<dyn PermissionGate>,
        options: ControllerOptions,
    ) -> Self {
        let (events, _) = broadcast::channel(options.event_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                backend,
                permissions,
                options,
                results: RwLock::new(ScanResultList::new()),
                events,
                active: Mutex::new(None),
                session: tokio::sync::Mutex::new(None),
            }),
        }
    }

    /// Settings applied to scans.
    #[must_use]
    pub fn settings(&self) -> &ScanSettings {
        &self.inner.options.settings
    }

    /// Label of the backend in use.
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.inner.backend.name()
    }

    /// Subscribe to list and state changes.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ViewEvent> {
        self.inner.events.subscribe()
    }

    /// Whether the radio is powered.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be queried.
    pub async fn is_radio_enabled(&self) -> Result<bool> {
        Ok(self.inner.backend.is_enabled().await?)
    }

    /// The "on" button.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to change power.
    pub async fn enable_radio(&self) -> Result<RadioOutcome> {
        self.set_radio(true).await
    }

    /// The "off" button. Stops a running scan first.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to change power.
    pub async fn disable_radio(&self) -> Result<RadioOutcome> {
        self.set_radio(false).await
    }

    #[instrument(skip(self))]
    async fn set_radio(&self, enabled: bool) -> Result<RadioOutcome> {
        let outcome = if self.inner.backend.is_enabled().await? == enabled {
            RadioOutcome::Unchanged { enabled }
        } else {
            if !enabled && self.is_scanning() {
                self.stop_scan().await?;
            }
            self.inner.backend.set_enabled(enabled).await?;
            RadioOutcome::Changed { enabled }
        };

        info!(?outcome, "Radio button handled");
        self.inner.notify(outcome.notice());
        Ok(outcome)
    }

    /// Whether a scan session is running.
    #[must_use]
    pub fn is_scanning(&self) -> bool {
        self.inner.active_session().is_some()
    }

    /// Start a scan session with an empty list.
    ///
    /// Starting while a session runs is a no-op.
    ///
    /// # Errors
    ///
    /// - [`BlescanError::RadioDisabled`] if the radio is off
    /// - [`BlescanError::PermissionDenied`] if a required permission is refused
    /// - [`BlescanError::ScanStartFailed`] if the backend refuses to scan
    #[instrument(skip(self))]
    pub async fn start_scan(&self) -> Result<ScanReport> {
        let mut session = self.inner.session.lock().await;

        if let Some(session_id) = self.inner.active_session() {
            return Ok(ScanReport {
                outcome: ScanOutcome::AlreadyScanning {
                    session_id: Some(session_id),
                },
                notices: vec![Notice::info("Already scanning")],
            });
        }

        if !self.inner.backend.is_enabled().await? {
            warn!("Scan requested with the radio off");
            self.inner.notify(Notice::warning("Bluetooth is off"));
            return Err(BlescanError::RadioDisabled);
        }

        let mut notices = Vec::new();
        for &permission in &self.inner.options.required_permissions {
            notices.push(self.ensure_permission(permission).await?);
        }

        // Reap the consumer of a session that ended on its own.
        if let Some(previous) = session.take() {
            previous.consumer.abort();
            let _ = previous.consumer.await;
        }

        let (sink, events) = mpsc::channel(self.inner.options.channel_capacity.max(1));
        if let Err(err) = self
            .inner
            .backend
            .start_scan(&self.inner.options.settings, sink)
            .await
        {
            match &err {
                BluetoothError::ScanFailed(failure) => {
                    error!(code = failure.code, "Scan failed to start: {}", failure.message);
                }
                other => error!(error = %other, "Scan failed to start"),
            }
            let err = BlescanError::from(err);
            self.inner.notify(Notice::error(err.to_string()));
            return Err(err);
        }

        // Events already sent wait in the channel until the consumer runs.
        self.inner.results.write().await.clear();
        self.inner.publish(ViewEvent::Reset { rows: Vec::new() });

        let session_id = Uuid::now_v7();
        *self.inner.lock_active() = Some(session_id);
        let consumer = tokio::spawn(consume(Arc::clone(&self.inner), session_id, events));
        *session = Some(Session {
            id: session_id,
            consumer,
        });

        info!(%session_id, settings = ?self.inner.options.settings, "Scanning started");
        self.inner.publish(ViewEvent::ScanState {
            scanning: true,
            session_id: Some(session_id),
        });
        let started = Notice::info("Scanning started");
        self.inner.notify(started.clone());
        notices.push(started);

        Ok(ScanReport {
            outcome: ScanOutcome::Started { session_id },
            notices,
        })
    }

    async fn ensure_permission(&self, permission: Permission) -> Result<Notice> {
        let gate = &self.inner.permissions;
        let granted = match gate.status(permission).await {
            PermissionStatus::Granted => true,
            PermissionStatus::Denied | PermissionStatus::Undetermined => {
                gate.request(permission).await.is_granted()
            }
        };

        if granted {
            let notice = Notice::info(format!("{} permission granted", permission.label()));
            self.inner.notify(notice.clone());
            Ok(notice)
        } else {
            warn!(%permission, "Permission refused, scan not started");
            self.inner.notify(Notice::warning(format!(
                "{} permission refused",
                permission.label()
            )));
            Err(BlescanError::PermissionDenied(permission.label().to_string()))
        }
    }

    /// Stop the running session. Results stay in place.
    ///
    /// Stopping while idle is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to stop; the session is ended regardless.
    #[instrument(skip(self))]
    pub async fn stop_scan(&self) -> Result<ScanReport> {
        let mut session = self.inner.session.lock().await;

        let Some(session_id) = self.inner.lock_active().take() else {
            return Ok(ScanReport {
                outcome: ScanOutcome::NotScanning,
                notices: vec![Notice::info("Not scanning")],
            });
        };

        let stopped = self.inner.backend.stop_scan().await;
        if let Some(current) = session.take() {
            debug!(session_id = %current.id, "Stopping scan consumer");
            current.consumer.abort();
            let _ = current.consumer.await;
        }

        info!(%session_id, "Scanning stopped");
        self.inner.publish(ViewEvent::ScanState {
            scanning: false,
            session_id: Some(session_id),
        });
        let notice = Notice::info("Stopped scanning");
        self.inner.notify(notice.clone());

        stopped?;
        Ok(ScanReport {
            outcome: ScanOutcome::Stopped {
                session_id: Some(session_id),
            },
            notices: vec![notice],
        })
    }

    /// The scan button: stop if scanning, start otherwise.
    ///
    /// # Errors
    ///
    /// See [`Self::start_scan`] and [`Self::stop_scan`].
    pub async fn toggle_scan(&self) -> Result<ScanReport> {
        if self.is_scanning() {
            self.stop_scan().await
        } else {
            self.start_scan().await
        }
    }

    /// Apply one observation as if delivered by the running scan.
    ///
    /// Returns `None` if the scan filter rejects it.
    pub async fn record(&self, observation: Observation) -> Option<Upsert> {
        self.inner.record(observation).await
    }

    /// Observations in list order.
    pub async fn results(&self) -> Vec<Observation> {
        self.inner.results.read().await.as_slice().to_vec()
    }

    /// Rendered rows in list order.
    pub async fn rows(&self) -> Vec<ResultRow> {
        ResultRow::render_all(self.inner.results.read().await.iter())
    }

    /// Number of distinct devices in the list.
    pub async fn result_count(&self) -> usize {
        self.inner.results.read().await.len()
    }

    /// Current state.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be queried.
    pub async fn status(&self) -> Result<ControllerStatus> {
        Ok(ControllerStatus {
            backend: self.backend_name().to_string(),
            radio_enabled: self.is_radio_enabled().await?,
            scanning: self.is_scanning(),
            session_id: self.inner.active_session(),
            result_count: self.result_count().await,
            settings: self.inner.options.settings.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::*;
    use crate::bluetooth::{MockBackend, ScanFailure, ScanFilter};
    use crate::notice::NoticeLevel;
    use crate::permissions::{PermissionPolicy, PolicyPermissions};

    fn controller_with(
        backend: &Arc<MockBackend>,
        permissions: PolicyPermissions,
        settings: ScanSettings,
    ) -> ScanController {
        let options = ControllerOptions {
            settings,
            ..ControllerOptions::default()
        };
        ScanController::new(backend.clone(), Arc::new(permissions), options)
    }

    fn controller(backend: &Arc<MockBackend>) -> ScanController {
        controller_with(
            backend,
            PolicyPermissions::allow_all(),
            ScanSettings::default(),
        )
    }

    async fn next_event(rx: &mut broadcast::Receiver<ViewEvent>) -> ViewEvent {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for view event")
            .expect("view channel closed")
    }

    /// Skip notices and scan state changes.
    async fn next_row_event(rx: &mut broadcast::Receiver<ViewEvent>) -> ViewEvent {
        loop {
            let event = next_event(rx).await;
            if matches!(
                event,
                ViewEvent::Inserted { .. } | ViewEvent::Changed { .. } | ViewEvent::Reset { .. }
            ) {
                return event;
            }
        }
    }

    async fn wait_until_idle(controller: &ScanController) {
        for _ in 0..200 {
            if !controller.is_scanning() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("scan never ended");
    }

    #[tokio::test]
    async fn test_enable_when_already_enabled_is_informational() {
        let backend = Arc::new(MockBackend::new(true));
        let controller = controller(&backend);

        let outcome = controller.enable_radio().await.unwrap();

        assert_eq!(outcome, RadioOutcome::Unchanged { enabled: true });
        assert!(!outcome.is_change());
        let notice = outcome.notice();
        assert_eq!(notice.level, NoticeLevel::Info);
        assert_eq!(notice.message, "Bluetooth already on");
        assert!(controller.is_radio_enabled().await.unwrap());
    }

    #[tokio::test]
    async fn test_enable_and_disable_change_state() {
        let backend = Arc::new(MockBackend::new(false));
        let controller = controller(&backend);

        let on = controller.enable_radio().await.unwrap();
        assert_eq!(on, RadioOutcome::Changed { enabled: true });
        assert_eq!(on.notice().message, "Bluetooth turned on");

        let off = controller.disable_radio().await.unwrap();
        assert_eq!(off, RadioOutcome::Changed { enabled: false });
        assert_eq!(
            controller.disable_radio().await.unwrap().notice().message,
            "Bluetooth already off"
        );
    }

    #[tokio::test]
    async fn test_scan_requires_radio() {
        let backend = Arc::new(MockBackend::new(false));
        let controller = controller(&backend);

        let err = controller.start_scan().await.unwrap_err();
        assert!(matches!(err, BlescanError::RadioDisabled));
        assert!(!controller.is_scanning());
    }

    #[tokio::test]
    async fn test_scan_session_upserts_by_address() {
        let backend = Arc::new(MockBackend::new(true));
        let controller = controller(&backend);
        let mut rx = controller.subscribe();

        let report = controller.start_scan().await.unwrap();
        assert!(matches!(report.outcome, ScanOutcome::Started { .. }));
        assert_eq!(
            report.notices.last().map(|n| n.message.as_str()),
            Some("Scanning started")
        );
        assert_eq!(next_row_event(&mut rx).await, ViewEvent::Reset { rows: vec![] });

        backend
            .inject(Observation::new("AA:BB", Some("X".into()), -40))
            .await;
        backend
            .inject(Observation::new("AA:BB", Some("X".into()), -55))
            .await;
        backend
            .inject(Observation::new("CC:DD", Some("Y".into()), -70))
            .await;

        match next_row_event(&mut rx).await {
            ViewEvent::Inserted { row } => assert_eq!((row.index, row.rssi_dbm), (0, -40)),
            other => panic!("unexpected event: {other:?}"),
        }
        match next_row_event(&mut rx).await {
            ViewEvent::Changed { row } => assert_eq!((row.index, row.rssi_dbm), (0, -55)),
            other => panic!("unexpected event: {other:?}"),
        }
        match next_row_event(&mut rx).await {
            ViewEvent::Inserted { row } => {
                assert_eq!((row.index, row.address.as_str()), (1, "CC:DD"));
            }
            other => panic!("unexpected event: {other:?}"),
        }

        let results = controller.results().await;
        let summary: Vec<(&str, i16)> =
            results.iter().map(|o| (o.address.as_str(), o.rssi)).collect();
        assert_eq!(summary, vec![("AA:BB", -55), ("CC:DD", -70)]);

        let stop = controller.stop_scan().await.unwrap();
        assert!(matches!(stop.outcome, ScanOutcome::Stopped { .. }));
        assert!(!backend.is_scanning().await);
        assert_eq!(controller.result_count().await, 2);
    }

    #[tokio::test]
    async fn test_start_twice_is_noop() {
        let backend = Arc::new(MockBackend::new(true));
        let controller = controller(&backend);

        let first = controller.start_scan().await.unwrap();
        let second = controller.start_scan().await.unwrap();

        let ScanOutcome::Started { session_id } = first.outcome else {
            panic!("first start did not start");
        };
        assert_eq!(
            second.outcome,
            ScanOutcome::AlreadyScanning {
                session_id: Some(session_id)
            }
        );
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_noop() {
        let backend = Arc::new(MockBackend::new(true));
        let controller = controller(&backend);

        let report = controller.stop_scan().await.unwrap();
        assert_eq!(report.outcome, ScanOutcome::NotScanning);
    }

    #[tokio::test]
    async fn test_toggle_alternates() {
        let backend = Arc::new(MockBackend::new(true));
        let controller = controller(&backend);

        assert!(controller.toggle_scan().await.unwrap().outcome.scanning());
        assert!(controller.is_scanning());
        assert!(!controller.toggle_scan().await.unwrap().outcome.scanning());
        assert!(!controller.is_scanning());
    }

    #[tokio::test]
    async fn test_new_session_starts_empty() {
        let backend = Arc::new(MockBackend::new(true));
        let controller = controller(&backend);

        controller.start_scan().await.unwrap();
        controller
            .record(Observation::new("AA:BB:CC:DD:EE:FF", None, -50))
            .await;
        controller.stop_scan().await.unwrap();
        assert_eq!(controller.result_count().await, 1);

        controller.start_scan().await.unwrap();
        assert_eq!(controller.result_count().await, 0);
    }

    #[tokio::test]
    async fn test_permission_denied_blocks_scan() {
        let backend = Arc::new(MockBackend::new(true));
        let policies = HashMap::from([(Permission::Location, PermissionPolicy::Deny)]);
        let controller = controller_with(
            &backend,
            PolicyPermissions::new(policies, Duration::from_secs(1)),
            ScanSettings::default(),
        );
        let mut rx = controller.subscribe();

        let err = controller.start_scan().await.unwrap_err();

        assert!(matches!(err, BlescanError::PermissionDenied(ref name) if name == "Location"));
        assert!(!controller.is_scanning());
        assert!(!backend.is_scanning().await);
        assert_eq!(
            next_event(&mut rx).await,
            ViewEvent::Notice {
                notice: Notice::warning("Location permission refused")
            }
        );
    }

    #[tokio::test]
    async fn test_start_failure_is_reported() {
        let backend = Arc::new(MockBackend::new(true));
        backend
            .fail_next_start(ScanFailure::new(ScanFailure::FEATURE_UNSUPPORTED, "no LE"))
            .await;
        let controller = controller(&backend);

        let err = controller.start_scan().await.unwrap_err();

        assert!(matches!(err, BlescanError::ScanStartFailed { code: 4, .. }));
        assert!(!controller.is_scanning());
    }

    #[tokio::test]
    async fn test_failed_start_keeps_previous_results() {
        let backend = Arc::new(MockBackend::new(true));
        let controller = controller(&backend);

        controller.start_scan().await.unwrap();
        controller
            .record(Observation::new("AA:BB:CC:DD:EE:FF", Some("Tag".into()), -50))
            .await;
        controller.stop_scan().await.unwrap();

        backend
            .fail_next_start(ScanFailure::new(ScanFailure::REGISTRATION_FAILED, "busy"))
            .await;
        let mut rx = controller.subscribe();
        assert!(controller.start_scan().await.is_err());

        assert_eq!(controller.result_count().await, 1);
        while let Ok(event) = rx.try_recv() {
            assert!(!matches!(event, ViewEvent::Reset { .. }), "list was reset");
        }
    }

    #[tokio::test]
    async fn test_failure_during_scan_ends_session() {
        let backend = Arc::new(MockBackend::new(true));
        let controller = controller(&backend);
        controller.start_scan().await.unwrap();
        let mut rx = controller.subscribe();

        assert!(
            backend
                .fail_active_scan(ScanFailure::new(ScanFailure::INTERNAL_ERROR, "stack reset"))
                .await
        );
        wait_until_idle(&controller).await;

        let mut saw_error = false;
        while let Ok(Ok(event)) = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await
        {
            if let ViewEvent::Notice { notice } = event {
                saw_error |= notice.level == NoticeLevel::Error;
            }
        }
        assert!(saw_error);

        // A failed session can be replaced by a new one.
        assert!(controller.start_scan().await.unwrap().outcome.scanning());
    }

    #[tokio::test]
    async fn test_disable_radio_stops_scan() {
        let backend = Arc::new(MockBackend::new(true));
        let controller = controller(&backend);
        controller.start_scan().await.unwrap();

        controller.disable_radio().await.unwrap();

        assert!(!controller.is_scanning());
        assert!(!backend.is_scanning().await);
    }

    #[tokio::test]
    async fn test_filter_drops_non_matching() {
        let backend = Arc::new(MockBackend::new(true));
        let settings = ScanSettings {
            filter: ScanFilter {
                min_rssi: Some(-80),
                ..ScanFilter::default()
            },
            ..ScanSettings::default()
        };
        let controller = controller_with(&backend, PolicyPermissions::allow_all(), settings);

        assert_eq!(
            controller
                .record(Observation::new("AA:BB:CC:DD:EE:01", None, -95))
                .await,
            None
        );
        assert_eq!(
            controller
                .record(Observation::new("AA:BB:CC:DD:EE:02", None, -60))
                .await,
            Some(Upsert::Inserted(0))
        );
    }

    #[tokio::test]
    async fn test_status_snapshot() {
        let backend = Arc::new(MockBackend::new(true));
        let controller = controller(&backend);

        let idle = controller.status().await.unwrap();
        assert_eq!(idle.backend, "mock");
        assert!(idle.radio_enabled);
        assert!(!idle.scanning);
        assert_eq!(idle.session_id, None);

        controller.start_scan().await.unwrap();
        let running = controller.status().await.unwrap();
        assert!(running.scanning);
        assert!(running.session_id.is_some());
    }
}
