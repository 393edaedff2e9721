//! Result list endpoints: the list itself and its live change feed.
//!
//! The feed is Server-Sent Events. It opens with a `reset` event carrying the
//! whole list, then sends one `inserted` or `changed` event per upsert, each
//! naming the row index so a client redraws only that row. A subscriber that
//! falls behind gets a fresh `reset` instead of the events it missed.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::{Json, Router};
use blescan_core::{ResultRow, ScanController, ViewEvent};
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::state::SharedState;

/// Creates the results router.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(get_results))
        .route("/events", get(stream_events))
}

/// The result list.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "scanning": true,
    "count": 1,
    "rows": [{
        "index": 0,
        "name": "Pixel Buds",
        "address": "AA:BB:CC:DD:EE:FF",
        "signal": "-55 dbm",
        "rssi_dbm": -55
    }]
}))]
pub struct ResultsResponse {
    /// Whether a scan is running.
    #[schema(example = true)]
    pub scanning: bool,

    /// Number of distinct devices.
    #[schema(example = 1)]
    pub count: usize,

    /// Rows in list order, one per device address.
    pub rows: Vec<ResultRow>,
}

/// Get the result list.
#[utoipa::path(
    get,
    path = "/api/results",
    tag = "results",
    operation_id = "getResults",
    summary = "List scan results",
    description = "Returns one row per device seen in the current (or last) scan session, \
        in the order devices were first seen. Each row shows the latest name and RSSI.",
    responses(
        (status = 200, description = "Result list", body = ResultsResponse)
    )
)]
pub async fn get_results(State(state): State<SharedState>) -> Json<ResultsResponse> {
    let rows = state.controller.rows().await;
    Json(ResultsResponse {
        scanning: state.controller.is_scanning(),
        count: rows.len(),
        rows,
    })
}

/// Follow the result list.
#[utoipa::path(
    get,
    path = "/api/results/events",
    tag = "results",
    operation_id = "streamResults",
    summary = "Stream result list changes",
    description = "Server-Sent Events. The event name is the `type` of the JSON payload: \
        `reset` (full list), `inserted` / `changed` (one row and its index), `scan_state` \
        and `notice`.",
    responses(
        (status = 200, description = "Event stream", content_type = "text/event-stream", body = ViewEvent)
    )
)]
pub async fn stream_events(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("SSE subscriber connected");
    let events = view_events(state.controller.clone()).await;
    Sse::new(events.map(|event| Ok(to_sse(&event)))).keep_alive(KeepAlive::default())
}

/// Snapshot followed by live changes.
///
/// Subscribes before taking the snapshot so no change is lost in between.
pub async fn view_events(controller: ScanController) -> impl Stream<Item = ViewEvent> {
    let receiver = controller.subscribe();
    let snapshot = ViewEvent::Reset {
        rows: controller.rows().await,
    };

    let updates = stream::unfold((receiver, controller), |(mut receiver, controller)| async move {
        let event = match receiver.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "SSE subscriber lagged, resending the list");
                ViewEvent::Reset {
                    rows: controller.rows().await,
                }
            }
            Err(RecvError::Closed) => return None,
        };
        Some((event, (receiver, controller)))
    });

    stream::once(async move { snapshot }).chain(updates)
}

fn to_sse(event: &ViewEvent) -> Event {
    Event::default()
        .event(event.kind())
        .json_data(event)
        .unwrap_or_else(|e| {
            warn!(error = %e, "Failed to encode view event");
            Event::default().comment("encoding failed")
        })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use blescan_core::{ControllerOptions, MockBackend, Observation, PolicyPermissions};

    use super::*;

    fn controller(backend: &Arc<MockBackend>) -> ScanController {
        ScanController::new(
            backend.clone(),
            Arc::new(PolicyPermissions::allow_all()),
            ControllerOptions::default(),
        )
    }

    async fn next<S: Stream<Item = ViewEvent> + Unpin>(events: &mut S) -> ViewEvent {
        tokio::time::timeout(Duration::from_secs(2), events.next())
            .await
            .expect("timed out")
            .expect("stream ended")
    }

    #[tokio::test]
    async fn test_feed_starts_with_snapshot() {
        let backend = Arc::new(MockBackend::new(true));
        let controller = controller(&backend);
        controller
            .record(Observation::new("AA:BB:CC:DD:EE:01", Some("Tag".into()), -40))
            .await;

        let mut events = Box::pin(view_events(controller.clone()).await);

        match next(&mut events).await {
            ViewEvent::Reset { rows } => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].name, "Tag");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_feed_reports_row_indices() {
        let backend = Arc::new(MockBackend::new(true));
        let controller = controller(&backend);
        let mut events = Box::pin(view_events(controller.clone()).await);
        let mut rows = Vec::new();
        assert!(next(&mut events).await.apply(&mut rows));

        controller
            .record(Observation::new("AA:BB:CC:DD:EE:01", None, -40))
            .await;
        controller
            .record(Observation::new("AA:BB:CC:DD:EE:02", None, -50))
            .await;
        controller
            .record(Observation::new("AA:BB:CC:DD:EE:01", None, -70))
            .await;

        let mut kinds = Vec::new();
        for _ in 0..3 {
            let event = next(&mut events).await;
            assert!(event.apply(&mut rows));
            kinds.push(event.kind());
        }

        assert_eq!(kinds, vec!["inserted", "inserted", "changed"]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].signal, "-70 dbm");
        assert_eq!(rows[1].rssi_dbm, -50);
    }

    #[test]
    fn test_sse_event_encoding() {
        let event = ViewEvent::Inserted {
            row: ResultRow::render(0, &Observation::new("AA:BB:CC:DD:EE:01", None, -40)),
        };
        let encoded = format!("{:?}", to_sse(&event));
        assert!(encoded.contains("inserted"));
    }
}
