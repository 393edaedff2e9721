//! Presentation surface for the result list.
//!
//! Rows are rendered from observations, and every list mutation is published
//! as a [`ViewEvent`] naming the affected index so a client redraws only that
//! row. A [`ViewEvent::Reset`] carries the full list and replaces whatever
//! the client holds.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::notice::Notice;
use crate::types::Observation;

/// One rendered list row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "index": 0,
    "name": "Pixel Buds",
    "address": "AA:BB:CC:DD:EE:FF",
    "signal": "-55 dbm",
    "rssi_dbm": -55
}))]
pub struct ResultRow {
    /// Position in the list.
    pub index: usize,

    /// Device name, `"unnamed"` if none was advertised.
    #[schema(example = "Pixel Buds")]
    pub name: String,

    /// Device MAC address.
    #[schema(example = "AA:BB:CC:DD:EE:FF")]
    pub address: String,

    /// Signal strength text.
    #[schema(example = "-55 dbm")]
    pub signal: String,

    /// Signal strength in dBm.
    #[schema(example = -55)]
    pub rssi_dbm: i16,
}

impl ResultRow {
    /// Render `observation` as the row at `index`.
    #[must_use]
    pub fn render(index: usize, observation: &Observation) -> Self {
        Self {
            index,
            name: observation.display_name().to_string(),
            address: observation.address.clone(),
            signal: format!("{} dbm", observation.rssi),
            rssi_dbm: observation.rssi,
        }
    }

    /// Render a whole list in order.
    pub fn render_all<'a>(observations: impl IntoIterator<Item = &'a Observation>) -> Vec<Self> {
        observations
            .into_iter()
            .enumerate()
            .map(|(i, o)| Self::render(i, o))
            .collect()
    }
}

/// A change the presentation layer must apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewEvent {
    /// Replace the whole list.
    Reset {
        /// Rows in order.
        rows: Vec<ResultRow>,
    },
    /// A row was appended.
    Inserted {
        /// The new row.
        row: ResultRow,
    },
    /// A row was overwritten in place.
    Changed {
        /// The updated row.
        row: ResultRow,
    },
    /// Scanning started or stopped.
    ScanState {
        /// Whether a scan is running.
        scanning: bool,
        /// Session the change belongs to.
        session_id: Option<Uuid>,
    },
    /// Something to tell the user.
    Notice {
        /// The notice.
        notice: Notice,
    },
}

impl ViewEvent {
    /// SSE event name.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Reset { .. } => "reset",
            Self::Inserted { .. } => "inserted",
            Self::Changed { .. } => "changed",
            Self::ScanState { .. } => "scan_state",
            Self::Notice { .. } => "notice",
        }
    }

    /// Apply this event to a client-side copy of the list.
    ///
    /// An insert the copy already holds (seen in a snapshot taken after the
    /// event was raised) overwrites its row. Returns `false` if the event
    /// refers to a row beyond the copy, in which case the client should fetch
    /// a fresh snapshot.
    pub fn apply(&self, rows: &mut Vec<ResultRow>) -> bool {
        match self {
            Self::Reset { rows: fresh } => {
                rows.clone_from(fresh);
                true
            }
            Self::Inserted { row } if row.index == rows.len() => {
                rows.push(row.clone());
                true
            }
            Self::Inserted { row } | Self::Changed { row } => match rows.get_mut(row.index) {
                Some(slot) => {
                    *slot = row.clone();
                    true
                }
                None => false,
            },
            Self::ScanState { .. } | Self::Notice { .. } => true,
        }
    }
}
