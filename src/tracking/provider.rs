//! The location-stream collaborator.
//!
//! A provider pushes [`LocationEvent`]s into the sink handed to [`LocationProvider::subscribe`]
//! until the matching [`LocationProvider::unsubscribe`]. Events that arrive after unsubscribe
//! are dropped by the tracker, so providers don't need to stop instantly.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::models::Coordinate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct WatchOptions {
    pub high_accuracy: bool,
    /// Samples closer than this to the previous delivered sample are suppressed.
    pub min_movement_meters: f64,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            min_movement_meters: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WatchId(pub u64);

#[derive(Debug, Clone, Error, PartialEq)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("position unavailable")]
    Unavailable,
    #[error("location request timed out")]
    Timeout,
    #[error("location stream failed: {0}")]
    Other(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LocationEvent {
    Sample(Coordinate),
    Error(LocationError),
}

pub type LocationSink = mpsc::UnboundedSender<LocationEvent>;

pub trait LocationProvider: Send + Sync {
    fn subscribe(&self, options: WatchOptions, sink: LocationSink) -> Result<WatchId, LocationError>;

    fn unsubscribe(&self, id: WatchId);
}
