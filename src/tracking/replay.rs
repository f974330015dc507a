use std::{
    collections::HashMap,
    fs,
    path::Path,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::{bail, Context, Result};
use log::{debug, warn};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{geo, models::Coordinate};

use super::provider::{LocationError, LocationEvent, LocationProvider, LocationSink, WatchId, WatchOptions};

/// Plays back a recorded route, one fix per `period`. The playback position is shared by
/// all subscriptions, so a resumed watch continues where the previous one stopped.
pub struct ReplayLocationProvider {
    route: Arc<Vec<Coordinate>>,
    period: Duration,
    cursor: Arc<AtomicUsize>,
    next_id: AtomicU64,
    watches: Mutex<HashMap<WatchId, CancellationToken>>,
}

impl ReplayLocationProvider {
    pub fn new(route: Vec<Coordinate>, period: Duration) -> Self {
        Self {
            route: Arc::new(route),
            period,
            cursor: Arc::new(AtomicUsize::new(0)),
            next_id: AtomicU64::new(1),
            watches: Mutex::new(HashMap::new()),
        }
    }

    /// Loads a JSON array of coordinates.
    pub fn from_json_file(path: &Path, period: Duration) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read route from {}", path.display()))?;
        let route: Vec<Coordinate> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse route in {}", path.display()))?;
        if route.is_empty() {
            bail!("route file {} contains no coordinates", path.display());
        }
        Ok(Self::new(route, period))
    }

    pub fn active_watches(&self) -> usize {
        self.lock_watches().len()
    }

    fn lock_watches(&self) -> std::sync::MutexGuard<'_, HashMap<WatchId, CancellationToken>> {
        match self.watches.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl LocationProvider for ReplayLocationProvider {
    fn subscribe(&self, options: WatchOptions, sink: LocationSink) -> Result<WatchId, LocationError> {
        if self.route.is_empty() {
            return Err(LocationError::Unavailable);
        }

        let id = WatchId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let cancel_token = CancellationToken::new();
        self.lock_watches().insert(id, cancel_token.clone());

        debug!(
            "Replay watch {} subscribed (high accuracy: {})",
            id.0, options.high_accuracy
        );

        let route = self.route.clone();
        let cursor = self.cursor.clone();
        let period = self.period;
        tokio::spawn(async move {
            let mut ticker = time::interval_at(time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last_sent: Option<Coordinate> = None;

            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => break,
                    _ = ticker.tick() => {
                        let index = cursor.fetch_add(1, Ordering::Relaxed);
                        let Some(coordinate) = route.get(index).copied() else {
                            if sink.send(LocationEvent::Error(LocationError::Unavailable)).is_err() {
                                break;
                            }
                            continue;
                        };

                        let moved = last_sent
                            .map(|previous| geo::distance(&previous, &coordinate))
                            .unwrap_or(f64::INFINITY);
                        if moved < options.min_movement_meters {
                            continue;
                        }

                        if sink.send(LocationEvent::Sample(coordinate)).is_err() {
                            break;
                        }
                        last_sent = Some(coordinate);
                    }
                }
            }
        });

        Ok(id)
    }

    fn unsubscribe(&self, id: WatchId) {
        match self.lock_watches().remove(&id) {
            Some(token) => token.cancel(),
            None => warn!("Replay watch {} was not active", id.0),
        }
    }
}
