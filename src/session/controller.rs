use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use anyhow::{bail, Result};
use chrono::Utc;
use log::{debug, info};
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
    time,
};

use crate::{
    models::{Coordinate, Interval, IntervalRun},
    persistence::{PersistError, SessionPersister},
    tracking::{LocationError, LocationProvider, LocationTracker, SampleSink, WatchOptions},
};

use super::{
    config::{SessionConfig, TICK_MS},
    state::{EngineState, SampleOutcome, SessionSnapshot, TickOutcome},
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Result of the one save attempt made when the last interval completes.
/// The run is kept even when saving failed so the caller can retry.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOutcome {
    pub run: IntervalRun,
    pub result: Result<String, PersistError>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    PhaseChanged(SessionSnapshot),
    IntervalCompleted { number: u32, interval: Interval },
    TrackingError(String),
    SessionCompleted(SessionOutcome),
}

struct SessionInner {
    state: EngineState,
    tracker: LocationTracker,
    events: mpsc::UnboundedSender<SessionEvent>,
    ticker: Option<JoinHandle<()>>,
    /// Bumped whenever the ticker is replaced or stopped; a tick from an older epoch is stale.
    timer_epoch: u64,
    disposed: bool,
    log_every_tick: bool,
}

impl SessionInner {
    /// Subscribes or unsubscribes so that tracking matches the engine state.
    fn sync_tracking(&mut self, session: &Weak<Mutex<SessionInner>>) {
        let should_track = self.state.should_track() && !self.disposed;
        match (should_track, self.tracker.is_tracking()) {
            (true, false) => {
                if let Err(err) = self.tracker.start_tracking(session.clone()) {
                    log_error!("failed to start location tracking: {err:#}");
                    let _ = self.events.send(SessionEvent::TrackingError(format!("{err:#}")));
                }
            }
            (false, true) => self.tracker.stop_tracking(),
            _ => {}
        }
    }

    fn stop_ticker(&mut self) {
        self.timer_epoch += 1;
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
    }

    fn emit_phase(&self) {
        let _ = self
            .events
            .send(SessionEvent::PhaseChanged(self.state.snapshot()));
    }

    /// Runs one tick. Returns false once the ticker should stop.
    fn handle_tick(&mut self, session: &Weak<Mutex<SessionInner>>, persister: &SessionPersister) -> bool {
        match self.state.tick(Utc::now()) {
            TickOutcome::Counting { remaining_ms } => {
                if self.log_every_tick {
                    debug!(
                        "{} {}ms remaining, {:.1}m",
                        self.state.phase().label(),
                        remaining_ms,
                        self.state.distance_meters()
                    );
                }
                true
            }
            TickOutcome::RunStarted => {
                info!(
                    "Interval {}/{} started",
                    self.state.completed_count() + 1,
                    self.state.config().total_intervals
                );
                self.sync_tracking(session);
                self.emit_phase();
                true
            }
            TickOutcome::IntervalCompleted(interval) => {
                self.sync_tracking(session);
                self.announce_interval(interval);
                self.emit_phase();
                true
            }
            TickOutcome::Finished { interval, run } => {
                self.sync_tracking(session);
                self.timer_epoch += 1;
                self.ticker = None;
                self.announce_interval(interval);
                self.emit_phase();

                info!(
                    "Session finished: {} intervals, {:.1}m total",
                    run.intervals.len(),
                    run.total_distance_meters()
                );

                // Saved on its own task, outside the ticker.
                let persister = persister.clone();
                let events = self.events.clone();
                tokio::spawn(async move {
                    let result = persister.save(&run).await;
                    let _ = events.send(SessionEvent::SessionCompleted(SessionOutcome { run, result }));
                });
                false
            }
            TickOutcome::Ignored(reason) => {
                log_warn!("tick ignored ({:?})", reason);
                false
            }
        }
    }

    fn announce_interval(&self, interval: Interval) {
        let number = self.state.completed_count();
        info!(
            "Interval {}/{} completed: {:.1}m over {} samples",
            number,
            self.state.config().total_intervals,
            interval.distance_meters,
            interval.route.len()
        );
        let _ = self
            .events
            .send(SessionEvent::IntervalCompleted { number, interval });
    }

    fn is_current(&self, generation: u64) -> bool {
        self.tracker.active_generation() == Some(generation)
    }
}

impl SampleSink for SessionInner {
    fn accept_sample(&mut self, generation: u64, coordinate: Coordinate) {
        if !self.is_current(generation) {
            log_warn!("dropping sample from stale subscription {}", generation);
            return;
        }

        match self.state.record_sample(coordinate) {
            SampleOutcome::Seeded => {
                debug!("Interval route seeded at {:.6},{:.6}", coordinate.latitude, coordinate.longitude);
            }
            SampleOutcome::Accumulated { delta_meters } => {
                debug!(
                    "+{:.1}m ({:.1}m this interval)",
                    delta_meters,
                    self.state.distance_meters()
                );
            }
            SampleOutcome::Ignored(reason) => {
                log_warn!("sample ignored ({:?})", reason);
            }
        }
    }

    fn stream_error(&mut self, generation: u64, error: LocationError) {
        if !self.is_current(generation) {
            return;
        }
        log_warn!("location stream error: {}", error);
        let _ = self.events.send(SessionEvent::TrackingError(error.to_string()));
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
    }
}

/// Drives one interval session: the one-second ticker, location tracking while running,
/// and the save once the last interval completes.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Mutex<SessionInner>>,
    persister: SessionPersister,
    tick_interval: Duration,
}

impl SessionController {
    pub fn new(
        config: SessionConfig,
        provider: Arc<dyn LocationProvider>,
        watch_options: WatchOptions,
        persister: SessionPersister,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SessionEvent>)> {
        config.validate()?;

        let log_every_tick = std::env::var("INTERVALRUN_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let inner = SessionInner {
            state: EngineState::new(config),
            tracker: LocationTracker::new(provider, watch_options),
            events: event_tx,
            ticker: None,
            timer_epoch: 0,
            disposed: false,
            log_every_tick,
        };

        let controller = Self {
            inner: Arc::new(Mutex::new(inner)),
            persister,
            tick_interval: Duration::from_millis(TICK_MS),
        };
        Ok((controller, event_rx))
    }

    pub fn persister(&self) -> &SessionPersister {
        &self.persister
    }

    pub async fn start(&self) -> Result<SessionSnapshot> {
        let mut inner = self.inner.lock().await;
        if inner.disposed {
            bail!("session was abandoned");
        }
        if !inner.state.begin() {
            bail!("session already started");
        }

        let config = *inner.state.config();
        info!(
            "Interval session started: {} x {}ms with {}ms rest",
            config.total_intervals, config.interval_duration_ms, config.rest_duration_ms
        );

        self.spawn_ticker(&mut inner);
        inner.sync_tracking(&Arc::downgrade(&self.inner));
        inner.emit_phase();
        Ok(inner.state.snapshot())
    }

    /// Stops the ticker and location tracking before returning. Pausing twice is a no-op.
    pub async fn pause(&self) -> Result<SessionSnapshot> {
        let mut inner = self.inner.lock().await;
        if inner.disposed || !inner.state.is_started() || inner.state.is_finished() {
            bail!("no active session to pause");
        }
        if !inner.state.pause() {
            return Ok(inner.state.snapshot());
        }

        inner.stop_ticker();
        inner.sync_tracking(&Arc::downgrade(&self.inner));
        log_info!(
            "session paused in {} with {}ms remaining",
            inner.state.phase().label(),
            inner.state.remaining_ms()
        );
        inner.emit_phase();
        Ok(inner.state.snapshot())
    }

    pub async fn resume(&self) -> Result<SessionSnapshot> {
        let mut inner = self.inner.lock().await;
        if inner.disposed || !inner.state.is_started() || inner.state.is_finished() {
            bail!("no active session to resume");
        }
        if !inner.state.resume() {
            return Ok(inner.state.snapshot());
        }

        self.spawn_ticker(&mut inner);
        inner.sync_tracking(&Arc::downgrade(&self.inner));
        log_info!(
            "session resumed in {} with {}ms remaining",
            inner.state.phase().label(),
            inner.state.remaining_ms()
        );
        inner.emit_phase();
        Ok(inner.state.snapshot())
    }

    /// Discards the session without producing a run.
    pub async fn abandon(&self) {
        let mut inner = self.inner.lock().await;
        if inner.disposed {
            return;
        }
        inner.disposed = true;
        inner.stop_ticker();
        inner.tracker.stop_tracking();
        info!(
            "Session abandoned after {} completed intervals",
            inner.state.completed_count()
        );
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.inner.lock().await.state.snapshot()
    }

    pub async fn completed_intervals(&self) -> Vec<Interval> {
        self.inner.lock().await.state.completed_intervals().to_vec()
    }

    pub async fn is_tracking(&self) -> bool {
        self.inner.lock().await.tracker.is_tracking()
    }

    fn spawn_ticker(&self, inner: &mut SessionInner) {
        inner.stop_ticker();
        let epoch = inner.timer_epoch;

        let session = Arc::downgrade(&self.inner);
        let persister = self.persister.clone();
        let tick_interval = self.tick_interval;

        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(time::Instant::now() + tick_interval, tick_interval);
            loop {
                interval.tick().await;

                let Some(strong) = session.upgrade() else {
                    break;
                };
                let mut guard = strong.lock().await;
                if guard.timer_epoch != epoch || guard.disposed {
                    log_warn!("stale tick from timer epoch {} ignored", epoch);
                    break;
                }
                if !guard.handle_tick(&session, &persister) {
                    break;
                }
            }
        });

        inner.ticker = Some(handle);
    }
}
