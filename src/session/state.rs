use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    geo,
    models::{Coordinate, Interval, IntervalRun},
    pace::{format_distance, format_elapsed, format_pace, ZERO_PACE},
};

use super::config::{SessionConfig, TICK_MS};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Resting,
    Running,
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Resting
    }
}

impl Phase {
    /// Caption shown under the countdown.
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Resting => "Rest",
            Phase::Running => "Time",
        }
    }
}

/// Why a tick or a sample was dropped without touching the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ignored {
    NotStarted,
    Paused,
    Finished,
    Resting,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Counting { remaining_ms: u64 },
    RunStarted,
    IntervalCompleted(Interval),
    /// The last interval completed. `run` holds every interval, including `interval`.
    Finished { interval: Interval, run: IntervalRun },
    Ignored(Ignored),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleOutcome {
    /// First sample of the interval; nothing to difference against yet.
    Seeded,
    Accumulated { delta_meters: f64 },
    Ignored(Ignored),
}

/// Read-only view of the session for display.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub paused: bool,
    pub finished: bool,
    pub remaining_ms: u64,
    pub remaining_label: String,
    pub accumulated_distance_meters: f64,
    pub display_distance: String,
    pub avg_pace_label: String,
    /// 1-based number of the interval being run or rested for.
    pub interval_number: u32,
    pub completed_intervals: u32,
    pub total_intervals: u32,
}

/// The interval session state machine. Pure: no timers, no IO.
#[derive(Debug, Clone)]
pub struct EngineState {
    config: SessionConfig,
    phase: Phase,
    started: bool,
    paused: bool,
    finished: bool,
    remaining_ms: u64,
    route: Vec<Coordinate>,
    distance_meters: f64,
    completed: Vec<Interval>,
    completed_count: u32,
    /// Only read for the instantaneous speed; the route owns the samples.
    last_coordinate: Option<Coordinate>,
}

impl EngineState {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            phase: Phase::Resting,
            started: false,
            paused: false,
            finished: false,
            remaining_ms: config.rest_duration_ms,
            route: Vec::new(),
            distance_meters: 0.0,
            completed: Vec::new(),
            completed_count: 0,
            last_coordinate: None,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn remaining_ms(&self) -> u64 {
        self.remaining_ms
    }

    pub fn distance_meters(&self) -> f64 {
        self.distance_meters
    }

    pub fn route(&self) -> &[Coordinate] {
        &self.route
    }

    pub fn completed_intervals(&self) -> &[Interval] {
        &self.completed
    }

    pub fn completed_count(&self) -> u32 {
        self.completed_count
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Location samples are wanted only in an active, unpaused RUN phase.
    pub fn should_track(&self) -> bool {
        self.started && !self.paused && !self.finished && self.phase == Phase::Running
    }

    /// Returns false if the session was already started.
    pub fn begin(&mut self) -> bool {
        if self.started {
            return false;
        }
        self.started = true;
        true
    }

    pub fn pause(&mut self) -> bool {
        if !self.started || self.finished || self.paused {
            return false;
        }
        self.paused = true;
        // movement while paused is not part of the interval
        self.last_coordinate = None;
        true
    }

    pub fn resume(&mut self) -> bool {
        if !self.started || self.finished || !self.paused {
            return false;
        }
        self.paused = false;
        true
    }

    /// Advances the countdown by one tick. At most one phase transition happens per call.
    pub fn tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        if self.finished {
            return TickOutcome::Ignored(Ignored::Finished);
        }
        if !self.started {
            return TickOutcome::Ignored(Ignored::NotStarted);
        }
        if self.paused {
            return TickOutcome::Ignored(Ignored::Paused);
        }

        self.remaining_ms = self.remaining_ms.saturating_sub(TICK_MS);
        if self.remaining_ms > 0 {
            return TickOutcome::Counting {
                remaining_ms: self.remaining_ms,
            };
        }

        match self.phase {
            Phase::Resting => {
                self.phase = Phase::Running;
                self.remaining_ms = self.config.interval_duration_ms;
                self.clear_in_progress();
                TickOutcome::RunStarted
            }
            Phase::Running => {
                let interval = Interval {
                    duration_ms: self.config.interval_duration_ms,
                    distance_meters: self.distance_meters,
                    route: std::mem::take(&mut self.route),
                };
                self.clear_in_progress();
                self.completed.push(interval.clone());
                self.completed_count += 1;

                if self.completed_count >= self.config.total_intervals {
                    self.finished = true;
                    let run = IntervalRun {
                        intervals: self.completed.clone(),
                        created_at: now.timestamp_millis(),
                    };
                    TickOutcome::Finished { interval, run }
                } else {
                    self.phase = Phase::Resting;
                    self.remaining_ms = self.config.rest_duration_ms;
                    TickOutcome::IntervalCompleted(interval)
                }
            }
        }
    }

    /// Accumulation entry point for location samples.
    pub fn record_sample(&mut self, coordinate: Coordinate) -> SampleOutcome {
        if self.finished {
            return SampleOutcome::Ignored(Ignored::Finished);
        }
        if !self.started {
            return SampleOutcome::Ignored(Ignored::NotStarted);
        }
        if self.paused {
            return SampleOutcome::Ignored(Ignored::Paused);
        }
        if self.phase != Phase::Running {
            return SampleOutcome::Ignored(Ignored::Resting);
        }

        let outcome = match &self.last_coordinate {
            Some(previous) => {
                let delta_meters = geo::distance(previous, &coordinate);
                // never let a degenerate fix poison the running total
                if delta_meters.is_finite() {
                    self.distance_meters += delta_meters;
                }
                SampleOutcome::Accumulated { delta_meters }
            }
            None => SampleOutcome::Seeded,
        };

        self.route.push(coordinate);
        self.last_coordinate = Some(coordinate);
        outcome
    }

    pub fn avg_pace_label(&self) -> String {
        if self.phase == Phase::Running && !self.finished {
            if let Some(speed) = self.last_coordinate.and_then(|c| c.reported_speed()) {
                return format_pace(1000, speed);
            }
            let elapsed_ms = self.config.interval_duration_ms.saturating_sub(self.remaining_ms);
            return format_pace(elapsed_ms as i64, self.distance_meters);
        }

        match self.completed.last() {
            Some(interval) => format_pace(
                self.config.interval_duration_ms as i64,
                interval.distance_meters,
            ),
            None => ZERO_PACE.to_string(),
        }
    }

    fn display_distance_meters(&self) -> f64 {
        if self.phase == Phase::Running && !self.finished {
            self.distance_meters
        } else {
            self.completed
                .last()
                .map(|interval| interval.distance_meters)
                .unwrap_or(0.0)
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            paused: self.paused,
            finished: self.finished,
            remaining_ms: self.remaining_ms,
            remaining_label: format_elapsed(self.remaining_ms),
            accumulated_distance_meters: self.distance_meters,
            display_distance: format_distance(self.display_distance_meters()),
            avg_pace_label: self.avg_pace_label(),
            interval_number: (self.completed_count + 1).min(self.config.total_intervals),
            completed_intervals: self.completed_count,
            total_intervals: self.config.total_intervals,
        }
    }

    fn clear_in_progress(&mut self) {
        self.route.clear();
        self.distance_meters = 0.0;
        self.last_coordinate = None;
    }
}
