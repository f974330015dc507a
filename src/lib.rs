pub mod db;
pub mod geo;
pub mod models;
pub mod pace;
pub mod persistence;
pub mod session;
pub mod settings;
pub mod tracking;
mod utils;

use std::{env, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use log::{error, info, warn};

use db::Database;
use persistence::{SessionPersister, StaticIdentity};
use session::{SessionController, SessionEvent};
use settings::SettingsStore;
use tracking::ReplayLocationProvider;

pub use models::{Coordinate, Interval, IntervalRun};

const DEFAULT_DATA_DIR: &str = "intervalrun-data";
const REPLAY_PERIOD: Duration = Duration::from_secs(1);

/// Runs one interval session, replaying the route file given as the first argument as the
/// location stream, and stores the finished run in the data directory.
pub async fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let route_path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("usage: intervalrun <route.json>"))?;

    let data_dir = env::var("INTERVALRUN_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR));
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

    let settings = SettingsStore::new(data_dir.join("settings.json"))?.settings();
    let user_id = env::var("INTERVALRUN_USER").ok().or(settings.user_id.clone());
    if user_id.is_none() {
        warn!("No user configured; the run will not be saved");
    }

    let database = Database::new(data_dir.join("intervalrun.sqlite3"))?;
    let provider = Arc::new(ReplayLocationProvider::from_json_file(&route_path, REPLAY_PERIOD)?);
    let persister = SessionPersister::new(
        Arc::new(database.clone()),
        Arc::new(StaticIdentity::new(user_id)),
    );

    let (controller, mut events) =
        SessionController::new(settings.session, provider, settings.tracking, persister)?;

    info!("intervalrun starting with route {}", route_path.display());
    controller.start().await?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                controller.abandon().await;
                bail!("session abandoned");
            }
            event = events.recv() => {
                let Some(event) = event else {
                    bail!("session ended without a result");
                };
                match event {
                    SessionEvent::PhaseChanged(snapshot) => info!(
                        "{} {} | interval {}/{} | pace {} | {} m{}",
                        snapshot.phase.label(),
                        snapshot.remaining_label,
                        snapshot.interval_number,
                        snapshot.total_intervals,
                        snapshot.avg_pace_label,
                        snapshot.display_distance,
                        if snapshot.paused { " (paused)" } else { "" }
                    ),
                    SessionEvent::IntervalCompleted { number, interval } => info!(
                        "Interval {} done: {} m, pace {}",
                        number,
                        pace::format_distance(interval.distance_meters),
                        pace::format_pace(interval.duration_ms as i64, interval.distance_meters)
                    ),
                    SessionEvent::TrackingError(message) => warn!("Location: {message}"),
                    SessionEvent::SessionCompleted(outcome) => {
                        return match outcome.result {
                            Ok(id) => {
                                if let Some(stored) = database.get_run(&id).await? {
                                    info!(
                                        "Run {} saved to {} ({} m total)",
                                        stored.id,
                                        stored.collection_path,
                                        pace::format_distance(stored.run.total_distance_meters())
                                    );
                                }
                                println!("{id}");
                                Ok(())
                            }
                            Err(err) => {
                                error!(
                                    "Run with {} intervals was not saved: {err}",
                                    outcome.run.intervals.len()
                                );
                                Err(err.into())
                            }
                        };
                    }
                }
            }
        }
    }
}
