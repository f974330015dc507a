use std::{sync::Arc, time::Duration};

use intervalrun_lib::{
    db::Database,
    models::Coordinate,
    persistence::{PersistError, SessionPersister, StaticIdentity},
    session::{SessionConfig, SessionController, SessionEvent, SessionOutcome},
    tracking::{ReplayLocationProvider, WatchOptions},
};
use tokio::sync::mpsc;

// ~33 m per step along a meridian
fn northbound_route(points: usize) -> Vec<Coordinate> {
    (0..points)
        .map(|i| Coordinate::new(55.0 + i as f64 * 0.0003, 12.0, 4.0))
        .collect()
}

async fn wait_for_outcome(events: &mut mpsc::UnboundedReceiver<SessionEvent>) -> (Vec<SessionEvent>, SessionOutcome) {
    let mut seen = Vec::new();
    loop {
        match events.recv().await.expect("event channel open") {
            SessionEvent::SessionCompleted(outcome) => return (seen, outcome),
            other => seen.push(other),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn replayed_session_is_saved_and_reads_back() {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let database = Database::new(temp_dir.path().join("runs.sqlite3")).unwrap();
    let provider = Arc::new(ReplayLocationProvider::new(northbound_route(60), Duration::from_secs(1)));
    let persister = SessionPersister::new(
        Arc::new(database.clone()),
        Arc::new(StaticIdentity::signed_in("jules")),
    );

    let (controller, mut events) = SessionController::new(
        SessionConfig::new(1_000, 5_000, 2),
        provider.clone(),
        WatchOptions::default(),
        persister,
    )
    .unwrap();
    controller.start().await.unwrap();

    let (seen, outcome) = wait_for_outcome(&mut events).await;
    let id = outcome.result.expect("run saved");

    let completed: Vec<u32> = seen
        .iter()
        .filter_map(|event| match event {
            SessionEvent::IntervalCompleted { number, .. } => Some(*number),
            _ => None,
        })
        .collect();
    assert_eq!(completed, vec![1, 2]);

    assert_eq!(outcome.run.intervals.len(), 2);
    for interval in &outcome.run.intervals {
        assert_eq!(interval.duration_ms, 5_000);
        assert!(interval.route.len() >= 4, "route had {} samples", interval.route.len());
        assert!(interval.distance_meters > 90.0);
    }
    assert_eq!(provider.active_watches(), 0);

    let stored = database.get_run(&id).await.unwrap().expect("stored run");
    assert_eq!(stored.collection_path, "users/jules/runs");
    assert_eq!(stored.run, outcome.run);
    assert_eq!(database.list_runs("jules").await.unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn unsaved_run_can_be_saved_later() {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let database = Database::new(temp_dir.path().join("runs.sqlite3")).unwrap();
    let identity = Arc::new(StaticIdentity::signed_out());
    let persister = SessionPersister::new(Arc::new(database.clone()), identity.clone());

    let (controller, mut events) = SessionController::new(
        SessionConfig::new(0, 2_000, 1),
        Arc::new(ReplayLocationProvider::new(northbound_route(10), Duration::from_secs(1))),
        WatchOptions::default(),
        persister,
    )
    .unwrap();
    controller.start().await.unwrap();

    let (_, outcome) = wait_for_outcome(&mut events).await;
    assert_eq!(outcome.result, Err(PersistError::NotAuthenticated));
    assert!(database.list_runs("kim").await.unwrap().is_empty());

    identity.set_user(Some("kim".into()));
    let id = controller.persister().save(&outcome.run).await.unwrap();
    assert!(database.get_run(&id).await.unwrap().is_some());
}

#[tokio::test(start_paused = true)]
async fn pause_and_resume_keep_the_countdown() {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let database = Database::new(temp_dir.path().join("runs.sqlite3")).unwrap();
    let provider = Arc::new(ReplayLocationProvider::new(northbound_route(60), Duration::from_secs(1)));
    let persister = SessionPersister::new(
        Arc::new(database),
        Arc::new(StaticIdentity::signed_in("lee")),
    );
    let (controller, _events) = SessionController::new(
        SessionConfig::default(),
        provider.clone(),
        WatchOptions::default(),
        persister,
    )
    .unwrap();

    controller.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(5_500)).await;
    let paused = controller.pause().await.unwrap();
    assert_eq!(paused.remaining_ms, 11_000);
    assert_eq!(provider.active_watches(), 0);

    tokio::time::sleep(Duration::from_secs(30)).await;
    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.remaining_ms, 11_000);
    assert_eq!(snapshot.accumulated_distance_meters, paused.accumulated_distance_meters);

    let resumed = controller.resume().await.unwrap();
    assert!(!resumed.paused);
    assert_eq!(provider.active_watches(), 1);
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    assert_eq!(controller.snapshot().await.remaining_ms, 9_000);
}
