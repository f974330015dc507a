use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use crate::{
    db::{
        helpers::{to_i64, to_u32, to_u64},
        models::{RunSummary, StoredRun},
        Database,
    },
    models::{Coordinate, Interval, IntervalRun},
    persistence::RunStore,
};

fn row_to_interval(row: &Row) -> Result<Interval> {
    let duration_ms: i64 = row.get("duration_ms")?;
    let route_json: String = row.get("route_json")?;
    let route: Vec<Coordinate> =
        serde_json::from_str(&route_json).context("failed to decode interval route")?;

    Ok(Interval {
        duration_ms: to_u64(duration_ms, "duration_ms")?,
        distance_meters: row.get("distance_meters")?,
        route,
    })
}

fn row_to_summary(row: &Row) -> Result<RunSummary> {
    let interval_count: i64 = row.get("interval_count")?;
    Ok(RunSummary {
        id: row.get("id")?,
        created_at: row.get("created_at")?,
        interval_count: to_u32(interval_count, "interval_count")?,
        total_distance_meters: row.get("total_distance_meters")?,
    })
}

impl Database {
    /// Inserts the run and its intervals in one transaction. Returns the new run id.
    pub async fn insert_run(
        &self,
        user_id: &str,
        collection_path: &str,
        run: &IntervalRun,
    ) -> Result<String> {
        let user_id = user_id.to_string();
        let collection_path = collection_path.to_string();
        let record = run.clone();

        self.execute(move |conn| {
            let run_id = Uuid::new_v4().to_string();
            let saved_at = Utc::now();
            let tx = conn.transaction().context("failed to open run transaction")?;

            tx.execute(
                "INSERT INTO runs (id, user_id, collection_path, created_at, interval_count, total_distance_meters, saved_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    run_id,
                    user_id,
                    collection_path,
                    record.created_at,
                    record.intervals.len() as i64,
                    record.total_distance_meters(),
                    saved_at.to_rfc3339(),
                ],
            )
            .context("failed to insert run")?;

            for (position, interval) in record.intervals.iter().enumerate() {
                let route_json =
                    serde_json::to_string(&interval.route).context("failed to encode route")?;
                tx.execute(
                    "INSERT INTO run_intervals (run_id, position, duration_ms, distance_meters, route_json)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        run_id,
                        position as i64,
                        to_i64(interval.duration_ms)?,
                        interval.distance_meters,
                        route_json,
                    ],
                )
                .with_context(|| format!("failed to insert interval {position}"))?;
            }

            tx.commit().context("failed to commit run")?;
            Ok(run_id)
        })
        .await
    }

    pub async fn get_run(&self, run_id: &str) -> Result<Option<StoredRun>> {
        let run_id = run_id.to_string();
        self.execute(move |conn| {
            let header = conn
                .query_row(
                    "SELECT id, user_id, collection_path, created_at, saved_at FROM runs WHERE id = ?1",
                    params![run_id],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, i64>(3)?,
                            row.get::<_, String>(4)?,
                        ))
                    },
                )
                .optional()
                .context("failed to load run")?;

            let Some((id, user_id, collection_path, created_at, saved_at)) = header else {
                return Ok(None);
            };

            let mut stmt = conn.prepare(
                "SELECT duration_ms, distance_meters, route_json
                 FROM run_intervals
                 WHERE run_id = ?1
                 ORDER BY position ASC",
            )?;
            let mut rows = stmt.query(params![id])?;
            let mut intervals = Vec::new();
            while let Some(row) = rows.next()? {
                intervals.push(row_to_interval(row)?);
            }

            let saved_at = DateTime::parse_from_rfc3339(&saved_at)
                .map(|dt| dt.with_timezone(&Utc))
                .context("failed to parse saved_at")?;

            Ok(Some(StoredRun {
                id,
                user_id,
                collection_path,
                saved_at,
                run: IntervalRun {
                    intervals,
                    created_at,
                },
            }))
        })
        .await
    }

    /// Newest first.
    pub async fn list_runs(&self, user_id: &str) -> Result<Vec<RunSummary>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, created_at, interval_count, total_distance_meters
                 FROM runs
                 WHERE user_id = ?1
                 ORDER BY created_at DESC",
            )?;
            let mut rows = stmt.query(params![user_id])?;
            let mut summaries = Vec::new();
            while let Some(row) = rows.next()? {
                summaries.push(row_to_summary(row)?);
            }
            Ok(summaries)
        })
        .await
    }
}

#[async_trait]
impl RunStore for Database {
    async fn create(&self, user_id: &str, collection_path: &str, run: &IntervalRun) -> Result<String> {
        self.insert_run(user_id, collection_path, run).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{runs_collection_path, SessionPersister, StaticIdentity};
    use std::sync::Arc;

    fn sample_run(created_at: i64) -> IntervalRun {
        IntervalRun {
            intervals: vec![
                Interval {
                    duration_ms: 15_000,
                    distance_meters: 48.25,
                    route: vec![
                        Coordinate::new(55.0, 12.0, 4.0).with_speed(3.2),
                        Coordinate::new(55.0003, 12.0, 4.0).with_altitude(12.5, Some(3.0)),
                    ],
                },
                Interval {
                    duration_ms: 15_000,
                    distance_meters: 0.0,
                    route: Vec::new(),
                },
            ],
            created_at,
        }
    }

    #[tokio::test]
    async fn stored_run_reads_back_intact() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let db = Database::new(temp_dir.path().join("runs.sqlite3")).unwrap();
        let run = sample_run(1_700_000_000_000);

        let id = db.insert_run("dana", &runs_collection_path("dana"), &run).await.unwrap();
        let stored = db.get_run(&id).await.unwrap().expect("run exists");

        assert_eq!(stored.id, id);
        assert_eq!(stored.user_id, "dana");
        assert_eq!(stored.collection_path, "users/dana/runs");
        assert_eq!(stored.run, run);

        assert!(db.get_run("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_runs_is_per_user_and_newest_first() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let db = Database::new(temp_dir.path().join("runs.sqlite3")).unwrap();

        let older = db.insert_run("erin", "users/erin/runs", &sample_run(1_000)).await.unwrap();
        let newer = db.insert_run("erin", "users/erin/runs", &sample_run(2_000)).await.unwrap();
        db.insert_run("frank", "users/frank/runs", &sample_run(3_000)).await.unwrap();

        let runs = db.list_runs("erin").await.unwrap();
        let ids: Vec<_> = runs.iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec![newer, older]);
        assert_eq!(runs[0].interval_count, 2);
        assert!((runs[0].total_distance_meters - 48.25).abs() < 1e-9);
    }

    #[tokio::test]
    async fn persister_writes_through_database() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let db = Database::new(temp_dir.path().join("runs.sqlite3")).unwrap();
        let persister = SessionPersister::new(
            Arc::new(db.clone()),
            Arc::new(StaticIdentity::signed_in("gale")),
        );

        let id = persister.save(&sample_run(5)).await.unwrap();
        let stored = db.get_run(&id).await.unwrap().unwrap();
        assert_eq!(stored.collection_path, "users/gale/runs");
    }

    #[tokio::test]
    async fn database_reopens_existing_file() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("nested").join("runs.sqlite3");
        let id = {
            let db = Database::new(path.clone()).unwrap();
            db.insert_run("hana", "users/hana/runs", &sample_run(7)).await.unwrap()
        };

        let db = Database::new(path).unwrap();
        assert_eq!(db.path().file_name().unwrap(), "runs.sqlite3");
        assert!(db.get_run(&id).await.unwrap().is_some());
    }
}
