use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::IntervalRun;

/// A run as read back from the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredRun {
    pub id: String,
    pub user_id: String,
    pub collection_path: String,
    pub saved_at: DateTime<Utc>,
    pub run: IntervalRun,
}

/// Listing row without intervals or routes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub id: String,
    pub created_at: i64,
    pub interval_count: u32,
    pub total_distance_meters: f64,
}
