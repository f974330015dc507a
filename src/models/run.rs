use serde::{Deserialize, Serialize};

use super::Coordinate;

/// One completed RUN phase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Interval {
    /// Nominal phase length, not wall-clock time.
    pub duration_ms: u64,
    pub distance_meters: f64,
    /// Samples in delivery order.
    pub route: Vec<Coordinate>,
}

/// A finished session: exactly one `Interval` per configured interval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IntervalRun {
    pub intervals: Vec<Interval>,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
}

impl IntervalRun {
    pub fn total_distance_meters(&self) -> f64 {
        self.intervals.iter().map(|i| i.distance_meters).sum()
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.intervals.iter().map(|i| i.duration_ms).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_document_field_names() {
        let run = IntervalRun {
            intervals: vec![Interval {
                duration_ms: 15_000,
                distance_meters: 42.5,
                route: vec![Coordinate::new(1.0, 2.0, 3.0).with_speed(2.5)],
            }],
            created_at: 1_700_000_000_000,
        };

        let value = serde_json::to_value(&run).unwrap();
        assert_eq!(value["createdAt"], 1_700_000_000_000i64);
        let interval = &value["intervals"][0];
        assert_eq!(interval["durationMs"], 15_000);
        assert_eq!(interval["distanceMeters"], 42.5);
        assert_eq!(interval["route"][0]["speed"], 2.5);
        assert!(interval["route"][0]["altitudeAccuracy"].is_null());
    }

    #[test]
    fn totals_sum_over_intervals() {
        let interval = |distance_meters| Interval {
            duration_ms: 15_000,
            distance_meters,
            route: Vec::new(),
        };
        let run = IntervalRun {
            intervals: vec![interval(100.0), interval(50.5)],
            created_at: 0,
        };
        assert_eq!(run.total_distance_meters(), 150.5);
        assert_eq!(run.total_duration_ms(), 30_000);
    }
}
