use std::sync::{Arc, Weak};

use anyhow::{anyhow, bail, Context, Result};
use log::info;
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use super::{
    loop_worker::{forward_samples, SampleSink},
    provider::{LocationProvider, WatchId, WatchOptions},
};

struct ActiveWatch {
    id: WatchId,
    generation: u64,
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns at most one subscription to the location stream.
pub struct LocationTracker {
    provider: Arc<dyn LocationProvider>,
    options: WatchOptions,
    active: Option<ActiveWatch>,
    generation: u64,
}

impl LocationTracker {
    pub fn new(provider: Arc<dyn LocationProvider>, options: WatchOptions) -> Self {
        Self {
            provider,
            options,
            active: None,
            generation: 0,
        }
    }

    pub fn options(&self) -> WatchOptions {
        self.options
    }

    pub fn is_tracking(&self) -> bool {
        self.active.is_some()
    }

    /// Generation of the live subscription, if any.
    pub fn active_generation(&self) -> Option<u64> {
        self.active.as_ref().map(|watch| watch.generation)
    }

    /// Subscribes and spawns the forwarder that feeds `sink`. Must run inside a tokio runtime.
    pub fn start_tracking<S: SampleSink>(&mut self, sink: Weak<Mutex<S>>) -> Result<u64> {
        if self.active.is_some() {
            bail!("location tracking already active");
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let id = self
            .provider
            .subscribe(self.options, event_tx)
            .map_err(|err| anyhow!(err))
            .context("failed to subscribe to location stream")?;

        self.generation += 1;
        let generation = self.generation;
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(forward_samples(
            generation,
            event_rx,
            sink,
            cancel_token.clone(),
        ));

        info!(
            "Location tracking started (watch {}, generation {}, min movement {}m)",
            id.0, generation, self.options.min_movement_meters
        );

        self.active = Some(ActiveWatch {
            id,
            generation,
            cancel_token,
            handle,
        });
        Ok(generation)
    }

    /// Unsubscribes and cancels the forwarder. Synchronous: nothing from the old
    /// subscription reaches the sink after this returns.
    pub fn stop_tracking(&mut self) {
        let Some(watch) = self.active.take() else {
            return;
        };

        self.provider.unsubscribe(watch.id);
        watch.cancel_token.cancel();
        // Not joined: the forwarder may be parked on the lock our caller holds.
        drop(watch.handle);

        info!(
            "Location tracking stopped (watch {}, generation {})",
            watch.id.0, watch.generation
        );
    }
}

impl Drop for LocationTracker {
    fn drop(&mut self) {
        self.stop_tracking();
    }
}


#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::testing::ManualProvider;
    use super::*;
    use crate::models::Coordinate;
    use crate::tracking::provider::{LocationError, LocationEvent};

    #[derive(Default)]
    struct RecordingSink {
        samples: Vec<(u64, Coordinate)>,
        errors: Vec<LocationError>,
    }

    impl SampleSink for RecordingSink {
        fn accept_sample(&mut self, generation: u64, coordinate: Coordinate) {
            self.samples.push((generation, coordinate));
        }

        fn stream_error(&mut self, _generation: u64, error: LocationError) {
            self.errors.push(error);
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn forwards_samples_until_stopped() {
        let provider = Arc::new(ManualProvider::default());
        let sink = Arc::new(Mutex::new(RecordingSink::default()));
        let mut tracker = LocationTracker::new(provider.clone(), WatchOptions::default());

        let generation = tracker.start_tracking(Arc::downgrade(&sink)).unwrap();
        assert_eq!(tracker.active_generation(), Some(generation));
        assert_eq!(provider.subscribe_count(), 1);

        provider.push(LocationEvent::Sample(Coordinate::new(1.0, 2.0, 5.0)));
        provider.push(LocationEvent::Error(LocationError::Timeout));
        settle().await;

        {
            let guard = sink.lock().await;
            assert_eq!(guard.samples.len(), 1);
            assert_eq!(guard.samples[0].0, generation);
            assert_eq!(guard.errors, vec![LocationError::Timeout]);
        }

        tracker.stop_tracking();
        assert!(!tracker.is_tracking());
        assert_eq!(provider.unsubscribe_count(), 1);
        assert_eq!(provider.live_count(), 0);

        provider.push_to_stale(LocationEvent::Sample(Coordinate::new(3.0, 4.0, 5.0)));
        settle().await;
        assert_eq!(sink.lock().await.samples.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn restarting_creates_a_fresh_subscription() {
        let provider = Arc::new(ManualProvider::default());
        let sink = Arc::new(Mutex::new(RecordingSink::default()));
        let mut tracker = LocationTracker::new(provider.clone(), WatchOptions::default());

        let first = tracker.start_tracking(Arc::downgrade(&sink)).unwrap();
        assert!(tracker.start_tracking(Arc::downgrade(&sink)).is_err());
        assert_eq!(provider.subscribe_count(), 1);

        tracker.stop_tracking();
        tracker.stop_tracking();
        assert_eq!(provider.unsubscribe_count(), 1);

        let second = tracker.start_tracking(Arc::downgrade(&sink)).unwrap();
        assert!(second > first);
        assert_eq!(provider.subscribe_count(), 2);
        assert_eq!(provider.live_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn subscribe_failure_leaves_tracker_idle() {
        let provider = Arc::new(ManualProvider::default());
        let sink = Arc::new(Mutex::new(RecordingSink::default()));
        let mut tracker = LocationTracker::new(provider.clone(), WatchOptions::default());

        provider.fail_next_subscribe();
        assert!(tracker.start_tracking(Arc::downgrade(&sink)).is_err());
        assert!(!tracker.is_tracking());

        assert!(tracker.start_tracking(Arc::downgrade(&sink)).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_tracker_unsubscribes() {
        let provider = Arc::new(ManualProvider::default());
        let sink = Arc::new(Mutex::new(RecordingSink::default()));
        {
            let mut tracker = LocationTracker::new(provider.clone(), WatchOptions::default());
            tracker.start_tracking(Arc::downgrade(&sink)).unwrap();
        }
        assert_eq!(provider.unsubscribe_count(), 1);
        assert_eq!(provider.live_count(), 0);
    }
}
