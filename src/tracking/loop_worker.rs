use std::sync::Weak;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::models::Coordinate;

use super::provider::{LocationError, LocationEvent};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Receiver of forwarded location events. `generation` identifies the subscription the
/// event came from so a sink can reject events from a subscription it already dropped.
pub trait SampleSink: Send + 'static {
    fn accept_sample(&mut self, generation: u64, coordinate: Coordinate);

    fn stream_error(&mut self, generation: u64, error: LocationError);
}

pub async fn forward_samples<S: SampleSink>(
    generation: u64,
    mut events: mpsc::UnboundedReceiver<LocationEvent>,
    sink: Weak<Mutex<S>>,
    cancel_token: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log_info!("location forwarder {} shutting down", generation);
                break;
            }
            event = events.recv() => {
                let Some(event) = event else {
                    log_warn!("location stream {} closed by provider", generation);
                    break;
                };
                let Some(sink) = sink.upgrade() else {
                    break;
                };

                let mut guard = sink.lock().await;
                // stop_tracking may have run while we waited for the lock
                if cancel_token.is_cancelled() {
                    break;
                }
                match event {
                    LocationEvent::Sample(coordinate) => guard.accept_sample(generation, coordinate),
                    LocationEvent::Error(error) => guard.stream_error(generation, error),
                }
            }
        }
    }
}
