pub mod controller;
pub mod loop_worker;
pub mod provider;
pub mod replay;

pub use controller::LocationTracker;
pub use loop_worker::SampleSink;
pub use provider::{LocationError, LocationEvent, LocationProvider, LocationSink, WatchId, WatchOptions};
pub use replay::ReplayLocationProvider;
