pub mod config;
pub mod controller;
pub mod state;

pub use config::SessionConfig;
pub use controller::{SessionController, SessionEvent, SessionOutcome};
pub use state::{EngineState, Phase, SessionSnapshot};
