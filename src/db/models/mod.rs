pub mod run;

pub use run::{RunSummary, StoredRun};
