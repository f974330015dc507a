mod coordinate;
mod run;

pub use coordinate::Coordinate;
pub use run::{Interval, IntervalRun};
