//! Small set types used throughout the runtime.

mod alt_set;
mod interval_set;

pub use alt_set::AltSet;
pub use interval_set::{Interval, IntervalSet};
