//! Command-line configuration.

mod duration;

pub use duration::parse_duration;
