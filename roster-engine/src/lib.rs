//! Monthly shift-roster engine for a 24x7 operations team under German
//! working-time rules. A pure, synchronous function from a
//! [`shared::types::ScheduleInput`] to a [`shared::types::ScheduleOutput`]:
//! no I/O, and a seedable RNG so a given input and seed always reproduce the
//! same roster.

pub mod config;
pub mod domain;
pub mod error;

pub use config::SchedulerConfig;
pub use domain::driver::{ScheduleDriver, generate_schedule};
pub use error::EngineError;
