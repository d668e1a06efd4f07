//! BDD step definitions for the weather gauges service

pub mod display_steps;
pub mod lifecycle_steps;
pub mod live_steps;
pub mod snapshot_steps;
