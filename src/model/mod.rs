//! Model
//!
//! Layers applied in sequence over one operator set, a linear readout per
//! rank, and an empty-safe reduction to either one vector per complex or
//! one row per cell.

mod model;
mod pooling;
mod readout;

pub use model::{Model, ModelConfig, Prediction, Sample, Task};
pub use pooling::{empty_safe_max, empty_safe_mean, Pooling};
pub use readout::Readout;
