//! Host-facing alarm blocks
//!
//! Thin wrappers that configure an [`AlarmEngine`](crate::AlarmEngine) for a
//! specific use and shape its result into the fields a workflow block
//! exposes:
//! - `PredictionAlarm` - detection count against a threshold
//! - `ConditionalAlarm` - arbitrary predicate, optionally a Rhai expression

mod conditional;
mod prediction;

pub use conditional::{ConditionalAlarm, ConditionalAlarmOutput, MAIN_CONDITION};
pub use prediction::{PredictionAlarm, PredictionAlarmOutput, DEFAULT_PREDICTION_TEMPLATE};
