//! Hysteresis-latched conditions
//!
//! A [`Condition`] pairs an activation test with a deactivation test and
//! remembers whether it is currently active. While inactive only the
//! activation test is consulted; once active, only the deactivation test
//! can release it. The gap between the two thresholds is the hysteresis
//! band that keeps a noisy value from flapping the alarm on and off.

mod condition;
mod types;

pub use condition::{range_condition, threshold_condition, Condition};
pub use types::{ConditionKind, Direction, Predicate};
