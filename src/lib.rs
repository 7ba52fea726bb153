//! CARE Alarm
//!
//! Condition-based alarm engine for video-inference workflows.
//!
//! The host derives numeric parameters from each processed frame (detection
//! counts, temperatures, ratios) and calls the engine once per tick. The
//! engine runs every registered condition through its hysteresis latch,
//! combines the results with AND/OR, and advances an
//! `Idle -> Firing -> Cooldown` state machine gated by a cooldown timer.
//!
//! ```ignore
//! use care_alarm::{threshold_condition, params_from, AlarmEngine, AlarmSettings};
//!
//! let mut engine = AlarmEngine::new();
//! engine.register_condition("count", threshold_condition("count", 10.0, 2.0, "above")?);
//!
//! let settings = AlarmSettings::new("AND", 5.0, "Count is {count}")?;
//! let result = engine.evaluate(&params_from([("count", 12)]), &settings)?;
//! assert!(result.active);
//! ```

pub mod blocks;
pub mod conditions;
pub mod config;
pub mod engine;
pub mod error;
pub mod params;
#[cfg(feature = "rhai-scripting")]
pub mod scripting;
pub mod streams;
pub mod template;

// Re-export commonly used types
pub use blocks::{ConditionalAlarm, PredictionAlarm};
pub use conditions::{
    range_condition, threshold_condition, Condition, ConditionKind, Direction, Predicate,
};
pub use config::{AlarmConfig, ConditionConfig};
pub use engine::{AlarmEngine, AlarmResult, AlarmSettings, AlarmState, CombineMode};
pub use error::{AlarmError, Result};
pub use params::{params_from, ParamValue, Params};
pub use streams::AlarmStreams;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
