//! Condition shape definitions

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AlarmError, Result};
use crate::params::{number, Params};

/// A boolean test over the tick's parameters
///
/// Implemented for any `Fn(&Params) -> Result<bool>` closure, so hosts can
/// plug arbitrary logic in without a dedicated type.
pub trait Predicate: Send + Sync {
    fn test(&self, params: &Params) -> Result<bool>;
}

impl<F> Predicate for F
where
    F: Fn(&Params) -> Result<bool> + Send + Sync,
{
    fn test(&self, params: &Params) -> Result<bool> {
        self(params)
    }
}

/// Which side of the threshold activates a threshold condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Active when `value >= threshold`
    #[default]
    Above,
    /// Active when `value < threshold`
    Below,
}

impl std::str::FromStr for Direction {
    type Err = AlarmError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "above" => Ok(Direction::Above),
            "below" => Ok(Direction::Below),
            _ => Err(AlarmError::config(format!(
                "Invalid direction: {}. Use 'above' or 'below'",
                s
            ))),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Above => write!(f, "above"),
            Direction::Below => write!(f, "below"),
        }
    }
}

/// The supported condition shapes
pub enum ConditionKind {
    /// Activates at `value >= threshold`, releases at `value < threshold - hysteresis`
    ThresholdAbove { param: String, threshold: f64 },

    /// Activates at `value < threshold`, releases at `value >= threshold + hysteresis`
    ThresholdBelow { param: String, threshold: f64 },

    /// Activates outside `[min, max]`, releases inside `[min + hysteresis, max - hysteresis]`
    Range { param: String, min: f64, max: f64 },

    /// Host-supplied activation and deactivation tests
    Custom {
        activation: Box<dyn Predicate>,
        deactivation: Box<dyn Predicate>,
    },
}

impl ConditionKind {
    /// Should an inactive condition turn on
    pub fn activates(&self, params: &Params) -> Result<bool> {
        match self {
            ConditionKind::ThresholdAbove { param, threshold } => {
                Ok(number(params, param)? >= *threshold)
            }
            ConditionKind::ThresholdBelow { param, threshold } => {
                Ok(number(params, param)? < *threshold)
            }
            ConditionKind::Range { param, min, max } => {
                let value = number(params, param)?;
                Ok(value < *min || value > *max)
            }
            ConditionKind::Custom { activation, .. } => activation.test(params),
        }
    }

    /// Should an active condition turn off
    pub fn deactivates(&self, params: &Params, hysteresis: f64) -> Result<bool> {
        match self {
            ConditionKind::ThresholdAbove { param, threshold } => {
                Ok(number(params, param)? < threshold - hysteresis)
            }
            ConditionKind::ThresholdBelow { param, threshold } => {
                Ok(number(params, param)? >= threshold + hysteresis)
            }
            ConditionKind::Range { param, min, max } => {
                let value = number(params, param)?;
                Ok(value >= min + hysteresis && value <= max - hysteresis)
            }
            ConditionKind::Custom { deactivation, .. } => deactivation.test(params),
        }
    }

    /// Parameter read by a built-in shape
    pub fn param(&self) -> Option<&str> {
        match self {
            ConditionKind::ThresholdAbove { param, .. }
            | ConditionKind::ThresholdBelow { param, .. }
            | ConditionKind::Range { param, .. } => Some(param),
            ConditionKind::Custom { .. } => None,
        }
    }
}

impl fmt::Debug for ConditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionKind::ThresholdAbove { param, threshold } => f
                .debug_struct("ThresholdAbove")
                .field("param", param)
                .field("threshold", threshold)
                .finish(),
            ConditionKind::ThresholdBelow { param, threshold } => f
                .debug_struct("ThresholdBelow")
                .field("param", param)
                .field("threshold", threshold)
                .finish(),
            ConditionKind::Range { param, min, max } => f
                .debug_struct("Range")
                .field("param", param)
                .field("min", min)
                .field("max", max)
                .finish(),
            ConditionKind::Custom { .. } => f.write_str("Custom"),
        }
    }
}
