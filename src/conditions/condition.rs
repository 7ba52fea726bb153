//! Latched condition and its factory helpers

use std::sync::Arc;

use super::{ConditionKind, Direction, Predicate};
use crate::error::{AlarmError, Result};
use crate::params::Params;

/// A condition with its own hysteresis latch
#[derive(Debug)]
pub struct Condition {
    kind: ConditionKind,
    hysteresis: f64,
    is_active: bool,
}

impl Condition {
    /// Wrap a condition shape, starting inactive
    pub fn new(kind: ConditionKind, hysteresis: f64) -> Result<Self> {
        check_hysteresis(hysteresis)?;
        Ok(Self {
            kind,
            hysteresis,
            is_active: false,
        })
    }

    /// Build a condition from host-supplied activation and deactivation tests
    ///
    /// `hysteresis` is informational here; the predicates are expected to
    /// encode it themselves.
    pub fn custom(
        activation: impl Predicate + 'static,
        deactivation: impl Predicate + 'static,
        hysteresis: f64,
    ) -> Result<Self> {
        Self::new(
            ConditionKind::Custom {
                activation: Box::new(activation),
                deactivation: Box::new(deactivation),
            },
            hysteresis,
        )
    }

    /// Condition that is active exactly while `predicate` holds
    pub fn from_predicate(predicate: Arc<dyn Predicate>, hysteresis: f64) -> Result<Self> {
        let negated = Arc::clone(&predicate);
        Self::custom(
            move |params: &Params| predicate.test(params),
            move |params: &Params| -> Result<bool> { Ok(!negated.test(params)?) },
            hysteresis,
        )
    }

    /// Evaluate against `params`, flipping the latch at most once
    ///
    /// Errors raised while testing leave the latch unchanged.
    pub fn evaluate(&mut self, params: &Params) -> Result<bool> {
        if !self.is_active {
            if self.kind.activates(params)? {
                self.is_active = true;
            }
        } else if self.kind.deactivates(params, self.hysteresis)? {
            self.is_active = false;
        }
        Ok(self.is_active)
    }

    /// Force the latch back to inactive
    pub fn reset(&mut self) {
        self.is_active = false;
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn hysteresis(&self) -> f64 {
        self.hysteresis
    }

    pub fn kind(&self) -> &ConditionKind {
        &self.kind
    }
}

fn check_hysteresis(hysteresis: f64) -> Result<()> {
    if hysteresis.is_nan() || hysteresis < 0.0 {
        return Err(AlarmError::config(format!(
            "hysteresis must be >= 0, got {}",
            hysteresis
        )));
    }
    Ok(())
}

/// Threshold condition on a single parameter
///
/// `direction` is `"above"` (activate at `value >= threshold`, release below
/// `threshold - hysteresis`) or `"below"` (activate at `value < threshold`,
/// release at `threshold + hysteresis` and up).
pub fn threshold_condition(
    param: impl Into<String>,
    threshold: f64,
    hysteresis: f64,
    direction: &str,
) -> Result<Condition> {
    let direction: Direction = direction.parse()?;
    let param = param.into();
    let kind = match direction {
        Direction::Above => ConditionKind::ThresholdAbove { param, threshold },
        Direction::Below => ConditionKind::ThresholdBelow { param, threshold },
    };
    Condition::new(kind, hysteresis)
}

/// Out-of-band condition: active outside `[min, max]`
///
/// Once active it only releases when the value is back inside
/// `[min + hysteresis, max - hysteresis]`. If that band is empty the
/// condition never releases on its own.
pub fn range_condition(
    param: impl Into<String>,
    min: f64,
    max: f64,
    hysteresis: f64,
) -> Result<Condition> {
    Condition::new(
        ConditionKind::Range {
            param: param.into(),
            min,
            max,
        },
        hysteresis,
    )
}
