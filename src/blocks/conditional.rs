//! Predicate-driven alarm

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use crate::conditions::{Condition, Predicate};
use crate::engine::{AlarmEngine, AlarmSettings, AlarmState};
use crate::error::{AlarmError, Result};
use crate::params::Params;

/// Name the predicate is registered under
pub const MAIN_CONDITION: &str = "main_condition";

/// Fields produced on every tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionalAlarmOutput {
    pub alarm_active: bool,
    pub alarm_message: String,
    pub state: AlarmState,
    pub alarm_count: u64,
}

/// Alarm over an arbitrary predicate
///
/// The predicate is registered with the engine on the first tick and kept
/// for the lifetime of the block; later ticks reuse it, so its latch
/// survives between frames.
pub struct ConditionalAlarm {
    engine: AlarmEngine,
    predicate: Arc<dyn Predicate>,
}

impl ConditionalAlarm {
    pub fn new(predicate: impl Predicate + 'static) -> Self {
        Self {
            engine: AlarmEngine::new(),
            predicate: Arc::new(predicate),
        }
    }

    /// Build from a Rhai boolean expression such as `"count > 10 && temp > 25"`
    #[cfg(feature = "rhai-scripting")]
    pub fn from_expression(expr: &str) -> Result<Self> {
        Ok(Self::new(crate::scripting::ScriptPredicate::compile(expr)?))
    }

    /// Evaluate one tick at the current instant
    pub fn run(
        &mut self,
        evaluation_parameters: &Params,
        hysteresis_default: f64,
        cooldown_seconds: f64,
        message_template: &str,
        combine_operator: &str,
    ) -> Result<ConditionalAlarmOutput> {
        self.run_at(
            evaluation_parameters,
            hysteresis_default,
            cooldown_seconds,
            message_template,
            combine_operator,
            Instant::now(),
        )
    }

    /// Evaluate one tick at `now`
    pub fn run_at(
        &mut self,
        evaluation_parameters: &Params,
        hysteresis_default: f64,
        cooldown_seconds: f64,
        message_template: &str,
        combine_operator: &str,
        now: Instant,
    ) -> Result<ConditionalAlarmOutput> {
        if hysteresis_default.is_nan() || hysteresis_default < 0.0 {
            return Err(AlarmError::config(format!(
                "hysteresis_default must be >= 0, got {}",
                hysteresis_default
            )));
        }
        let settings = AlarmSettings::new(combine_operator, cooldown_seconds, message_template)?;

        if !self.engine.has_condition(MAIN_CONDITION) {
            let condition =
                Condition::from_predicate(Arc::clone(&self.predicate), hysteresis_default)?;
            self.engine.register_condition(MAIN_CONDITION, condition);
        }

        let result = self.engine.evaluate_at(evaluation_parameters, &settings, now)?;

        Ok(ConditionalAlarmOutput {
            alarm_active: result.active,
            alarm_message: result.message,
            state: result.state,
            alarm_count: result.fire_count,
        })
    }

    pub fn engine(&self) -> &AlarmEngine {
        &self.engine
    }

    pub fn reset(&mut self) {
        self.engine.reset();
    }
}
