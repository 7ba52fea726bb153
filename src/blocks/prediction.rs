//! Detection-count alarm

use serde::Serialize;
use std::time::Instant;

use crate::engine::{AlarmEngine, AlarmSettings, AlarmState, CombineMode};
use crate::error::{AlarmError, Result};
use crate::params::params_from;

/// Message used when the host does not supply one
pub const DEFAULT_PREDICTION_TEMPLATE: &str =
    "Alert: {count} detection(s) (threshold: {threshold})";

/// Fields produced on every tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionAlarmOutput {
    pub alarm_active: bool,
    pub alarm_message: String,
    /// The input count, passed through
    pub count_value: i64,
    pub state: AlarmState,
}

/// Fires when a detection count reaches a threshold
///
/// Firing always needs `count >= threshold`. While the cooldown is running
/// the alarm stays in cooldown as long as the count holds at or above
/// `max(0, threshold - hysteresis)`; dropping below that returns it to idle.
/// Once the cooldown is over a count under the threshold also returns it to
/// idle. Templates may reference `{count}`, `{threshold}` and `{hysteresis}`.
#[derive(Debug, Default)]
pub struct PredictionAlarm {
    engine: AlarmEngine,
}

impl PredictionAlarm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate one tick at the current instant
    pub fn run(
        &mut self,
        count: i64,
        threshold: i64,
        hysteresis: i64,
        cooldown_seconds: f64,
        message_template: &str,
    ) -> Result<PredictionAlarmOutput> {
        self.run_at(
            count,
            threshold,
            hysteresis,
            cooldown_seconds,
            message_template,
            Instant::now(),
        )
    }

    /// Evaluate one tick at `now`
    pub fn run_at(
        &mut self,
        count: i64,
        threshold: i64,
        hysteresis: i64,
        cooldown_seconds: f64,
        message_template: &str,
        now: Instant,
    ) -> Result<PredictionAlarmOutput> {
        if threshold <= 0 {
            return Err(AlarmError::config(format!(
                "threshold must be greater than 0, got {}",
                threshold
            )));
        }
        if hysteresis < 0 {
            return Err(AlarmError::config(format!(
                "hysteresis must be >= 0, got {}",
                hysteresis
            )));
        }
        let settings =
            AlarmSettings::with_mode(CombineMode::And, cooldown_seconds, message_template)?;

        let deactivation_threshold = threshold.saturating_sub(hysteresis).max(0);
        let holding = self.engine.state() == AlarmState::Cooldown
            && !self.engine.cooldown_elapsed(now, settings.cooldown);
        let signal = if holding {
            count >= deactivation_threshold
        } else {
            count >= threshold
        };

        let params = params_from([
            ("count", count),
            ("threshold", threshold),
            ("hysteresis", hysteresis),
        ]);
        let before = self.engine.state();
        let result = self.engine.evaluate_signal_at(signal, &params, &settings, now)?;
        if before == AlarmState::Cooldown && result.state == AlarmState::Idle {
            log::info!(
                "Prediction alarm reset: count={}, threshold={}, deactivation_threshold={}",
                count,
                threshold,
                deactivation_threshold
            );
        }

        Ok(PredictionAlarmOutput {
            alarm_active: result.active,
            alarm_message: result.message,
            count_value: count,
            state: result.state,
        })
    }

    pub fn state(&self) -> AlarmState {
        self.engine.state()
    }

    pub fn fire_count(&self) -> u64 {
        self.engine.fire_count()
    }

    pub fn reset(&mut self) {
        self.engine.reset();
    }
}
