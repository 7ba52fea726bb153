//! Alarm engine
//!
//! Owns a named set of [`Condition`]s and drives a three-state machine on
//! every tick:
//!
//! ```text
//!            combined && cooldown elapsed
//!   Idle ───────────────────────────────► Firing
//!    ▲                                      │
//!    │ !combined                  (always)  │
//!    │                                      ▼
//!    └──────────────────────────────── Cooldown ◄─┐
//!                                        │  │     │ combined && !elapsed
//!          combined && cooldown elapsed  │  └─────┘
//!              (re-fire, back to Firing) ┘
//! ```
//!
//! A firing is reported on exactly two ticks: the tick that enters
//! `Firing` and the following tick that demotes it to `Cooldown`. The
//! demotion happens whether or not the conditions still hold.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

use crate::conditions::Condition;
use crate::error::{AlarmError, Result};
use crate::params::Params;
use crate::template;

/// Default message used when no template is configured
pub const DEFAULT_MESSAGE_TEMPLATE: &str = "Alarm triggered";

/// Default minimum interval between two firings
pub const DEFAULT_COOLDOWN_SECONDS: f64 = 5.0;

/// State of the alarm state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmState {
    #[default]
    Idle,
    Firing,
    Cooldown,
}

impl AlarmState {
    /// Lowercase label reported to the host
    pub fn as_str(&self) -> &'static str {
        match self {
            AlarmState::Idle => "idle",
            AlarmState::Firing => "firing",
            AlarmState::Cooldown => "cooldown",
        }
    }
}

impl fmt::Display for AlarmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How per-condition results reduce to one boolean
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CombineMode {
    /// Every condition must hold
    #[default]
    #[serde(rename = "AND")]
    And,
    /// At least one condition must hold
    #[serde(rename = "OR")]
    Or,
}

impl CombineMode {
    /// Reduce condition results; an empty set is true under AND and false under OR
    pub fn combine(&self, results: impl IntoIterator<Item = bool>) -> bool {
        let mut results = results.into_iter();
        match self {
            CombineMode::And => results.all(|r| r),
            CombineMode::Or => results.any(|r| r),
        }
    }
}

impl std::str::FromStr for CombineMode {
    type Err = AlarmError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "AND" => Ok(CombineMode::And),
            "OR" => Ok(CombineMode::Or),
            _ => Err(AlarmError::config(format!(
                "Invalid combine_with: {}. Use 'AND' or 'OR'",
                s
            ))),
        }
    }
}

impl fmt::Display for CombineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CombineMode::And => write!(f, "AND"),
            CombineMode::Or => write!(f, "OR"),
        }
    }
}

/// Per-tick evaluation settings, validated up front
#[derive(Debug, Clone, PartialEq)]
pub struct AlarmSettings {
    pub combine_with: CombineMode,
    pub cooldown: Duration,
    pub message_template: String,
}

impl AlarmSettings {
    /// Parse and validate settings as the host passes them
    pub fn new(
        combine_with: &str,
        cooldown_seconds: f64,
        message_template: impl Into<String>,
    ) -> Result<Self> {
        Self::with_mode(combine_with.parse()?, cooldown_seconds, message_template)
    }

    /// Build settings from an already-typed combine mode
    pub fn with_mode(
        combine_with: CombineMode,
        cooldown_seconds: f64,
        message_template: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            combine_with,
            cooldown: cooldown_from_secs(cooldown_seconds)?,
            message_template: message_template.into(),
        })
    }
}

impl Default for AlarmSettings {
    fn default() -> Self {
        Self {
            combine_with: CombineMode::And,
            cooldown: Duration::from_secs_f64(DEFAULT_COOLDOWN_SECONDS),
            message_template: DEFAULT_MESSAGE_TEMPLATE.to_string(),
        }
    }
}

/// Convert a cooldown given in seconds
///
/// Negative, NaN, infinite and out-of-range values are rejected.
pub fn cooldown_from_secs(cooldown_seconds: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(cooldown_seconds).map_err(|e| {
        AlarmError::config(format!(
            "cooldown_seconds must be a finite number >= 0, got {} ({})",
            cooldown_seconds, e
        ))
    })
}

/// Outcome of one tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlarmResult {
    #[serde(rename = "alarm_active")]
    pub active: bool,
    #[serde(rename = "alarm_message")]
    pub message: String,
    pub state: AlarmState,
    #[serde(rename = "alarm_count")]
    pub fire_count: u64,
    /// Post-evaluation latch of every registered condition
    pub condition_states: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Output {
    Silent,
    Report,
    Fire,
}

fn transition(state: AlarmState, combined: bool, cooldown_elapsed: bool) -> (AlarmState, Output) {
    match (state, combined, cooldown_elapsed) {
        (AlarmState::Idle, true, true) => (AlarmState::Firing, Output::Fire),
        (AlarmState::Idle, _, _) => (AlarmState::Idle, Output::Silent),
        (AlarmState::Firing, _, _) => (AlarmState::Cooldown, Output::Report),
        (AlarmState::Cooldown, false, _) => (AlarmState::Idle, Output::Silent),
        (AlarmState::Cooldown, true, true) => (AlarmState::Firing, Output::Fire),
        (AlarmState::Cooldown, true, false) => (AlarmState::Cooldown, Output::Silent),
    }
}

/// Condition-driven alarm with cooldown-gated firing
///
/// One engine per alarm stream. `evaluate` mutates condition latches and
/// the state machine without synchronization; hosts that share an engine
/// across threads must serialize access themselves.
#[derive(Debug, Default)]
pub struct AlarmEngine {
    state: AlarmState,
    last_fire_time: Option<Instant>,
    fire_count: u64,
    conditions: BTreeMap<String, Condition>,
}

impl AlarmEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a condition under `name`, returning any condition it replaced
    pub fn register_condition(
        &mut self,
        name: impl Into<String>,
        condition: Condition,
    ) -> Option<Condition> {
        let name = name.into();
        log::debug!("Registering condition '{}': {:?}", name, condition.kind());
        self.conditions.insert(name, condition)
    }

    pub fn has_condition(&self, name: &str) -> bool {
        self.conditions.contains_key(name)
    }

    pub fn condition(&self, name: &str) -> Option<&Condition> {
        self.conditions.get(name)
    }

    /// Registered condition names, sorted
    pub fn condition_names(&self) -> impl Iterator<Item = &str> {
        self.conditions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn state(&self) -> AlarmState {
        self.state
    }

    pub fn fire_count(&self) -> u64 {
        self.fire_count
    }

    pub fn last_fire_time(&self) -> Option<Instant> {
        self.last_fire_time
    }

    /// Evaluate one tick at the current instant
    pub fn evaluate(&mut self, params: &Params, settings: &AlarmSettings) -> Result<AlarmResult> {
        self.evaluate_at(params, settings, Instant::now())
    }

    /// Evaluate one tick at `now`
    ///
    /// Conditions are evaluated first and each latch updates as it goes. If a
    /// condition fails partway through, latches already visited keep their new
    /// value while the state machine, fire time and fire count stay untouched.
    /// The message is rendered before the transition is committed, so a
    /// template error also leaves the state machine as it was.
    pub fn evaluate_at(
        &mut self,
        params: &Params,
        settings: &AlarmSettings,
        now: Instant,
    ) -> Result<AlarmResult> {
        let mut condition_states = BTreeMap::new();
        for (name, condition) in self.conditions.iter_mut() {
            condition_states.insert(name.clone(), condition.evaluate(params)?);
        }

        let combined = settings
            .combine_with
            .combine(condition_states.values().copied());

        self.advance(combined, condition_states, params, settings, now)
    }

    /// Drive the state machine from a combined signal computed by the caller
    ///
    /// Registered conditions are neither consulted nor updated, and the
    /// result carries no condition states. `params` is only used to render
    /// the message.
    pub fn evaluate_signal_at(
        &mut self,
        combined: bool,
        params: &Params,
        settings: &AlarmSettings,
        now: Instant,
    ) -> Result<AlarmResult> {
        self.advance(combined, BTreeMap::new(), params, settings, now)
    }

    fn advance(
        &mut self,
        combined: bool,
        condition_states: BTreeMap<String, bool>,
        params: &Params,
        settings: &AlarmSettings,
        now: Instant,
    ) -> Result<AlarmResult> {
        let cooldown_elapsed = self.cooldown_elapsed(now, settings.cooldown);
        let (next, output) = transition(self.state, combined, cooldown_elapsed);

        let message = match output {
            Output::Silent => String::new(),
            Output::Report | Output::Fire => {
                template::render(&settings.message_template, params)?
            }
        };

        if next != self.state {
            log::debug!("Alarm state {} -> {}", self.state, next);
        }
        if output == Output::Fire {
            self.last_fire_time = Some(now);
            self.fire_count += 1;
            if self.state == AlarmState::Cooldown {
                log::info!("Alarm RE-FIRED: {} (count: {})", message, self.fire_count);
            } else {
                log::info!("Alarm FIRED: {} (count: {})", message, self.fire_count);
            }
        }
        self.state = next;

        Ok(AlarmResult {
            active: output != Output::Silent,
            message,
            state: self.state,
            fire_count: self.fire_count,
            condition_states,
        })
    }

    /// Has `cooldown` passed since the last firing (true if never fired)
    pub fn cooldown_elapsed(&self, now: Instant, cooldown: Duration) -> bool {
        match self.last_fire_time {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= cooldown,
        }
    }

    /// Template placeholders that no registered condition reads
    ///
    /// Such keys must be supplied by the host on every reporting tick. Custom
    /// conditions read unknown parameters, so their presence makes the check
    /// inconclusive and nothing is returned.
    pub fn unread_template_keys(&self, message_template: &str) -> Vec<String> {
        let mut read = Vec::with_capacity(self.conditions.len());
        for condition in self.conditions.values() {
            match condition.kind().param() {
                Some(param) => read.push(param),
                None => return Vec::new(),
            }
        }

        template::placeholders(message_template)
            .into_iter()
            .filter(|key| !read.contains(&key.as_str()))
            .collect()
    }

    /// Return to Idle with a zero fire count and every latch released
    ///
    /// Registered conditions are kept.
    pub fn reset(&mut self) {
        self.state = AlarmState::Idle;
        self.last_fire_time = None;
        self.fire_count = 0;
        for condition in self.conditions.values_mut() {
            condition.reset();
        }
        log::debug!("Alarm engine reset ({} conditions kept)", self.conditions.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::{range_condition, threshold_condition};
    use crate::params::{number, params_from};

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn count_engine() -> AlarmEngine {
        let mut engine = AlarmEngine::new();
        engine.register_condition(
            "count",
            threshold_condition("count", 10.0, 2.0, "above").unwrap(),
        );
        engine
    }

    #[test]
    fn test_transition_table() {
        use AlarmState::*;
        assert_eq!(transition(Idle, true, true), (Firing, Output::Fire));
        assert_eq!(transition(Idle, true, false), (Idle, Output::Silent));
        assert_eq!(transition(Idle, false, true), (Idle, Output::Silent));
        assert_eq!(transition(Firing, false, false), (Cooldown, Output::Report));
        assert_eq!(transition(Firing, true, true), (Cooldown, Output::Report));
        assert_eq!(transition(Cooldown, false, true), (Idle, Output::Silent));
        assert_eq!(transition(Cooldown, true, true), (Firing, Output::Fire));
        assert_eq!(transition(Cooldown, true, false), (Cooldown, Output::Silent));
    }

    #[test]
    fn test_one_shot_then_cooldown() {
        let mut engine = count_engine();
        let settings = AlarmSettings::new("AND", 5.0, "Count is {count}").unwrap();
        let params = params_from([("count", 12)]);
        let t0 = Instant::now();

        let r1 = engine.evaluate_at(&params, &settings, t0).unwrap();
        assert!(r1.active);
        assert_eq!(r1.message, "Count is 12");
        assert_eq!(r1.state, AlarmState::Firing);
        assert_eq!(r1.fire_count, 1);

        let r2 = engine.evaluate_at(&params, &settings, t0).unwrap();
        assert!(r2.active);
        assert_eq!(r2.message, "Count is 12");
        assert_eq!(r2.state, AlarmState::Cooldown);
        assert_eq!(r2.fire_count, 1);

        let r3 = engine.evaluate_at(&params, &settings, t0).unwrap();
        assert!(!r3.active);
        assert_eq!(r3.message, "");
        assert_eq!(r3.state, AlarmState::Cooldown);
        assert_eq!(r3.fire_count, 1);

        let r4 = engine.evaluate_at(&params, &settings, t0 + secs(5)).unwrap();
        assert!(r4.active);
        assert_eq!(r4.state, AlarmState::Firing);
        assert_eq!(r4.fire_count, 2);
        assert_eq!(engine.last_fire_time(), Some(t0 + secs(5)));
    }

    #[test]
    fn test_firing_demotes_even_when_condition_clears() {
        let mut engine = count_engine();
        let settings = AlarmSettings::new("AND", 5.0, "{count}").unwrap();
        let t0 = Instant::now();

        engine.evaluate_at(&params_from([("count", 12)]), &settings, t0).unwrap();
        let r = engine.evaluate_at(&params_from([("count", 0)]), &settings, t0).unwrap();
        assert!(r.active);
        assert_eq!(r.message, "0");
        assert_eq!(r.state, AlarmState::Cooldown);
        assert_eq!(r.condition_states["count"], false);

        let r = engine.evaluate_at(&params_from([("count", 0)]), &settings, t0).unwrap();
        assert!(!r.active);
        assert_eq!(r.state, AlarmState::Idle);
    }

    #[test]
    fn test_idle_waits_for_cooldown() {
        let mut engine = count_engine();
        let settings = AlarmSettings::new("AND", 5.0, "alarm").unwrap();
        let t0 = Instant::now();
        let high = params_from([("count", 12)]);
        let low = params_from([("count", 0)]);

        engine.evaluate_at(&high, &settings, t0).unwrap();
        engine.evaluate_at(&high, &settings, t0).unwrap();
        engine.evaluate_at(&low, &settings, t0 + secs(1)).unwrap();
        assert_eq!(engine.state(), AlarmState::Idle);

        let r = engine.evaluate_at(&high, &settings, t0 + secs(2)).unwrap();
        assert!(!r.active);
        assert_eq!(r.state, AlarmState::Idle);

        let r = engine.evaluate_at(&high, &settings, t0 + secs(5)).unwrap();
        assert!(r.active);
        assert_eq!(r.fire_count, 2);
    }

    #[test]
    fn test_and_or_combination() {
        let build = || {
            let mut engine = AlarmEngine::new();
            engine.register_condition(
                "doctors",
                threshold_condition("doctors", 2.0, 0.0, "below").unwrap(),
            );
            engine.register_condition(
                "patients",
                threshold_condition("patients", 8.0, 0.0, "above").unwrap(),
            );
            engine
        };
        let params = params_from([("doctors", 3), ("patients", 9)]);

        let r = build()
            .evaluate(&params, &AlarmSettings::new("AND", 0.0, "x").unwrap())
            .unwrap();
        assert!(!r.active);
        assert_eq!(r.condition_states["doctors"], false);
        assert_eq!(r.condition_states["patients"], true);

        let r = build()
            .evaluate(&params, &AlarmSettings::new("OR", 0.0, "x").unwrap())
            .unwrap();
        assert!(r.active);
    }

    #[test]
    fn test_invalid_settings() {
        let err = AlarmSettings::new("XOR", 5.0, "x").unwrap_err();
        assert!(matches!(err, AlarmError::Configuration(_)));
        assert!(err.to_string().contains("XOR"));

        assert!(AlarmSettings::new("and", 5.0, "x").is_err());
        assert!(AlarmSettings::new("AND", -1.0, "x").is_err());
        assert!(AlarmSettings::new("AND", f64::NAN, "x").is_err());
        assert!(AlarmSettings::new("OR", 0.0, "x").is_ok());
    }

    #[test]
    fn test_cooldown_out_of_range() {
        for bad in [1e20, f64::MAX, f64::INFINITY, -0.5] {
            let err = AlarmSettings::new("AND", bad, "x").unwrap_err();
            assert!(matches!(err, AlarmError::Configuration(_)), "{}", bad);
        }
        assert_eq!(cooldown_from_secs(0.25).unwrap(), Duration::from_millis(250));
        assert_eq!(cooldown_from_secs(86_400.0).unwrap(), secs(86_400));
    }

    #[test]
    fn test_signal_drives_state_machine() {
        let mut engine = count_engine();
        let settings = AlarmSettings::new("AND", 5.0, "{count}").unwrap();
        let params = params_from([("count", 0)]);
        let t0 = Instant::now();

        let r = engine.evaluate_signal_at(true, &params, &settings, t0).unwrap();
        assert!(r.active);
        assert_eq!(r.message, "0");
        assert_eq!(r.state, AlarmState::Firing);
        assert!(r.condition_states.is_empty());
        // the registered condition was not consulted
        assert!(!engine.condition("count").unwrap().is_active());

        engine.evaluate_signal_at(true, &params, &settings, t0).unwrap();
        let r = engine.evaluate_signal_at(false, &params, &settings, t0 + secs(1)).unwrap();
        assert_eq!(r.state, AlarmState::Idle);
        assert_eq!(r.fire_count, 1);
        assert!(!engine.cooldown_elapsed(t0 + secs(4), settings.cooldown));
        assert!(engine.cooldown_elapsed(t0 + secs(5), settings.cooldown));
    }

    #[test]
    fn test_unread_template_keys() {
        let mut engine = count_engine();
        engine.register_condition("temp", range_condition("temp", 18.0, 26.0, 1.0).unwrap());
        assert_eq!(
            engine.unread_template_keys("{count} at {temp} in {zone}"),
            vec!["zone".to_string()]
        );
        assert!(engine.unread_template_keys("{count}").is_empty());

        engine.register_condition(
            "custom",
            Condition::custom(
                |p: &Params| -> Result<bool> { Ok(number(p, "zone")? > 0.0) },
                |p: &Params| -> Result<bool> { Ok(number(p, "zone")? <= 0.0) },
                0.0,
            )
            .unwrap(),
        );
        assert!(engine.unread_template_keys("{count} in {zone}").is_empty());
    }

    #[test]
    fn test_template_only_rendered_when_reporting() {
        let mut engine = count_engine();
        let settings = AlarmSettings::new("AND", 5.0, "Value {missing}").unwrap();
        let t0 = Instant::now();

        let r = engine.evaluate_at(&params_from([("count", 1)]), &settings, t0).unwrap();
        assert!(!r.active);

        let err = engine.evaluate_at(&params_from([("count", 12)]), &settings, t0).unwrap_err();
        assert_eq!(err, AlarmError::MissingTemplateKey("missing".to_string()));
        assert_eq!(engine.state(), AlarmState::Idle);
        assert_eq!(engine.fire_count(), 0);
        assert_eq!(engine.last_fire_time(), None);
    }

    #[test]
    fn test_failing_condition_leaves_state_machine() {
        let mut engine = AlarmEngine::new();
        engine.register_condition("a", threshold_condition("a", 1.0, 0.0, "above").unwrap());
        engine.register_condition(
            "b",
            Condition::custom(
                |p: &Params| -> Result<bool> { Ok(number(p, "b")? > 0.0) },
                |p: &Params| -> Result<bool> { Ok(number(p, "b")? <= 0.0) },
                0.0,
            )
            .unwrap(),
        );
        let settings = AlarmSettings::new("AND", 0.0, "x").unwrap();

        let err = engine.evaluate(&params_from([("a", 5)]), &settings).unwrap_err();
        assert_eq!(err, AlarmError::MissingParameter("b".to_string()));
        // "a" sorts first and already latched
        assert!(engine.condition("a").unwrap().is_active());
        assert_eq!(engine.state(), AlarmState::Idle);
        assert_eq!(engine.fire_count(), 0);
    }

    #[test]
    fn test_empty_engine() {
        let params = Params::new();
        let r = AlarmEngine::new()
            .evaluate(&params, &AlarmSettings::new("AND", 0.0, "always").unwrap())
            .unwrap();
        assert!(r.active);
        assert!(r.condition_states.is_empty());

        let r = AlarmEngine::new()
            .evaluate(&params, &AlarmSettings::new("OR", 0.0, "never").unwrap())
            .unwrap();
        assert!(!r.active);
    }

    #[test]
    fn test_reset_keeps_conditions() {
        let mut engine = count_engine();
        engine.register_condition("temp", range_condition("temp", 18.0, 26.0, 1.0).unwrap());
        let settings = AlarmSettings::new("OR", 5.0, "x").unwrap();
        let params = params_from([("count", 12), ("temp", 30)]);

        engine.evaluate(&params, &settings).unwrap();
        engine.evaluate(&params, &settings).unwrap();
        assert_eq!(engine.fire_count(), 1);

        engine.reset();
        assert_eq!(engine.state(), AlarmState::Idle);
        assert_eq!(engine.fire_count(), 0);
        assert_eq!(engine.last_fire_time(), None);
        assert_eq!(engine.condition_names().collect::<Vec<_>>(), vec!["count", "temp"]);
        assert!(!engine.condition("count").unwrap().is_active());
        assert!(!engine.condition("temp").unwrap().is_active());
    }

    #[test]
    fn test_register_replaces() {
        let mut engine = count_engine();
        let previous = engine.register_condition(
            "count",
            threshold_condition("count", 3.0, 0.0, "above").unwrap(),
        );
        assert!(previous.is_some());
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn test_result_json() {
        let mut engine = count_engine();
        let settings = AlarmSettings::new("AND", 5.0, "hi").unwrap();
        let r = engine.evaluate(&params_from([("count", 12)]), &settings).unwrap();

        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["alarm_active"], true);
        assert_eq!(json["alarm_message"], "hi");
        assert_eq!(json["state"], "firing");
        assert_eq!(json["alarm_count"], 1);
        assert_eq!(json["condition_states"]["count"], true);
    }
}
