//! Alarm definitions
//!
//! An [`AlarmConfig`] describes a complete alarm (conditions plus evaluation
//! settings) and can be loaded from TOML or JSON:
//!
//! ```toml
//! name = "crowding"
//! combine_with = "AND"
//! cooldown_seconds = 10.0
//! message_template = "{patients} patients for {doctors} doctors"
//!
//! [[conditions]]
//! name = "few_doctors"
//! type = "threshold"
//! param = "doctors"
//! threshold = 2
//! direction = "below"
//!
//! [[conditions]]
//! name = "many_patients"
//! type = "threshold"
//! param = "patients"
//! threshold = 8
//! hysteresis = 2
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::conditions::{Condition, ConditionKind, Direction};
use crate::engine::{
    AlarmEngine, AlarmSettings, CombineMode, DEFAULT_COOLDOWN_SECONDS, DEFAULT_MESSAGE_TEMPLATE,
};
use crate::error::{AlarmError, Result};

fn default_cooldown() -> f64 {
    DEFAULT_COOLDOWN_SECONDS
}

fn default_template() -> String {
    DEFAULT_MESSAGE_TEMPLATE.to_string()
}

/// A complete alarm definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmConfig {
    /// Name used in logs
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub combine_with: CombineMode,

    #[serde(default = "default_cooldown")]
    pub cooldown_seconds: f64,

    #[serde(default = "default_template")]
    pub message_template: String,

    #[serde(default)]
    pub conditions: Vec<NamedCondition>,
}

/// A condition definition with the name it is registered under
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedCondition {
    pub name: String,
    #[serde(flatten)]
    pub condition: ConditionConfig,
}

/// Serializable condition shapes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ConditionConfig {
    Threshold {
        param: String,
        threshold: f64,
        #[serde(default)]
        hysteresis: f64,
        #[serde(default)]
        direction: Direction,
    },
    Range {
        param: String,
        min: f64,
        max: f64,
        #[serde(default)]
        hysteresis: f64,
    },
    /// Rhai boolean expression over the parameters
    #[cfg(feature = "rhai-scripting")]
    Expression {
        expr: String,
        #[serde(default)]
        hysteresis: f64,
    },
}

impl ConditionConfig {
    /// Build a fresh, inactive condition
    pub fn build(&self) -> Result<Condition> {
        match self {
            ConditionConfig::Threshold {
                param,
                threshold,
                hysteresis,
                direction,
            } => {
                let kind = match direction {
                    Direction::Above => ConditionKind::ThresholdAbove {
                        param: param.clone(),
                        threshold: *threshold,
                    },
                    Direction::Below => ConditionKind::ThresholdBelow {
                        param: param.clone(),
                        threshold: *threshold,
                    },
                };
                Condition::new(kind, *hysteresis)
            }
            ConditionConfig::Range {
                param,
                min,
                max,
                hysteresis,
            } => {
                crate::conditions::range_condition(param.clone(), *min, *max, *hysteresis)
            }
            #[cfg(feature = "rhai-scripting")]
            ConditionConfig::Expression { expr, hysteresis } => {
                crate::scripting::expression_condition(expr, *hysteresis)
            }
        }
    }
}

impl AlarmConfig {
    /// Create an empty definition with default settings
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            combine_with: CombineMode::default(),
            cooldown_seconds: DEFAULT_COOLDOWN_SECONDS,
            message_template: DEFAULT_MESSAGE_TEMPLATE.to_string(),
            conditions: Vec::new(),
        }
    }

    /// Add a condition
    pub fn with_condition(mut self, name: impl Into<String>, condition: ConditionConfig) -> Self {
        self.conditions.push(NamedCondition {
            name: name.into(),
            condition,
        });
        self
    }

    /// Set the combine mode
    pub fn with_combine(mut self, combine_with: CombineMode) -> Self {
        self.combine_with = combine_with;
        self
    }

    /// Set the cooldown
    pub fn with_cooldown(mut self, cooldown_seconds: f64) -> Self {
        self.cooldown_seconds = cooldown_seconds;
        self
    }

    /// Set the message template
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.message_template = template.into();
        self
    }

    /// Parse a TOML definition
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| AlarmError::Parse(e.to_string()))
    }

    /// Parse a JSON definition
    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| AlarmError::Parse(e.to_string()))
    }

    /// Load a definition from a `.toml` or `.json` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AlarmError::Parse(format!("{}: {}", path.display(), e)))?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content),
            Some("toml") => Self::from_toml_str(&content),
            other => Err(AlarmError::Parse(format!(
                "Unsupported alarm config extension: {:?}",
                other
            ))),
        }
    }

    /// Validated evaluation settings
    pub fn settings(&self) -> Result<AlarmSettings> {
        AlarmSettings::with_mode(
            self.combine_with,
            self.cooldown_seconds,
            self.message_template.clone(),
        )
    }

    /// Build an engine with every condition registered
    pub fn build_engine(&self) -> Result<AlarmEngine> {
        let mut engine = AlarmEngine::new();
        for named in &self.conditions {
            if engine.has_condition(&named.name) {
                return Err(AlarmError::config(format!(
                    "Duplicate condition name '{}' in alarm '{}'",
                    named.name, self.name
                )));
            }
            engine.register_condition(named.name.clone(), named.condition.build()?);
        }

        for key in engine.unread_template_keys(&self.message_template) {
            log::warn!(
                "Alarm '{}': template key '{}' is not read by any condition",
                self.name,
                key
            );
        }
        Ok(engine)
    }
}
