//! Error types for the alarm engine

use thiserror::Error;

/// Result type for alarm operations
pub type Result<T> = std::result::Result<T, AlarmError>;

/// Error type shared by conditions, the engine, templates and configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AlarmError {
    /// Invalid argument supplied at call time (combine mode, cooldown, hysteresis, direction)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A predicate looked up a parameter that was not supplied
    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    /// A message template references a key absent from the parameters
    #[error("Missing template key: {0}")]
    MissingTemplateKey(String),

    /// Malformed message template
    #[error("Template error: {0}")]
    Template(String),

    /// A numeric condition received a non-numeric parameter
    #[error("Parameter '{name}' is not numeric (got {actual})")]
    NotNumeric { name: String, actual: &'static str },

    /// Failure raised inside a user-supplied predicate or script
    #[error("Predicate error: {0}")]
    Predicate(String),

    /// Alarm definition could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),
}

impl AlarmError {
    /// Shorthand for a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        AlarmError::Configuration(message.into())
    }

    /// Whether this error comes from a missing parameter or template key
    pub fn is_lookup(&self) -> bool {
        matches!(
            self,
            AlarmError::MissingParameter(_) | AlarmError::MissingTemplateKey(_)
        )
    }
}
