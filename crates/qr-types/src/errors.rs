use thiserror::Error;

/// Main error type for the Quarry system
#[derive(Error, Debug)]
pub enum QrError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Ranking error: {0}")]
    Ranking(#[from] RankingError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl QrError {
    /// Whether this error is a fatal configuration/misuse error.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Oracle(OracleError::Misuse { .. }))
    }
}

/// Configuration errors. Always fatal; never retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{parameter} = {value} is out of range, expected {valid}")]
    OutOfRange {
        parameter: String,
        value: String,
        valid: String,
    },

    #[error("Required component not set: {component}")]
    MissingComponent { component: String },

    #[error("Ensemble must contain at least one member model")]
    EmptyEnsemble,

    #[error("Unknown {kind} \"{name}\", known: {known}")]
    UnknownOperator {
        kind: String,
        name: String,
        known: String,
    },

    #[error("Entry shape mismatch: {message}")]
    ShapeMismatch { message: String },

    #[error("Cannot change settings: {message}")]
    Locked { message: String },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

impl ConfigError {
    pub fn out_of_range(
        parameter: impl Into<String>,
        value: impl ToString,
        valid: impl Into<String>,
    ) -> Self {
        Self::OutOfRange {
            parameter: parameter.into(),
            value: value.to_string(),
            valid: valid.into(),
        }
    }

    pub fn missing(component: impl Into<String>) -> Self {
        Self::MissingComponent {
            component: component.into(),
        }
    }
}

/// Oracle errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OracleError {
    #[error("Oracle misuse: {message}")]
    Misuse { message: String },

    #[error("Oracle cannot resolve entry {key}")]
    MissingEntry { key: String },

    #[error("Oracle evaluation of {key} failed: {message}")]
    EvaluationFailed { key: String, message: String },

    #[error("Oracle batch incomplete: {missing} of {total} entries lack a measurement")]
    Incomplete { missing: usize, total: usize },
}

impl OracleError {
    pub fn misuse(message: impl Into<String>) -> Self {
        Self::Misuse {
            message: message.into(),
        }
    }
}

/// Surrogate model errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Model {model} has not been trained")]
    NotTrained { model: String },

    #[error("Cannot train {model} on an empty dataset")]
    EmptyTrainingSet { model: String },

    #[error("Entry {key} has no attributes")]
    MissingAttributes { key: String },

    #[error("Entry {key} has {actual} attributes, model expects {expected}")]
    AttributeMismatch {
        key: String,
        expected: usize,
        actual: usize,
    },

    #[error("Training entry {key} has no measured value")]
    MissingMeasurement { key: String },
}

/// Ranking errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RankingError {
    #[error("Entry {key} has no {kind} value")]
    MissingValue { key: String, kind: String },

    #[error("Entry {key} has a non-finite objective value")]
    NonFinite { key: String },
}

/// Result type alias for Quarry operations
pub type QrResult<T> = Result<T, QrError>;

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::QrError::Validation(format!($($arg)*))
    };
}

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::QrError::Internal(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::QrError::Config($crate::ConfigError::Invalid {
            message: format!($($arg)*),
        })
    };
}
