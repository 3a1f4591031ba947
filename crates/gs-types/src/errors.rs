use thiserror::Error;

/// Main error type for the gsopt service
#[derive(Error, Debug)]
pub enum GsError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Unknown backend: {identifier}")]
    UnknownBackend { identifier: String },

    #[error("Algorithm error: {0}")]
    Algorithm(#[from] AlgorithmError),

    #[error("Resource limit exceeded: {0}")]
    ResourceLimit(#[from] ResourceLimitError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification used by transports to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller sent something wrong; retrying unchanged will fail again.
    Client,
    /// The engine or the server failed.
    Server,
}

impl GsError {
    pub fn unknown_backend(identifier: impl Into<String>) -> Self {
        Self::UnknownBackend {
            identifier: identifier.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_)
            | Self::UnknownBackend { .. }
            | Self::ResourceLimit(_)
            | Self::Serialization(_) => ErrorKind::Client,
            Self::Algorithm(_) | Self::Config(_) | Self::Io(_) | Self::Internal(_) => {
                ErrorKind::Server
            }
        }
    }

    /// The offending field, when the error points at one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation(e) => Some(e.field.as_str()),
            Self::ResourceLimit(e) => Some(e.field()),
            _ => None,
        }
    }
}

/// A malformed setting or history record.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Failures raised by an optimization engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AlgorithmError {
    #[error("{engine}: numerical failure: {message}")]
    Numerical { engine: String, message: String },

    #[error("{engine}: did not converge: {message}")]
    NotConverged { engine: String, message: String },

    #[error("{engine}: invalid input: {message}")]
    InvalidInput { engine: String, message: String },

    #[error("{engine}: replay consumed {consumed} evaluations, expected {expected}")]
    ReplayMismatch {
        engine: String,
        consumed: usize,
        expected: usize,
    },
}

impl AlgorithmError {
    pub fn numerical(engine: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Numerical {
            engine: engine.into(),
            message: message.into(),
        }
    }

    pub fn not_converged(engine: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotConverged {
            engine: engine.into(),
            message: message.into(),
        }
    }

    pub fn invalid_input(engine: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            engine: engine.into(),
            message: message.into(),
        }
    }
}

/// Request exceeds a configured size bound
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResourceLimitError {
    #[error("too many parameters: {count} exceeds limit {limit}")]
    TooManyParameters { count: usize, limit: usize },

    #[error("history too long: {count} records exceeds limit {limit}")]
    HistoryTooLong { count: usize, limit: usize },

    #[error("batch too large: {count} exceeds limit {limit}")]
    BatchTooLarge { count: usize, limit: usize },

    #[error("too many initial points: {count} exceeds limit {limit}")]
    TooManyInitPoints { count: usize, limit: usize },

    #[error("acquisition option {option}: {count} exceeds limit {limit}")]
    AcquisitionTooLarge {
        option: &'static str,
        count: usize,
        limit: usize,
    },
}

impl ResourceLimitError {
    pub fn field(&self) -> &'static str {
        match self {
            Self::TooManyParameters { .. } => "param_names",
            Self::HistoryTooLong { .. } => "existing_data",
            Self::BatchTooLarge { .. } => "batch_size",
            Self::TooManyInitPoints { .. } => "num_init_points",
            Self::AcquisitionTooLarge { option, .. } => *option,
        }
    }
}

/// Result type alias for gsopt operations
pub type GsResult<T> = Result<T, GsError>;

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($field:expr, $($arg:tt)*) => {
        $crate::GsError::Validation($crate::ValidationError::new($field, format!($($arg)*)))
    };
}

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::GsError::Internal(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::GsError::Config(format!($($arg)*))
    };
}
