use thiserror::Error;

/// Errors raised by the statistical core.
///
/// Numerical singularities are not represented; the smoothers recover them
/// point by point.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SensorError {
    /// Invalid configuration; fatal to the caller.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The input violates a call-time precondition (e.g. a leading missing value).
    #[error("precondition violated: {0}")]
    Precondition(String),

    #[error("length mismatch: numerator has {numerator} values, denominator has {denominator}")]
    LengthMismatch { numerator: usize, denominator: usize },

    /// Dates are not strictly increasing and contiguous.
    #[error("invalid date index: {0}")]
    Dates(String),
}

impl SensorError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition(message.into())
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<SensorError> for AppError {
    fn from(err: SensorError) -> Self {
        let exit_code = match err {
            SensorError::Config(_) => 2,
            _ => 3,
        };
        Self::new(exit_code, err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
