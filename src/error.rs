use thiserror::Error;

/// Error types for the paramcalc-rs library.
#[derive(Error, Debug)]
pub enum CalcError {
    /// Error indicating a mismatch in matrix dimensions.
    #[error("Matrix dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Error for invalid operands or arguments passed to an operation.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Invalid state in the engine or data model.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Parameter not found.
    #[error("Parameter not found: {0}")]
    ParameterNotFound(String),

    /// Component not found.
    #[error("Component not found: {0}")]
    ComponentNotFound(String),

    /// Result table not found.
    #[error("Result table not found: {0}")]
    TableNotFound(String),

    /// Calculation not found within a component.
    #[error("Calculation not found: {0}")]
    CalculationNotFound(String),

    /// Expression parsing error.
    #[error("Expression error: {0}")]
    Expression(#[from] crate::expr::ExprError),

    /// Calculation ordering error.
    #[error("Scheduling error: {0}")]
    Schedule(#[from] crate::engine::scheduler::ScheduleError),

    /// I/O error wrapper.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Generic error for cases that don't fit the other categories.
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for paramcalc-rs operations.
pub type Result<T> = std::result::Result<T, CalcError>;

/// Extensions for converting from other error types.
impl From<String> for CalcError {
    fn from(s: String) -> Self {
        CalcError::Other(s)
    }
}

impl From<&str> for CalcError {
    fn from(s: &str) -> Self {
        CalcError::Other(s.to_string())
    }
}
