use thiserror::Error;

/// Errors raised by the grid, agent and world operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CellGridError {
    /// The caller broke a residency or lifecycle precondition.
    #[error("precondition violated: {0}")]
    PreconditionViolation(String),
    #[error("capacity exceeded: {requested} agents requested but only {available} cells available")]
    CapacityExceeded { requested: usize, available: usize },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("unknown population '{0}'")]
    UnknownPopulation(String),
    #[error("unknown agent handle")]
    UnknownAgent,
    #[error("cell index {0} is outside the grid")]
    UnknownCell(usize),
}

pub type Result<T> = std::result::Result<T, CellGridError>;

pub(crate) fn precondition(message: impl Into<String>) -> CellGridError {
    CellGridError::PreconditionViolation(message.into())
}
