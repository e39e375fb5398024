use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid server identity: {field} violates constraint: {constraint}")]
    InvalidIdentity { field: String, constraint: String },

    #[error("Feature error: {0}")]
    Framework(#[from] silarpc_framework::FrameworkError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid server state: {0}")]
    InvalidState(String),

    #[error("Discovery error: {0}")]
    Discovery(String),

    #[error("Server is shutting down")]
    ShuttingDown,
}

impl From<std::net::AddrParseError> for ServerError {
    fn from(err: std::net::AddrParseError) -> Self {
        ServerError::Transport(err.to_string())
    }
}

/// Error raised by a feature implementation while handling one call.
///
/// Mirrors the execution-error taxonomy of the feature model: validation
/// errors for bad parameters, defined execution errors declared in the
/// feature definition, and undefined execution errors for everything else.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CallError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Defined execution error '{identifier}': {message}")]
    DefinedExecution { identifier: String, message: String },

    #[error("Undefined execution error: {0}")]
    UndefinedExecution(String),

    #[error("No command execution with UUID {0}")]
    UnknownExecution(String),

    #[error("Command execution {0} has not finished yet")]
    ExecutionNotFinished(String),

    #[error("Call not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, ServerError>;
