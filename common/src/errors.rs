//! Application error types.
//!
//! Every library function returns [`AppResult`]; only the binaries turn an
//! [`AppError`] into a message on stderr and a process exit code.

use thiserror::Error;

/// Result alias used across the workspace.
pub type AppResult<T> = Result<T, AppError>;

/// Coarse error category, used for exit codes and log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad driver tag, output format or configuration value.
    Configuration,
    /// Endpoint unreachable, authentication or ping failure.
    Connectivity,
    /// The server rejected or failed the operation.
    Execution,
    /// Wrong argument count or unknown command.
    Usage,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Configuration => write!(f, "configuration"),
            ErrorKind::Connectivity => write!(f, "connectivity"),
            ErrorKind::Execution => write!(f, "execution"),
            ErrorKind::Usage => write!(f, "usage"),
        }
    }
}

/// Errors raised by the SQL and Redis utilities.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unsupported database driver: {0}")]
    UnsupportedDatabaseType(String),

    #[error("Unsupported output format: {0}")]
    UnsupportedOutputFormat(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database connection failed: {0}")]
    DatabaseConnection(String),

    #[error("Query failed: {0}")]
    DatabaseQuery(String),

    #[error("Invalid bind parameter: {0}")]
    InvalidParameter(String),

    #[error("Redis connection failed: {0}")]
    RedisConnection(String),

    #[error("Redis operation failed: {0}")]
    RedisOperation(String),

    #[error("{0}")]
    Usage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Returns the taxonomy category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::UnsupportedDatabaseType(_)
            | AppError::UnsupportedOutputFormat(_)
            | AppError::Config(_)
            | AppError::Validation(_) => ErrorKind::Configuration,
            AppError::DatabaseConnection(_) | AppError::RedisConnection(_) => {
                ErrorKind::Connectivity
            }
            AppError::DatabaseQuery(_)
            | AppError::InvalidParameter(_)
            | AppError::RedisOperation(_)
            | AppError::Io(_) => ErrorKind::Execution,
            AppError::Usage(_) => ErrorKind::Usage,
        }
    }

    /// Process exit code for the binaries.
    pub fn exit_code(&self) -> u8 {
        match self.kind() {
            ErrorKind::Usage => 2,
            _ => 1,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            AppError::UnsupportedDatabaseType("oracle".into()).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            AppError::RedisConnection("refused".into()).kind(),
            ErrorKind::Connectivity
        );
        assert_eq!(
            AppError::DatabaseQuery("syntax".into()).kind(),
            ErrorKind::Execution
        );
        assert_eq!(AppError::Usage("get".into()).kind(), ErrorKind::Usage);
    }

    #[test]
    fn test_usage_exit_code() {
        assert_eq!(AppError::Usage("x".into()).exit_code(), 2);
        assert_eq!(AppError::DatabaseConnection("x".into()).exit_code(), 1);
    }

    #[test]
    fn test_message_names_unsupported_value() {
        let err = AppError::UnsupportedDatabaseType("sqlite".into());
        assert_eq!(err.to_string(), "Unsupported database driver: sqlite");
    }
}
