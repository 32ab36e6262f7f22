use thiserror::Error;

use crate::domain::Page;

#[derive(Error, Debug)]
pub enum ExplorerError {
    #[error("Could not parse uploaded file: {message}")]
    Parse { message: String },

    #[error("Unknown column: {column}")]
    UnknownColumn { column: String },

    #[error("Duplicate column name: {column}")]
    DuplicateColumn { column: String },

    #[error("Column '{column}' must be {expected}, found {found}")]
    ColumnType {
        column: String,
        expected: String,
        found: String,
    },

    #[error("Dataset does not match its schema: {message}")]
    SchemaMismatch { message: String },

    #[error("{message}")]
    MissingPrerequisite { page: Page, message: String },

    #[error("{message}")]
    EmptySelection { message: String },

    #[error("Chart rendering failed: {message}")]
    Chart { message: String },

    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("IO error: {message}")]
    Io { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl From<std::io::Error> for ExplorerError {
    fn from(err: std::io::Error) -> Self {
        ExplorerError::Io {
            message: err.to_string(),
        }
    }
}

impl From<regex::Error> for ExplorerError {
    fn from(err: regex::Error) -> Self {
        ExplorerError::Internal {
            message: format!("Invalid missing-value pattern: {}", err),
        }
    }
}

impl ExplorerError {
    /// Errors the user can fix from the page they are on. Anything else is
    /// a fault in the engine or its environment.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            ExplorerError::Parse { .. }
                | ExplorerError::UnknownColumn { .. }
                | ExplorerError::DuplicateColumn { .. }
                | ExplorerError::ColumnType { .. }
                | ExplorerError::MissingPrerequisite { .. }
                | ExplorerError::EmptySelection { .. }
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ExplorerError::Parse { .. } => "ParseError",
            ExplorerError::UnknownColumn { .. } => "UnknownColumn",
            ExplorerError::DuplicateColumn { .. } => "DuplicateColumn",
            ExplorerError::ColumnType { .. } => "ColumnTypeError",
            ExplorerError::SchemaMismatch { .. } => "SchemaMismatch",
            ExplorerError::MissingPrerequisite { .. } => "MissingPrerequisite",
            ExplorerError::EmptySelection { .. } => "EmptySelection",
            ExplorerError::Chart { .. } => "ChartError",
            ExplorerError::SessionNotFound { .. } => "SessionNotFound",
            ExplorerError::Arrow(_) => "ArrowError",
            ExplorerError::Io { .. } => "IoError",
            ExplorerError::Config { .. } => "ConfigError",
            ExplorerError::Internal { .. } => "InternalError",
        }
    }
}
