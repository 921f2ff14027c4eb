use thiserror::Error;

/// Errors emitted while building or querying the database.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sql(#[from] sqlx::Error),
    #[error(transparent)]
    Core(#[from] edk2db_core::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("generator '{0}' requires a workspace path")]
    MissingWorkspace(String),
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("generator '{generator}' failed: {source}")]
    Generator {
        generator: String,
        #[source]
        source: Box<DbError>,
    },
}

/// Result type for database operations.
pub type Result<T> = std::result::Result<T, DbError>;
