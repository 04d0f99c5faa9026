use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("no index found with name {0}")]
    IndexNotFound(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("data source error: {0}")]
    Source(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type IndexResult<T> = Result<T, IndexError>;
