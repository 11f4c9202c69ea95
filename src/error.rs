use thiserror::Error as ThisError;

#[allow(clippy::enum_variant_names)]
#[derive(Debug, ThisError)]
pub enum Error {
    #[error("invalid event handler config: {0}")]
    InvalidConfig(String),
    #[error("invalid change record: {0}")]
    InvalidRecord(String),
    #[error("invalid json path `{path}`: {reason}")]
    InvalidQuery { path: String, reason: String },
    #[error("execution already exists: {0}")]
    ExecutionAlreadyExists(String),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("aws-sdk error: {0}")]
    SdkError(Box<dyn std::error::Error + Send + Sync + 'static>),
}
