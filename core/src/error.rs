use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("alert store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("executor failure: {0}")]
    Executor(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("rule pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
