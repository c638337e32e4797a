use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlacefinderError {
    #[error("Malformed input: {0}")]
    MalformedInput(#[from] crate::query::QueryError),
    #[error("Unsupported query shape: {0}")]
    UnsupportedQueryShape(#[from] crate::plan::PlanError),
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(#[from] crate::hydrate::HydrateError),
    #[error("Store failure: {0}")]
    StoreFailure(#[from] crate::store::StoreError),
    #[error("Data processing error: {0}")]
    DataProcessing(#[from] placefinder_data::DataError),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Init Logging error: {0}")]
    InitLoggingError(#[from] tracing_subscriber::filter::ParseError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PlacefinderError {
    /// Store failures may succeed on a retry; every other error is final.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreFailure(_))
    }
}

pub type Result<T> = std::result::Result<T, PlacefinderError>;
