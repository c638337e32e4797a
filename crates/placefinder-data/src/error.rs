use polars::prelude::PolarsError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DataError>;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
    #[error("Required column '{column}' not found in {frame} frame")]
    MissingColumn { frame: &'static str, column: String },
    #[error("Unsupported gazetteer file format: {0}")]
    UnsupportedFormat(String),
}
