//! Gazetteer frames for the placefinder search engine.
//!
//! This crate owns the column layout of the places and rivers frames, loads them
//! from prepared CSV or Parquet files, and ships a small fixture gazetteer used
//! throughout the test suites.

mod error;
pub mod places;
pub mod schema;
pub mod test_data;

pub use error::{DataError, Result};
pub use places::GazetteerFrames;
pub use polars;
