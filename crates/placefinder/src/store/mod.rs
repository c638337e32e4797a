//! Read access to a gazetteer.
//!
//! A [`GazetteerStore`] executes search plans and admin lookups and returns
//! rows in the result layout read by [`crate::hydrate::hydrate`].

mod frame;

use std::fmt::Debug;

pub use error::StoreError;
pub use frame::FrameStore;
use polars::prelude::DataFrame;

use crate::{
    admin::{AdminQuery, UnitQuery},
    plan::{CountQuery, DataQuery},
};

pub trait GazetteerStore: Debug + Send + Sync {
    /// The scored, ordered and paged rows of a search.
    fn fetch(&self, query: &DataQuery) -> Result<DataFrame, StoreError>;

    /// Number of rows in the search scope, ignoring paging.
    fn count(&self, query: &CountQuery) -> Result<usize, StoreError>;

    /// Places around an anchor, with `closest_distance` to it.
    fn nearby(&self, query: &AdminQuery) -> Result<DataFrame, StoreError>;

    /// Country and state units of a country.
    fn units(&self, query: &UnitQuery) -> Result<DataFrame, StoreError>;
}

mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum StoreError {
        #[error("DataFrame error: {0}")]
        DataFrame(#[from] polars::prelude::PolarsError),
        #[error("Data processing error: {0}")]
        DataProcessing(#[from] placefinder_data::DataError),
        #[error(transparent)]
        Other(#[from] anyhow::Error),
    }
}
