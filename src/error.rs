use chrono::NaiveDate;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// No granule matched the query for a date. Callers iterating over many
    /// days treat this as "nothing to do today" rather than a failure.
    #[error("No {product} granules found for {date} within {geometry}")]
    DataUnavailable {
        product: &'static str,
        date: NaiveDate,
        geometry: String,
    },
    #[error("Unable to parse date or time: {0:?}")]
    InvalidTime(String),
    #[error("Unable to parse geometry: {0:?}")]
    InvalidGeometry(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Failure reported by the catalog, transport or raster backend.
    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}

impl Error {
    pub fn is_data_unavailable(&self) -> bool {
        matches!(self, Self::DataUnavailable { .. })
    }
}
