use crate::catalog::Catalog;
use crate::constants::{self, PRODUCT_NAME};
use crate::error::{Error, Result};
use crate::geometry::Geometry;
use crate::granule::{acquire, RasterBackend};
use crate::search::search_granules;
use crate::time::IntoMoment;
use crate::transport::Transport;
use std::path::{Path, PathBuf};
use tracing::info;

/// Retrieves EMIT L2A reflectance for a date or a range of dates.
pub struct Retriever<C, T, B> {
    pub(crate) catalog: C,
    pub(crate) transport: T,
    pub(crate) backend: B,
    pub(crate) download_directory: PathBuf,
}

impl<C: Catalog, T: Transport, B: RasterBackend> Retriever<C, T, B> {
    pub fn new(catalog: C, transport: T, backend: B) -> Self {
        Self {
            catalog,
            transport,
            backend,
            download_directory: constants::download_directory(),
        }
    }

    pub fn with_download_directory(mut self, download_directory: impl Into<PathBuf>) -> Self {
        self.download_directory = download_directory.into();
        self
    }

    pub fn download_directory(&self) -> &Path {
        &self.download_directory
    }

    /// Mosaic of every granule acquired on `date` over `geometry`.
    ///
    /// Fails with [`Error::DataUnavailable`] when the catalog has no granule
    /// for the day. Any other failure is passed through untouched.
    pub async fn retrieve(&self, date: impl IntoMoment, geometry: &Geometry) -> Result<B::Cube> {
        let date = date.into_moment()?.date();
        let granules =
            search_granules(&self.catalog, date, date, Some(geometry), None, None).await?;

        if granules.is_empty() {
            return Err(Error::DataUnavailable {
                product: PRODUCT_NAME,
                date,
                geometry: geometry.to_string(),
            });
        }
        info!("Found {} granules for {}", granules.len(), date);

        let mut cubes = Vec::with_capacity(granules.len());
        for granule in granules.iter() {
            let handle = acquire(
                &self.transport,
                &self.backend,
                granule,
                &self.download_directory,
            )
            .await?;
            cubes.push(handle.reflectance(geometry)?);
        }

        Ok(self.backend.mosaic(cubes)?)
    }
}
