//! Local granule acquisition and the raster seams it hands off to.
use crate::catalog::GranuleDescriptor;
use crate::constants::QUALITY_BANDS;
use crate::error::Result;
use crate::geometry::Geometry;
use crate::transport::Transport;
use std::path::{Path, PathBuf};
use tracing::info;

/// In-memory multi-band raster.
pub trait RasterCube {
    /// Writes the cube as a GeoTIFF to `path`, whatever its extension.
    fn to_file(self: &Self, path: &Path) -> anyhow::Result<()>;
}

/// Granule reader and mosaic service of the raster library.
pub trait RasterBackend {
    type Cube: RasterCube;

    /// Reads the reflectance bands of the granule at `path`, masks pixels
    /// flagged by `quality_bands`, and clips/reprojects to `geometry`.
    fn reflectance(
        self: &Self,
        path: &Path,
        geometry: &Geometry,
        quality_bands: &[usize],
    ) -> anyhow::Result<Self::Cube>;

    /// Merges overlapping cubes into one. A single cube comes back as is.
    fn mosaic(self: &Self, cubes: Vec<Self::Cube>) -> anyhow::Result<Self::Cube>;
}

/// A granule present on local disk.
pub struct GranuleHandle<'a, B: RasterBackend> {
    path: PathBuf,
    backend: &'a B,
}

impl<'a, B: RasterBackend> GranuleHandle<'a, B> {
    pub fn new(path: PathBuf, backend: &'a B) -> Self {
        Self { path, backend }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn reflectance(&self, geometry: &Geometry) -> Result<B::Cube> {
        Ok(self
            .backend
            .reflectance(&self.path, geometry, &QUALITY_BANDS)?)
    }
}

/// Returns the local copy of `granule`, downloading it only when no file of
/// the expected name exists in `download_directory`.
pub async fn ensure_downloaded(
    transport: &impl Transport,
    granule: &GranuleDescriptor,
    download_directory: &Path,
) -> Result<PathBuf> {
    let path = download_directory.join(granule.file_name());
    if path.exists() {
        info!("Granule {} already downloaded", granule.native_id);
        return Ok(path);
    }
    info!("Downloading granule {}", granule.native_id);
    Ok(transport.download(granule, download_directory).await?)
}

pub async fn acquire<'a, B: RasterBackend>(
    transport: &impl Transport,
    backend: &'a B,
    granule: &GranuleDescriptor,
    download_directory: &Path,
) -> Result<GranuleHandle<'a, B>> {
    let path = ensure_downloaded(transport, granule, download_directory).await?;
    Ok(GranuleHandle::new(path, backend))
}
