use crate::catalog::Catalog;
use crate::constants::OUTPUT_PREFIX;
use crate::error::{Error, Result};
use crate::geometry::Geometry;
use crate::granule::{RasterBackend, RasterCube};
use crate::retrieve::Retriever;
use crate::time::{DateWindow, IntoMoment};
use crate::transport::Transport;
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// `<output_directory>/EMIT_L2A_RFL_<YYYYMMDD>.tif`
pub fn output_path(output_directory: &Path, date: NaiveDate) -> PathBuf {
    output_directory.join(output_file_name(date))
}

pub fn output_file_name(date: NaiveDate) -> String {
    format!("{}_{}.tif", OUTPUT_PREFIX, date.format("%Y%m%d"))
}

/// Each day of `window` paired with its output, if that output exists.
pub fn existing_outputs(
    output_directory: &Path,
    window: &DateWindow,
) -> Vec<(NaiveDate, Option<PathBuf>)> {
    window
        .days()
        .map(|date| {
            let path = output_path(output_directory, date);
            (date, path.exists().then_some(path))
        })
        .collect()
}

/// Writes `cube` next to `path` under a temporary name and renames it into
/// place, so an interrupted write never leaves a file at `path`.
pub fn write_atomically(cube: &impl RasterCube, path: &Path) -> Result<()> {
    let stem = path.file_stem().unwrap_or_default().to_string_lossy();
    let partial = path.with_file_name(format!("{}.partial.tif", stem));

    if let Err(e) = cube.to_file(&partial) {
        let _ = fs::remove_file(&partial);
        return Err(e.into());
    }
    fs::rename(&partial, path)?;
    Ok(())
}

impl<C: Catalog, T: Transport, B: RasterBackend> Retriever<C, T, B> {
    /// Produces one GeoTIFF per day in `[start_date, end_date]` and returns
    /// the paths that exist afterwards, in calendar order.
    ///
    /// Days whose output already exists are not retrieved again. Days without
    /// granules are left out. Any other failure aborts the run.
    pub async fn retrieve_series(
        &self,
        start_date: impl IntoMoment,
        end_date: impl IntoMoment,
        geometry: &Geometry,
        output_directory: &Path,
    ) -> Result<Vec<PathBuf>> {
        let window = DateWindow::new(start_date, end_date)?;
        let mut outputs: Vec<PathBuf> = vec![];
        if window.is_empty() {
            return Ok(outputs);
        }
        info!(
            "Retrieving {} days from {} to {}",
            window.len(),
            window.start,
            window.end
        );

        if !output_directory.exists() {
            fs::create_dir_all(output_directory)?;
        }

        for date in window.days() {
            let path = output_path(output_directory, date);
            if path.exists() {
                info!("Output {} already exists", path.display());
                outputs.push(path);
                continue;
            }

            match self.retrieve(date, geometry).await {
                Ok(cube) => {
                    write_atomically(&cube, &path)?;
                    info!("Wrote {}", path.display());
                    outputs.push(path);
                }
                Err(e @ Error::DataUnavailable { .. }) => {
                    warn!("{}", e);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(outputs)
    }
}
