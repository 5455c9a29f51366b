//! Fixed properties of the EMIT L2A surface reflectance product.
use std::path::PathBuf;

pub const ENGINE: &str = "netcdf4";
pub const GLT_NODATA_VALUE: i32 = 0;
pub const FILL_VALUE: i32 = -9999;

pub const EMIT_L2A_REFLECTANCE_SHORT_NAME: &str = "EMITL2ARFL";
pub const EMIT_L2A_REFLECTANCE_DOI: &str = "10.5067/EMIT/EMITL2ARFL.001";
pub const EMIT_L2A_REFLECTANCE_CONCEPT_ID: &str = "C2408750690-LPCLOUD";
pub const EMIT_L2A_REFLECTANCE_STAC_COLLECTION: &str = "EMITL2ARFL_001";

/// Human readable product name used in messages.
pub const PRODUCT_NAME: &str = "EMIT L2A RFL";

/// Prefix of every time-series output file, `<OUTPUT_PREFIX>_<YYYYMMDD>.tif`.
pub const OUTPUT_PREFIX: &str = "EMIT_L2A_RFL";

pub const DOWNLOAD_DIRECTORY: &str = "~/data/EMIT_L2A_RFL";

/// Band indices of the L2A mask file that flag unusable pixels.
pub const QUALITY_BANDS: [usize; 5] = [0, 1, 2, 3, 4];

pub const CMR_GRANULE_SEARCH_URL: &str = "https://cmr.earthdata.nasa.gov/search/granules.umm_json";
pub const CMR_STAC_ROOT_URL: &str = "https://cmr.earthdata.nasa.gov/stac/LPCLOUD";

pub const TOKEN_ENV: &str = "EARTHDATA_TOKEN";

/// The default download directory with a leading `~` expanded.
pub fn download_directory() -> PathBuf {
    expand_home(DOWNLOAD_DIRECTORY)
}

/// Expands a leading `~` against `$HOME`. Paths without one, or a missing
/// `$HOME`, come back unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    match (path.strip_prefix('~'), home) {
        (Some(""), Some(home)) => home,
        (Some(rest), Some(home)) if rest.starts_with('/') => home.join(&rest[1..]),
        _ => PathBuf::from(path),
    }
}
