mod cmr;
mod stac_api;

pub use self::cmr::CmrCatalog;
pub use self::stac_api::StacCatalog;

use crate::geometry::Geometry;
use anyhow::Result;
use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use url::Url;

/// One remote granule as reported by a catalog.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct GranuleDescriptor {
    pub concept_id: String,
    pub native_id: String,
    pub data_links: Vec<Url>,
    pub begin: Option<NaiveDateTime>,
}

impl GranuleDescriptor {
    /// Local file name of the reflectance asset, derived from the native id.
    pub fn file_name(&self) -> String {
        if self.native_id.ends_with(".nc") {
            self.native_id.clone()
        } else {
            format!("{}.nc", self.native_id)
        }
    }

    pub fn data_url(&self) -> Option<&Url> {
        let file_name = self.file_name();
        self.data_links
            .iter()
            .find(|url| {
                url.path_segments()
                    .and_then(|mut segments| segments.next_back())
                    .is_some_and(|last| last == file_name)
            })
            .or_else(|| self.data_links.first())
    }

    /// `(orbit, scene)` parsed from a native id such as
    /// `EMIT_L2A_RFL_001_20230815T200551_2322713_007`.
    pub fn orbit_scene(&self) -> Option<(u32, u32)> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let re = PATTERN.get_or_init(|| {
            Regex::new(r"_(?<orbit>\d+)_(?<scene>\d{3})(?:\.nc)?$")
                .expect("Regex pattern should always compile")
        });
        let captures = re.captures(&self.native_id)?;
        let (_, [orbit, scene]) = captures.extract();
        Some((orbit.parse().ok()?, scene.parse().ok()?))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GranuleQuery {
    pub concept_id: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub geometry: Option<Geometry>,
    /// Glob over granule names, e.g. `*2322713_007*`.
    pub name_pattern: Option<String>,
}

pub trait Catalog {
    async fn search(self: &Self, query: &GranuleQuery) -> Result<Vec<GranuleDescriptor>>;
}

/// Catalog backend chosen at runtime from configuration.
pub enum CatalogClient {
    Cmr(CmrCatalog),
    Stac(StacCatalog),
}

impl Catalog for CatalogClient {
    async fn search(self: &Self, query: &GranuleQuery) -> Result<Vec<GranuleDescriptor>> {
        match self {
            Self::Cmr(catalog) => catalog.search(query).await,
            Self::Stac(catalog) => catalog.search(query).await,
        }
    }
}

fn format_timestamp(t: &NaiveDateTime) -> String {
    t.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
