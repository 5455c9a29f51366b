use crate::catalog::{Catalog, GranuleDescriptor, GranuleQuery};
use crate::constants::EMIT_L2A_REFLECTANCE_CONCEPT_ID;
use crate::error::Result;
use crate::geometry::Geometry;
use crate::time::IntoMoment;
use tracing::debug;

/// Granule name filter for one orbit/scene. Both must be given; a lone
/// orbit or scene applies no filter.
pub fn name_pattern(orbit: Option<u32>, scene: Option<u32>) -> Option<String> {
    match (orbit, scene) {
        (Some(orbit), Some(scene)) => Some(format!("*{}_{:03}*", orbit, scene)),
        _ => None,
    }
}

/// Finds EMIT L2A reflectance granules acquired between `start` and `end`,
/// in the order the catalog reports them. An empty result is not an error.
pub async fn search_granules(
    catalog: &impl Catalog,
    start: impl IntoMoment,
    end: impl IntoMoment,
    geometry: Option<&Geometry>,
    orbit: Option<u32>,
    scene: Option<u32>,
) -> Result<Vec<GranuleDescriptor>> {
    let query = GranuleQuery {
        concept_id: EMIT_L2A_REFLECTANCE_CONCEPT_ID.to_string(),
        start: start.into_moment()?.as_start(),
        end: end.into_moment()?.as_end(),
        geometry: geometry.copied(),
        name_pattern: name_pattern(orbit, scene),
    };
    debug!("Searching granules: {:?}", query);

    let granules = catalog.search(&query).await?;
    debug!("Found {} granules", granules.len());
    Ok(granules)
}
