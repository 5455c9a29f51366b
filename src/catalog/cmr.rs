use super::{format_timestamp, Catalog, GranuleDescriptor, GranuleQuery};
use crate::constants::CMR_GRANULE_SEARCH_URL;
use crate::geometry::Geometry;
use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDateTime};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

const SEARCH_AFTER_HEADER: &str = "CMR-Search-After";
/// CMR rejects `page_size` above this.
const MAX_PAGE_SIZE: usize = 2000;

/// Granule search against the NASA Common Metadata Repository.
pub struct CmrCatalog {
    client: Client,
    url: Url,
    page_size: usize,
}

impl CmrCatalog {
    pub fn new(client: Client, url: Url) -> Self {
        Self {
            client,
            url,
            page_size: MAX_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn earthdata() -> Result<Self> {
        Ok(Self::new(Client::new(), Url::parse(CMR_GRANULE_SEARCH_URL)?))
    }
}

impl Catalog for CmrCatalog {
    async fn search(self: &Self, query: &GranuleQuery) -> Result<Vec<GranuleDescriptor>> {
        let params = query_params(query, self.page_size)?;
        debug!("CMR granule search: {:?}", params);

        let mut granules: Vec<GranuleDescriptor> = vec![];
        let mut search_after: Option<String> = None;

        loop {
            let mut request = self.client.get(self.url.clone()).query(&params);
            if let Some(token) = &search_after {
                request = request.header(SEARCH_AFTER_HEADER, token);
            }
            let response = request.send().await?.error_for_status()?;

            search_after = response
                .headers()
                .get(SEARCH_AFTER_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);

            let page: UmmSearchResponse = response.json().await?;
            let page_len = page.items.len();
            for item in page.items {
                granules.push(item.into_descriptor()?);
            }

            if page_len < self.page_size || search_after.is_none() {
                break;
            }
        }

        debug!("CMR returned {} granules", granules.len());
        Ok(granules)
    }
}

fn query_params(query: &GranuleQuery, page_size: usize) -> Result<Vec<(String, String)>> {
    let mut params = vec![
        ("collection_concept_id".to_string(), query.concept_id.clone()),
        (
            "temporal[]".to_string(),
            format!(
                "{},{}",
                format_timestamp(&query.start),
                format_timestamp(&query.end)
            ),
        ),
        ("page_size".to_string(), page_size.to_string()),
    ];

    if let Some(geometry) = &query.geometry {
        let [xmin, ymin, xmax, ymax] = geometry.lon_lat_bounds()?;
        match geometry {
            Geometry::Point { .. } => {
                params.push(("point".to_string(), format!("{},{}", xmin, ymin)))
            }
            Geometry::BBox { .. } => params.push((
                "bounding_box".to_string(),
                format!("{},{},{},{}", xmin, ymin, xmax, ymax),
            )),
        }
    }

    if let Some(pattern) = &query.name_pattern {
        params.push(("readable_granule_name[]".to_string(), pattern.clone()));
        params.push((
            "options[readable_granule_name][pattern]".to_string(),
            "true".to_string(),
        ));
    }

    Ok(params)
}

#[derive(Deserialize, Debug)]
struct UmmSearchResponse {
    #[serde(default)]
    items: Vec<UmmItem>,
}

#[derive(Deserialize, Debug)]
struct UmmItem {
    meta: UmmMeta,
    umm: Umm,
}

#[derive(Deserialize, Debug)]
struct UmmMeta {
    #[serde(rename = "concept-id")]
    concept_id: String,
    #[serde(rename = "native-id")]
    native_id: String,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "PascalCase")]
struct Umm {
    #[serde(default)]
    related_urls: Vec<RelatedUrl>,
    temporal_extent: Option<TemporalExtent>,
}

#[derive(Deserialize, Debug)]
struct RelatedUrl {
    #[serde(rename = "URL")]
    url: String,
    #[serde(rename = "Type")]
    kind: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
struct TemporalExtent {
    range_date_time: Option<RangeDateTime>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
struct RangeDateTime {
    beginning_date_time: Option<String>,
}

impl UmmItem {
    fn into_descriptor(self) -> Result<GranuleDescriptor> {
        let data_links = self
            .umm
            .related_urls
            .iter()
            .filter(|u| u.kind.as_deref() == Some("GET DATA"))
            .map(|u| {
                Url::parse(&u.url).map_err(|e| anyhow!("Invalid data link {}: {}", u.url, e))
            })
            .collect::<Result<Vec<_>>>()?;

        let begin = self
            .umm
            .temporal_extent
            .and_then(|t| t.range_date_time)
            .and_then(|r| r.beginning_date_time)
            .and_then(|s| parse_umm_timestamp(&s));

        Ok(GranuleDescriptor {
            concept_id: self.meta.concept_id,
            native_id: self.meta.native_id,
            data_links,
            begin,
        })
    }
}

fn parse_umm_timestamp(s: &str) -> Option<NaiveDateTime> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.naive_utc())
}
