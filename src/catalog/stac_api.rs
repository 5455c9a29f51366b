use super::{format_timestamp, Catalog, GranuleDescriptor, GranuleQuery};
use crate::constants::{CMR_STAC_ROOT_URL, EMIT_L2A_REFLECTANCE_STAC_COLLECTION};
use anyhow::{anyhow, Result};
use chrono::NaiveDateTime;
use regex::Regex;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use stac::{href_to_url, Item, ItemCollection, Link, Links};
use std::sync::OnceLock;
use tracing::debug;
use url::Url;

const DEFAULT_LIMIT: usize = 250;

/// Item search against a STAC API such as CMR-STAC. STAC has no granule
/// name filter, so name patterns are matched against item ids locally.
pub struct StacCatalog {
    client: Client,
    root: Url,
    collection: String,
    limit: usize,
}

impl StacCatalog {
    pub fn new(client: Client, root: Url, collection: &str) -> Self {
        Self {
            client,
            root,
            collection: collection.to_string(),
            limit: DEFAULT_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    pub fn earthdata() -> Result<Self> {
        Ok(Self::new(
            Client::new(),
            Url::parse(CMR_STAC_ROOT_URL)?,
            EMIT_L2A_REFLECTANCE_STAC_COLLECTION,
        ))
    }

    fn search_url(self: &Self) -> String {
        format!("{}/search", self.root.as_str().trim_end_matches('/'))
    }

    fn search_body(self: &Self, query: &GranuleQuery) -> Result<Value> {
        let mut body = serde_json::json!({
            "collections": vec![self.collection.as_str()],
            "datetime": format!("{}/{}", format_timestamp(&query.start), format_timestamp(&query.end)),
            "limit": self.limit,
        });
        if let Some(geometry) = &query.geometry {
            body["bbox"] = serde_json::json!(geometry.lon_lat_bounds()?);
        }
        Ok(body)
    }
}

impl Catalog for StacCatalog {
    async fn search(self: &Self, query: &GranuleQuery) -> Result<Vec<GranuleDescriptor>> {
        let mut body = self.search_body(query)?;
        debug!("STAC item search: {}", body);

        let mut items: Vec<Item> = vec![];
        let mut request = self.client.post(self.search_url()).json(&body);
        for page in 1.. {
            let item_collection: ItemCollection = request
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            debug!("STAC page {}: {} items", page, item_collection.items.len());

            let next = item_collection.link("next").cloned();
            if item_collection.items.is_empty() {
                break;
            }
            items.extend(item_collection.items);
            match next {
                Some(link) => request = self.next_request(&link, &mut body)?,
                None => break,
            }
        }

        let name_filter = query.name_pattern.as_deref().map(glob_to_regex).transpose()?;

        items
            .iter()
            .filter(|item| name_filter.as_ref().map_or(true, |re| re.is_match(&item.id)))
            .map(descriptor_from_item)
            .collect()
    }
}

impl StacCatalog {
    /// Builds the request for a `next` link. POST links carry a body that
    /// either replaces the previous one or is merged into it.
    fn next_request(self: &Self, link: &Link, body: &mut Value) -> Result<RequestBuilder> {
        let url = self.root.join(&link.href)?;
        let is_post = link
            .method
            .as_deref()
            .is_some_and(|method| method.eq_ignore_ascii_case("POST"));
        if !is_post {
            return Ok(self.client.get(url));
        }

        if let Some(next_body) = &link.body {
            if link.merge.unwrap_or(false) {
                let fields = body
                    .as_object_mut()
                    .ok_or(anyhow!("Search body is not a JSON object"))?;
                fields.extend(next_body.clone());
            } else {
                *body = Value::Object(next_body.clone());
            }
        }
        Ok(self.client.post(url).json(body))
    }
}

/// Translates a `*`/`?` glob into an anchored regex.
fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let mut expr = String::from("^");
    for c in pattern.chars() {
        match c {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            c => expr.push_str(&regex::escape(&c.to_string())),
        }
    }
    expr.push('$');
    Ok(Regex::new(&expr)?)
}

fn descriptor_from_item(item: &Item) -> Result<GranuleDescriptor> {
    let data_links = item
        .assets
        .values()
        .filter(|asset| asset.href.ends_with(".nc"))
        .map(|asset| href_to_url(&asset.href).ok_or(anyhow!("Invalid asset href: {}", asset.href)))
        .collect::<Result<Vec<_>>>()?;

    Ok(GranuleDescriptor {
        concept_id: item.id.to_owned(),
        native_id: item.id.to_owned(),
        data_links,
        begin: begin_from_id(&item.id),
    })
}

/// EMIT ids embed the acquisition start as `_YYYYMMDDTHHMMSS_`.
fn begin_from_id(id: &str) -> Option<NaiveDateTime> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN
        .get_or_init(|| Regex::new(r"_(\d{8}T\d{6})_").expect("Regex pattern should always compile"));
    let stamp = re.captures(id)?.get(1)?.as_str();
    NaiveDateTime::parse_from_str(stamp, "%Y%m%dT%H%M%S").ok()
}
