use crate::catalog::{CatalogClient, CmrCatalog, StacCatalog};
use crate::constants::{
    expand_home, CMR_GRANULE_SEARCH_URL, CMR_STAC_ROOT_URL, DOWNLOAD_DIRECTORY,
    EMIT_L2A_REFLECTANCE_STAC_COLLECTION, TOKEN_ENV,
};
use crate::transport::HttpTransport;
use anyhow::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use toml;
use url::Url;

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CatalogBackend {
    #[default]
    Cmr,
    Stac,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct CatalogConfig {
    #[serde(default)]
    pub backend: CatalogBackend,
    /// Overrides the backend's default search endpoint.
    pub url: Option<Url>,
    pub page_size: Option<usize>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct RetrievalConfig {
    download_directory: String,
    output_directory: Option<String>,
    #[serde(default = "default_token_env")]
    pub token_env: String,
    pub catalog: CatalogConfig,
}

fn default_token_env() -> String {
    TOKEN_ENV.to_string()
}

pub fn template() -> toml::Table {
    toml::toml! {
        download_directory = "~/data/EMIT_L2A_RFL"

        output_directory = "~/data/EMIT_L2A_RFL/timeseries"

        // Environment variable holding an Earthdata Login bearer token
        token_env = "EARTHDATA_TOKEN"

        [catalog]
        backend = "cmr"
        page_size = 2000
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            download_directory: DOWNLOAD_DIRECTORY.to_string(),
            output_directory: None,
            token_env: default_token_env(),
            catalog: CatalogConfig {
                backend: CatalogBackend::Cmr,
                url: None,
                page_size: None,
            },
        }
    }
}

impl RetrievalConfig {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn write<P: AsRef<Path>>(self: &Self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn from_template(table: &toml::Table) -> Result<Self> {
        let config: Self = toml::from_str(&table.to_string())?;
        Ok(config)
    }

    pub fn download_directory(self: &Self) -> PathBuf {
        expand_home(&self.download_directory)
    }

    pub fn output_directory(self: &Self) -> Option<PathBuf> {
        self.output_directory.as_deref().map(expand_home)
    }

    pub fn catalog(self: &Self) -> Result<CatalogClient> {
        let client = Client::new();
        let catalog = match self.catalog.backend {
            CatalogBackend::Cmr => {
                let url = match &self.catalog.url {
                    Some(url) => url.clone(),
                    None => Url::parse(CMR_GRANULE_SEARCH_URL)?,
                };
                let mut cmr = CmrCatalog::new(client, url);
                if let Some(page_size) = self.catalog.page_size {
                    cmr = cmr.with_page_size(page_size);
                }
                CatalogClient::Cmr(cmr)
            }
            CatalogBackend::Stac => {
                let url = match &self.catalog.url {
                    Some(url) => url.clone(),
                    None => Url::parse(CMR_STAC_ROOT_URL)?,
                };
                let mut stac = StacCatalog::new(client, url, EMIT_L2A_REFLECTANCE_STAC_COLLECTION);
                if let Some(limit) = self.catalog.page_size {
                    stac = stac.with_limit(limit);
                }
                CatalogClient::Stac(stac)
            }
        };
        Ok(catalog)
    }

    pub fn transport(self: &Self) -> HttpTransport {
        HttpTransport::from_env(&self.token_env)
    }
}
