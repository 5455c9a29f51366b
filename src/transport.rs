use crate::catalog::GranuleDescriptor;
use anyhow::{anyhow, Result};
use futures_util::StreamExt;
use reqwest::header::{AUTHORIZATION, CONTENT_RANGE, RANGE};
use reqwest::{Client, RequestBuilder, StatusCode};
use std::fs;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use url::Url;

pub trait Transport {
    /// Fetches the granule's reflectance asset into `directory` and returns
    /// the local path.
    async fn download(self: &Self, granule: &GranuleDescriptor, directory: &Path)
        -> Result<PathBuf>;
}

/// Downloads over HTTPS, optionally authenticated with an Earthdata token.
pub struct HttpTransport {
    client: Client,
    token: Option<String>,
}

impl HttpTransport {
    pub fn new(client: Client, token: Option<String>) -> Self {
        Self { client, token }
    }

    /// Reads the bearer token from the named environment variable, if set.
    pub fn from_env(token_env: &str) -> Self {
        let token = std::env::var(token_env).ok().filter(|t| !t.is_empty());
        Self::new(Client::new(), token)
    }
}

impl Transport for HttpTransport {
    async fn download(
        self: &Self,
        granule: &GranuleDescriptor,
        directory: &Path,
    ) -> Result<PathBuf> {
        let url = granule
            .data_url()
            .ok_or(anyhow!("Granule {} has no data link", granule.native_id))?;

        if !directory.exists() {
            fs::create_dir_all(directory)?;
        }
        let dst = directory.join(granule.file_name());

        // Bytes left behind by an interrupted download
        let partial = partial_path(&dst);
        let mut byte_count = fs::metadata(&partial).map(|m| m.len()).unwrap_or(0);

        loop {
            if byte_count > 0 {
                info!("Resuming {} from byte {}", granule.file_name(), byte_count);
            }
            let response = self.request(url, byte_count).send().await?;
            let (first_byte, total) = response
                .headers()
                .get(CONTENT_RANGE)
                .and_then(|value| value.to_str().ok())
                .map(parse_content_range)
                .unwrap_or((None, None));

            let (mut partial_file, expected_len) = match response.status() {
                StatusCode::PARTIAL_CONTENT if first_byte == Some(byte_count) => {
                    let file = OpenOptions::new().create(true).append(true).open(&partial)?;
                    (file, total)
                }
                StatusCode::PARTIAL_CONTENT if byte_count > 0 => {
                    warn!(
                        "Server resumed {} at {:?} instead of byte {}; starting over",
                        url, first_byte, byte_count
                    );
                    fs::remove_file(&partial)?;
                    byte_count = 0;
                    continue;
                }
                StatusCode::OK => {
                    // A server that ignores Range sends the whole object
                    let file = OpenOptions::new()
                        .create(true)
                        .write(true)
                        .truncate(true)
                        .open(&partial)?;
                    byte_count = 0;
                    (file, response.content_length())
                }
                StatusCode::RANGE_NOT_SATISFIABLE if byte_count > 0 => {
                    if total == Some(byte_count) {
                        info!("{} was already complete", partial.display());
                        fs::rename(&partial, &dst)?;
                        return Ok(dst);
                    }
                    warn!(
                        "Discarding {} ({} bytes, remote size {:?})",
                        partial.display(),
                        byte_count,
                        total
                    );
                    fs::remove_file(&partial)?;
                    byte_count = 0;
                    continue;
                }
                status => {
                    return Err(anyhow!("Download of {} failed with status {}", url, status));
                }
            };

            info!("Downloading {}", url);
            let mut stream = response.bytes_stream();
            while let Some(bytes) = stream.next().await {
                let bytes = bytes?;
                partial_file.write_all(&bytes)?;
                byte_count += bytes.len() as u64;
            }
            partial_file.flush()?;

            if let Some(expected_len) = expected_len {
                if byte_count != expected_len {
                    return Err(anyhow!(
                        "Download of {} stopped at {} of {} bytes",
                        url,
                        byte_count,
                        expected_len
                    ));
                }
            }

            info!("Downloaded {} bytes to {}", byte_count, dst.display());
            // Rename the file to remove .partial suffix
            fs::rename(&partial, &dst)?;
            return Ok(dst);
        }
    }
}

impl HttpTransport {
    fn request(self: &Self, url: &Url, offset: u64) -> RequestBuilder {
        let mut request = self.client.get(url.clone());
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        if offset > 0 {
            request = request.header(RANGE, format!("bytes={}-", offset));
        }
        request
    }
}

/// Reads `bytes <first>-<last>/<total>` or `bytes */<total>` into the first
/// byte position and the total length. Either is `None` when absent or `*`.
fn parse_content_range(value: &str) -> (Option<u64>, Option<u64>) {
    let Some(spec) = value.trim().strip_prefix("bytes ") else {
        return (None, None);
    };
    let (range, total) = spec.split_once('/').unwrap_or((spec, "*"));
    let first_byte = range
        .split_once('-')
        .and_then(|(first, _)| first.trim().parse().ok());
    (first_byte, total.trim().parse().ok())
}

pub(crate) fn partial_path(dst: &Path) -> PathBuf {
    let mut name = dst.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    dst.with_file_name(name)
}
