//! Search and download client for the NeuroMorpho.org repository.
//!
//! Downloaded SWC files are kept in a plain directory cache keyed by archive
//! and neuron name; a cached file is returned without touching the network.
//! Nothing is ever evicted from the cache.

use crate::config::{ClientConfig, LoadOptions};
use crate::error::ClientError;
use crate::morphology::NeuronMorphology;
use crate::swc::read_swc;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::OnceCell;
use tracing::{debug, info};

const FIELDS_ENDPOINT: &str = "api/neuron/fields";
const SELECT_ENDPOINT: &str = "api/neuron/select/";

/// One entry of a search listing. Fields beyond name and archive are kept
/// verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuronSummary {
    #[serde(default)]
    pub neuron_id: Option<u64>,
    pub neuron_name: String,
    pub archive: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One parsed page of `api/neuron/select`.
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    pub neurons: Vec<NeuronSummary>,
    pub total_pages: Option<u64>,
}

#[derive(Deserialize)]
struct RawListing {
    #[serde(rename = "_embedded")]
    embedded: Option<RawEmbedded>,
    page: Option<RawPage>,
}

#[derive(Deserialize)]
struct RawEmbedded {
    #[serde(rename = "neuronResources", default)]
    neuron_resources: Vec<NeuronSummary>,
}

#[derive(Deserialize)]
struct RawPage {
    #[serde(rename = "totalPages")]
    total_pages: Option<u64>,
}

#[derive(Deserialize)]
struct RawFields {
    #[serde(rename = "Neuron Fields")]
    neuron_fields: Vec<String>,
}

/// Parse a listing body. A body without `_embedded` is an empty page.
pub fn parse_listing(body: &str) -> Result<ListingPage, ClientError> {
    let raw: RawListing = serde_json::from_str(body)?;
    Ok(ListingPage {
        neurons: raw.embedded.map(|e| e.neuron_resources).unwrap_or_default(),
        total_pages: raw.page.and_then(|p| p.total_pages),
    })
}

/// Validate search keys and turn them into `fq=key:value` filter pairs.
pub fn build_query(
    query: &BTreeMap<String, String>,
    permitted: &[String],
) -> Result<Vec<(String, String)>, ClientError> {
    query
        .iter()
        .map(|(key, value)| {
            if !permitted.iter().any(|p| p == key) {
                return Err(ClientError::InvalidSearchField {
                    field: key.clone(),
                    permitted: permitted.to_vec(),
                });
            }
            Ok(("fq".to_string(), format!("{}:{}", key, value)))
        })
        .collect()
}

fn looks_like_html(body: &str) -> bool {
    let head: String = body.trim_start().chars().take(512).collect::<String>().to_ascii_lowercase();
    head.starts_with("<!doctype html") || head.contains("<html")
}

fn check_name(name: &str) -> Result<(), ClientError> {
    if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(ClientError::InvalidName(name.to_string()));
    }
    Ok(())
}

pub struct NeuroMorphoClient {
    http: reqwest::Client,
    config: ClientConfig,
    permitted_fields: OnceCell<Vec<String>>,
}

impl NeuroMorphoClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            permitted_fields: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Absolute URL for an API path relative to the base URL.
    pub fn url(&self, ext: &str) -> Result<Url, ClientError> {
        let mut base = self.config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let ext = ext.trim_start_matches('/');
        Url::parse(&base)
            .and_then(|b| b.join(ext))
            .map_err(|e| ClientError::InvalidUrl(format!("{}{}: {}", base, ext, e)))
    }

    pub fn search_url(&self, filters: &[(String, String)], page: u64) -> Result<Url, ClientError> {
        let mut url = self.url(SELECT_ENDPOINT)?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in filters {
                pairs.append_pair(key, value);
            }
            pairs.append_pair("page", &page.to_string());
        }
        Ok(url)
    }

    /// Local cache location for one neuron's standardized SWC.
    pub fn cache_path(&self, archive: &str, neuron_name: &str) -> PathBuf {
        self.config
            .cache_dir
            .join(archive.to_lowercase())
            .join(format!("{}.CNG.swc", neuron_name))
    }

    async fn get_text(&self, url: Url) -> Result<String, ClientError> {
        debug!(%url, "GET");
        let response = self.http.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }

    /// Search keys the server accepts, fetched once per client.
    pub async fn permitted_fields(&self) -> Result<&[String], ClientError> {
        let fields = self
            .permitted_fields
            .get_or_try_init(|| async {
                let body = self.get_text(self.url(FIELDS_ENDPOINT)?).await?;
                let raw: RawFields = serde_json::from_str(&body)?;
                Ok::<_, ClientError>(raw.neuron_fields)
            })
            .await?;
        Ok(fields.as_slice())
    }

    /// Page through search results until the listing runs out or `limit`
    /// neurons have been collected.
    pub async fn search(
        &self,
        query: &BTreeMap<String, String>,
        limit: Option<usize>,
    ) -> Result<Vec<NeuronSummary>, ClientError> {
        if limit == Some(0) {
            return Ok(Vec::new());
        }
        let filters = build_query(query, self.permitted_fields().await?)?;
        let mut neurons = Vec::new();
        let mut page = 0u64;

        loop {
            let body = self.get_text(self.search_url(&filters, page)?).await?;
            let listing = parse_listing(&body)?;
            if listing.neurons.is_empty() {
                break;
            }
            info!(page, count = listing.neurons.len(), "fetched search page");
            neurons.extend(listing.neurons);

            if let Some(limit) = limit {
                if neurons.len() >= limit {
                    neurons.truncate(limit);
                    break;
                }
            }
            page += 1;
            match listing.total_pages {
                Some(total) if page < total => {}
                _ => break,
            }
        }

        Ok(neurons)
    }

    /// SWC text for one neuron, served from the cache when present.
    pub async fn download_swc_text(&self, archive: &str, neuron_name: &str) -> Result<String, ClientError> {
        check_name(archive)?;
        check_name(neuron_name)?;

        let path = self.cache_path(archive, neuron_name);
        if tokio::fs::try_exists(&path).await? {
            debug!(path = %path.display(), "cache hit");
            return Ok(tokio::fs::read_to_string(&path).await?);
        }

        let ext = format!(
            "dableFiles/{}/CNG%20version/{}.CNG.swc",
            archive.to_lowercase(),
            neuron_name
        );
        let url = self.url(&ext)?;
        let body = self.get_text(url.clone()).await?;
        if looks_like_html(&body) {
            return Err(ClientError::HtmlResponse(url.to_string()));
        }

        write_cache(&path, &body).await?;
        info!(archive, neuron_name, path = %path.display(), "downloaded SWC");
        Ok(body)
    }

    pub async fn download_morphology(
        &self,
        archive: &str,
        neuron_name: &str,
        options: &LoadOptions,
    ) -> Result<NeuronMorphology, ClientError> {
        let text = self.download_swc_text(archive, neuron_name).await?;
        Ok(read_swc(&text, options)?)
    }

    /// Download the morphology behind a search result.
    pub async fn download_summary(
        &self,
        summary: &NeuronSummary,
        options: &LoadOptions,
    ) -> Result<NeuronMorphology, ClientError> {
        self.download_morphology(&summary.archive, &summary.neuron_name, options)
            .await
    }
}

/// Write `body` to `path` through a sibling temp file and a rename, so a
/// failed or interrupted write never leaves a partial file at `path`.
async fn write_cache(path: &Path, body: &str) -> std::io::Result<()> {
    static NEXT: AtomicU64 = AtomicU64::new(0);

    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(
        ".{}.{}.part",
        std::process::id(),
        NEXT.fetch_add(1, Ordering::Relaxed)
    ));
    let tmp = path.with_file_name(name);

    let written = match tokio::fs::write(&tmp, body).await {
        Ok(()) => tokio::fs::rename(&tmp, path).await,
        Err(e) => Err(e),
    };
    if written.is_err() {
        let _ = tokio::fs::remove_file(&tmp).await;
    }
    written
}
