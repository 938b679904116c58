//! Image inlining for self-contained ICF documents
//!
//! Remote images are fetched one at a time and embedded as base64 data
//! URIs. Inlined results are cached by URL.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use moka::future::Cache;
use newsroom_artifact::ContentHash;
use newsroom_timeline::MilestoneImages;
use std::sync::Arc;

/// Content type assumed when a response carries none
const FALLBACK_CONTENT_TYPE: &str = "image/jpeg";

/// Raw image bytes from a fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Downloads images
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> anyhow::Result<FetchedImage>;
}

/// [`ImageFetcher`] over HTTP
#[derive(Debug, Clone, Default)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    /// Create fetcher with a default client
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create fetcher with a configured client
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// Guess a content type from the URL's extension
fn content_type_from_url(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_lowercase();
    match path.rsplit('.').next() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => FALLBACK_CONTENT_TYPE,
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> anyhow::Result<FetchedImage> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map_or_else(|| content_type_from_url(url).to_string(), str::to_string);
        let bytes = response.bytes().await?.to_vec();
        Ok(FetchedImage { bytes, content_type })
    }
}

/// An image ready to embed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlinedImage {
    pub data_uri: String,
    /// SHA-256 of the data URI
    pub digest: ContentHash,
}

impl InlinedImage {
    fn from_data_uri(data_uri: String) -> Self {
        let digest = ContentHash::compute(data_uri.as_bytes());
        Self { data_uri, digest }
    }
}

/// An inlined image in its milestone slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotImage {
    pub slot: &'static str,
    pub source_url: String,
    pub image: InlinedImage,
}

/// Encode bytes as a data URI
#[must_use]
pub fn to_data_uri(content_type: &str, bytes: &[u8]) -> String {
    format!("data:{content_type};base64,{}", STANDARD.encode(bytes))
}

/// Converts image URLs into embedded data URIs
#[derive(Clone)]
pub struct ImageInliner {
    fetcher: Arc<dyn ImageFetcher>,
    cache: Cache<String, InlinedImage>,
}

impl std::fmt::Debug for ImageInliner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageInliner")
            .field("cached", &self.cache.entry_count())
            .finish_non_exhaustive()
    }
}

impl ImageInliner {
    /// Create inliner caching up to `capacity` images
    #[must_use]
    pub fn new(fetcher: Arc<dyn ImageFetcher>, capacity: u64) -> Self {
        Self {
            fetcher,
            cache: Cache::new(capacity),
        }
    }

    /// Inline one URL; `data:` URLs pass through
    ///
    /// Returns `None` if the fetch fails; the failure is logged.
    pub async fn inline(&self, url: &str) -> Option<InlinedImage> {
        let url = url.trim();
        if url.is_empty() {
            return None;
        }
        if url.starts_with("data:") {
            return Some(InlinedImage::from_data_uri(url.to_string()));
        }
        if let Some(cached) = self.cache.get(url).await {
            return Some(cached);
        }
        match self.fetcher.fetch(url).await {
            Ok(fetched) => {
                let image = InlinedImage::from_data_uri(to_data_uri(&fetched.content_type, &fetched.bytes));
                self.cache.insert(url.to_string(), image.clone()).await;
                Some(image)
            }
            Err(e) => {
                tracing::warn!("Failed to inline image {}: {:#}", url, e);
                None
            }
        }
    }

    /// Inline every image slot, sequentially and in slot order
    pub async fn inline_all(&self, images: &MilestoneImages) -> Vec<SlotImage> {
        let mut inlined = Vec::new();
        for (slot, url) in images.slots() {
            if let Some(image) = self.inline(url).await {
                inlined.push(SlotImage {
                    slot,
                    source_url: url.to_string(),
                    image,
                });
            }
        }
        inlined
    }
}
