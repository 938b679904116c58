//! Testing utilities for the newsroom workspace
//!
//! Fake collaborators with recorded calls, a store that fails on demand,
//! and fixtures for a seeded folder.

#![allow(missing_docs)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use newsroom_artifact::DocPath;
use newsroom_core::{
    AttestationService, ComparisonFunction, ComparisonRequest, ComparisonResult, FetchedImage, FixedClock,
    ImageFetcher, KarmaFeed, NewsroomConfig, NewsroomContext, Rasterizer, RasterOptions, RenderSurface,
    WalletProvider,
};
use newsroom_store::{
    BlobStore, Document, DocumentStore, DocumentStoreExt, FolderRepo, MemoryBlobStore, MemoryDocumentStore,
    StoreError, Subscription,
};
use newsroom_timeline::MilestoneRow;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Block holding the general table in seeded folders
pub const TABLE_BLOCK: &str = "general-table";
/// Serpentine block in seeded folders
pub const SERPENTINE_BLOCK: &str = "timeline";
/// Karma query block in seeded folders
pub const QUERY_BLOCK: &str = "karma-query";
/// Preview returned by [`FixedRasterizer`]
pub const PREVIEW_DATA_URI: &str = "data:image/jpeg;base64,/9j/AAAA";

/// 14 February 2025, 09:00 UTC
#[must_use]
pub fn feb_2025() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 2, 14, 9, 0, 0).unwrap()
}

/// Three completed rows: two in January, one in February 2025
#[must_use]
pub fn scenario_rows() -> Vec<MilestoneRow> {
    vec![
        MilestoneRow::new("jan-2025", "Launched the grants portal", "completed")
            .with_title("karma", "Grants portal launch")
            .with_created_at("2024-11-02T10:00:00Z"),
        MilestoneRow::new("jan-2025", "Published the audit report", "completed")
            .with_title("karma", "Security audit")
            .with_created_at("2024-11-20T10:00:00Z"),
        MilestoneRow::new("feb-2025", "Onboarded ten communities", "completed")
            .with_title("karma", "Community onboarding")
            .with_created_at("2024-12-05T10:00:00Z"),
    ]
}

/// Context over in-memory stores with a fixed clock
#[must_use]
pub fn fixed_context(config: NewsroomConfig, now: DateTime<Utc>) -> (NewsroomContext, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::new(now));
    let ctx = NewsroomContext::in_memory(config).with_clock(clock.clone());
    (ctx, clock)
}

/// Context over the given stores with a fixed clock
#[must_use]
pub fn context_with_stores(
    config: NewsroomConfig,
    documents: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    now: DateTime<Utc>,
) -> (NewsroomContext, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::new(now));
    let ctx = NewsroomContext::new(config, documents, blobs).with_clock(clock.clone());
    (ctx, clock)
}

/// Seed a folder with a general table block and a serpentine block
pub async fn seed_folder(ctx: &NewsroomContext, folder: &FolderRepo, rows: &[MilestoneRow], months_to_show: u32) {
    let documents = ctx.documents();
    documents
        .set_as(folder.block(TABLE_BLOCK).path(), &json!({ "type": "karma-general-table" }))
        .await
        .unwrap();
    documents
        .set_as(&folder.block(TABLE_BLOCK).general_table(), &json!({ "rows": rows }))
        .await
        .unwrap();
    documents
        .set_as(folder.block(SERPENTINE_BLOCK).path(), &json!({ "type": "karma-serpentine" }))
        .await
        .unwrap();
    documents
        .set_as(
            &folder.block(SERPENTINE_BLOCK).serpentine_config(),
            &json!({ "sourceBlockId": TABLE_BLOCK, "monthsToShow": months_to_show }),
        )
        .await
        .unwrap();
}

/// Renderer returning a fixed preview
#[derive(Debug, Default)]
pub struct FixedRasterizer {
    calls: AtomicUsize,
    fail: bool,
}

impl FixedRasterizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Renderer whose every render fails
    #[must_use]
    pub fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Rasterizer for FixedRasterizer {
    async fn render(&self, _surface: &dyn RenderSurface, _options: &RasterOptions) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("render target detached");
        }
        Ok(PREVIEW_DATA_URI.to_string())
    }
}

/// Surface that records every background change
#[derive(Debug, Default)]
pub struct RecordingSurface {
    background: Mutex<Option<String>>,
    history: Mutex<Vec<Option<String>>>,
}

impl RecordingSurface {
    #[must_use]
    pub fn new(background: Option<&str>) -> Self {
        Self {
            background: Mutex::new(background.map(str::to_string)),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Backgrounds set so far, in order
    #[must_use]
    pub fn history(&self) -> Vec<Option<String>> {
        self.history.lock().clone()
    }
}

impl RenderSurface for RecordingSurface {
    fn background(&self) -> Option<String> {
        self.background.lock().clone()
    }

    fn set_background(&self, background: Option<String>) {
        self.history.lock().push(background.clone());
        *self.background.lock() = background;
    }
}

/// Fetcher serving images from a map
#[derive(Debug, Default)]
pub struct StaticImageFetcher {
    images: HashMap<String, FetchedImage>,
    calls: AtomicUsize,
}

impl StaticImageFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `bytes` as PNG at `url`
    #[must_use]
    pub fn with_png(mut self, url: &str, bytes: &[u8]) -> Self {
        self.images.insert(
            url.to_string(),
            FetchedImage {
                bytes: bytes.to_vec(),
                content_type: "image/png".to_string(),
            },
        );
        self
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageFetcher for StaticImageFetcher {
    async fn fetch(&self, url: &str) -> anyhow::Result<FetchedImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.images
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("404 Not Found: {url}"))
    }
}

/// Blob store rejecting every upload
#[derive(Debug, Default)]
pub struct FailingBlobStore;

#[async_trait]
impl BlobStore for FailingBlobStore {
    async fn upload(&self, path: &str, _bytes: Vec<u8>, _content_type: &str) -> Result<String, StoreError> {
        Err(StoreError::Backend(format!("quota exceeded writing {path}")))
    }

    async fn public_url(&self, path: &str) -> Result<String, StoreError> {
        Err(StoreError::NotFound(path.to_string()))
    }
}

/// Blob store that accepts uploads only under some prefixes
#[derive(Debug)]
pub struct SelectiveBlobStore {
    inner: MemoryBlobStore,
    allowed: Vec<String>,
}

impl SelectiveBlobStore {
    #[must_use]
    pub fn allowing(prefixes: &[&str]) -> Self {
        Self {
            inner: MemoryBlobStore::default(),
            allowed: prefixes.iter().map(|p| (*p).to_string()).collect(),
        }
    }

    #[must_use]
    pub fn inner(&self) -> &MemoryBlobStore {
        &self.inner
    }
}

#[async_trait]
impl BlobStore for SelectiveBlobStore {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, StoreError> {
        if !self.allowed.iter().any(|p| path.starts_with(p.as_str())) {
            return Err(StoreError::Backend(format!("permission denied: {path}")));
        }
        self.inner.upload(path, bytes, content_type).await
    }

    async fn public_url(&self, path: &str) -> Result<String, StoreError> {
        self.inner.public_url(path).await
    }
}

/// Document store that fails writes under a prefix
#[derive(Debug)]
pub struct FaultyDocumentStore {
    inner: MemoryDocumentStore,
    failing_prefix: Mutex<Option<DocPath>>,
}

impl FaultyDocumentStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: MemoryDocumentStore::new(),
            failing_prefix: Mutex::new(None),
        }
    }

    /// Fail every write at or below `prefix`
    pub fn fail_writes_under(&self, prefix: DocPath) {
        *self.failing_prefix.lock() = Some(prefix);
    }

    fn check(&self, path: &DocPath) -> Result<(), StoreError> {
        match self.failing_prefix.lock().as_ref() {
            Some(prefix) if prefix.is_prefix_of(path) => Err(StoreError::Backend(format!("write rejected: {path}"))),
            _ => Ok(()),
        }
    }
}

impl Default for FaultyDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for FaultyDocumentStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError> {
        self.inner.get(path).await
    }

    async fn set(&self, path: &DocPath, document: Document) -> Result<(), StoreError> {
        self.check(path)?;
        self.inner.set(path, document).await
    }

    async fn set_merge(&self, path: &DocPath, document: Document) -> Result<(), StoreError> {
        self.check(path)?;
        self.inner.set_merge(path, document).await
    }

    async fn list(&self, collection: &DocPath) -> Result<Vec<(String, Document)>, StoreError> {
        self.inner.list(collection).await
    }

    async fn subscribe(&self, path: &DocPath) -> Result<Subscription, StoreError> {
        self.inner.subscribe(path).await
    }
}

/// Attestation service recording each submission
#[derive(Debug, Default)]
pub struct RecordingAttestationService {
    submissions: Mutex<Vec<(String, Vec<u8>)>>,
}

impl RecordingAttestationService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `(schema_uid, encoded)` per submission
    #[must_use]
    pub fn submissions(&self) -> Vec<(String, Vec<u8>)> {
        self.submissions.lock().clone()
    }
}

#[async_trait]
impl AttestationService for RecordingAttestationService {
    async fn submit(&self, schema_uid: &str, encoded: &[u8]) -> anyhow::Result<String> {
        let mut submissions = self.submissions.lock();
        submissions.push((schema_uid.to_string(), encoded.to_vec()));
        Ok(format!("0xattestation{:04}", submissions.len()))
    }
}

/// Wallet with a fixed address and a switchable chain
#[derive(Debug)]
pub struct StaticWallet {
    address: Option<String>,
    chain_id: Mutex<u64>,
    can_switch: bool,
    switches: AtomicUsize,
}

impl StaticWallet {
    #[must_use]
    pub fn connected(address: &str, chain_id: u64) -> Self {
        Self {
            address: Some(address.to_string()),
            chain_id: Mutex::new(chain_id),
            can_switch: true,
            switches: AtomicUsize::new(0),
        }
    }

    /// No wallet available; connecting fails
    #[must_use]
    pub fn disconnected() -> Self {
        Self {
            address: None,
            chain_id: Mutex::new(0),
            can_switch: false,
            switches: AtomicUsize::new(0),
        }
    }

    /// Refuse chain switch requests
    #[must_use]
    pub fn refusing_switch(mut self) -> Self {
        self.can_switch = false;
        self
    }

    #[must_use]
    pub fn switches(&self) -> usize {
        self.switches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletProvider for StaticWallet {
    async fn connect(&self) -> anyhow::Result<String> {
        self.address
            .clone()
            .ok_or_else(|| anyhow::anyhow!("no injected provider"))
    }

    async fn address(&self) -> Option<String> {
        self.address.clone()
    }

    async fn chain_id(&self) -> anyhow::Result<u64> {
        Ok(*self.chain_id.lock())
    }

    async fn switch_chain(&self, chain_id: u64) -> anyhow::Result<()> {
        self.switches.fetch_add(1, Ordering::SeqCst);
        if !self.can_switch {
            anyhow::bail!("user rejected the request");
        }
        *self.chain_id.lock() = chain_id;
        Ok(())
    }
}

/// Comparison function returning queued results
#[derive(Debug, Default)]
pub struct StaticComparison {
    results: Mutex<Vec<ComparisonResult>>,
    requests: Mutex<Vec<ComparisonRequest>>,
}

impl StaticComparison {
    /// Results are handed out in order; the last one repeats
    #[must_use]
    pub fn returning(results: Vec<ComparisonResult>) -> Self {
        Self {
            results: Mutex::new(results),
            requests: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn requests(&self) -> Vec<ComparisonRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ComparisonFunction for StaticComparison {
    async fn compare(&self, request: &ComparisonRequest) -> anyhow::Result<ComparisonResult> {
        self.requests.lock().push(request.clone());
        let mut results = self.results.lock();
        match results.len() {
            0 => anyhow::bail!("comparison function unavailable"),
            1 => Ok(results[0].clone()),
            _ => Ok(results.remove(0)),
        }
    }
}

/// Feed with canned updates per slug; unknown slugs fail
#[derive(Debug, Default)]
pub struct StaticKarmaFeed {
    updates: HashMap<String, Vec<Value>>,
}

impl StaticKarmaFeed {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_updates(mut self, slug: &str, updates: Vec<Value>) -> Self {
        self.updates.insert(slug.to_string(), updates);
        self
    }
}

#[async_trait]
impl KarmaFeed for StaticKarmaFeed {
    async fn fetch_updates(&self, slug: &str) -> anyhow::Result<Vec<Value>> {
        self.updates
            .get(slug)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("project {slug} not found"))
    }
}
