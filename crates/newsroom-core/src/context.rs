//! Process-wide context passed to every flow
//!
//! Stores are initialised once at startup and shared; no flow creates its
//! own client.

use crate::config::NewsroomConfig;
use chrono::{DateTime, NaiveDate, Utc};
use newsroom_store::{BlobStore, DocumentStore, MemoryBlobStore, MemoryDocumentStore};
use parking_lot::Mutex;
use std::sync::Arc;

/// Source of the current time
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current instant
    fn now(&self) -> DateTime<Utc>;

    /// Current calendar date (UTC)
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    /// Create clock stopped at `now`
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    /// Move the clock forward
    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Shared configuration, stores and clock
#[derive(Clone)]
pub struct NewsroomContext {
    config: Arc<NewsroomConfig>,
    documents: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for NewsroomContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewsroomContext")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl NewsroomContext {
    /// Create context from initialised stores
    #[must_use]
    pub fn new(config: NewsroomConfig, documents: Arc<dyn DocumentStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            config: Arc::new(config),
            documents,
            blobs,
            clock: Arc::new(SystemClock),
        }
    }

    /// Context backed by in-memory stores
    #[must_use]
    pub fn in_memory(config: NewsroomConfig) -> Self {
        Self::new(
            config,
            Arc::new(MemoryDocumentStore::new()),
            Arc::new(MemoryBlobStore::default()),
        )
    }

    /// With a different clock
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &NewsroomConfig {
        &self.config
    }

    /// Document store
    #[inline]
    #[must_use]
    pub fn documents(&self) -> &dyn DocumentStore {
        self.documents.as_ref()
    }

    /// Blob store
    #[inline]
    #[must_use]
    pub fn blobs(&self) -> &dyn BlobStore {
        self.blobs.as_ref()
    }

    /// Current instant
    #[inline]
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Current date
    #[inline]
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }
}
