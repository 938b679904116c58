//! Attestation portal
//!
//! Authorized wallet holders score milestones of an archived snapshot. The
//! milestone index always refers to the archived general table in
//! canonical order. Each submission is ABI-encoded, written on-chain by an
//! external service and recorded under the snapshot's `attestations`
//! collection, where at most one record per
//! `(milestoneIndex, wallet, type)` is active.

use crate::archive::load_manifest;
use crate::config::AttestationType;
use crate::context::NewsroomContext;
use crate::error::{NewsroomError, Result};
use crate::rows::RowService;
use crate::serpentine::SerpentineConfig;
use async_trait::async_trait;
use newsroom_artifact::{normalize_hash_hex, ContentHash};
use newsroom_store::{DocumentStoreExt, SnapshotRepo, COMPARISON_DOC};
use newsroom_timeline::{sort_attestation_rows, MilestoneRow};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Size of one ABI word
const WORD: usize = 32;

/// Accepted score range
pub const SCORE_RANGE: std::ops::RangeInclusive<i64> = 1..=100;

/// Writes attestations on-chain
#[async_trait]
pub trait AttestationService: Send + Sync {
    /// Submit encoded schema data, returning the on-chain UID
    async fn submit(&self, schema_uid: &str, encoded: &[u8]) -> anyhow::Result<String>;
}

/// The attester's wallet
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Prompt for a connection, returning the address
    async fn connect(&self) -> anyhow::Result<String>;

    /// Connected address, if any
    async fn address(&self) -> Option<String>;

    async fn chain_id(&self) -> anyhow::Result<u64>;

    async fn switch_chain(&self, chain_id: u64) -> anyhow::Result<()>;
}

/// Schema fields in declaration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationFields<'a> {
    pub score: u8,
    pub comment: &'a str,
    pub milestone_summary: &'a str,
    pub project_id: &'a str,
    pub folder_id: &'a str,
    pub snapshot_id: &'a str,
    pub milestone_index: u16,
    pub discussion_id: &'a str,
    pub content_hash: [u8; 32],
    pub content_url: &'a str,
}

enum Token<'a> {
    Uint(u64),
    Bytes32([u8; 32]),
    Str(&'a str),
}

fn uint_word(value: u64) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 8..].copy_from_slice(&value.to_be_bytes());
    word
}

/// ABI-encode the schema fields
///
/// Head of ten words, then each string as length word plus data padded to
/// a word boundary. String offsets are relative to the start.
#[must_use]
pub fn encode_attestation(fields: &AttestationFields<'_>) -> Vec<u8> {
    let tokens = [
        Token::Uint(u64::from(fields.score)),
        Token::Str(fields.comment),
        Token::Str(fields.milestone_summary),
        Token::Str(fields.project_id),
        Token::Str(fields.folder_id),
        Token::Str(fields.snapshot_id),
        Token::Uint(u64::from(fields.milestone_index)),
        Token::Str(fields.discussion_id),
        Token::Bytes32(fields.content_hash),
        Token::Str(fields.content_url),
    ];
    let head_len = tokens.len() * WORD;
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();
    for token in &tokens {
        match token {
            Token::Uint(value) => head.extend_from_slice(&uint_word(*value)),
            Token::Bytes32(bytes) => head.extend_from_slice(bytes),
            Token::Str(text) => {
                head.extend_from_slice(&uint_word((head_len + tail.len()) as u64));
                tail.extend_from_slice(&uint_word(text.len() as u64));
                tail.extend_from_slice(text.as_bytes());
                let padding = (WORD - text.len() % WORD) % WORD;
                tail.resize(tail.len() + padding, 0);
            }
        }
    }
    head.extend(tail);
    head
}

/// A stored attestation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationRecord {
    pub id: String,
    pub attestation_type: AttestationType,
    /// Index into the archived general table
    pub milestone_index: usize,
    pub milestone_summary: String,
    pub score: u8,
    pub comment: String,
    #[serde(default)]
    pub discussion_id: String,
    /// Lowercase
    pub attester_wallet: String,
    #[serde(rename = "schemaUID")]
    pub schema_uid: String,
    #[serde(rename = "onchainUID")]
    pub onchain_uid: String,
    pub is_active: bool,
    pub replaces: Option<String>,
    pub replaced_by: Option<String>,
    pub created_at: String,
}

impl AttestationRecord {
    fn same_slot(&self, milestone_index: usize, wallet: &str, kind: AttestationType) -> bool {
        self.milestone_index == milestone_index
            && self.attestation_type == kind
            && self.attester_wallet.eq_ignore_ascii_case(wallet)
    }
}

/// What the attester submits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationRequest {
    pub attestation_type: AttestationType,
    pub milestone_index: usize,
    pub score: i64,
    pub comment: String,
    pub discussion_id: String,
}

/// Scores archived milestones
pub struct AttestationPortal {
    ctx: NewsroomContext,
    service: Arc<dyn AttestationService>,
    wallet: Arc<dyn WalletProvider>,
    /// Serializes the deactivate-then-record step
    ledger: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for AttestationPortal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttestationPortal").finish_non_exhaustive()
    }
}

impl AttestationPortal {
    /// Create new portal
    #[must_use]
    pub fn new(ctx: NewsroomContext, service: Arc<dyn AttestationService>, wallet: Arc<dyn WalletProvider>) -> Self {
        Self {
            ctx,
            service,
            wallet,
            ledger: tokio::sync::Mutex::new(()),
        }
    }

    /// Try to connect the wallet on page load; failures are logged only
    pub async fn connect_eagerly(&self) -> Option<String> {
        match self.wallet.connect().await {
            Ok(address) => {
                tracing::info!("Wallet connected: {}", address);
                Some(address)
            }
            Err(e) => {
                tracing::warn!("Eager wallet connect failed: {:#}", e);
                None
            }
        }
    }

    /// Archived general table rows in canonical order
    ///
    /// # Errors
    /// Returns [`NewsroomError::NotFound`] if the snapshot or its table is
    /// missing.
    pub async fn load_rows(&self, snapshot: &SnapshotRepo) -> Result<Vec<MilestoneRow>> {
        let manifest = load_manifest(&self.ctx, snapshot).await?;
        let serpentine_id = manifest
            .source_block_id
            .ok_or_else(|| NewsroomError::NotFound(format!("source block of snapshot {}", snapshot.id())))?;
        let serpentine_block = snapshot.block(serpentine_id);
        let config: Option<SerpentineConfig> = self
            .ctx
            .documents()
            .get_as(&serpentine_block.serpentine_config())
            .await?;
        let table_block = match config {
            Some(config) if !config.source_block_id.is_empty() => serpentine_block.sibling(config.source_block_id),
            _ => serpentine_block,
        };
        let rows = RowService::new(self.ctx.clone()).require_rows(&table_block).await?;
        Ok(sort_attestation_rows(&rows))
    }

    async fn ensure_chain(&self) -> Result<()> {
        let target = self.ctx.config().attestation.chain_id;
        let wallet_error = |e: anyhow::Error| NewsroomError::Wallet(NewsroomError::external_message(&e));
        let current = self.wallet.chain_id().await.map_err(wallet_error)?;
        if current == target {
            return Ok(());
        }
        tracing::info!("Switching wallet from chain {:#x} to {:#x}", current, target);
        self.wallet.switch_chain(target).await.map_err(wallet_error)?;
        let switched = self.wallet.chain_id().await.map_err(wallet_error)?;
        if switched != target {
            return Err(NewsroomError::Wallet(format!(
                "wallet is on chain {switched:#x}, expected {target:#x}"
            )));
        }
        Ok(())
    }

    /// Validate, encode, submit and record an attestation
    ///
    /// # Errors
    /// Returns [`NewsroomError::Validation`] for a bad score or milestone
    /// index, [`NewsroomError::Wallet`] without a wallet or on the wrong
    /// chain, [`NewsroomError::Unauthorized`] for wallets off the
    /// allow-list, [`NewsroomError::Hash`] for a malformed ICF hash and
    /// [`NewsroomError::Attestation`] if submission fails.
    pub async fn submit(&self, snapshot: &SnapshotRepo, request: AttestationRequest) -> Result<AttestationRecord> {
        if !SCORE_RANGE.contains(&request.score) {
            return Err(NewsroomError::validation("score", "score must be between 1 and 100"));
        }
        let score = u8::try_from(request.score).map_err(|_| NewsroomError::validation("score", "out of range"))?;

        let wallet = self
            .wallet
            .address()
            .await
            .ok_or_else(|| NewsroomError::Wallet("no wallet connected".to_string()))?
            .to_lowercase();
        if !self.ctx.config().attestation.is_authorized(&wallet) {
            return Err(NewsroomError::Unauthorized(format!("{wallet} may not attest")));
        }
        self.ensure_chain().await?;

        let manifest = load_manifest(&self.ctx, snapshot).await?;
        let content_hash: ContentHash = normalize_hash_hex(&manifest.content_hash)?.parse()?;

        let rows = self.load_rows(snapshot).await?;
        let row = rows.get(request.milestone_index).ok_or_else(|| {
            NewsroomError::validation(
                "milestoneIndex",
                format!("{} is outside the {} archived rows", request.milestone_index, rows.len()),
            )
        })?;
        let milestone_index = u16::try_from(request.milestone_index)
            .map_err(|_| NewsroomError::validation("milestoneIndex", "exceeds uint16"))?;

        let schema_uid = self.ctx.config().attestation.schema_uid(request.attestation_type)?.to_string();
        let encoded = encode_attestation(&AttestationFields {
            score,
            comment: &request.comment,
            milestone_summary: &row.summary,
            project_id: &manifest.project_id,
            folder_id: &manifest.folder_id,
            snapshot_id: &manifest.snapshot_id,
            milestone_index,
            discussion_id: &request.discussion_id,
            content_hash: *content_hash.as_bytes(),
            content_url: &manifest.icf_url,
        });

        let onchain_uid = self
            .service
            .submit(&schema_uid, &encoded)
            .await
            .map_err(|e| NewsroomError::Attestation(NewsroomError::external_message(&e)))?;
        tracing::info!(
            "Attested milestone {} of {} as {:?}: {}",
            request.milestone_index,
            snapshot.id(),
            request.attestation_type,
            onchain_uid
        );

        let record = AttestationRecord {
            id: ulid::Ulid::from_datetime(self.ctx.now().into()).to_string(),
            attestation_type: request.attestation_type,
            milestone_index: request.milestone_index,
            milestone_summary: row.summary.clone(),
            score,
            comment: request.comment,
            discussion_id: request.discussion_id,
            attester_wallet: wallet,
            schema_uid,
            onchain_uid,
            is_active: true,
            replaces: None,
            replaced_by: None,
            created_at: self.ctx.now().to_rfc3339(),
        };
        self.record(snapshot, record).await
    }

    /// Store a record, deactivating the one it replaces
    async fn record(&self, snapshot: &SnapshotRepo, mut record: AttestationRecord) -> Result<AttestationRecord> {
        let _ledger = self.ledger.lock().await;
        let previous = self
            .attestations(snapshot)
            .await?
            .into_iter()
            .find(|r| r.is_active && r.same_slot(record.milestone_index, &record.attester_wallet, record.attestation_type));

        record.replaces = previous.as_ref().map(|p| p.id.clone());
        let documents = self.ctx.documents();
        documents.set_as(&snapshot.attestation(record.id.clone()), &record).await?;
        if let Some(previous) = previous {
            documents
                .merge_as(
                    &snapshot.attestation(previous.id.clone()),
                    &json!({ "isActive": false, "replacedBy": record.id }),
                )
                .await?;
            tracing::debug!("Attestation {} replaced by {}", previous.id, record.id);
        }
        Ok(record)
    }

    /// Every attestation record of a snapshot, oldest first
    ///
    /// # Errors
    /// Returns an error if the store fails.
    pub async fn attestations(&self, snapshot: &SnapshotRepo) -> Result<Vec<AttestationRecord>> {
        let collection = snapshot.attestations();
        let mut records = Vec::new();
        for (id, document) in self.ctx.documents().list(&collection).await? {
            if id == COMPARISON_DOC {
                continue;
            }
            match newsroom_store::from_document::<AttestationRecord>(&collection.child(id.clone()), document) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!("Skipping malformed attestation {}: {}", id, e),
            }
        }
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }

    /// The active record for a milestone, wallet and type
    ///
    /// # Errors
    /// Returns an error if the store fails.
    pub async fn active_attestation(
        &self,
        snapshot: &SnapshotRepo,
        milestone_index: usize,
        wallet: &str,
        kind: AttestationType,
    ) -> Result<Option<AttestationRecord>> {
        Ok(self
            .attestations(snapshot)
            .await?
            .into_iter()
            .find(|r| r.is_active && r.same_slot(milestone_index, wallet, kind)))
    }
}
