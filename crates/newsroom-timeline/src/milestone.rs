//! Milestone rows
//!
//! The canonical row shape of the general table. Rows are regenerated from
//! the external feed on every refresh, so identity is the
//! `(slug, title, createdAt)` triple rather than a synthetic id.

use crate::error::TimelineError;
use newsroom_artifact::ContentHash;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Maximum number of proof links per row
pub const MAX_PROOFS: usize = 3;

/// Status substrings that make a row eligible for the timeline
pub const QUALIFYING_STATUSES: [&str; 2] = ["completed", "manually approved"];

/// A link backing a milestone claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofLink {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl ProofLink {
    /// Proof with no label
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            label: None,
        }
    }
}

/// Up to three image URLs attached to a milestone
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneImages {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image3: Option<String>,
}

impl MilestoneImages {
    /// Non-empty image URLs in display order with their slot name
    #[must_use]
    pub fn slots(&self) -> Vec<(&'static str, &str)> {
        [
            ("main", self.main.as_deref()),
            ("image2", self.image2.as_deref()),
            ("image3", self.image3.as_deref()),
        ]
        .into_iter()
        .filter_map(|(slot, url)| url.filter(|u| !u.trim().is_empty()).map(|u| (slot, u)))
        .collect()
    }

    /// True when no slot holds a URL
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots().is_empty()
    }
}

/// Identity triple used to match regenerated rows with edited ones
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowIdentity {
    pub slug: String,
    pub title: String,
    pub created_at: Option<String>,
}

/// One row of the general table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MilestoneRow {
    pub official_date: String,
    pub summary: String,
    pub status: String,
    pub slug: String,
    pub title: String,
    pub proofs: Vec<ProofLink>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<MilestoneImages>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    /// Added through "Add Row" rather than ingested from the feed
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub manual: bool,
    /// Marked for removal through the "not in karma" path
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub not_in_karma: bool,
    /// Columns this crate does not model, kept so copies are lossless
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl MilestoneRow {
    /// Row with the fields the timeline filter looks at
    #[must_use]
    pub fn new(
        official_date: impl Into<String>,
        summary: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        Self {
            official_date: official_date.into(),
            summary: summary.into(),
            status: status.into(),
            ..Self::default()
        }
    }

    /// Builder: set slug and title
    #[must_use]
    pub fn with_title(mut self, slug: impl Into<String>, title: impl Into<String>) -> Self {
        self.slug = slug.into();
        self.title = title.into();
        self
    }

    /// Builder: set creation timestamp
    #[must_use]
    pub fn with_created_at(mut self, created_at: impl Into<String>) -> Self {
        self.created_at = Some(created_at.into());
        self
    }

    /// Identity triple
    #[must_use]
    pub fn identity(&self) -> RowIdentity {
        RowIdentity {
            slug: self.slug.clone(),
            title: self.title.clone(),
            created_at: self.created_at.clone(),
        }
    }

    /// True if any comma-separated status token is qualifying
    ///
    /// Matching is a case-insensitive substring test against the whole
    /// status string.
    #[must_use]
    pub fn has_qualifying_status(&self) -> bool {
        let status = self.status.to_lowercase();
        QUALIFYING_STATUSES.iter().any(|s| status.contains(s))
    }

    /// Proof URLs, capped at [`MAX_PROOFS`]
    #[must_use]
    pub fn proof_urls(&self) -> Vec<&str> {
        self.proofs.iter().take(MAX_PROOFS).map(|p| p.url.as_str()).collect()
    }

    /// Stable fingerprint of date and summary
    #[must_use]
    pub fn content_key(&self) -> String {
        let material = format!("{}\u{1f}{}", self.official_date.trim(), self.summary.trim());
        ContentHash::compute(material.as_bytes()).short()
    }

    /// Check the fields required before a row may be saved
    ///
    /// # Errors
    /// Returns [`TimelineError::MissingField`] naming the first empty
    /// required column, or [`TimelineError::TooManyProofs`].
    pub fn validate_for_save(&self) -> Result<(), TimelineError> {
        if self.official_date.trim().is_empty() {
            return Err(TimelineError::MissingField { field: "Single Date" });
        }
        if self.summary.trim().is_empty() {
            return Err(TimelineError::MissingField { field: "Summary" });
        }
        if self.proofs.len() > MAX_PROOFS {
            return Err(TimelineError::TooManyProofs {
                count: self.proofs.len(),
                max: MAX_PROOFS,
            });
        }
        Ok(())
    }
}
