//! Karma feed queries
//!
//! A query block pulls project updates per slug and stores each run as a
//! timestamped document in its `query-results` collection. Per-slug
//! failures are recorded in the result, never propagated.

use crate::context::NewsroomContext;
use crate::error::Result;
use async_trait::async_trait;
use chrono::DateTime;
use newsroom_store::{BlockRepo, DocumentStoreExt, FolderRepo};
use newsroom_timeline::{parse_loose_date, MilestoneRow, MonthToken, ProofLink, MAX_PROOFS};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Block `type` of karma query blocks
pub const KARMA_QUERY_BLOCK_TYPE: &str = "karma-query";

/// Source of project updates
#[async_trait]
pub trait KarmaFeed: Send + Sync {
    /// Raw updates for one project slug
    async fn fetch_updates(&self, slug: &str) -> anyhow::Result<Vec<Value>>;
}

/// One stored query run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KarmaQueryResult {
    /// RFC 3339 time of the run
    pub timestamp: String,
    pub slugs: Vec<String>,
    /// Updates per slug; failed slugs map to `[]`
    pub results: BTreeMap<String, Vec<Value>>,
    /// Error message per failed slug
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, String>,
    /// True only if every slug succeeded
    pub success: bool,
}

impl KarmaQueryResult {
    pub(crate) fn sort_key(&self) -> (Option<i64>, &str) {
        let millis = DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|t| t.timestamp_millis());
        (millis, self.timestamp.as_str())
    }
}

/// Query every slug in order and store the run under `block`
///
/// # Errors
/// Returns an error only if persisting the result fails.
pub async fn run_karma_query(
    ctx: &NewsroomContext,
    feed: &dyn KarmaFeed,
    block: &BlockRepo,
    slugs: &[String],
) -> Result<KarmaQueryResult> {
    let mut results = BTreeMap::new();
    let mut errors = BTreeMap::new();
    for slug in slugs {
        match feed.fetch_updates(slug).await {
            Ok(updates) => {
                tracing::debug!("Fetched {} updates for {}", updates.len(), slug);
                results.insert(slug.clone(), updates);
            }
            Err(e) => {
                tracing::warn!("Karma query failed for {}: {:#}", slug, e);
                results.insert(slug.clone(), Vec::new());
                errors.insert(slug.clone(), format!("{e:#}"));
            }
        }
    }

    let now = ctx.now();
    let result = KarmaQueryResult {
        timestamp: now.to_rfc3339(),
        slugs: slugs.to_vec(),
        success: errors.is_empty(),
        results,
        errors,
    };
    let id = ulid::Ulid::from_datetime(now.into()).to_string();
    ctx.documents().set_as(&block.query_result(id), &result).await?;
    tracing::info!(
        "Karma query on {} finished: {} slugs, success={}",
        block.path(),
        slugs.len(),
        result.success
    );
    Ok(result)
}

/// Newest stored run of a query block
///
/// # Errors
/// Returns an error if the store fails.
pub async fn latest_query_result(ctx: &NewsroomContext, block: &BlockRepo) -> Result<Option<KarmaQueryResult>> {
    let collection = block.query_results();
    let mut newest: Option<KarmaQueryResult> = None;
    for (id, document) in ctx.documents().list(&collection).await? {
        let result: KarmaQueryResult = match newsroom_store::from_document(&collection.child(id.clone()), document) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("Skipping malformed query result {}: {}", id, e);
                continue;
            }
        };
        if newest.as_ref().map_or(true, |n| result.sort_key() > n.sort_key()) {
            newest = Some(result);
        }
    }
    Ok(newest)
}

/// Newest run across all karma query blocks of a folder
///
/// Blocks are recognised by `type == "karma-query"`.
///
/// # Errors
/// Returns an error if the store fails.
pub async fn latest_folder_query_result(
    ctx: &NewsroomContext,
    folder: &FolderRepo,
) -> Result<Option<KarmaQueryResult>> {
    let mut newest: Option<KarmaQueryResult> = None;
    for (block_id, document) in ctx.documents().list(&folder.blocks()).await? {
        if document.get("type").and_then(Value::as_str) != Some(KARMA_QUERY_BLOCK_TYPE) {
            continue;
        }
        if let Some(result) = latest_query_result(ctx, &folder.block(block_id)).await? {
            if newest.as_ref().map_or(true, |n| result.sort_key() > n.sort_key()) {
                newest = Some(result);
            }
        }
    }
    Ok(newest)
}

fn str_field<'a>(update: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| update.get(*k).and_then(Value::as_str))
        .filter(|s| !s.trim().is_empty())
}

/// Convert feed updates of one slug into general table rows
///
/// The official date is the month of completion (or end date) as a
/// `mon-yyyy` token. Updates without a title are skipped.
#[must_use]
pub fn rows_from_updates(slug: &str, updates: &[Value]) -> Vec<MilestoneRow> {
    updates
        .iter()
        .filter_map(|update| {
            let title = str_field(update, &["title", "name"])?;
            let completed_at = str_field(update, &["completedAt"]).map(str::to_string);
            let end_date = str_field(update, &["endDate", "endsAt"]).map(str::to_string);
            let official_date = completed_at
                .as_deref()
                .or(end_date.as_deref())
                .and_then(parse_loose_date)
                .map(|d| MonthToken::from_date(d.date()).token())
                .unwrap_or_default();
            let status = str_field(update, &["status"])
                .map(str::to_string)
                .unwrap_or_else(|| (if completed_at.is_some() { "completed" } else { "pending" }).to_string());
            let proofs: Vec<ProofLink> = update
                .get("proofs")
                .and_then(Value::as_array)
                .map(|links| {
                    links
                        .iter()
                        .filter_map(|l| l.as_str().or_else(|| l.get("url").and_then(Value::as_str)))
                        .take(MAX_PROOFS)
                        .map(ProofLink::new)
                        .collect()
                })
                .unwrap_or_default();

            Some(MilestoneRow {
                official_date,
                summary: str_field(update, &["summary", "description", "text"])
                    .unwrap_or_default()
                    .to_string(),
                status,
                slug: slug.to_string(),
                title: title.to_string(),
                proofs,
                created_at: str_field(update, &["createdAt"]).map(str::to_string),
                end_date,
                due_date: str_field(update, &["dueDate"]).map(str::to_string),
                start_date: str_field(update, &["startDate"]).map(str::to_string),
                completed_at,
                updated_at: str_field(update, &["updatedAt"]).map(str::to_string),
                ..MilestoneRow::default()
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NewsroomConfig;
    use crate::context::FixedClock;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::sync::Arc;

    struct Feed;

    #[async_trait]
    impl KarmaFeed for Feed {
        async fn fetch_updates(&self, slug: &str) -> anyhow::Result<Vec<Value>> {
            if slug == "down" {
                anyhow::bail!("gateway timeout");
            }
            Ok(vec![json!({"title": format!("{slug} update")})])
        }
    }

    fn ctx() -> (NewsroomContext, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap()));
        let ctx = NewsroomContext::in_memory(NewsroomConfig::new()).with_clock(clock.clone());
        (ctx, clock)
    }

    #[tokio::test]
    async fn failing_slug_recorded_not_propagated() {
        let (ctx, _) = ctx();
        let block = FolderRepo::new("p", "f").block("q");
        let slugs = vec!["a".to_string(), "down".to_string(), "b".to_string()];
        let result = run_karma_query(&ctx, &Feed, &block, &slugs).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.results["down"], Vec::<Value>::new());
        assert!(result.errors["down"].contains("gateway timeout"));
        assert_eq!(result.results["b"].len(), 1);
    }

    #[tokio::test]
    async fn all_success_is_success() {
        let (ctx, _) = ctx();
        let block = FolderRepo::new("p", "f").block("q");
        let result = run_karma_query(&ctx, &Feed, &block, &["a".to_string()]).await.unwrap();
        assert!(result.success);
        assert!(result.errors.is_empty());
    }

    #[tokio::test]
    async fn latest_picks_newest_run() {
        let (ctx, clock) = ctx();
        let folder = FolderRepo::new("p", "f");
        ctx.documents()
            .set_as(folder.block("q").path(), &json!({"type": "karma-query"}))
            .await
            .unwrap();
        run_karma_query(&ctx, &Feed, &folder.block("q"), &["old".to_string()])
            .await
            .unwrap();
        clock.advance(chrono::Duration::hours(1));
        run_karma_query(&ctx, &Feed, &folder.block("q"), &["new".to_string()])
            .await
            .unwrap();

        let latest = latest_folder_query_result(&ctx, &folder).await.unwrap().unwrap();
        assert_eq!(latest.slugs, vec!["new"]);
    }

    #[test]
    fn updates_become_rows() {
        let updates = vec![
            json!({
                "title": "Ship v1",
                "description": "Released",
                "completedAt": "2025-01-20T10:00:00Z",
                "createdAt": "2024-12-01T00:00:00Z",
                "proofs": ["https://a", {"url": "https://b"}, "https://c", "https://d"],
            }),
            json!({"description": "no title"}),
        ];
        let rows = rows_from_updates("proj", &updates);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].official_date, "jan-2025");
        assert_eq!(rows[0].status, "completed");
        assert_eq!(rows[0].summary, "Released");
        assert_eq!(rows[0].proofs.len(), 3);
        assert_eq!(rows[0].proofs[1].url, "https://b");
    }
}
