//! Reconciliation of regenerated feed rows with edited rows
//!
//! The general table is rebuilt from the external feed on every refresh.
//! Edits made in the table are reattached to the regenerated rows by their
//! `(slug, title, createdAt)` identity.

use crate::milestone::{MilestoneRow, RowIdentity};
use std::collections::{HashMap, HashSet};

/// Copy every non-empty manually editable field of `edited` onto `fresh`
///
/// An empty edited value means "not edited": a field cleared in the table
/// takes the feed's value again on the next refresh.
fn overlay(fresh: &mut MilestoneRow, edited: &MilestoneRow) {
    if !edited.official_date.trim().is_empty() {
        fresh.official_date.clone_from(&edited.official_date);
    }
    if !edited.summary.trim().is_empty() {
        fresh.summary.clone_from(&edited.summary);
    }
    if !edited.status.trim().is_empty() {
        fresh.status.clone_from(&edited.status);
    }
    if !edited.proofs.is_empty() {
        fresh.proofs.clone_from(&edited.proofs);
    }
    if edited.notes.as_deref().is_some_and(|n| !n.trim().is_empty()) {
        fresh.notes.clone_from(&edited.notes);
    }
    if edited.images.as_ref().is_some_and(|i| !i.is_empty()) {
        fresh.images.clone_from(&edited.images);
    }
}

/// Merge freshly regenerated rows with previously edited rows
///
/// - Fresh rows keep feed order; an edited row with the same identity
///   overlays its non-empty editable fields.
/// - Rows flagged `notInKarma` in the edited set are dropped, as are
///   fresh rows sharing their identity.
/// - Manual rows that the feed does not produce are appended in their
///   edited order.
///
/// Pure: no storage access.
#[must_use]
pub fn reconcile(fresh: &[MilestoneRow], edited: &[MilestoneRow]) -> Vec<MilestoneRow> {
    let removed: HashSet<RowIdentity> = edited
        .iter()
        .filter(|r| r.not_in_karma)
        .map(MilestoneRow::identity)
        .collect();
    let edits: HashMap<RowIdentity, &MilestoneRow> = edited
        .iter()
        .filter(|r| !r.not_in_karma)
        .map(|r| (r.identity(), r))
        .collect();

    let mut seen = HashSet::new();
    let mut merged = Vec::with_capacity(fresh.len());
    for row in fresh {
        let identity = row.identity();
        if removed.contains(&identity) || row.not_in_karma {
            continue;
        }
        let mut row = row.clone();
        if let Some(edit) = edits.get(&identity) {
            overlay(&mut row, edit);
        }
        seen.insert(identity);
        merged.push(row);
    }

    let kept_manual = edited
        .iter()
        .filter(|r| r.manual && !r.not_in_karma && !seen.contains(&r.identity()))
        .cloned();
    merged.extend(kept_manual);

    tracing::debug!(
        "Reconciled {} fresh rows with {} edited rows into {}",
        fresh.len(),
        edited.len(),
        merged.len()
    );
    merged
}

/// Remove the row with `identity`, returning whether one was removed
pub fn remove_not_in_karma(rows: &mut Vec<MilestoneRow>, identity: &RowIdentity) -> bool {
    let before = rows.len();
    rows.retain(|r| &r.identity() != identity);
    before != rows.len()
}
