//! Best-effort title matching between serpentine nodes and table rows

use crate::milestone::MilestoneRow;

/// Minimum share of the target title length a containing candidate must cover
pub const CONTAINMENT_THRESHOLD: f64 = 0.8;

/// Lowercase, trim and collapse internal whitespace
#[must_use]
pub fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Index of the candidate matching `target`
///
/// An exact normalized match wins. Otherwise the first candidate where one
/// title contains the other and the candidate is at least
/// [`CONTAINMENT_THRESHOLD`] of the target's length (in characters).
/// Empty titles never match.
#[must_use]
pub fn match_title<'a, I>(target: &str, candidates: I) -> Option<usize>
where
    I: IntoIterator<Item = &'a str>,
{
    let target = normalize_title(target);
    if target.is_empty() {
        return None;
    }
    let normalized: Vec<String> = candidates.into_iter().map(normalize_title).collect();

    if let Some(index) = normalized.iter().position(|c| *c == target) {
        return Some(index);
    }

    let target_len = target.chars().count() as f64;
    normalized.iter().position(|candidate| {
        !candidate.is_empty()
            && (candidate.contains(target.as_str()) || target.contains(candidate.as_str()))
            && candidate.chars().count() as f64 >= CONTAINMENT_THRESHOLD * target_len
    })
}

/// Row in `rows` whose title matches `target`
#[must_use]
pub fn find_row_by_title<'r>(target: &str, rows: &'r [MilestoneRow]) -> Option<&'r MilestoneRow> {
    match_title(target, rows.iter().map(|r| r.title.as_str())).map(|i| &rows[i])
}
