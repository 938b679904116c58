//! Canonical attestation sort
//!
//! Used when building snapshots and when the attestation portal lists
//! archived rows, so milestone indices mean the same thing in both places.

use crate::milestone::MilestoneRow;
use crate::month::parse_loose_date;
use chrono::NaiveDateTime;
use std::cmp::Ordering;

/// Fallback date for rows without a dated summary
///
/// Priority: `officialDate`, `endDate`, `dueDate`, `startDate`,
/// `createdAt`, `completedAt`, `updatedAt`; the first parseable one wins.
#[must_use]
pub fn fallback_date(row: &MilestoneRow) -> Option<NaiveDateTime> {
    std::iter::once(Some(row.official_date.as_str()))
        .chain([
            row.end_date.as_deref(),
            row.due_date.as_deref(),
            row.start_date.as_deref(),
            row.created_at.as_deref(),
            row.completed_at.as_deref(),
            row.updated_at.as_deref(),
        ])
        .flatten()
        .find_map(parse_loose_date)
}

fn is_dated_summary(row: &MilestoneRow) -> bool {
    !row.summary.trim().is_empty() && !row.official_date.trim().is_empty()
}

/// Parseable dates first; `descending` flips only the date comparison
fn compare_dates(a: Option<NaiveDateTime>, b: Option<NaiveDateTime>, descending: bool) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) if descending => b.cmp(&a),
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Sort rows for attestation display
///
/// Rows with both a summary and an official date come first, ascending by
/// official date. All other rows follow, newest first by fallback date.
/// Unparseable dates sort last within their group. The sort is stable.
#[must_use]
pub fn sort_attestation_rows(rows: &[MilestoneRow]) -> Vec<MilestoneRow> {
    let (mut dated, mut rest): (Vec<MilestoneRow>, Vec<MilestoneRow>) =
        rows.iter().cloned().partition(is_dated_summary);

    dated.sort_by(|a, b| {
        compare_dates(
            parse_loose_date(&a.official_date),
            parse_loose_date(&b.official_date),
            false,
        )
    });
    rest.sort_by(|a, b| compare_dates(fallback_date(a), fallback_date(b), true));

    dated.extend(rest);
    dated
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn summaries(rows: &[MilestoneRow]) -> Vec<&str> {
        rows.iter().map(|r| r.summary.as_str()).collect()
    }

    #[test]
    fn dated_rows_ascend_then_rest_descend() {
        let mut undated_old = MilestoneRow::new("", "", "");
        undated_old.end_date = Some("2024-01-01".to_string());
        undated_old.title = "old".to_string();
        let mut undated_new = MilestoneRow::new("", "", "");
        undated_new.created_at = Some("2025-06-01T00:00:00Z".to_string());
        undated_new.title = "new".to_string();

        let rows = vec![
            undated_old,
            MilestoneRow::new("mar-2025", "March", "completed"),
            undated_new,
            MilestoneRow::new("jan-2025", "January", "completed"),
        ];
        let sorted = sort_attestation_rows(&rows);
        assert_eq!(summaries(&sorted)[..2], ["January", "March"]);
        assert_eq!(sorted[2].title, "new");
        assert_eq!(sorted[3].title, "old");
    }

    #[test]
    fn unparseable_dates_sort_last_in_group() {
        let rows = vec![
            MilestoneRow::new("someday", "Vague", "completed"),
            MilestoneRow::new("feb-2025", "Feb", "completed"),
        ];
        assert_eq!(summaries(&sort_attestation_rows(&rows)), vec!["Feb", "Vague"]);
    }

    #[test]
    fn fallback_priority_prefers_end_date() {
        let mut row = MilestoneRow::new("", "", "");
        row.end_date = Some("2025-05-01".to_string());
        row.created_at = Some("2020-01-01".to_string());
        assert_eq!(fallback_date(&row).unwrap().date().to_string(), "2025-05-01");
    }

    #[test]
    fn equal_dates_keep_input_order() {
        let rows = vec![
            MilestoneRow::new("jan-2025", "first", "completed"),
            MilestoneRow::new("jan-2025", "second", "completed"),
        ];
        assert_eq!(summaries(&sort_attestation_rows(&rows)), vec!["first", "second"]);
    }

    fn arb_row() -> impl Strategy<Value = MilestoneRow> {
        let months = prop_oneof![
            Just(String::new()),
            Just("garbage".to_string()),
            (0usize..12, 2020i32..2027).prop_map(|(m, y)| {
                let names = ["jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec"];
                format!("{}-{y}", names[m])
            }),
        ];
        (months, prop_oneof![Just(String::new()), "[a-z]{1,8}"])
            .prop_map(|(date, summary)| MilestoneRow::new(date, summary, "completed"))
    }

    proptest! {
        #[test]
        fn prop_sort_law(rows in proptest::collection::vec(arb_row(), 0..40)) {
            let sorted = sort_attestation_rows(&rows);
            prop_assert_eq!(sorted.len(), rows.len());

            let first_rest = sorted.iter().position(|r| !is_dated_summary(r)).unwrap_or(sorted.len());
            prop_assert!(sorted[first_rest..].iter().all(|r| !is_dated_summary(r)));

            let dates: Vec<_> = sorted[..first_rest].iter().map(|r| parse_loose_date(&r.official_date)).collect();
            for pair in dates.windows(2) {
                match (pair[0], pair[1]) {
                    (Some(a), Some(b)) => prop_assert!(a <= b),
                    (None, Some(_)) => prop_assert!(false, "unparseable before parseable"),
                    _ => {}
                }
            }
        }
    }
}
