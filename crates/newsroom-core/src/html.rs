//! Self-contained HTML rendering for ICF documents and comparison reports

use crate::images::SlotImage;
use crate::karma::KarmaQueryResult;
use indexmap::IndexSet;
use newsroom_artifact::JsonLdGraph;
use newsroom_timeline::MilestoneRow;
use serde_json::Value;
use std::fmt::Write as _;

const STYLE: &str = "body{font-family:system-ui,sans-serif;margin:2rem;color:#1a1a1a;background:#fff}\
h1{font-size:1.5rem}h2{font-size:1.2rem;margin-top:2rem}\
table{border-collapse:collapse;width:100%;font-size:.9rem}\
th,td{border:1px solid #ddd;padding:.4rem;vertical-align:top;text-align:left}\
th{background:#f4f4f4}td img{max-width:160px;display:block;margin-bottom:.3rem}\
.meta{color:#555;font-size:.85rem}.preview{max-width:100%;border:1px solid #ddd}\
pre{background:#f8f8f8;padding:1rem;overflow:auto;font-size:.8rem}\
.error{color:#b00020}.warning{color:#a15c00}";

/// Escape text for HTML element content and attribute values
#[must_use]
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Make JSON safe to embed inside a `<script>` element
#[must_use]
pub fn escape_script_json(json: &str) -> String {
    json.replace("</", "<\\/")
}

/// One milestone row of the rendered table
#[derive(Debug, Clone)]
pub struct MilestoneEntry {
    pub node_index: usize,
    pub month: String,
    pub is_extra_node: bool,
    pub row: MilestoneRow,
    pub images: Vec<SlotImage>,
}

/// Everything an ICF page shows
#[derive(Debug, Clone, Copy)]
pub struct IcfPage<'a> {
    pub title: &'a str,
    pub snapshot_id: &'a str,
    pub content_hash: &'a str,
    pub generated_at: &'a str,
    pub graph: &'a JsonLdGraph,
    pub milestones: &'a [MilestoneEntry],
    pub preview: Option<&'a str>,
    pub rows: &'a [MilestoneRow],
    pub karma: Option<&'a KarmaQueryResult>,
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn write_milestone_table(out: &mut String, milestones: &[MilestoneEntry]) {
    out.push_str("<table><thead><tr><th>Date</th><th>Summary</th><th>Proofs</th><th>Notes</th><th>Images</th></tr></thead><tbody>");
    for entry in milestones {
        let row = &entry.row;
        let _ = write!(
            out,
            "<tr id=\"milestone-{}\"><td>{}</td><td><strong>{}</strong><br>{}</td><td>",
            entry.node_index,
            escape_html(&row.official_date),
            escape_html(&row.title),
            escape_html(&row.summary)
        );
        for url in row.proof_urls() {
            let url = escape_html(url);
            let _ = write!(out, "<a href=\"{url}\">{url}</a><br>");
        }
        let _ = write!(out, "</td><td>{}</td><td>", escape_html(row.notes.as_deref().unwrap_or_default()));
        for image in &entry.images {
            let _ = write!(
                out,
                "<img src=\"{}\" alt=\"{}\">",
                escape_html(&image.image.data_uri),
                escape_html(image.slot)
            );
        }
        out.push_str("</td></tr>");
    }
    out.push_str("</tbody></table>");
}

/// Table of arbitrary rows; columns in first-seen order
fn write_row_dump(out: &mut String, rows: &[MilestoneRow]) {
    let objects: Vec<serde_json::Map<String, Value>> = rows
        .iter()
        .filter_map(|r| match serde_json::to_value(r) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        })
        .collect();
    let mut columns: IndexSet<&str> = IndexSet::new();
    for object in &objects {
        columns.extend(object.keys().map(String::as_str));
    }

    out.push_str("<table><thead><tr>");
    for column in &columns {
        let _ = write!(out, "<th>{}</th>", escape_html(column));
    }
    out.push_str("</tr></thead><tbody>");
    for object in &objects {
        out.push_str("<tr>");
        for column in &columns {
            let _ = write!(out, "<td>{}</td>", escape_html(&cell_text(object.get(*column))));
        }
        out.push_str("</tr>");
    }
    out.push_str("</tbody></table>");
}

fn write_details(out: &mut String, summary: &str, body: &str) {
    let _ = write!(out, "<details><summary>{}</summary>{}</details>", escape_html(summary), body);
}

fn pretty(value: &impl serde::Serialize) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

/// Render the complete ICF document
#[must_use]
pub fn render_icf_html(page: &IcfPage<'_>) -> String {
    let graph_json = pretty(page.graph);
    let mut out = String::new();
    let _ = write!(
        out,
        "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\"><title>{title}</title><style>{STYLE}</style>\
         <script type=\"application/ld+json\">{ld}</script></head><body><h1>{title}</h1>\
         <p class=\"meta\">Snapshot <code>{id}</code> &middot; SHA-256 <code>{hash}</code> &middot; generated {at}</p>",
        title = escape_html(page.title),
        ld = escape_script_json(&graph_json),
        id = escape_html(page.snapshot_id),
        hash = escape_html(page.content_hash),
        at = escape_html(page.generated_at),
    );

    out.push_str("<h2>Milestones</h2>");
    write_milestone_table(&mut out, page.milestones);

    if let Some(preview) = page.preview {
        let _ = write!(
            out,
            "<h2>Timeline</h2><img class=\"preview\" src=\"{}\" alt=\"Serpentine timeline\">",
            escape_html(preview)
        );
    }

    let mut table = String::new();
    write_row_dump(&mut table, page.rows);
    write_details(&mut out, &format!("General table ({} rows)", page.rows.len()), &table);

    if let Some(karma) = page.karma {
        let body = format!("<pre>{}</pre>", escape_html(&pretty(karma)));
        write_details(&mut out, &format!("Karma query ({})", karma.timestamp), &body);
    }

    let body = format!("<pre>{}</pre>", escape_html(&graph_json));
    write_details(&mut out, "JSON-LD", &body);

    out.push_str("</body></html>");
    out
}

/// Render a stored comparison result
#[must_use]
pub fn render_comparison_html(snapshot_id: &str, result: &crate::compare::ComparisonResult) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\"><title>Comparison {id}</title>\
         <style>{STYLE}</style></head><body><h1>Comparison for {id}</h1>\
         <p>Similarity {similarity:.1}% &middot; {verdict}</p><p>{summary}</p>",
        id = escape_html(snapshot_id),
        similarity = result.similarity,
        verdict = if result.is_match { "match" } else { "drift detected" },
        summary = escape_html(&result.summary),
    );
    if result.differences.is_empty() {
        out.push_str("<p>No differences.</p>");
    } else {
        out.push_str("<table><thead><tr><th>Category</th><th>Field</th><th>Identifier</th><th>ICF</th><th>Live</th><th>Severity</th></tr></thead><tbody>");
        for d in &result.differences {
            let severity = d.severity.as_str();
            let _ = write!(
                out,
                "<tr class=\"{severity}\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{severity}</td></tr>",
                d.category.as_str(),
                escape_html(&d.field),
                escape_html(d.identifier.as_deref().unwrap_or_default()),
                escape_html(&cell_text(Some(&d.icf_value))),
                escape_html(&cell_text(Some(&d.firestore_value))),
            );
        }
        out.push_str("</tbody></table>");
    }
    out.push_str("</body></html>");
    out
}
