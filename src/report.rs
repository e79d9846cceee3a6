//! Console rendering and file output for crawl, discovery and harvest results.

use serde::Serialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::error::Result;
use crate::graph::{Edge, HierarchyGraph};
use crate::harvest::University;

/// One reconciled candidate, flattened for tables and CSV.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub name: String,
    pub status: String,
    pub id: Option<String>,
    pub label: Option<String>,
    pub unit_type: String,
    pub website: Option<String>,
    pub location: String,
    pub reference_url: Option<String>,
    pub root_id: String,
    pub root_label: String,
}

/// Indented tree of the graph below its root.
///
/// Children are ordered by label. A node reached a second time (several parents or a
/// cycle) is printed with a back-reference and not expanded again.
pub fn render_tree(graph: &HierarchyGraph) -> String {
    let root = graph.root();
    let mut out = format!("{} ({})\n", root.label, root.id);
    let mut printed = HashSet::from([root.id.clone()]);
    render_children(graph, &root.id, 1, &mut printed, &mut out);
    out
}

fn render_children(
    graph: &HierarchyGraph,
    parent: &str,
    depth: usize,
    printed: &mut HashSet<String>,
    out: &mut String,
) {
    let mut children = graph.direct_children(parent);
    children.sort_by(|a, b| a.label.cmp(&b.label).then_with(|| a.id.cmp(&b.id)));

    for child in children {
        let relation = graph.relation(parent, &child.id).unwrap_or("?");
        out.push_str(&"  ".repeat(depth));
        out.push_str(&format!("└─ [{}] {} ({})", relation, child.label, child.id));
        if let Some(t) = graph.child_type(&child.id) {
            out.push_str(&format!(" · {}", t));
        }

        if printed.insert(child.id.clone()) {
            out.push('\n');
            render_children(graph, &child.id, depth + 1, printed, out);
        } else {
            out.push_str(" (see above)\n");
        }
    }
}

/// Aligned `Name | Status | QID | Label` table.
pub fn render_diff_table(rows: &[ReportRow]) -> String {
    let header: Vec<String> = ["Name", "Status", "QID", "Label"]
        .iter()
        .map(|h| h.to_string())
        .collect();
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            vec![
                r.name.clone(),
                r.status.clone(),
                r.id.clone().unwrap_or_else(|| "-".to_string()),
                r.label.clone().unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();

    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }
    let rule: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();

    let mut out = String::new();
    for line in std::iter::once(&header).chain(std::iter::once(&rule)).chain(&cells) {
        out.push_str(&pad_columns(line, &widths));
        out.push('\n');
    }
    out
}

fn pad_columns(cols: &[String], widths: &[usize]) -> String {
    cols.iter()
        .zip(widths)
        .map(|(c, w)| format!("{:<w$}", c, w = *w))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

/// Write the edge list as pretty JSON, in discovery order.
pub fn write_edges_json(path: &Path, edges: &[Edge]) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, edges)?;
    log::info!("Wrote {} edge(s) to {}", edges.len(), path.display());
    Ok(())
}

/// Write reconciliation rows as CSV with a header line.
pub fn write_diff_csv(path: &Path, rows: &[ReportRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    log::info!("Wrote {} row(s) to {}", rows.len(), path.display());
    Ok(())
}

pub fn write_universities_json(path: &Path, universities: &[University]) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, universities)?;
    log::info!("Wrote {} universities to {}", universities.len(), path.display());
    Ok(())
}
