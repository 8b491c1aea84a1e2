//! Directed link graph export
//!
//! Edges come from the `parent` column of the page log. The synthetic
//! `sitemap` parent is kept as a node like any other.

use super::csv_log::read_rows;
use super::summary::rank_counts;
use super::{require_file, OutputLayout, OutputResult};
use crate::url::authority_of_str;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::BufWriter;
use tracing::info;

/// Domain counts serialized as a JSON object in rank order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankedCounts(pub Vec<(String, u64)>);

impl Serialize for RankedCounts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, count) in &self.0 {
            map.serialize_entry(key, count)?;
        }
        map.end()
    }
}

/// Contents of `link_graph.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LinkGraph {
    pub nodes: Vec<String>,
    /// `[parent, url]` pairs
    pub edges: Vec<(String, String)>,
    pub domain_counts: RankedCounts,
}

/// Builds the graph from page log rows
pub fn build_link_graph(rows: &[HashMap<String, String>]) -> LinkGraph {
    let mut nodes = BTreeSet::new();
    let mut edges = BTreeSet::new();
    let mut domains: HashMap<String, u64> = HashMap::new();

    for row in rows {
        let url = row.get("url").map(|v| v.trim()).unwrap_or_default();
        if url.is_empty() {
            continue;
        }
        let parent = row.get("parent").map(|v| v.trim()).unwrap_or_default();

        nodes.insert(url.to_string());
        *domains
            .entry(authority_of_str(url).unwrap_or_default())
            .or_insert(0) += 1;

        if !parent.is_empty() {
            nodes.insert(parent.to_string());
            edges.insert((parent.to_string(), url.to_string()));
        }
    }

    LinkGraph {
        nodes: nodes.into_iter().collect(),
        edges: edges.into_iter().collect(),
        domain_counts: RankedCounts(rank_counts(domains)),
    }
}

/// Writes `link_graph.json`; the page log must exist
pub fn export_link_graph(layout: &OutputLayout) -> OutputResult<LinkGraph> {
    let log_path = layout.page_log_path();
    let rows: Vec<HashMap<String, String>> = read_rows(require_file(&log_path)?)?;
    let graph = build_link_graph(&rows);

    let out_path = layout.link_graph_path();
    let writer = BufWriter::new(File::create(&out_path)?);
    serde_json::to_writer_pretty(writer, &graph)?;

    info!(
        "Wrote link graph ({} nodes, {} edges) to {}",
        graph.nodes.len(),
        graph.edges.len(),
        out_path.display()
    );
    Ok(graph)
}
