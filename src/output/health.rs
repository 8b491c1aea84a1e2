//! Per-host health document written at shutdown

use super::OutputResult;
use crate::admission::HealthSnapshot;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::info;

#[derive(Debug, Serialize, PartialEq)]
pub struct HostHealth {
    pub domain: String,
    /// Current delay in seconds
    pub crawl_delay: f64,
    /// Mean latency of the recent window in seconds, null before any response
    pub avg_latency: Option<f64>,
    pub errors: u64,
    pub requests: u64,
    pub error_rate: f64,
}

impl From<&HealthSnapshot> for HostHealth {
    fn from(snapshot: &HealthSnapshot) -> Self {
        Self {
            domain: snapshot.host.clone(),
            crawl_delay: snapshot.current_delay.as_secs_f64(),
            avg_latency: snapshot.mean_latency.map(|d| d.as_secs_f64()),
            errors: snapshot.error_count,
            requests: snapshot.request_count,
            error_rate: snapshot.error_rate,
        }
    }
}

/// Builds the `{host: health}` map, keyed and ordered by host
pub fn health_report(snapshots: &[HealthSnapshot]) -> BTreeMap<String, HostHealth> {
    snapshots
        .iter()
        .map(|s| (s.host.clone(), HostHealth::from(s)))
        .collect()
}

/// Writes `domain_health.json`
pub fn write_health_report(path: &Path, snapshots: &[HealthSnapshot]) -> OutputResult<()> {
    let report = health_report(snapshots);
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, &report)?;
    info!("Wrote domain health for {} hosts to {}", report.len(), path.display());
    Ok(())
}
