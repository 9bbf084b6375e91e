//! Report sinks - where finished missions end up
//!
//! `FileReportSink` renders a plain-text report and overwrites the target
//! file on every mission. `MemoryReportSink` keeps records for tests.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use shared_types::{MissionOutcome, PartyRole, SettlementRecord};
use tokio::sync::Mutex;

const RULE: &str = "=========================================================";
const THIN_RULE: &str = "---------------------------------------------------------";

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to write report to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Accepts the final record of a mission
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn write_report(&self, record: &SettlementRecord) -> Result<(), ReportError>;
}

/// Writes a human-readable report to a single file
#[derive(Debug, Clone)]
pub struct FileReportSink {
    path: PathBuf,
}

impl FileReportSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ReportSink for FileReportSink {
    async fn write_report(&self, record: &SettlementRecord) -> Result<(), ReportError> {
        let io_error = |source| ReportError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        tokio::fs::write(&self.path, render_report(record))
            .await
            .map_err(io_error)?;

        tracing::info!(
            mission_id = %record.mission_id,
            path = %self.path.display(),
            "Mission report written"
        );
        Ok(())
    }
}

/// Keeps every record in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryReportSink {
    records: Arc<Mutex<Vec<SettlementRecord>>>,
}

impl MemoryReportSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<SettlementRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl ReportSink for MemoryReportSink {
    async fn write_report(&self, record: &SettlementRecord) -> Result<(), ReportError> {
        self.records.lock().await.push(record.clone());
        Ok(())
    }
}

pub fn render_report(record: &SettlementRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "== FINAL MISSION REPORT ==");
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "Mission: {}", record.mission_id);
    let _ = writeln!(out, "Filed at: {}", record.created_at.to_rfc3339());

    match record.outcome {
        MissionOutcome::Success => render_success(&mut out, record),
        MissionOutcome::Failed => render_failure(&mut out, record),
    }

    let _ = writeln!(out, "{RULE}");
    out
}

fn render_success(out: &mut String, record: &SettlementRecord) {
    let _ = writeln!(out, "Overall result: MISSION ACCOMPLISHED");
    let _ = writeln!(out);
    let _ = writeln!(out, "--- LOOT BREAKDOWN ---");
    let _ = writeln!(out, "Base loot: ${}", record.base_loot);
    let _ = writeln!(out, "Bonus loot: ${}", record.bonus_loot);
    let _ = writeln!(out, "Total loot: ${}", record.total_loot);
    let _ = writeln!(out);
    let _ = writeln!(out, "{THIN_RULE}");
    for share in &record.shares {
        if share.role == PartyRole::Broker && record.remainder > 0 {
            let _ = writeln!(
                out,
                "Payment to {}: ${} (share) + ${} (remainder)",
                share.party,
                share.amount - record.remainder,
                record.remainder
            );
        } else {
            let _ = writeln!(out, "Payment to {}: ${}", share.party, share.amount);
        }
    }
    let _ = writeln!(out, "{THIN_RULE}");

    if !record.payments.is_empty() {
        let _ = writeln!(out, "--- PAYMENT ACKNOWLEDGEMENTS ---");
        for ack in &record.payments {
            let verdict = if ack.accepted { "accepted" } else { "rejected" };
            let _ = writeln!(out, "{} {}: {}", ack.party, verdict, ack.message);
        }
        let _ = writeln!(out, "{THIN_RULE}");
    }

    let _ = writeln!(out, "Final balance of the operation: ${}", record.shares_total());
}

fn render_failure(out: &mut String, record: &SettlementRecord) {
    let _ = writeln!(out, "Overall result: MISSION FAILED");
    let _ = writeln!(out);
    let _ = writeln!(out, "--- FAILURE DETAILS ---");
    match &record.failure {
        Some(failure) => {
            let _ = writeln!(out, "Failed in: {}", failure.phase);
            let _ = writeln!(
                out,
                "Responsible: {}",
                failure.character.as_deref().unwrap_or("nobody in particular")
            );
            let _ = writeln!(out, "Lost loot: ${}", failure.lost_loot);
            let _ = writeln!(out, "Reason: {}", failure.reason);
        }
        None => {
            let _ = writeln!(out, "Reason: unknown");
        }
    }
}
