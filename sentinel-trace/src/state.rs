// sentinel-trace/src/state.rs
// ============================================================================
// Module: Trace Analyzer State
// Description: Persisted run cursor and analysis report shapes.
// Purpose: Let an incremental run resume where the previous one left off.
// Dependencies: serde, serde_json, sentinel_core::atomic
// ============================================================================

//! ## Overview
//! `trace-analyzer-state.json` owns [`TraceAnalyzerState`] exclusively
//! (`spec.md` §3 "Ownership"); `trace-analysis-report.json` owns
//! [`TraceAnalysisReport`]. Both are written via
//! [`sentinel_core::atomic::write_atomic`] so a crash mid-run never leaves a
//! torn file behind.

use std::path::Path;

use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::detectors::Finding;

/// Persisted cursor for the Trace Orchestrator (`spec.md` §4.15).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceAnalyzerState {
    /// Maximum event timestamp seen by the last completed run.
    pub last_processed_ts: i64,
    /// Lifetime count of events processed.
    pub total_events_processed: u64,
    /// Lifetime count of findings raised.
    pub total_findings: u64,
    /// Identifier of the most recently written report.
    pub last_report_id: Option<Uuid>,
    /// ISO-8601 timestamp of the last write.
    pub updated_at: String,
}

impl Default for TraceAnalyzerState {
    fn default() -> Self {
        Self {
            last_processed_ts: 0,
            total_events_processed: 0,
            total_findings: 0,
            last_report_id: None,
            updated_at: String::new(),
        }
    }
}

impl TraceAnalyzerState {
    /// Loads state from `path`, or returns the default (a fresh full run)
    /// if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        match std::fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err),
        }
    }

    /// Atomically persists state to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the atomic write fails.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let bytes = serde_json::to_vec_pretty(self)?;
        sentinel_core::atomic::write_atomic(path, &bytes)
    }
}

/// A single completed Trace Orchestrator run (`spec.md` §4.15).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceAnalysisReport {
    /// Unique identifier for this report.
    pub id: Uuid,
    /// Whether this was a full or incremental run.
    pub full_run: bool,
    /// `[start_ms, end_ms)` window this run covered.
    pub window: (i64, i64),
    /// Number of chains reconstructed.
    pub chain_count: usize,
    /// Findings raised this run, classified where possible.
    pub findings: Vec<ReportFinding>,
    /// ISO-8601 timestamp this report was generated.
    pub generated_at: String,
}

/// Serializable projection of a [`Finding`] for the on-disk report; avoids
/// committing [`Finding`]'s in-memory shape to the wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportFinding {
    /// Finding identifier.
    pub id: Uuid,
    /// Owning chain identifier.
    pub chain_id: String,
    /// Responsible agent.
    pub agent: String,
    /// Detector that raised this finding.
    pub kind: String,
    /// Assigned severity.
    pub severity: String,
    /// Human-readable summary.
    pub summary: String,
    /// Model-produced root cause, if classified.
    pub root_cause: Option<String>,
    /// Recommended action kind, if classified.
    pub action_type: Option<String>,
    /// Recommended action detail, if classified.
    pub action_text: Option<String>,
    /// Model confidence, if classified.
    pub confidence: Option<f64>,
}

impl From<&Finding> for ReportFinding {
    fn from(finding: &Finding) -> Self {
        Self {
            id: finding.id.0,
            chain_id: finding.chain_id.as_str().to_string(),
            agent: finding.agent.as_str().to_string(),
            kind: finding.kind.as_str().to_string(),
            severity: finding.severity.as_str().to_string(),
            summary: finding.summary.clone(),
            root_cause: finding.classification.as_ref().map(|c| c.root_cause.clone()),
            action_type: finding.classification.as_ref().map(|c| c.action_type.as_str().to_string()),
            action_text: finding.classification.as_ref().map(|c| c.action_text.clone()),
            confidence: finding.classification.as_ref().map(|c| c.confidence),
        }
    }
}

impl TraceAnalysisReport {
    /// Atomically persists the report to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the atomic write fails.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let bytes = serde_json::to_vec_pretty(self)?;
        sentinel_core::atomic::write_atomic(path, &bytes)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "unit tests favor unwrap/expect for clarity")]
    use super::*;

    #[test]
    fn missing_state_file_loads_as_fresh_full_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace-analyzer-state.json");
        let state = TraceAnalyzerState::load(&path).unwrap();
        assert_eq!(state.last_processed_ts, 0);
        assert_eq!(state.total_findings, 0);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace-analyzer-state.json");
        let mut state = TraceAnalyzerState::default();
        state.last_processed_ts = 12345;
        state.total_events_processed = 10;
        state.save(&path).unwrap();
        let loaded = TraceAnalyzerState::load(&path).unwrap();
        assert_eq!(loaded.last_processed_ts, 12345);
        assert_eq!(loaded.total_events_processed, 10);
    }

    #[test]
    fn report_finding_carries_classification_when_present() {
        let finding = Finding {
            id: sentinel_core::FindingId::new_v4(),
            chain_id: sentinel_core::ChainId::from("deadbeef00000000"),
            agent: sentinel_core::AgentId::from("atlas"),
            kind: crate::detectors::SignalKind::TimeoutOrHang,
            severity: crate::detectors::Severity::High,
            summary: "slow".to_string(),
            evidence: serde_json::json!({}),
            event_range: (0, 1),
            classification: Some(crate::detectors::Classification {
                root_cause: "network flake".to_string(),
                action_type: crate::detectors::ActionType::ManualReview,
                action_text: "investigate".to_string(),
                confidence: 0.8,
                model: "gpt-4o-mini".to_string(),
            }),
        };
        let report_finding = ReportFinding::from(&finding);
        assert_eq!(report_finding.root_cause.as_deref(), Some("network flake"));
        assert_eq!(report_finding.confidence, Some(0.8));
    }
}
