// sentinel-cli/src/commands/trace_status.rs
// ============================================================================
// Module: trace-status Command
// Description: Reports the Trace Analyzer's persisted cursor and last report.
// Purpose: Let an operator check analyzer progress without a live run.
// Dependencies: sentinel_core, sentinel_trace
// ============================================================================

use std::path::PathBuf;

use async_trait::async_trait;
use sentinel_core::interfaces::CommandHandler;
use sentinel_core::interfaces::CommandOutput;
use sentinel_trace::TraceAnalysisReport;
use sentinel_trace::TraceAnalyzerState;

/// Handler for the `trace-status` command. Reads
/// `trace-analyzer-state.json` and `trace-analysis-report.json` directly;
/// does not require a live orchestrator or event-store transport.
pub struct TraceStatusCommand {
    workspace_dir: PathBuf,
}

impl TraceStatusCommand {
    /// Builds the handler over the workspace directory that owns the
    /// analyzer's state and report files.
    #[must_use]
    pub fn new(workspace_dir: impl Into<PathBuf>) -> Self {
        Self { workspace_dir: workspace_dir.into() }
    }

    fn load_report(&self) -> Option<TraceAnalysisReport> {
        let bytes = std::fs::read(self.workspace_dir.join("trace-analysis-report.json")).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

#[async_trait]
impl CommandHandler for TraceStatusCommand {
    fn name(&self) -> &str {
        "trace-status"
    }

    fn description(&self) -> &str {
        "Reports the trace analyzer's cursor and most recent report"
    }

    async fn handle(&self, _args: &[String]) -> CommandOutput {
        let state_path = self.workspace_dir.join("trace-analyzer-state.json");
        let state = TraceAnalyzerState::load(&state_path).unwrap_or_default();

        let mut text = format!(
            "## Trace Status\n\n\
             - Last processed timestamp: {}\n\
             - Total events processed: {}\n\
             - Total findings raised: {}\n\
             - Last updated: {}\n",
            state.last_processed_ts, state.total_events_processed, state.total_findings, state.updated_at,
        );

        match self.load_report() {
            Some(report) => {
                text.push_str(&format!(
                    "\n### Last report `{}`\n\n- Full run: {}\n- Window: [{}, {})\n- Chains: {}\n- Findings in report: {}\n",
                    report.id, report.full_run, report.window.0, report.window.1, report.chain_count, report.findings.len(),
                ));
            }
            None => text.push_str("\nNo report has been written yet.\n"),
        }
        CommandOutput::new(text)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "unit tests favor unwrap/expect for clarity")]
    use super::*;

    #[tokio::test]
    async fn reports_a_fresh_cursor_when_no_state_exists() {
        let dir = tempfile::tempdir().unwrap();
        let command = TraceStatusCommand::new(dir.path());
        let output = command.handle(&[]).await;
        assert!(output.text.contains("Last processed timestamp: 0"));
        assert!(output.text.contains("No report has been written yet."));
    }

    #[tokio::test]
    async fn reports_a_persisted_report_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let report = TraceAnalysisReport {
            id: uuid::Uuid::nil(),
            full_run: true,
            window: (0, 1000),
            chain_count: 2,
            findings: vec![],
            generated_at: "2026-01-01T00:00:00Z".to_string(),
        };
        report.save(&dir.path().join("trace-analysis-report.json")).unwrap();

        let command = TraceStatusCommand::new(dir.path());
        let output = command.handle(&[]).await;
        assert!(output.text.contains("Chains: 2"));
    }
}
