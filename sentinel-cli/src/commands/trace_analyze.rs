// sentinel-cli/src/commands/trace_analyze.rs
// ============================================================================
// Module: trace-analyze Command
// Description: Triggers a full or incremental Trace Orchestrator run on demand.
// Purpose: Let an operator request an off-schedule analysis pass.
// Dependencies: sentinel_core, sentinel_providers, sentinel_trace
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use sentinel_core::interfaces::CommandHandler;
use sentinel_core::interfaces::CommandOutput;
use sentinel_core::interfaces::EventStoreTransport;
use sentinel_providers::clock::Clock;
use sentinel_trace::TraceOrchestrator;
use sentinel_trace::TraceRunError;

/// Handler for `trace-analyze [full=true|false]`. Generic over the
/// event-store transport the host supplies; a standalone CLI with no live
/// transport has no instance of this command registered.
pub struct TraceAnalyzeCommand<T> {
    orchestrator: Arc<TraceOrchestrator<T>>,
    clock: Arc<dyn Clock>,
}

impl<T: EventStoreTransport> TraceAnalyzeCommand<T> {
    /// Builds the handler over a live orchestrator and clock.
    #[must_use]
    pub fn new(orchestrator: Arc<TraceOrchestrator<T>>, clock: Arc<dyn Clock>) -> Self {
        Self { orchestrator, clock }
    }
}

fn parse_full(args: &[String]) -> bool {
    args.iter().any(|arg| arg == "full=true" || arg == "full")
}

#[async_trait]
impl<T: EventStoreTransport + 'static> CommandHandler for TraceAnalyzeCommand<T> {
    fn name(&self) -> &str {
        "trace-analyze"
    }

    fn description(&self) -> &str {
        "Runs a full or incremental trace analysis pass"
    }

    async fn handle(&self, args: &[String]) -> CommandOutput {
        let full = parse_full(args);
        let now_ms = self.clock.now_ms();
        match self.orchestrator.run(full, now_ms).await {
            Ok(report) => CommandOutput::new(format!(
                "## Trace Analysis Complete\n\n\
                 - Report `{}`\n\
                 - Full run: {}\n\
                 - Chains reconstructed: {}\n\
                 - Findings raised: {}\n",
                report.id,
                report.full_run,
                report.chain_count,
                report.findings.len(),
            )),
            Err(TraceRunError::AlreadyRunning) => CommandOutput::new("A trace analysis run is already in progress; try again shortly."),
            Err(TraceRunError::Io(err)) => CommandOutput::new(format!("Trace analysis failed to persist its state or report: {err}")),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "unit tests favor unwrap/expect for clarity")]
    use super::*;

    #[test]
    fn recognizes_full_true_and_bare_full() {
        assert!(parse_full(&["full=true".to_string()]));
        assert!(parse_full(&["full".to_string()]));
        assert!(!parse_full(&["full=false".to_string()]));
        assert!(!parse_full(&[]));
    }
}
