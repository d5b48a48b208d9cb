// sentinel-cli/src/commands/sitrep.rs
// ============================================================================
// Module: sitrep Command
// Description: Cross-subsystem situational report, aggregating the other commands.
// Purpose: One text blob an operator can paste into a status channel.
// Dependencies: sentinel_core, sentinel_governance, sentinel_knowledge
// ============================================================================

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use sentinel_core::interfaces::CommandHandler;
use sentinel_core::interfaces::CommandOutput;
use sentinel_governance::GovernanceOrchestrator;
use sentinel_knowledge::FactStore;
use sentinel_trace::TraceAnalyzerState;

const COLLECTORS: [&str; 3] = ["governance", "knowledge", "trace"];

/// Handler for `sitrep [refresh|collectors]`. With no argument, renders a
/// combined snapshot across governance, knowledge, and trace state. With
/// `refresh`, force-flushes the audit journal and fact store before
/// rendering. With `collectors`, lists the data sources the report draws
/// from instead of rendering the full snapshot.
pub struct SitrepCommand {
    governance: Arc<GovernanceOrchestrator>,
    facts: Arc<FactStore>,
    workspace_dir: PathBuf,
}

impl SitrepCommand {
    /// Builds the handler over shared governance and knowledge state.
    #[must_use]
    pub fn new(governance: Arc<GovernanceOrchestrator>, facts: Arc<FactStore>, workspace_dir: impl Into<PathBuf>) -> Self {
        Self { governance, facts, workspace_dir: workspace_dir.into() }
    }

    fn render(&self) -> String {
        let trace_state = TraceAnalyzerState::load(&self.workspace_dir.join("trace-analyzer-state.json")).unwrap_or_default();
        format!(
            "## Situational Report\n\n\
             ### Governance\n\
             - Vault entries: {}\n\
             - Audit records today: {}\n\n\
             ### Knowledge\n\
             - Facts stored: {}\n\
             - Facts awaiting embedding: {}\n\n\
             ### Trace\n\
             - Total findings raised: {}\n\
             - Last processed timestamp: {}\n",
            self.governance.vault_len(),
            self.governance.audit().count_today(),
            self.facts.len(),
            self.facts.get_unembedded_facts().len(),
            trace_state.total_findings,
            trace_state.last_processed_ts,
        )
    }
}

#[async_trait]
impl CommandHandler for SitrepCommand {
    fn name(&self) -> &str {
        "sitrep"
    }

    fn description(&self) -> &str {
        "Cross-subsystem situational report"
    }

    async fn handle(&self, args: &[String]) -> CommandOutput {
        match args.first().map(String::as_str) {
            Some("collectors") => {
                let mut text = String::from("## Sitrep Collectors\n\n");
                for collector in COLLECTORS {
                    text.push_str(&format!("- {collector}\n"));
                }
                CommandOutput::new(text)
            }
            Some("refresh") => {
                if let Err(err) = self.governance.audit().flush() {
                    return CommandOutput::new(format!("Failed to flush audit journal: {err}"));
                }
                if let Err(err) = self.facts.flush() {
                    return CommandOutput::new(format!("Failed to flush fact store: {err}"));
                }
                CommandOutput::new(self.render())
            }
            _ => CommandOutput::new(self.render()),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "unit tests favor unwrap/expect for clarity")]
    use super::*;
    use sentinel_config::GovernanceSettings;
    use sentinel_config::KnowledgeSettings;
    use sentinel_config::VaultSettings;
    use sentinel_core::interfaces::NullLogger;
    use sentinel_governance::AuditJournal;
    use sentinel_governance::TrustManager;
    use sentinel_governance::Vault;
    use sentinel_providers::clock::FixedClock;

    fn stack(dir: &std::path::Path) -> (Arc<GovernanceOrchestrator>, Arc<FactStore>) {
        let audit = AuditJournal::open(dir, sentinel_config::AuditSettings::default(), Arc::new(NullLogger), Arc::new(FixedClock(0))).unwrap();
        let governance = Arc::new(GovernanceOrchestrator::new(
            GovernanceSettings::default(),
            None,
            TrustManager::new(sentinel_config::TrustSettings::default(), Arc::new(NullLogger)),
            16,
            Vault::new(&VaultSettings::default()),
            audit,
            Arc::new(NullLogger),
            Arc::new(FixedClock(0)),
        ));
        let facts = Arc::new(FactStore::new(dir.join("facts.json"), KnowledgeSettings::default(), Arc::new(NullLogger), Arc::new(FixedClock(0))));
        (governance, facts)
    }

    #[tokio::test]
    async fn collectors_lists_the_contributing_subsystems() {
        let dir = tempfile::tempdir().unwrap();
        let (governance, facts) = stack(dir.path());
        let command = SitrepCommand::new(governance, facts, dir.path());
        let output = command.handle(&["collectors".to_string()]).await;
        assert!(output.text.contains("governance"));
        assert!(output.text.contains("knowledge"));
        assert!(output.text.contains("trace"));
    }

    #[tokio::test]
    async fn default_invocation_renders_a_combined_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let (governance, facts) = stack(dir.path());
        facts.add_fact("atlas", "role", "operator", sentinel_knowledge::SOURCE_INGESTED, 0);
        let command = SitrepCommand::new(governance, facts, dir.path());
        let output = command.handle(&[]).await;
        assert!(output.text.contains("Facts stored: 1"));
    }
}
