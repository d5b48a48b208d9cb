// sentinel-cli/src/commands/cortexstatus.rs
// ============================================================================
// Module: cortexstatus Command
// Description: One-shot snapshot of the governance and knowledge subsystems.
// Purpose: Give an operator a quick "is everything alive" text blob.
// Dependencies: sentinel_core, sentinel_governance, sentinel_knowledge
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use sentinel_core::interfaces::CommandHandler;
use sentinel_core::interfaces::CommandOutput;
use sentinel_governance::GovernanceOrchestrator;
use sentinel_knowledge::FactStore;

/// Handler for the `cortexstatus` command: vault, audit, and fact-store counters.
pub struct CortexStatusCommand {
    governance: Arc<GovernanceOrchestrator>,
    facts: Arc<FactStore>,
}

impl CortexStatusCommand {
    /// Builds the handler over shared governance and knowledge state.
    #[must_use]
    pub fn new(governance: Arc<GovernanceOrchestrator>, facts: Arc<FactStore>) -> Self {
        Self { governance, facts }
    }
}

#[async_trait]
impl CommandHandler for CortexStatusCommand {
    fn name(&self) -> &str {
        "cortexstatus"
    }

    fn description(&self) -> &str {
        "Reports vault, audit, and fact-store counters"
    }

    async fn handle(&self, _args: &[String]) -> CommandOutput {
        let unembedded = self.facts.get_unembedded_facts().len();
        let text = format!(
            "## Cortex Status\n\n\
             - Redaction vault entries: {}\n\
             - Audit records today: {}\n\
             - Facts stored: {}\n\
             - Facts awaiting embedding: {}\n",
            self.governance.vault_len(),
            self.governance.audit().count_today(),
            self.facts.len(),
            unembedded,
        );
        CommandOutput::new(text)
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

    #[tokio::test]
    async fn reports_zero_counters_for_a_fresh_stack() {
        let dir = tempfile::tempdir().unwrap();
        let audit = AuditJournal::open(dir.path(), sentinel_config::AuditSettings::default(), Arc::new(NullLogger), Arc::new(FixedClock(0))).unwrap();
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
        let facts = Arc::new(FactStore::new(dir.path().join("facts.json"), KnowledgeSettings::default(), Arc::new(NullLogger), Arc::new(FixedClock(0))));

        let command = CortexStatusCommand::new(governance, facts);
        let output = command.handle(&[]).await;
        assert!(output.text.contains("Facts stored: 0"));
        assert!(output.text.contains("Redaction vault entries: 0"));
    }
}
