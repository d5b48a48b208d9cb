// sentinel-cli/src/commands/governance.rs
// ============================================================================
// Module: governance Command
// Description: Renders the most recent audit records as a markdown table.
// Purpose: Let an operator inspect recent allow/deny decisions without grepping shards.
// Dependencies: sentinel_core, sentinel_governance
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use sentinel_core::interfaces::CommandHandler;
use sentinel_core::interfaces::CommandOutput;
use sentinel_governance::AuditQuery;
use sentinel_governance::GovernanceOrchestrator;

const DEFAULT_LIMIT: usize = 20;

/// Handler for the `governance` command. Accepts an optional `agent=<id>`
/// or `verdict=<label>` filter and an optional `limit=<n>` argument.
pub struct GovernanceCommand {
    governance: Arc<GovernanceOrchestrator>,
}

impl GovernanceCommand {
    /// Builds the handler over shared governance state.
    #[must_use]
    pub fn new(governance: Arc<GovernanceOrchestrator>) -> Self {
        Self { governance }
    }
}

fn parse_filter(args: &[String]) -> AuditQuery {
    let mut query = AuditQuery { limit: Some(DEFAULT_LIMIT), ..AuditQuery::default() };
    for arg in args {
        if let Some(agent) = arg.strip_prefix("agent=") {
            query.agent = Some(sentinel_core::AgentId::from(agent));
        } else if let Some(verdict) = arg.strip_prefix("verdict=") {
            query.verdict = Some(verdict.to_string());
        } else if let Some(limit) = arg.strip_prefix("limit=") {
            if let Ok(limit) = limit.parse() {
                query.limit = Some(limit);
            }
        }
    }
    query
}

#[async_trait]
impl CommandHandler for GovernanceCommand {
    fn name(&self) -> &str {
        "governance"
    }

    fn description(&self) -> &str {
        "Lists recent governance audit records"
    }

    async fn handle(&self, args: &[String]) -> CommandOutput {
        let query = parse_filter(args);
        let records = self.governance.audit().query(&query);
        if records.is_empty() {
            return CommandOutput::new("## Governance Audit\n\nNo matching audit records.\n");
        }

        let mut text = String::from("## Governance Audit\n\n| Time | Agent | Hook | Verdict | Reason |\n| --- | --- | --- | --- | --- |\n");
        for record in &records {
            text.push_str(&format!(
                "| {} | {} | {:?} | {} | {} |\n",
                record.timestamp_ms,
                record.agent.as_str(),
                record.hook,
                record.verdict,
                record.reason,
            ));
        }
        CommandOutput::new(text)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "unit tests favor unwrap/expect for clarity")]
    use super::*;

    #[test]
    fn parses_agent_verdict_and_limit_filters() {
        let args = vec!["agent=atlas".to_string(), "verdict=deny".to_string(), "limit=5".to_string()];
        let query = parse_filter(&args);
        assert_eq!(query.agent.as_ref().map(sentinel_core::AgentId::as_str), Some("atlas"));
        assert_eq!(query.verdict.as_deref(), Some("deny"));
        assert_eq!(query.limit, Some(5));
    }

    #[test]
    fn defaults_to_a_bounded_limit_with_no_filters() {
        let query = parse_filter(&[]);
        assert_eq!(query.limit, Some(DEFAULT_LIMIT));
        assert!(query.agent.is_none());
    }
}
