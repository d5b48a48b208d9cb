// sentinel-governance/src/orchestrator.rs
// ============================================================================
// Module: Governance Orchestrator
// Description: Per-event pipeline wiring trust, risk, frequency, policy, vault, and audit together.
// Purpose: The single entry point a hook dispatcher calls for every governed event.
// Dependencies: sentinel_core, sentinel_config, sentinel_providers
// ============================================================================

//! ## Overview
//! `spec.md` §4.14. For every dispatched hook: derive the acting agent's
//! effective trust snapshot (a sub-agent's score is capped at its parent's,
//! so a child never out-trusts the agent that spawned it), record a
//! frequency event, assess risk, evaluate policies, and persist the
//! decision to the audit journal. A denied decision also records a trust
//! violation before the audit write, so the violation is reflected in any
//! concurrent read of the trust store.
//!
//! If the policy index failed to compile when the host loaded its policy
//! set, the orchestrator is built with `policies: None`: every decision
//! then falls back to the configured `fail_open`/`fail_closed` default and
//! is recorded with the verdict label `"error-fallback"` rather than
//! `"allow"`/`"deny"`, so the audit trail can distinguish a real policy
//! decision from a degraded one.
//!
//! [`GovernanceOrchestrator::record_outcome`] is the separate entry point
//! for post-tool-call hooks: it feeds a tool's success or failure back into
//! the trust manager and does not itself evaluate policy.

use std::sync::Arc;
use std::sync::Mutex;

use sentinel_config::GovernanceSettings;
use sentinel_core::AgentId;
use sentinel_core::AuditRecordId;
use sentinel_core::ChannelId;
use sentinel_core::interfaces::HookName;
use sentinel_core::interfaces::Logger;
use sentinel_core::redact::Redactor;
use sentinel_core::redact::StatelessMinter;
use sentinel_providers::clock::Clock;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

use crate::audit::AuditJournal;
use crate::audit::AuditRecord;
use crate::audit::build_record;
use crate::frequency::FrequencyEvent;
use crate::frequency::FrequencyScope;
use crate::frequency::FrequencyTracker;
use crate::policy::PolicyContext;
use crate::policy::PolicyIndex;
use crate::policy::PolicyVerdict;
use crate::risk::RiskAssessment;
use crate::risk::RiskContext;
use crate::risk::RiskLevel;
use crate::risk::assess;
use crate::trust::TrustManager;
use crate::trust::TrustTier;
use crate::vault::Vault;

const RECENT_ACTION_WINDOW_SECONDS: u64 = 60;

fn datetime(epoch_ms: i64) -> Option<time::OffsetDateTime> {
    time::OffsetDateTime::from_unix_timestamp_nanos(i128::from(epoch_ms) * 1_000_000).ok()
}

fn hour_of_day(epoch_ms: i64) -> u32 {
    datetime(epoch_ms).map_or(0, |dt| u32::from(dt.hour()))
}

fn minute_of_day(epoch_ms: i64) -> u32 {
    datetime(epoch_ms).map_or(0, |dt| u32::from(dt.hour()) * 60 + u32::from(dt.minute()))
}

fn day_of_week(epoch_ms: i64) -> u8 {
    datetime(epoch_ms).map_or(0, |dt| dt.weekday().number_days_from_sunday())
}

/// Everything the orchestrator needs to know about one dispatched hook event.
pub struct GovernanceRequest<'a> {
    /// The hook being dispatched.
    pub hook: HookName,
    /// The acting agent.
    pub agent: AgentId,
    /// The acting agent's parent, for sub-agent sessions.
    pub parent_agent: Option<AgentId>,
    /// Session key.
    pub session_key: String,
    /// Channel, if any.
    pub channel: Option<ChannelId>,
    /// Tool name, for tool-call hooks.
    pub tool_name: Option<&'a str>,
    /// Sensitivity override for `tool_name`, if the host configured one.
    pub tool_sensitivity_override: Option<u32>,
    /// Tool parameters, for tool-call hooks.
    pub tool_params: &'a Map<String, Value>,
    /// Conversation/session metadata.
    pub metadata: &'a Map<String, Value>,
    /// Whether the operation targets something outside the sandbox.
    pub targets_external_scope: bool,
    /// Current time, epoch ms.
    pub now_ms: i64,
}

/// Full decision returned to the hook dispatcher.
#[derive(Debug, Clone)]
pub struct GovernanceDecision {
    /// Whether the operation is allowed.
    pub allow: bool,
    /// Human-readable reason for the decision.
    pub reason: String,
    /// Assessed risk level.
    pub risk_level: RiskLevel,
    /// Assessed risk score, 0..100.
    pub risk_score: f64,
    /// The agent's effective trust score used for this decision.
    pub trust_score: f64,
    /// The agent's effective trust tier used for this decision.
    pub trust_tier: TrustTier,
}

/// Glues trust, risk, frequency, policy, vault, and audit into the
/// per-event pipeline (`spec.md` §4.14).
pub struct GovernanceOrchestrator {
    settings: GovernanceSettings,
    policies: Option<PolicyIndex>,
    trust: Mutex<TrustManager>,
    frequency: Mutex<FrequencyTracker>,
    vault: Vault,
    audit: AuditJournal,
    redactor: Redactor,
    logger: Arc<dyn Logger>,
    clock: Arc<dyn Clock>,
}

impl GovernanceOrchestrator {
    /// Builds an orchestrator. `policies` is `None` when the policy set
    /// failed to compile at load time; every decision then falls back to
    /// `settings.fail_open` and is recorded with verdict `"error-fallback"`.
    #[must_use]
    pub fn new(
        settings: GovernanceSettings,
        policies: Option<PolicyIndex>,
        trust: TrustManager,
        frequency_capacity: usize,
        vault: Vault,
        audit: AuditJournal,
        logger: Arc<dyn Logger>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            settings,
            policies,
            trust: Mutex::new(trust),
            frequency: Mutex::new(FrequencyTracker::new(frequency_capacity)),
            vault,
            audit,
            redactor: Redactor::new(),
            logger,
            clock,
        }
    }

    /// Runs the full pipeline for one dispatched hook event.
    #[allow(clippy::missing_panics_doc, reason = "mutexes are never held across a panic in this module")]
    pub fn evaluate(&self, req: &GovernanceRequest<'_>) -> GovernanceDecision {
        let now_ms = req.now_ms;

        let mut trust = self.trust.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let own_score = trust.score(&req.agent);
        let effective_score =
            req.parent_agent.as_ref().map_or(own_score, |parent| own_score.min(trust.score(parent)));
        let effective_tier = TrustTier::quantize(effective_score);

        let mut frequency = self.frequency.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        frequency.record(FrequencyEvent {
            timestamp_ms: now_ms,
            agent: req.agent.clone(),
            session_key: req.session_key.clone(),
            tool: req.tool_name.map(ToString::to_string),
        });
        let recent_action_count =
            frequency.count(now_ms, RECENT_ACTION_WINDOW_SECONDS, FrequencyScope::Agent, &req.agent, &req.session_key);

        let risk = assess(
            &RiskContext {
                tool_name: req.tool_name,
                tool_sensitivity_override: req.tool_sensitivity_override,
                hour_utc: hour_of_day(now_ms),
                trust_score: effective_score,
                recent_action_count,
                targets_external_scope: req.targets_external_scope,
            },
            &self.settings.risk,
        );

        let Some(policies) = &self.policies else {
            drop(frequency);
            drop(trust);
            let decision = self.fallback_decision(effective_score, effective_tier, &risk);
            self.record_fallback_audit(req, &decision);
            return decision;
        };

        let ctx = PolicyContext {
            hook: req.hook,
            agent: req.agent.clone(),
            parent_agent: req.parent_agent.clone(),
            session_key: req.session_key.clone(),
            channel: req.channel.clone(),
            tool_name: req.tool_name,
            tool_params: req.tool_params,
            metadata: req.metadata,
            trust_score: effective_score,
            trust_tier: effective_tier,
            risk_level: risk.level,
            now_ms,
            hour_utc: hour_of_day(now_ms),
            minute_utc: minute_of_day(now_ms),
            day_of_week: day_of_week(now_ms),
            frequency: &frequency,
        };
        let verdict = policies.evaluate(&ctx);
        drop(frequency);

        if !verdict.allow {
            trust.record_violation(&req.agent, now_ms);
        }
        drop(trust);

        self.record_audit(req, &verdict, &risk, effective_score, effective_tier);

        GovernanceDecision {
            allow: verdict.allow,
            reason: verdict.reason,
            risk_level: risk.level,
            risk_score: risk.score,
            trust_score: effective_score,
            trust_tier: effective_tier,
        }
    }

    /// Post-tool-call feedback: records a success or violation against the
    /// acting agent's trust record. Does not evaluate policy.
    pub fn record_outcome(&self, agent: &AgentId, success: bool, now_ms: i64) {
        let mut trust = self.trust.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if success {
            trust.record_success(agent, now_ms);
        } else {
            trust.record_violation(agent, now_ms);
        }
    }

    /// Periodic maintenance: evicts expired vault entries and flushes any
    /// buffered audit records. Intended to run on a roughly-1Hz ticker
    /// (`spec.md` §4.10, §4.12).
    pub fn tick(&self, now_ms: i64) {
        self.vault.evict_expired(now_ms);
        if let Err(err) = self.audit.flush() {
            self.logger.error(&format!("audit flush failed during tick: {err}"));
        }
    }

    /// Persists the trust store to `path`. Intended to run on
    /// `GovernanceSettings::persist_interval_seconds`.
    pub fn persist_trust(&self, path: &std::path::Path, now_ms: i64) {
        self.trust.lock().unwrap_or_else(std::sync::PoisonError::into_inner).persist(path, now_ms);
    }

    /// Current trust score for `agent`, without recording any event.
    #[must_use]
    pub fn trust_score(&self, agent: &AgentId) -> f64 {
        self.trust.lock().unwrap_or_else(std::sync::PoisonError::into_inner).score(agent)
    }

    /// Current trust tier for `agent`, without recording any event.
    #[must_use]
    pub fn trust_tier(&self, agent: &AgentId) -> TrustTier {
        self.trust.lock().unwrap_or_else(std::sync::PoisonError::into_inner).tier(agent)
    }

    /// Live vault entry count, for diagnostics.
    #[must_use]
    pub fn vault_len(&self) -> usize {
        self.vault.len()
    }

    /// Clock the orchestrator was built with, for callers that schedule
    /// their own ticks.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Borrows the audit journal, for query handlers (`governance`, `sitrep`).
    #[must_use]
    pub fn audit(&self) -> &AuditJournal {
        &self.audit
    }

    fn fallback_decision(&self, trust_score: f64, trust_tier: TrustTier, risk: &RiskAssessment) -> GovernanceDecision {
        GovernanceDecision {
            allow: self.settings.fail_open,
            reason: "policy set failed to compile; using configured fallback".to_string(),
            risk_level: risk.level,
            risk_score: risk.score,
            trust_score,
            trust_tier,
        }
    }

    fn record_audit(
        &self,
        req: &GovernanceRequest<'_>,
        verdict: &PolicyVerdict,
        risk: &RiskAssessment,
        trust_score: f64,
        trust_tier: TrustTier,
    ) {
        let raw_context = json!({ "tool_params": req.tool_params, "metadata": req.metadata });
        let record = build_record(
            AuditRecordId::new_v4(),
            req.now_ms,
            req.agent.clone(),
            req.hook,
            req.tool_name.map(ToString::to_string),
            verdict,
            risk,
            trust_score,
            trust_tier,
            &raw_context,
            &self.redactor,
        );
        self.audit.record(record);
    }

    fn record_fallback_audit(&self, req: &GovernanceRequest<'_>, decision: &GovernanceDecision) {
        let raw_context = json!({ "tool_params": req.tool_params, "metadata": req.metadata });
        let mut minter = StatelessMinter;
        let context = self.redactor.redact_value(&raw_context, &mut minter);
        let record = AuditRecord {
            id: AuditRecordId::new_v4(),
            timestamp_ms: req.now_ms,
            agent: req.agent.clone(),
            hook: req.hook,
            tool_name: req.tool_name.map(ToString::to_string),
            verdict: "error-fallback".to_string(),
            reason: decision.reason.clone(),
            risk_score: decision.risk_score,
            risk_level: decision.risk_level.as_str().to_string(),
            trust_score: decision.trust_score,
            trust_tier: decision.trust_tier.as_str().to_string(),
            policy_ids: vec![],
            controls: vec![],
            context,
        };
        self.audit.record(record);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "unit tests favor unwrap/expect for clarity")]
    use super::*;
    use crate::policy::Effect;
    use crate::policy::RawCondition;
    use crate::policy::RawPolicy;
    use crate::policy::RawRule;
    use sentinel_core::NullLogger;
    use sentinel_providers::clock::FixedClock;

    fn empty_map() -> Map<String, Value> {
        Map::new()
    }

    fn deny_all_policy() -> RawPolicy {
        RawPolicy {
            id: "deny-all".to_string(),
            version: 1,
            enabled: true,
            scope: None,
            priority: 0,
            controls: vec!["A.1.1".to_string()],
            rules: vec![RawRule {
                id: "deny".to_string(),
                conditions: vec![RawCondition::Tool { name: None, params: vec![] }],
                min_trust_tier: None,
                max_trust_tier: None,
                effect: Effect::Deny { reason: "always denied".to_string() },
            }],
        }
    }

    fn orchestrator(policies: Option<PolicyIndex>) -> GovernanceOrchestrator {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(FixedClock(0));
        let audit = AuditJournal::open(
            dir.path().join("audit"),
            sentinel_config::AuditSettings::default(),
            Arc::new(NullLogger),
            clock.clone(),
        )
        .unwrap();
        GovernanceOrchestrator::new(
            GovernanceSettings::default(),
            policies,
            TrustManager::new(sentinel_config::TrustSettings::default(), Arc::new(NullLogger)),
            100,
            Vault::new(&sentinel_config::VaultSettings::default()),
            audit,
            Arc::new(NullLogger),
            clock,
        )
    }

    #[test]
    fn sub_agent_score_is_capped_at_its_parent() {
        let orch = orchestrator(Some(PolicyIndex::build(&[]).unwrap()));
        let parent = AgentId::from("parent");
        let child = AgentId::from("child");
        orch.trust.lock().unwrap().set_score(&parent, 10.0, 0);
        orch.trust.lock().unwrap().set_score(&child, 90.0, 0);

        let req = GovernanceRequest {
            hook: HookName::BeforeToolCall,
            agent: child.clone(),
            parent_agent: Some(parent),
            session_key: "s1".to_string(),
            channel: None,
            tool_name: Some("exec"),
            tool_sensitivity_override: None,
            tool_params: &empty_map(),
            metadata: &empty_map(),
            targets_external_scope: false,
            now_ms: 0,
        };
        let decision = orch.evaluate(&req);
        assert!(decision.trust_score <= 10.0);
    }

    #[test]
    fn a_deny_verdict_records_a_trust_violation() {
        let policies = PolicyIndex::build(&[deny_all_policy()]).unwrap();
        let orch = orchestrator(Some(policies));
        let agent = AgentId::from("atlas");
        let before = orch.trust_score(&agent);

        let req = GovernanceRequest {
            hook: HookName::BeforeToolCall,
            agent: agent.clone(),
            parent_agent: None,
            session_key: "s1".to_string(),
            channel: None,
            tool_name: Some("exec"),
            tool_sensitivity_override: None,
            tool_params: &empty_map(),
            metadata: &empty_map(),
            targets_external_scope: false,
            now_ms: 0,
        };
        let decision = orch.evaluate(&req);
        assert!(!decision.allow);
        assert!(orch.trust_score(&agent) < before);
    }

    #[test]
    fn missing_policy_index_falls_back_to_configured_fail_open() {
        let orch = orchestrator(None);
        let req = GovernanceRequest {
            hook: HookName::BeforeToolCall,
            agent: AgentId::from("atlas"),
            parent_agent: None,
            session_key: "s1".to_string(),
            channel: None,
            tool_name: Some("exec"),
            tool_sensitivity_override: None,
            tool_params: &empty_map(),
            metadata: &empty_map(),
            targets_external_scope: false,
            now_ms: 0,
        };
        let decision = orch.evaluate(&req);
        assert_eq!(decision.allow, GovernanceSettings::default().fail_open);
        orch.audit.flush().unwrap();
        let records = orch.audit.query(&crate::audit::AuditQuery::default());
        assert_eq!(records[0].verdict, "error-fallback");
    }

    #[test]
    fn record_outcome_success_raises_score_and_failure_lowers_it() {
        let orch = orchestrator(Some(PolicyIndex::build(&[]).unwrap()));
        let agent = AgentId::from("atlas");
        orch.record_outcome(&agent, true, 0);
        orch.record_outcome(&agent, true, 1);
        let after_success = orch.trust_score(&agent);
        orch.record_outcome(&agent, false, 2);
        assert!(orch.trust_score(&agent) < after_success);
    }

    #[test]
    fn tick_evicts_expired_vault_entries() {
        let orch = orchestrator(Some(PolicyIndex::build(&[]).unwrap()));
        orch.vault.mint_at("secret", sentinel_core::redact::RedactionCategory::Credential, 0);
        assert_eq!(orch.vault_len(), 1);
        let far_future = sentinel_config::VaultSettings::default().ttl_seconds as i64 * 1000 + 1;
        orch.tick(far_future);
        assert_eq!(orch.vault_len(), 0);
    }
}
