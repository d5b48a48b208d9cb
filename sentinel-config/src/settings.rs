// sentinel-config/src/settings.rs
// ============================================================================
// Module: Plugin Settings Model
// Description: The config.json shape, with every tunable's spec default.
// Purpose: One serde model instead of ad-hoc mapping lookups per crate.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! [`PluginSettings`] is the full `config.json` shape. Every field carries
//! the default named in `spec.md`'s component descriptions, so a missing
//! file (or a missing nested key, since every level derives `Default` and
//! uses `#[serde(default)]`) bootstraps to the documented behavior rather
//! than an arbitrary placeholder.

use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

/// Top-level `config.json` shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginSettings {
    /// Whether the plugin is active at all.
    pub enabled: bool,
    /// Override for the workspace directory; defaults to
    /// `$HOME/.openclaw/plugins/<plugin>` when absent.
    pub workspace_dir: Option<PathBuf>,
    /// LLM transport settings shared by trace classification and the output validator.
    pub llm: LlmSettings,
    /// Trace Analyzer tunables.
    pub trace: TraceSettings,
    /// Governance Engine tunables.
    pub governance: GovernanceSettings,
    /// Knowledge Engine tunables.
    pub knowledge: KnowledgeSettings,
}

impl Default for PluginSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            workspace_dir: None,
            llm: LlmSettings::default(),
            trace: TraceSettings::default(),
            governance: GovernanceSettings::default(),
            knowledge: KnowledgeSettings::default(),
        }
    }
}

/// LLM Transport settings (`spec.md` §6, §4.6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Base endpoint; requests go to `{endpoint}/chat/completions`.
    pub endpoint: Option<String>,
    /// Optional bearer token.
    pub api_key: Option<String>,
    /// Model name sent in the request body.
    pub model: String,
    /// Triage model name, when different from `model`.
    pub triage_model: Option<String>,
    /// Per-call timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            triage_model: None,
            timeout_ms: 15_000,
        }
    }
}

/// Trace Analyzer settings (`spec.md` §4.3, §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceSettings {
    /// Scheduled run interval, in hours.
    pub interval_hours: u64,
    /// Incremental-run lookback window, in minutes.
    pub incremental_context_window_min: u64,
    /// Inactivity gap, in minutes, that forces a chain split.
    pub inactivity_gap_min: u64,
    /// Hard event-count cap per chain.
    pub max_chain_events: usize,
    /// Number of events to include on each side of a finding for deep analysis.
    pub classify_context_radius: usize,
}

impl Default for TraceSettings {
    fn default() -> Self {
        Self {
            interval_hours: 6,
            incremental_context_window_min: 15,
            inactivity_gap_min: 30,
            max_chain_events: 1000,
            classify_context_radius: 10,
        }
    }
}

/// Governance Engine settings, combining §4.7–§4.14's individually
/// documented defaults into one struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceSettings {
    /// Soft per-call policy-evaluation time budget, in microseconds.
    pub max_eval_us: u64,
    /// Trust persistence interval, in seconds.
    pub persist_interval_seconds: u64,
    /// Whether to fail open (allow) or fail closed (deny) when evaluation errors.
    pub fail_open: bool,
    pub trust: TrustSettings,
    pub risk: RiskSettings,
    pub vault: VaultSettings,
    pub audit: AuditSettings,
    pub output_validator: OutputValidatorSettings,
}

impl Default for GovernanceSettings {
    fn default() -> Self {
        Self {
            max_eval_us: 5_000,
            persist_interval_seconds: 60,
            fail_open: false,
            trust: TrustSettings::default(),
            risk: RiskSettings::default(),
            vault: VaultSettings::default(),
            audit: AuditSettings::default(),
            output_validator: OutputValidatorSettings::default(),
        }
    }
}

/// Trust Manager settings (`spec.md` §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustSettings {
    /// Default score assigned to a newly seen agent.
    pub default_score: f64,
    /// Bounded history ring capacity.
    pub history_capacity: usize,
    /// Score weight per recorded success.
    pub weight_success: f64,
    /// Score weight (subtracted) per recorded violation.
    pub weight_violation: f64,
    /// Score weight per day of age.
    pub weight_age: f64,
    /// Score weight per clean streak entry.
    pub weight_clean_streak: f64,
    /// Days of inactivity before decay is applied.
    pub decay_inactivity_days: f64,
    /// Multiplicative decay rate applied after inactivity.
    pub decay_rate: f64,
}

impl Default for TrustSettings {
    fn default() -> Self {
        Self {
            default_score: 50.0,
            history_capacity: 100,
            weight_success: 1.0,
            weight_violation: 5.0,
            weight_age: 0.1,
            weight_clean_streak: 0.2,
            decay_inactivity_days: 30.0,
            decay_rate: 0.95,
        }
    }
}

/// Risk Assessor factor weights (`spec.md` §4.7, all five built-in factors).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskSettings {
    /// Weight of the tool-sensitivity factor.
    pub weight_tool_sensitivity: u32,
    /// Default tool sensitivity when not overridden.
    pub default_tool_sensitivity: u32,
    /// Weight of the time-of-day factor.
    pub weight_time_of_day: u32,
    /// Weight of the trust-deficit factor.
    pub weight_trust_deficit: u32,
    /// Weight of the frequency factor.
    pub weight_frequency: u32,
    /// Recent-action count at which the frequency factor saturates.
    pub frequency_saturation: u32,
    /// Weight of the target-scope factor.
    pub weight_target_scope: u32,
}

impl Default for RiskSettings {
    fn default() -> Self {
        Self {
            weight_tool_sensitivity: 30,
            default_tool_sensitivity: 30,
            weight_time_of_day: 15,
            weight_trust_deficit: 20,
            weight_frequency: 15,
            frequency_saturation: 20,
            weight_target_scope: 20,
        }
    }
}

/// Redaction Vault settings (`spec.md` §4.10).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultSettings {
    /// Entry time-to-live, in seconds.
    pub ttl_seconds: u64,
    /// Eviction ticker interval, in seconds.
    pub evict_interval_seconds: u64,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self { ttl_seconds: 3600, evict_interval_seconds: 300 }
    }
}

/// Audit Journal settings (`spec.md` §4.11).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditSettings {
    /// Days of shard history retained before pruning.
    pub retention_days: u32,
    /// Record count that forces an immediate flush rather than waiting for the 1Hz tick.
    pub immediate_flush_threshold: usize,
    /// Default query result limit.
    pub default_query_limit: usize,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self { retention_days: 90, immediate_flush_threshold: 100, default_query_limit: 100 }
    }
}

/// Output Validator settings (`spec.md` §4.13).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputValidatorSettings {
    /// Trust score at or above which a contradiction only flags with a note.
    pub flag_above: f64,
    /// Trust score below which a contradiction blocks outright.
    pub block_below: f64,
    /// Policy applied to unverified (not contradicted, not confirmed) claims.
    pub unverified_claim_policy: ClaimPolicy,
    /// Policy applied to self-referential claims lacking a registry entry.
    pub self_referential_policy: ClaimPolicy,
}

impl Default for OutputValidatorSettings {
    fn default() -> Self {
        Self {
            flag_above: 60.0,
            block_below: 40.0,
            unverified_claim_policy: ClaimPolicy::Flag,
            self_referential_policy: ClaimPolicy::Flag,
        }
    }
}

/// How the Output Validator should treat a claim it could not confirm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimPolicy {
    /// Let the claim through untouched.
    Ignore,
    /// Let the claim through but flag it.
    Flag,
    /// Block the output.
    Block,
}

/// Fact Store settings (`spec.md` §4.12).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeSettings {
    /// Maximum retained facts before pruning.
    pub max_facts: usize,
    /// Debounce window before a persist write is flushed, in milliseconds.
    pub persist_debounce_ms: u64,
    /// Relevance boost applied on touch, as a fraction of the remaining distance to 1.0.
    pub relevance_boost: f64,
    /// Relevance floor applied by `decayFacts`.
    pub decay_floor: f64,
}

impl Default for KnowledgeSettings {
    fn default() -> Self {
        Self { max_facts: 5000, persist_debounce_ms: 15_000, relevance_boost: 0.5, decay_floor: 0.1 }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "unit tests favor unwrap/expect for clarity")]
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let settings = PluginSettings::default();
        assert!(settings.enabled);
        assert_eq!(settings.trace.inactivity_gap_min, 30);
        assert_eq!(settings.governance.vault.ttl_seconds, 3600);
        assert_eq!(settings.knowledge.persist_debounce_ms, 15_000);
    }

    #[test]
    fn missing_fields_deserialize_to_defaults() {
        let settings: PluginSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, PluginSettings::default());
    }

    #[test]
    fn partial_override_keeps_remaining_defaults() {
        let settings: PluginSettings =
            serde_json::from_str(r#"{"governance":{"audit":{"retention_days":30}}}"#).unwrap();
        assert_eq!(settings.governance.audit.retention_days, 30);
        assert_eq!(settings.governance.audit.default_query_limit, 100);
    }
}
