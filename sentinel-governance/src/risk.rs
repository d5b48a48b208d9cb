// sentinel-governance/src/risk.rs
// ============================================================================
// Module: Risk Assessor
// Description: Weighted scoring of a policy-evaluation context.
// Purpose: Feed both the audit trail and risk-gated policy conditions a 0..100 score.
// Dependencies: sentinel_config
// ============================================================================

//! ## Overview
//! Five clamped factor values are summed, the total is clamped to 0..100,
//! and the result is mapped to a level by quartile (`spec.md` §4.8, §3).
//! Each factor's weight doubles as its contribution cap: a factor never
//! contributes more than its configured weight.

use sentinel_config::RiskSettings;
use serde::Deserialize;
use serde::Serialize;

/// Coarse banding of the numeric risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// score < 25
    Low,
    /// score < 50
    Medium,
    /// score < 75
    High,
    /// score <= 100
    Critical,
}

impl RiskLevel {
    /// Quantizes a 0..100 score into its quartile level.
    #[must_use]
    pub fn quantize(score: f64) -> Self {
        if score < 25.0 {
            Self::Low
        } else if score < 50.0 {
            Self::Medium
        } else if score < 75.0 {
            Self::High
        } else {
            Self::Critical
        }
    }

    /// Lowercase label used in audit records and policy conditions.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One weighted contribution to the total risk score.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskFactor {
    /// Stable factor name (e.g. `"tool-sensitivity"`).
    pub name: &'static str,
    /// Configured cap for this factor's contribution.
    pub weight: f64,
    /// Actual contribution, always in `0.0..=weight`.
    pub value: f64,
    /// Human-readable explanation for audit display.
    pub description: String,
}

/// Full breakdown produced by [`assess`].
#[derive(Debug, Clone, PartialEq)]
pub struct RiskAssessment {
    /// Total score, 0..100.
    pub score: f64,
    /// Quartile banding of `score`.
    pub level: RiskLevel,
    /// Per-factor breakdown, in evaluation order.
    pub factors: Vec<RiskFactor>,
}

/// Inputs the five built-in risk factors read (`spec.md` §3).
#[derive(Debug, Clone, Copy)]
pub struct RiskContext<'a> {
    /// Tool being invoked, if this is a tool-call context.
    pub tool_name: Option<&'a str>,
    /// Sensitivity override for `tool_name`, if configured; falls back to
    /// `RiskSettings::default_tool_sensitivity`.
    pub tool_sensitivity_override: Option<u32>,
    /// Hour of day, UTC, 0..24.
    pub hour_utc: u32,
    /// The agent's current trust score, 0..100.
    pub trust_score: f64,
    /// Count of recent actions from the frequency tracker.
    pub recent_action_count: u32,
    /// Whether the operation targets something outside the sandbox (a
    /// `message-to` recipient, or a non-sandboxed host).
    pub targets_external_scope: bool,
}

/// Computes the five-factor risk breakdown (`spec.md` §4.8).
#[must_use]
pub fn assess(ctx: &RiskContext<'_>, settings: &RiskSettings) -> RiskAssessment {
    let tool_weight = f64::from(settings.weight_tool_sensitivity);
    let tool_raw = f64::from(ctx.tool_sensitivity_override.unwrap_or(settings.default_tool_sensitivity));
    let tool_value = tool_raw.clamp(0.0, tool_weight);
    let tool_factor = RiskFactor {
        name: "tool-sensitivity",
        weight: tool_weight,
        value: tool_value,
        description: ctx.tool_name.map_or_else(
            || "no tool in context".to_string(),
            |name| format!("tool \"{name}\" sensitivity {tool_raw:.0}"),
        ),
    };

    let off_hours = ctx.hour_utc < 8 || ctx.hour_utc >= 23;
    let time_weight = f64::from(settings.weight_time_of_day);
    let time_factor = RiskFactor {
        name: "time-of-day",
        weight: time_weight,
        value: if off_hours { time_weight } else { 0.0 },
        description: if off_hours {
            format!("off-hours (hour {})", ctx.hour_utc)
        } else {
            format!("within business hours (hour {})", ctx.hour_utc)
        },
    };

    let trust_weight = f64::from(settings.weight_trust_deficit);
    let deficit_fraction = ((100.0 - ctx.trust_score) / 100.0).clamp(0.0, 1.0);
    let trust_factor = RiskFactor {
        name: "trust-deficit",
        weight: trust_weight,
        value: trust_weight * deficit_fraction,
        description: format!("trust score {:.1}", ctx.trust_score),
    };

    let freq_weight = f64::from(settings.weight_frequency);
    let saturation = f64::from(settings.frequency_saturation).max(1.0);
    let freq_fraction = (f64::from(ctx.recent_action_count) / saturation).clamp(0.0, 1.0);
    let freq_factor = RiskFactor {
        name: "frequency",
        weight: freq_weight,
        value: freq_weight * freq_fraction,
        description: format!("{} recent actions", ctx.recent_action_count),
    };

    let scope_weight = f64::from(settings.weight_target_scope);
    let scope_factor = RiskFactor {
        name: "target-scope",
        weight: scope_weight,
        value: if ctx.targets_external_scope { scope_weight } else { 0.0 },
        description: if ctx.targets_external_scope { "external target".to_string() } else { "sandboxed target".to_string() },
    };

    let factors = vec![tool_factor, time_factor, trust_factor, freq_factor, scope_factor];
    let score = factors.iter().map(|f| f.value).sum::<f64>().clamp(0.0, 100.0);
    let level = RiskLevel::quantize(score);
    RiskAssessment { score, level, factors }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "unit tests favor unwrap/expect for clarity")]
    use super::*;

    fn base_ctx() -> RiskContext<'static> {
        RiskContext {
            tool_name: None,
            tool_sensitivity_override: None,
            hour_utc: 12,
            trust_score: 100.0,
            recent_action_count: 0,
            targets_external_scope: false,
        }
    }

    #[test]
    fn quiet_daytime_context_scores_low() {
        let assessment = assess(&base_ctx(), &RiskSettings::default());
        assert!(assessment.score < 40.0);
        assert_eq!(assessment.level, RiskLevel::Low);
    }

    #[test]
    fn off_hours_adds_the_full_time_weight() {
        let mut ctx = base_ctx();
        ctx.hour_utc = 23;
        let assessment = assess(&ctx, &RiskSettings::default());
        let time_factor = assessment.factors.iter().find(|f| f.name == "time-of-day").unwrap();
        assert_eq!(time_factor.value, 15.0);
    }

    #[test]
    fn frequency_saturates_at_the_configured_count() {
        let mut ctx = base_ctx();
        ctx.recent_action_count = 1000;
        let assessment = assess(&ctx, &RiskSettings::default());
        let freq_factor = assessment.factors.iter().find(|f| f.name == "frequency").unwrap();
        assert_eq!(freq_factor.value, 15.0);
    }

    #[test]
    fn zero_trust_maximizes_the_deficit_factor() {
        let mut ctx = base_ctx();
        ctx.trust_score = 0.0;
        let assessment = assess(&ctx, &RiskSettings::default());
        let trust_factor = assessment.factors.iter().find(|f| f.name == "trust-deficit").unwrap();
        assert_eq!(trust_factor.value, 20.0);
    }

    #[test]
    fn combining_every_factor_reaches_critical() {
        let ctx = RiskContext {
            tool_name: Some("exec"),
            tool_sensitivity_override: Some(100),
            hour_utc: 2,
            trust_score: 0.0,
            recent_action_count: 100,
            targets_external_scope: true,
        };
        let assessment = assess(&ctx, &RiskSettings::default());
        assert_eq!(assessment.score, 100.0);
        assert_eq!(assessment.level, RiskLevel::Critical);
    }
}
