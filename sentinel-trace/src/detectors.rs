// sentinel-trace/src/detectors.rs
// ============================================================================
// Module: Signal Detectors
// Description: Stateless pattern matchers over chains, producing Findings.
// Purpose: Turn raw chain content into a bounded, severity-ranked finding list.
// Dependencies: sentinel_core, std::collections::HashMap
// ============================================================================

//! ## Overview
//! Four built-in detectors (`spec.md` §4.4), each a regex/structural matcher
//! over one [`crate::chain::ConversationChain`] at a time: repeated
//! tool-error, timeout/hang, escalating retry, and credential-in-output.
//! Every finding carries a half-open `[start_idx, end_idx)` event range so
//! the LLM classifier can slice a focused context later. After collection,
//! findings are globally sorted by severity and truncated to a configured
//! maximum.

use std::collections::HashMap;

use sentinel_core::AgentId;
use sentinel_core::ChainId;
use sentinel_core::FindingId;
use sentinel_core::Payload;
use sentinel_core::Redactor;
use sentinel_core::redact::RedactionCategory;
use sentinel_core::redact::StatelessMinter;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use crate::chain::ConversationChain;

/// Severity of a detected signal, ordered low to critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Worth noting, unlikely to need action.
    Low,
    /// Should be reviewed in aggregate.
    Medium,
    /// Likely needs a rule or policy change.
    High,
    /// Needs immediate attention (e.g. a leaked credential).
    Critical,
}

impl Severity {
    /// Lowercase label used in reports and logs.
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

/// Which built-in detector produced a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// The same tool failed repeatedly within a chain.
    RepeatedToolError,
    /// A tool call took implausibly long, suggesting a hang.
    TimeoutOrHang,
    /// Retries of the same tool grew more frequent rather than backing off.
    EscalatingRetry,
    /// A credential pattern was found in tool output.
    CredentialInOutput,
}

impl SignalKind {
    /// Kebab-case label used in reports and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RepeatedToolError => "repeated-tool-error",
            Self::TimeoutOrHang => "timeout-or-hang",
            Self::EscalatingRetry => "escalating-retry",
            Self::CredentialInOutput => "credential-in-output",
        }
    }
}

/// Recommended next action for a classified finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionType {
    /// Add or adjust a soul-level behavioral rule.
    SoulRule,
    /// Add or adjust a governance policy.
    GovernancePolicy,
    /// Add or adjust a Cortex learned pattern.
    CortexPattern,
    /// Needs a human to look at it.
    ManualReview,
}

impl ActionType {
    /// Kebab-case label used in reports and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SoulRule => "soul-rule",
            Self::GovernancePolicy => "governance-policy",
            Self::CortexPattern => "cortex-pattern",
            Self::ManualReview => "manual-review",
        }
    }
}

/// LLM-produced classification of a finding (`spec.md` §4.6).
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Model's stated root cause.
    pub root_cause: String,
    /// Recommended action kind.
    pub action_type: ActionType,
    /// Recommended action detail.
    pub action_text: String,
    /// Model's stated confidence, 0..1.
    pub confidence: f64,
    /// Identifier of the model that produced this classification.
    pub model: String,
}

/// A detector's output: one anomalous window in a chain.
#[derive(Debug, Clone)]
pub struct Finding {
    /// Unique identifier.
    pub id: FindingId,
    /// Chain this finding was detected in.
    pub chain_id: ChainId,
    /// Agent responsible for the chain.
    pub agent: AgentId,
    /// Which detector produced this.
    pub kind: SignalKind,
    /// Severity assigned by the detector.
    pub severity: Severity,
    /// Human-readable summary.
    pub summary: String,
    /// Structured evidence (already redacted where the detector deals with raw content).
    pub evidence: Value,
    /// Half-open `[start, end)` index range into the chain's events.
    pub event_range: (usize, usize),
    /// Filled in by the LLM classifier, if classification ran and succeeded.
    pub classification: Option<Classification>,
}

/// Thresholds shared by all four detectors.
#[derive(Debug, Clone, Copy)]
pub struct DetectorConfig {
    /// Consecutive same-tool errors required to raise a repeated-error finding.
    pub repeated_error_min_count: u32,
    /// Tool-call duration, in milliseconds, considered a hang.
    pub hang_threshold_ms: u64,
    /// Calls to the same tool within the escalation window required to flag escalation.
    pub escalating_retry_min_calls: usize,
    /// Window, in milliseconds, over which escalating calls are counted.
    pub escalating_retry_window_ms: i64,
    /// Maximum findings kept after severity sort and truncation.
    pub max_findings: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            repeated_error_min_count: 3,
            hang_threshold_ms: 30_000,
            escalating_retry_min_calls: 3,
            escalating_retry_window_ms: 60_000,
            max_findings: 200,
        }
    }
}

/// Tracks repeated-failure counts across chains within a run, so a tool
/// that has already failed elsewhere escalates faster than a first offense.
#[derive(Debug, Default)]
pub struct RepeatFailState {
    counts: HashMap<(AgentId, String), u32>,
}

impl RepeatFailState {
    /// Records one failure of `tool` by `agent`, returning the running count.
    pub fn record(&mut self, agent: &AgentId, tool: &str) -> u32 {
        let entry = self.counts.entry((agent.clone(), tool.to_string())).or_insert(0);
        *entry += 1;
        *entry
    }
}

/// Runs all four detectors over `chains`, then globally sorts by severity
/// (critical first) and truncates to `config.max_findings`.
pub fn detect_all(chains: &[ConversationChain], config: &DetectorConfig, state: &mut RepeatFailState) -> Vec<Finding> {
    let mut findings = Vec::new();
    for chain in chains {
        findings.extend(detect_repeated_tool_error(chain, config, state));
        findings.extend(detect_timeout_or_hang(chain, config));
        findings.extend(detect_escalating_retry(chain, config));
        findings.extend(detect_credential_in_output(chain));
    }
    findings.sort_by(|a, b| b.severity.cmp(&a.severity));
    findings.truncate(config.max_findings);
    findings
}

fn new_finding(
    chain: &ConversationChain,
    kind: SignalKind,
    severity: Severity,
    summary: String,
    evidence: Value,
    event_range: (usize, usize),
) -> Finding {
    Finding {
        id: FindingId::new_v4(),
        chain_id: chain.id.clone(),
        agent: chain.agent.clone(),
        kind,
        severity,
        summary,
        evidence,
        event_range,
        classification: None,
    }
}

fn detect_repeated_tool_error(
    chain: &ConversationChain,
    config: &DetectorConfig,
    state: &mut RepeatFailState,
) -> Vec<Finding> {
    let mut findings = Vec::new();
    let mut run_start: Option<usize> = None;
    let mut run_tool: Option<String> = None;
    let mut run_len = 0u32;

    let mut flush = |findings: &mut Vec<Finding>, end_idx: usize, run_start: &mut Option<usize>, run_tool: &mut Option<String>, run_len: &mut u32, state: &mut RepeatFailState| {
        if let (Some(start), Some(tool)) = (*run_start, run_tool.take()) {
            if *run_len >= config.repeated_error_min_count {
                let total = state.record(&chain.agent, &tool);
                let severity = if total >= config.repeated_error_min_count * 2 { Severity::High } else { Severity::Medium };
                findings.push(new_finding(
                    chain,
                    SignalKind::RepeatedToolError,
                    severity,
                    format!("tool `{tool}` failed {run_len} times in a row"),
                    json!({"tool": tool, "consecutiveFailures": run_len, "lifetimeFailures": total}),
                    (start, end_idx),
                ));
            }
        }
        *run_start = None;
        *run_len = 0;
    };

    for (idx, event) in chain.events.iter().enumerate() {
        if let Payload::ToolResult { tool_name: Some(tool_name), tool_error: Some(_), .. } = &event.payload {
            if run_tool.as_deref() == Some(tool_name.as_str()) {
                run_len += 1;
            } else {
                flush(&mut findings, idx, &mut run_start, &mut run_tool, &mut run_len, state);
                run_start = Some(idx);
                run_tool = Some(tool_name.clone());
                run_len = 1;
            }
        } else {
            flush(&mut findings, idx, &mut run_start, &mut run_tool, &mut run_len, state);
        }
    }
    flush(&mut findings, chain.events.len(), &mut run_start, &mut run_tool, &mut run_len, state);
    findings
}

fn detect_timeout_or_hang(chain: &ConversationChain, config: &DetectorConfig) -> Vec<Finding> {
    chain
        .events
        .iter()
        .enumerate()
        .filter_map(|(idx, event)| {
            let Payload::ToolResult { tool_name, duration_ms: Some(duration), .. } = &event.payload else {
                return None;
            };
            if *duration < config.hang_threshold_ms {
                return None;
            }
            Some(new_finding(
                chain,
                SignalKind::TimeoutOrHang,
                if *duration > config.hang_threshold_ms * 4 { Severity::High } else { Severity::Medium },
                format!("tool `{}` took {duration}ms", tool_name.as_deref().unwrap_or("?")),
                json!({"tool": tool_name, "durationMs": duration}),
                (idx, idx + 1),
            ))
        })
        .collect()
}

fn detect_escalating_retry(chain: &ConversationChain, config: &DetectorConfig) -> Vec<Finding> {
    let mut by_tool: HashMap<&str, Vec<usize>> = HashMap::new();
    for (idx, event) in chain.events.iter().enumerate() {
        if let Payload::ToolCall { tool_name, .. } = &event.payload {
            by_tool.entry(tool_name.as_str()).or_default().push(idx);
        }
    }
    let mut findings = Vec::new();
    for (tool, indices) in by_tool {
        if indices.len() < config.escalating_retry_min_calls {
            continue;
        }
        let last_idx = indices[indices.len() - 1];
        let first_ts = chain.events[indices[0]].timestamp_ms;
        let last_ts = chain.events[last_idx].timestamp_ms;
        if last_ts - first_ts > config.escalating_retry_window_ms {
            continue;
        }
        findings.push(new_finding(
            chain,
            SignalKind::EscalatingRetry,
            Severity::Medium,
            format!("tool `{tool}` called {} times within {}ms", indices.len(), last_ts - first_ts),
            json!({"tool": tool, "callCount": indices.len(), "windowMs": last_ts - first_ts}),
            (indices[0], last_idx + 1),
        ));
    }
    findings
}

fn detect_credential_in_output(chain: &ConversationChain) -> Vec<Finding> {
    let redactor = Redactor::new();
    chain
        .events
        .iter()
        .enumerate()
        .filter_map(|(idx, event)| {
            let text = match &event.payload {
                Payload::ToolResult { result: Some(value), .. } => value.to_string(),
                Payload::Message { content, .. } => content.clone(),
                _ => return None,
            };
            let mut minter = StatelessMinter;
            let redacted = redactor.redact_text(&text, &mut minter);
            if !redacted.contains("[REDACTED:credential:") {
                return None;
            }
            Some(new_finding(
                chain,
                SignalKind::CredentialInOutput,
                Severity::Critical,
                "credential pattern found in tool/message output".to_string(),
                json!({"category": RedactionCategory::Credential.label()}),
                (idx, idx + 1),
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "unit tests favor unwrap/expect for clarity")]
    use super::*;
    use sentinel_core::EventKind;
    use sentinel_core::SessionId;
    use crate::chain::BoundaryTag;

    fn chain_with(events: Vec<sentinel_core::NormalizedEvent>) -> ConversationChain {
        ConversationChain {
            id: ChainId::from("deadbeef00000000"),
            session: SessionId::from("s1"),
            agent: AgentId::from("atlas"),
            events,
            boundary: BoundaryTag::Gap,
        }
    }

    fn tool_result(seq: u64, ts: i64, tool: &str, error: Option<&str>, duration_ms: Option<u64>) -> sentinel_core::NormalizedEvent {
        sentinel_core::NormalizedEvent {
            id: format!("e{seq}"),
            timestamp_ms: ts,
            agent: AgentId::from("atlas"),
            session: SessionId::from("s1"),
            kind: EventKind::ToolResult,
            payload: Payload::ToolResult {
                tool_name: Some(tool.to_string()),
                result: None,
                tool_error: error.map(ToString::to_string),
                duration_ms,
            },
            seq,
        }
    }

    #[test]
    fn three_consecutive_errors_raise_a_finding() {
        let chain = chain_with(vec![
            tool_result(1, 0, "exec", Some("fail"), None),
            tool_result(2, 1000, "exec", Some("fail"), None),
            tool_result(3, 2000, "exec", Some("fail"), None),
        ]);
        let mut state = RepeatFailState::default();
        let findings = detect_repeated_tool_error(&chain, &DetectorConfig::default(), &mut state);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, SignalKind::RepeatedToolError);
        assert_eq!(findings[0].event_range, (0, 3));
    }

    #[test]
    fn hang_detector_flags_slow_calls() {
        let chain = chain_with(vec![tool_result(1, 0, "exec", None, Some(45_000))]);
        let findings = detect_timeout_or_hang(&chain, &DetectorConfig::default());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, SignalKind::TimeoutOrHang);
    }

    #[test]
    fn credential_in_tool_result_is_flagged_critical() {
        let mut event = tool_result(1, 0, "exec", None, None);
        event.payload = Payload::ToolResult {
            tool_name: Some("exec".to_string()),
            result: Some(Value::String("sk-ant-REDACTED".to_string())),
            tool_error: None,
            duration_ms: None,
        };
        let chain = chain_with(vec![event.clone(), event]);
        let findings = detect_credential_in_output(&chain);
        assert!(!findings.is_empty());
        assert_eq!(findings[0].severity, Severity::Critical);
    }

    #[test]
    fn detect_all_sorts_by_severity_descending() {
        let chain = chain_with(vec![
            tool_result(1, 0, "exec", Some("fail"), None),
            tool_result(2, 1000, "exec", Some("fail"), None),
            tool_result(3, 2000, "exec", Some("fail"), None),
            tool_result(4, 3000, "exec", None, Some(45_000)),
        ]);
        let mut state = RepeatFailState::default();
        let findings = detect_all(&[chain], &DetectorConfig::default(), &mut state);
        for pair in findings.windows(2) {
            assert!(pair[0].severity >= pair[1].severity);
        }
    }
}
