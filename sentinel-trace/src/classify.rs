// sentinel-trace/src/classify.rs
// ============================================================================
// Module: LLM Classifier
// Description: Triage + deep analysis of findings over an OpenAI-compatible HTTP transport.
// Purpose: Turn a structural Finding into a root cause and a recommended action.
// Dependencies: sentinel_providers, sentinel_core, sentinel_config
// ============================================================================

//! ## Overview
//! Two-step per `spec.md` §4.6. **Triage**: when a triage model is
//! configured, each finding gets a short keep/drop prompt with a severity
//! hint; any parse or transport failure conservatively keeps the finding.
//! **Deep analysis**: the chain slice around the finding's event range
//! (default ±10 events) is rendered to a plain-text transcript and handed
//! to the primary model alongside the signal summary, expecting
//! `{rootCause,actionType,actionText,confidence}`; an unknown `actionType`
//! is coerced to `manual-review`. Transport failure simply leaves the
//! finding unclassified — it is never dropped for that reason.

use sentinel_config::LlmSettings;
use sentinel_core::Redactor;
use sentinel_core::redact::StatelessMinter;
use sentinel_providers::llm::ChatMessage;
use sentinel_providers::llm::LlmClient;
use sentinel_providers::llm::LlmRequest;
use serde::Deserialize;

use crate::chain::ConversationChain;
use crate::detectors::ActionType;
use crate::detectors::Classification;
use crate::detectors::Finding;
use crate::detectors::Severity;

const MAX_VALUE_CHARS: usize = 500;

/// Per-analyzer LLM override, merged field-by-field over the global config
/// (`spec.md` §4.6 "never whole-object replace").
#[derive(Debug, Clone, Default)]
pub struct ClassifierOverride {
    /// Overrides `endpoint`, when set.
    pub endpoint: Option<String>,
    /// Overrides `api_key`, when set.
    pub api_key: Option<String>,
    /// Overrides `model`, when set.
    pub model: Option<String>,
    /// Overrides `triage_model`, when set.
    pub triage_model: Option<String>,
    /// Overrides `timeout_ms`, when set.
    pub timeout_ms: Option<u64>,
}

/// Field-by-field merge of `over` atop `base`. Never replaces the whole struct.
#[must_use]
pub fn merge_llm_settings(base: &LlmSettings, over: &ClassifierOverride) -> LlmSettings {
    LlmSettings {
        endpoint: over.endpoint.clone().or_else(|| base.endpoint.clone()),
        api_key: over.api_key.clone().or_else(|| base.api_key.clone()),
        model: over.model.clone().unwrap_or_else(|| base.model.clone()),
        triage_model: over.triage_model.clone().or_else(|| base.triage_model.clone()),
        timeout_ms: over.timeout_ms.unwrap_or(base.timeout_ms),
    }
}

#[derive(Debug, Deserialize)]
struct TriageReply {
    keep: bool,
    severity: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeepAnalysisReply {
    #[serde(rename = "rootCause")]
    root_cause: String,
    #[serde(rename = "actionType")]
    action_type: String,
    #[serde(rename = "actionText")]
    action_text: String,
    confidence: f64,
}

fn parse_action_type(raw: &str) -> ActionType {
    match raw {
        "soul-rule" => ActionType::SoulRule,
        "governance-policy" => ActionType::GovernancePolicy,
        "cortex-pattern" => ActionType::CortexPattern,
        _ => ActionType::ManualReview,
    }
}

fn parse_severity_hint(raw: &str) -> Option<Severity> {
    match raw {
        "low" => Some(Severity::Low),
        "medium" => Some(Severity::Medium),
        "high" => Some(Severity::High),
        "critical" => Some(Severity::Critical),
        _ => None,
    }
}

/// Runs the triage step over `finding`, applying any severity hint in
/// place. Returns `true` (keep) unless the triage model both replies and
/// replies with `keep: false`; any transport or parse failure keeps the
/// finding.
pub async fn triage(client: &LlmClient, settings: &LlmSettings, finding: &mut Finding) -> bool {
    let Some(triage_model) = &settings.triage_model else { return true };
    let Some(endpoint) = &settings.endpoint else { return true };
    let prompt = format!(
        "A monitoring system detected this signal in an agent's activity. Reply with JSON \
         {{\"keep\":boolean,\"severity\":string}} saying whether this is worth a human's attention.\n\n\
         kind: {}\nseverity: {}\nsummary: {}",
        finding.kind.as_str(),
        finding.severity.as_str(),
        finding.summary
    );
    let mut request =
        LlmRequest::with_defaults(endpoint, triage_model, vec![ChatMessage::system(
            "You triage monitoring signals. Reply with JSON only.",
        ), ChatMessage::user(prompt)]);
    request.api_key.clone_from(&settings.api_key);
    request.timeout = std::time::Duration::from_millis(settings.timeout_ms);

    let Ok(raw) = client.complete(&request).await else { return true };
    match serde_json::from_str::<TriageReply>(&raw) {
        Ok(reply) => {
            if let Some(hint) = reply.severity.as_deref().and_then(parse_severity_hint) {
                finding.severity = hint;
            }
            reply.keep
        }
        Err(_) => true,
    }
}

/// Renders the chain slice `[start, end)` (already expected to be
/// redacted) into a plain-text transcript, one line per event, truncating
/// any single value to [`MAX_VALUE_CHARS`].
#[must_use]
pub fn render_transcript(chain: &ConversationChain, start: usize, end: usize) -> String {
    let mut lines = Vec::new();
    for event in chain.events.iter().take(end).skip(start) {
        let line = match &event.payload {
            sentinel_core::Payload::Message { content, role } => {
                format!("[{}] {}", role.as_deref().unwrap_or("message"), truncate(content))
            }
            sentinel_core::Payload::ToolCall { tool_name, params } => {
                format!("[tool_call] {tool_name}({})", truncate(&serde_json::to_string(params).unwrap_or_default()))
            }
            sentinel_core::Payload::ToolResult { tool_name, result, tool_error, .. } => {
                let body = tool_error.clone().unwrap_or_else(|| {
                    result.as_ref().map(std::string::ToString::to_string).unwrap_or_default()
                });
                format!("[tool_result] {}: {}", tool_name.as_deref().unwrap_or("?"), truncate(&body))
            }
            sentinel_core::Payload::Lifecycle { detail } => {
                format!("[lifecycle:{}] {}", event.kind, detail.as_deref().unwrap_or(""))
            }
        };
        lines.push(line);
    }
    lines.join("\n")
}

fn truncate(value: &str) -> String {
    if value.chars().count() <= MAX_VALUE_CHARS { value.to_string() } else { value.chars().take(MAX_VALUE_CHARS).collect() }
}

/// Context radius (events on each side of the finding's range) used when
/// no analyzer-specific override is given.
pub const DEFAULT_CONTEXT_RADIUS: usize = 10;

/// Runs deep analysis for one finding: redacts the surrounding chain
/// slice, renders a transcript, and asks the primary model for a
/// classification. Returns `None` on any transport or parse failure —
/// the finding simply survives unclassified.
pub async fn classify(
    client: &LlmClient,
    settings: &LlmSettings,
    chain: &ConversationChain,
    finding: &Finding,
    context_radius: usize,
) -> Option<Classification> {
    let endpoint = settings.endpoint.as_ref()?;
    let (start, end) = finding.event_range;
    let slice_start = start.saturating_sub(context_radius);
    let slice_end = (end + context_radius).min(chain.events.len());
    let transcript = render_transcript(chain, slice_start, slice_end);
    let redactor = Redactor::new();
    let mut minter = StatelessMinter;
    let redacted_transcript = redactor.redact_text(&transcript, &mut minter);

    let prompt = format!(
        "A detector flagged this signal in an agent's activity. Reply with JSON \
         {{\"rootCause\":string,\"actionType\":string (one of soul-rule, governance-policy, \
         cortex-pattern, manual-review),\"actionText\":string,\"confidence\":number 0..1}}.\n\n\
         signal: {}\n\ntranscript:\n{redacted_transcript}",
        finding.summary
    );
    let mut request = LlmRequest::with_defaults(endpoint, &settings.model, vec![
        ChatMessage::system("You analyze agent failure signals. Reply with JSON only."),
        ChatMessage::user(prompt),
    ]);
    request.api_key.clone_from(&settings.api_key);
    request.timeout = std::time::Duration::from_millis(settings.timeout_ms);

    let raw = client.complete(&request).await.ok()?;
    let reply: DeepAnalysisReply = serde_json::from_str(&raw).ok()?;
    Some(Classification {
        root_cause: reply.root_cause,
        action_type: parse_action_type(&reply.action_type),
        action_text: reply.action_text,
        confidence: reply.confidence.clamp(0.0, 1.0),
        model: settings.model.clone(),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "unit tests favor unwrap/expect for clarity")]
    use super::*;
    use sentinel_core::AgentId;
    use sentinel_core::ChainId;
    use sentinel_core::EventKind;
    use sentinel_core::NormalizedEvent;
    use sentinel_core::Payload;
    use sentinel_core::SessionId;

    use crate::chain::BoundaryTag;
    use crate::detectors::Finding;
    use crate::detectors::Severity;
    use crate::detectors::SignalKind;

    #[test]
    fn merge_overrides_only_the_set_fields() {
        let base = LlmSettings::default();
        let over = ClassifierOverride { model: Some("gpt-4o".to_string()), ..ClassifierOverride::default() };
        let merged = merge_llm_settings(&base, &over);
        assert_eq!(merged.model, "gpt-4o");
        assert_eq!(merged.timeout_ms, base.timeout_ms);
    }

    #[test]
    fn unknown_action_type_coerces_to_manual_review() {
        assert_eq!(parse_action_type("something-weird"), ActionType::ManualReview);
        assert_eq!(parse_action_type("soul-rule"), ActionType::SoulRule);
    }

    #[test]
    fn transcript_truncates_long_values() {
        let long = "x".repeat(900);
        let event = NormalizedEvent {
            id: "e1".to_string(),
            timestamp_ms: 0,
            agent: AgentId::from("atlas"),
            session: SessionId::from("s1"),
            kind: EventKind::MessageIn,
            payload: Payload::Message { content: long, role: Some("user".to_string()) },
            seq: 1,
        };
        let chain = ConversationChain {
            id: ChainId::from("deadbeef00000000"),
            session: SessionId::from("s1"),
            agent: AgentId::from("atlas"),
            events: vec![event],
            boundary: BoundaryTag::Gap,
        };
        let transcript = render_transcript(&chain, 0, 1);
        assert!(transcript.len() < 900);
    }

    #[tokio::test]
    async fn classify_with_no_endpoint_configured_returns_none() {
        let client = LlmClient::new();
        let settings = LlmSettings::default();
        let chain = ConversationChain {
            id: ChainId::from("deadbeef00000000"),
            session: SessionId::from("s1"),
            agent: AgentId::from("atlas"),
            events: Vec::new(),
            boundary: BoundaryTag::Gap,
        };
        let finding = Finding {
            id: sentinel_core::FindingId::new_v4(),
            chain_id: chain.id.clone(),
            agent: chain.agent.clone(),
            kind: SignalKind::TimeoutOrHang,
            severity: Severity::Medium,
            summary: "slow call".to_string(),
            evidence: serde_json::json!({}),
            event_range: (0, 0),
            classification: None,
        };
        let result = classify(&client, &settings, &chain, &finding, DEFAULT_CONTEXT_RADIUS).await;
        assert!(result.is_none());
    }
}
