// sentinel-core/src/event.rs
// ============================================================================
// Module: Event Normalizer
// Description: Converts two raw wire schemas into one Normalized Event.
// Purpose: Give every downstream component a single, stable event shape.
// Dependencies: serde_json, crate::ids
// ============================================================================

//! ## Overview
//! Two event-store schemas are observed in the wild ("schema A", a flat
//! `type`/`ts` shape, and "schema B", a `conversation.*`-prefixed shape used
//! by session-sync transports). [`normalize`] collapses both into
//! [`NormalizedEvent`] so nothing downstream ever inspects a raw payload
//! again (`spec.md` §4.1, §9 "Dynamic mappings → tagged variants").
//!
//! Per the richer of the two normalizer variants noted in `spec.md` §9,
//! schema-A `tool-result` extraction additionally probes
//! `result.details.{error,status,exitCode}` and `result.isError`.

use serde_json::Value;

use crate::ids::AgentId;
use crate::ids::SessionId;

// ============================================================================
// SECTION: Canonical Event Kind
// ============================================================================

/// Canonical event kind, collapsed from either wire schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Inbound user/system message.
    MessageIn,
    /// Outbound assistant message.
    MessageOut,
    /// A tool invocation was requested.
    ToolCall,
    /// A tool invocation completed (success or error).
    ToolResult,
    /// A session began.
    SessionStart,
    /// A session ended.
    SessionEnd,
    /// A run began.
    RunStart,
    /// A run ended.
    RunEnd,
    /// A run failed.
    RunError,
}

impl EventKind {
    /// Kebab-case label matching the canonical kind names in `spec.md` §3.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MessageIn => "message-in",
            Self::MessageOut => "message-out",
            Self::ToolCall => "tool-call",
            Self::ToolResult => "tool-result",
            Self::SessionStart => "session-start",
            Self::SessionEnd => "session-end",
            Self::RunStart => "run-start",
            Self::RunEnd => "run-end",
            Self::RunError => "run-error",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Normalized Payload
// ============================================================================

/// Normalized payload union. Downstream code matches on this, never on the
/// raw source map.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Message content and role, for `MessageIn`/`MessageOut`.
    Message {
        /// Message text.
        content: String,
        /// Speaker role, when the source reports one.
        role: Option<String>,
    },
    /// Tool invocation request, for `ToolCall`.
    ToolCall {
        /// Name of the invoked tool.
        tool_name: String,
        /// Tool parameters as reported by the source.
        params: serde_json::Map<String, Value>,
    },
    /// Tool invocation outcome, for `ToolResult`.
    ToolResult {
        /// Name of the tool, when the source reports one.
        tool_name: Option<String>,
        /// Raw result value, when present and not an error.
        result: Option<Value>,
        /// First 500 chars of an error message, if the result represents a failure.
        tool_error: Option<String>,
        /// Wall-clock duration of the call, in milliseconds.
        duration_ms: Option<u64>,
    },
    /// Session/run lifecycle marker, for the remaining kinds.
    Lifecycle {
        /// Free-form detail carried by the source (e.g. a run-error reason).
        detail: Option<String>,
    },
}

// ============================================================================
// SECTION: Normalized Event
// ============================================================================

/// A single normalized event, stable across both wire schemas.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEvent {
    /// Source-assigned identifier, when one was present; otherwise derived
    /// from `(session, seq)`.
    pub id: String,
    /// Millisecond timestamp.
    pub timestamp_ms: i64,
    /// Agent label.
    pub agent: AgentId,
    /// Canonicalized session label.
    pub session: SessionId,
    /// Canonical event kind.
    pub kind: EventKind,
    /// Normalized payload.
    pub payload: Payload,
    /// Monotonic sequence number from the source log.
    pub seq: u64,
}

/// Why a raw record did not become a [`NormalizedEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No timestamp field was present.
    MissingTimestamp,
    /// The `type`/`kind` field did not map to a canonical kind.
    UnknownKind,
}

// ============================================================================
// SECTION: Session Canonicalization
// ============================================================================

/// Canonicalizes a session label: a prefix of `agent:NAME:subagent:CHILD:…`
/// is flattened to `NAME`, or to the innermost sub-agent name if the
/// `subagent` marker appears.
#[must_use]
pub fn canonicalize_session_label(raw: &str) -> SessionId {
    let parts: Vec<&str> = raw.split(':').collect();
    if parts.first() != Some(&"agent") || parts.len() < 2 {
        return SessionId::from(raw);
    }
    let root = parts[1];
    let mut innermost = root;
    let mut i = 2;
    while i + 1 < parts.len() {
        if parts[i] == "subagent" {
            innermost = parts[i + 1];
        }
        i += 1;
    }
    SessionId::from(innermost)
}

// ============================================================================
// SECTION: Schema Detection
// ============================================================================

fn is_schema_b(raw: &Value) -> bool {
    let kind_is_conversation = raw
        .get("type")
        .and_then(Value::as_str)
        .is_some_and(|k| k.starts_with("conversation."));
    let meta_is_session_sync = raw
        .pointer("/meta/source")
        .and_then(Value::as_str)
        .is_some_and(|s| s == "session-sync");
    kind_is_conversation || meta_is_session_sync
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Converts a raw transport record into a [`NormalizedEvent`], or reports why
/// it should be skipped.
///
/// # Errors
///
/// Returns `Err(SkipReason)` when the record has no timestamp or does not
/// map to a known canonical kind; callers should log and drop the record.
pub fn normalize(raw: &Value, seq: u64) -> Result<NormalizedEvent, SkipReason> {
    if is_schema_b(raw) { normalize_schema_b(raw, seq) } else { normalize_schema_a(raw, seq) }
}

fn get_str<'a>(raw: &'a Value, key: &str) -> Option<&'a str> {
    raw.get(key).and_then(Value::as_str)
}

fn get_i64(raw: &Value, key: &str) -> Option<i64> {
    raw.get(key).and_then(Value::as_i64)
}

fn event_id(raw: &Value, session: &SessionId, seq: u64) -> String {
    get_str(raw, "id").map_or_else(|| format!("{session}:{seq}"), ToString::to_string)
}

fn normalize_schema_a(raw: &Value, seq: u64) -> Result<NormalizedEvent, SkipReason> {
    let ts = get_i64(raw, "ts").ok_or(SkipReason::MissingTimestamp)?;
    let agent = AgentId::from(get_str(raw, "agent").unwrap_or_default());
    let session = canonicalize_session_label(get_str(raw, "session").unwrap_or_default());
    let kind_str = get_str(raw, "type").ok_or(SkipReason::UnknownKind)?;
    let (kind, payload) = match kind_str {
        "message.in" | "message.out" => {
            let content = get_str(raw, "content").unwrap_or_default().to_string();
            let role = get_str(raw, "role").map(ToString::to_string);
            let kind = if kind_str == "message.in" { EventKind::MessageIn } else { EventKind::MessageOut };
            (kind, Payload::Message { content, role })
        }
        "tool.call" => {
            let tool_name = get_str(raw, "toolName").unwrap_or_default().to_string();
            let params = raw.get("params").and_then(Value::as_object).cloned().unwrap_or_default();
            (EventKind::ToolCall, Payload::ToolCall { tool_name, params })
        }
        "tool.result" => {
            let tool_name = get_str(raw, "toolName").map(ToString::to_string);
            let duration_ms = raw.get("durationMs").and_then(Value::as_u64);
            let result = raw.get("result").cloned();
            let tool_error = schema_a_tool_error(raw);
            (EventKind::ToolResult, Payload::ToolResult { tool_name, result, tool_error, duration_ms })
        }
        "session.start" => (EventKind::SessionStart, Payload::Lifecycle { detail: None }),
        "session.end" => (EventKind::SessionEnd, Payload::Lifecycle { detail: None }),
        "run.start" => (EventKind::RunStart, Payload::Lifecycle { detail: None }),
        "run.end" => (EventKind::RunEnd, Payload::Lifecycle { detail: None }),
        "run.error" => {
            let detail = get_str(raw, "reason").map(ToString::to_string);
            (EventKind::RunError, Payload::Lifecycle { detail })
        }
        _ => return Err(SkipReason::UnknownKind),
    };
    let id = event_id(raw, &session, seq);
    Ok(NormalizedEvent { id, timestamp_ms: ts, agent, session, kind, payload, seq })
}

/// Extracts a schema-A tool-result error, probing the richer nested shape
/// (`spec.md` §4.1, §9 first Open Question): `result.details.error`,
/// `result.details.status == "error"`, `result.details.exitCode > 0`, and
/// top-level `result.isError`.
fn schema_a_tool_error(raw: &Value) -> Option<String> {
    let result = raw.get("result")?;
    let details = result.get("details");
    let has_details_error = details.and_then(|d| d.get("error")).is_some();
    let status_is_error =
        details.and_then(|d| d.get("status")).and_then(Value::as_str).is_some_and(|s| s == "error");
    let exit_code_nonzero =
        details.and_then(|d| d.get("exitCode")).and_then(Value::as_i64).is_some_and(|c| c > 0);
    let is_error_flag = result.get("isError").and_then(Value::as_bool).unwrap_or(false);
    if !(has_details_error || status_is_error || exit_code_nonzero || is_error_flag) {
        return None;
    }
    let text = details
        .and_then(|d| d.get("error"))
        .and_then(Value::as_str)
        .or_else(|| result.get("content").and_then(Value::as_str))
        .or_else(|| result.get("text").and_then(Value::as_str))
        .unwrap_or("tool call failed");
    Some(truncate_chars(text, 500))
}

fn normalize_schema_b(raw: &Value, seq: u64) -> Result<NormalizedEvent, SkipReason> {
    let ts = get_i64(raw, "timestamp").ok_or(SkipReason::MissingTimestamp)?;
    let agent = AgentId::from(get_str(raw, "agent").unwrap_or_default());
    let session = canonicalize_session_label(get_str(raw, "session").unwrap_or_default());
    let kind_str = get_str(raw, "type").ok_or(SkipReason::UnknownKind)?;
    let data = raw.get("data");
    let (kind, payload) = match kind_str {
        "conversation.message_in" | "conversation.message_out" => {
            let content = data.and_then(|d| d.get("content")).and_then(Value::as_str).unwrap_or_default();
            let role = data.and_then(|d| d.get("role")).and_then(Value::as_str).map(ToString::to_string);
            let kind =
                if kind_str == "conversation.message_in" { EventKind::MessageIn } else { EventKind::MessageOut };
            (kind, Payload::Message { content: content.to_string(), role })
        }
        "conversation.tool_call" => {
            let tool_name = data.and_then(|d| d.get("name")).and_then(Value::as_str).unwrap_or_default();
            let params =
                data.and_then(|d| d.get("args")).and_then(Value::as_object).cloned().unwrap_or_default();
            (EventKind::ToolCall, Payload::ToolCall { tool_name: tool_name.to_string(), params })
        }
        "conversation.tool_result" => {
            let tool_name = data.and_then(|d| d.get("name")).and_then(Value::as_str).map(ToString::to_string);
            let duration_ms = data.and_then(|d| d.get("durationMs")).and_then(Value::as_u64);
            let error_text = data.and_then(|d| d.get("error")).and_then(Value::as_str);
            let tool_error = error_text.map(|t| truncate_chars(t, 500));
            let result = if tool_error.is_none() { data.and_then(|d| d.get("result")).cloned() } else { None };
            (EventKind::ToolResult, Payload::ToolResult { tool_name, result, tool_error, duration_ms })
        }
        "conversation.session_start" => (EventKind::SessionStart, Payload::Lifecycle { detail: None }),
        "conversation.session_end" => (EventKind::SessionEnd, Payload::Lifecycle { detail: None }),
        "conversation.run_start" => (EventKind::RunStart, Payload::Lifecycle { detail: None }),
        "conversation.run_end" => (EventKind::RunEnd, Payload::Lifecycle { detail: None }),
        "conversation.run_error" => {
            let detail = data.and_then(|d| d.get("reason")).and_then(Value::as_str).map(ToString::to_string);
            (EventKind::RunError, Payload::Lifecycle { detail })
        }
        _ => return Err(SkipReason::UnknownKind),
    };
    let id = event_id(raw, &session, seq);
    Ok(NormalizedEvent { id, timestamp_ms: ts, agent, session, kind, payload, seq })
}
