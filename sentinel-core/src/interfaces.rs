// sentinel-core/src/interfaces.rs
// ============================================================================
// Module: Plugin Host Interfaces
// Description: Traits the plugin host supplies to every other crate.
// Purpose: Keep the suite free of a hard dependency on any one host SDK.
// Dependencies: async-trait, serde_json
// ============================================================================

//! ## Overview
//! `spec.md` §6 describes a "Plugin Host API (consumed)": a surface the
//! implementer provides rather than one this suite owns. Every other crate
//! (trace, governance, knowledge, cli) is written against these traits, not
//! against any concrete host SDK, so the suite can be embedded in whatever
//! actually implements the host side.
//!
//! No logging crate is pulled in on purpose: [`Logger`] is the host's
//! logger, handed to every component that needs one, exactly as the host
//! API hands out `logger`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::ids::AgentId;

// ============================================================================
// SECTION: Logger
// ============================================================================

/// The host's structured logger. Mirrors the host API's `logger`
/// (`info`/`warn`/`error`/`debug`); nothing in this suite reaches for
/// `tracing` or `log` directly.
pub trait Logger: Send + Sync {
    /// Logs an informational message.
    fn info(&self, message: &str);
    /// Logs a warning.
    fn warn(&self, message: &str);
    /// Logs an error.
    fn error(&self, message: &str);
    /// Logs a debug-level message.
    fn debug(&self, message: &str);
}

/// A [`Logger`] that discards everything. Useful as a default and in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn info(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
    fn debug(&self, _message: &str) {}
}

// ============================================================================
// SECTION: Configuration Surfaces
// ============================================================================

/// The plugin's own arbitrary configuration mapping (`pluginConfig`).
pub type PluginConfig = Map<String, Value>;

/// The host-wide configuration mapping (`config`), used to extract the set
/// of known agent identifiers.
#[derive(Debug, Clone)]
pub struct HostConfig(pub Value);

impl HostConfig {
    /// Extracts every `agents.list[].id` entry as a known [`AgentId`].
    /// Missing or malformed paths yield an empty list rather than an error;
    /// the host config is advisory, not load-bearing.
    #[must_use]
    pub fn known_agent_ids(&self) -> Vec<AgentId> {
        self.0
            .pointer("/agents/list")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(|entry| entry.get("id").and_then(Value::as_str))
                    .map(AgentId::from)
                    .collect()
            })
            .unwrap_or_default()
    }
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Result of a registered command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Text blob returned to the caller.
    pub text: String,
}

impl CommandOutput {
    /// Wraps `text` as a command output.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// A host-registered CLI command (`registerCommand`), e.g. `cortexstatus`
/// or `trace-analyze`.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Command name, as registered with the host.
    fn name(&self) -> &str;
    /// One-line description shown in command listings.
    fn description(&self) -> &str;
    /// Whether the host should require authentication before invoking this.
    fn require_auth(&self) -> bool {
        false
    }
    /// Runs the command against its raw argument list.
    async fn handle(&self, args: &[String]) -> CommandOutput;
}

// ============================================================================
// SECTION: Services
// ============================================================================

/// A host-registered background service (`registerService`): started once
/// at plugin load and stopped at unload or on demand.
#[async_trait]
pub trait Service: Send + Sync {
    /// Stable service identifier.
    fn id(&self) -> &str;
    /// Starts the service.
    async fn start(&self);
    /// Stops the service, cancelling any background work it owns.
    async fn stop(&self);
}

// ============================================================================
// SECTION: Hooks
// ============================================================================

/// Named lifecycle hook the host dispatches (`on(hookName, handler, {priority})`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookName {
    /// A session began.
    SessionStart,
    /// An agent is about to start.
    BeforeAgentStart,
    /// A tool is about to be called; handlers may block it.
    BeforeToolCall,
    /// A tool call completed.
    AfterToolCall,
    /// A tool result is about to be persisted; handlers may annotate it.
    ToolResultPersist,
    /// A message is about to be written to the transcript; handlers may block or rewrite it.
    BeforeMessageWrite,
    /// A message is about to be sent; handlers may cancel or rewrite it.
    MessageSending,
    /// The gateway is starting.
    GatewayStart,
    /// The gateway is stopping.
    GatewayStop,
}

impl HookName {
    /// Snake-case label matching the host's hook name strings.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SessionStart => "session_start",
            Self::BeforeAgentStart => "before_agent_start",
            Self::BeforeToolCall => "before_tool_call",
            Self::AfterToolCall => "after_tool_call",
            Self::ToolResultPersist => "tool_result_persist",
            Self::BeforeMessageWrite => "before_message_write",
            Self::MessageSending => "message_sending",
            Self::GatewayStart => "gateway_start",
            Self::GatewayStop => "gateway_stop",
        }
    }
}

impl std::fmt::Display for HookName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a `before_tool_call` handler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BeforeToolCallOutcome {
    /// Whether the call should be blocked.
    pub block: bool,
    /// Human-readable reason shown when `block` is set.
    pub block_reason: Option<String>,
    /// Replacement parameters, when the handler wants to rewrite the call.
    pub params: Option<Value>,
}

/// Outcome of a `tool_result_persist` handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResultPersistOutcome {
    /// Message to attach to the persisted record.
    pub message: String,
}

/// Outcome of a `before_message_write` handler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BeforeMessageWriteOutcome {
    /// Whether the write should be blocked.
    pub block: bool,
    /// Replacement content, when the handler wants to rewrite the message.
    pub content: Option<String>,
}

/// Outcome of a `message_sending` handler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageSendingOutcome {
    /// Whether the send should be cancelled.
    pub cancel: bool,
    /// Replacement content, when the handler wants to rewrite the message.
    pub content: Option<String>,
}

/// The subset of host dispatch this suite registers against. Kept narrow
/// (only the hooks governance and trace actually use) rather than modeling
/// the full host hook surface.
#[async_trait]
pub trait HookDispatcher: Send + Sync {
    /// Registers a `before_tool_call` handler at `priority` (higher runs first).
    fn on_before_tool_call(
        &mut self,
        priority: i32,
        handler: Box<dyn Fn(&AgentId, &str, &Value) -> BeforeToolCallOutcome + Send + Sync>,
    );
    /// Registers an `after_tool_call` handler.
    fn on_after_tool_call(&mut self, handler: Box<dyn Fn(&AgentId, &str, &Value) + Send + Sync>);
    /// Registers a `tool_result_persist` handler.
    fn on_tool_result_persist(
        &mut self,
        handler: Box<dyn Fn(&AgentId, &str, &Value) -> ToolResultPersistOutcome + Send + Sync>,
    );
}

// ============================================================================
// SECTION: Event-Store Transport
// ============================================================================

/// Errors surfaced by either event-store transport shape.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EventStoreError {
    /// The requested sequence number does not exist on the stream.
    #[error("sequence {0} not found on stream {1}")]
    NotFound(u64, String),
    /// The transport failed to respond.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Summary returned by [`EventStoreTransport::info`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamInfo {
    /// Lowest sequence number retained.
    pub first_seq: u64,
    /// Highest sequence number present.
    pub last_seq: u64,
    /// Total message count.
    pub messages: u64,
}

/// A raw message fetched from the event store.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    /// Sequence number of this message.
    pub seq: u64,
    /// Raw, unnormalized payload.
    pub data: Value,
}

/// Per-sequence random-access event-store API (`spec.md` §6 option (a)).
#[async_trait]
pub trait EventStoreTransport: Send + Sync {
    /// Fetches the message at `seq` on `stream`, if it still exists.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError`] on transport failure.
    async fn get_message(&self, stream: &str, seq: u64) -> Result<Option<RawMessage>, EventStoreError>;

    /// Returns the stream's current bounds.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError`] on transport failure.
    async fn info(&self, stream: &str) -> Result<StreamInfo, EventStoreError>;
}

/// A message handed out by the batching consumer, with an explicit ack.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumedMessage {
    /// Sequence number of this message.
    pub seq: u64,
    /// Raw, unnormalized payload.
    pub data: Value,
}

/// Batching event-store consumer API (`spec.md` §6 option (b)).
#[async_trait]
pub trait EventStoreConsumer: Send + Sync {
    /// Fetches up to `max_messages`, waiting up to `idle_heartbeat` for the
    /// first message to arrive before returning an empty batch.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError`] on transport failure.
    async fn consume(
        &self,
        max_messages: u32,
        idle_heartbeat: Duration,
    ) -> Result<Vec<ConsumedMessage>, EventStoreError>;

    /// Acknowledges a message, allowing the transport to advance past it.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError`] on transport failure.
    async fn ack(&self, seq: u64) -> Result<(), EventStoreError>;
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "unit tests favor unwrap/expect for clarity")]
    use super::*;
    use serde_json::json;

    #[test]
    fn host_config_extracts_known_agent_ids() {
        let cfg = HostConfig(json!({"agents": {"list": [{"id": "atlas"}, {"id": "nova"}]}}));
        let ids = cfg.known_agent_ids();
        assert_eq!(ids, vec![AgentId::from("atlas"), AgentId::from("nova")]);
    }

    #[test]
    fn host_config_missing_path_is_empty() {
        let cfg = HostConfig(json!({}));
        assert!(cfg.known_agent_ids().is_empty());
    }

    #[test]
    fn null_logger_does_not_panic() {
        let logger = NullLogger;
        logger.info("hi");
        logger.warn("hi");
        logger.error("hi");
        logger.debug("hi");
    }
}
