// sentinel-trace/src/chain.rs
// ============================================================================
// Module: Chain Reconstructor
// Description: Buckets, dedupes, and splits normalized events into conversation chains.
// Purpose: Give detectors a contiguous, ordered window instead of a flat event log.
// Dependencies: sentinel_core
// ============================================================================

//! ## Overview
//! Two-pass reconstruction (`spec.md` §4.3): pass one buckets events by
//! `(session, agent)`; pass two sorts each bucket by timestamp, deduplicates
//! using kind-specific fingerprints (keeping the higher-seq duplicate), then
//! splits at session/run boundaries, long inactivity gaps, or a hard event
//! cap. Chains shorter than two events are dropped. [`chain_id`] is a pure
//! function so re-running reconstruction over the same events is
//! byte-identical.

use std::collections::BTreeMap;
use std::collections::HashMap;

use sentinel_core::AgentId;
use sentinel_core::ChainId;
use sentinel_core::EventKind;
use sentinel_core::NormalizedEvent;
use sentinel_core::Payload;
use sentinel_core::SessionId;
use sentinel_core::hashing::sha256_hex_prefix;

/// Inactivity gap, run-end/run-start gap, and hard cap tunables.
#[derive(Debug, Clone, Copy)]
pub struct ChainConfig {
    /// Inactivity gap, in milliseconds, that forces a chain split.
    pub inactivity_gap_ms: i64,
    /// Hard event-count cap per chain.
    pub max_chain_events: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self { inactivity_gap_ms: 30 * 60 * 1000, max_chain_events: 1000 }
    }
}

const RUN_BOUNDARY_GAP_MS: i64 = 5 * 60 * 1000;

/// Whether a chain's start/end boundary was a lifecycle marker or just a gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryTag {
    /// First or last event is a session/run boundary.
    Lifecycle,
    /// Chain was split purely on a time gap or the hard event cap.
    Gap,
}

/// A reconstructed, time-ordered slice of one agent's activity in one session.
#[derive(Debug, Clone)]
pub struct ConversationChain {
    /// Deterministic identifier, see [`chain_id`].
    pub id: ChainId,
    /// Session the chain belongs to.
    pub session: SessionId,
    /// Agent the chain belongs to.
    pub agent: AgentId,
    /// Time-ordered, deduplicated events.
    pub events: Vec<NormalizedEvent>,
    /// Whether the chain's edges are a lifecycle boundary or a bare gap.
    pub boundary: BoundaryTag,
}

/// Deterministic chain identifier: the first 16 hex chars of
/// `SHA-256(session:agent:firstTs)`.
#[must_use]
pub fn chain_id(session: &SessionId, agent: &AgentId, first_ts: i64) -> ChainId {
    let input = format!("{session}:{agent}:{first_ts}");
    ChainId::from(sha256_hex_prefix(&input, 16))
}

/// Reconstructs conversation chains from a flat, unordered event list.
#[must_use]
pub fn reconstruct(events: &[NormalizedEvent], config: &ChainConfig) -> Vec<ConversationChain> {
    let mut buckets: BTreeMap<(String, String), Vec<NormalizedEvent>> = BTreeMap::new();
    for event in events {
        buckets.entry((event.session.as_str().to_string(), event.agent.as_str().to_string())).or_default().push(
            event.clone(),
        );
    }
    let mut chains = Vec::new();
    for ((_, _), mut bucket) in buckets {
        bucket.sort_by(|a, b| a.timestamp_ms.cmp(&b.timestamp_ms).then(a.seq.cmp(&b.seq)));
        let deduped = dedupe(bucket);
        chains.extend(split(deduped, config));
    }
    chains
}

fn dedupe(events: Vec<NormalizedEvent>) -> Vec<NormalizedEvent> {
    let mut out: Vec<NormalizedEvent> = Vec::with_capacity(events.len());
    let mut index_by_fingerprint: HashMap<String, usize> = HashMap::new();
    for event in events {
        let fp = fingerprint(&event);
        if let Some(&idx) = index_by_fingerprint.get(&fp) {
            if event.seq > out[idx].seq {
                out[idx] = event;
            }
        } else {
            index_by_fingerprint.insert(fp, out.len());
            out.push(event);
        }
    }
    out
}

fn fingerprint(event: &NormalizedEvent) -> String {
    let second_bucket = event.timestamp_ms / 1000;
    match &event.payload {
        Payload::Message { content, .. } => {
            let head: String = content.chars().take(200).collect();
            format!("msg:{}:{second_bucket}", fnv1a(&head))
        }
        Payload::ToolCall { tool_name, params } => {
            let params_text = serde_json::to_string(params).unwrap_or_default();
            format!("call:{tool_name}:{}:{second_bucket}", fnv1a(&params_text))
        }
        Payload::ToolResult { tool_name, .. } => {
            format!("result:{}:{}:{second_bucket}", event.agent, tool_name.as_deref().unwrap_or(""))
        }
        Payload::Lifecycle { .. } => {
            format!("life:{}:{}", event.kind, event.timestamp_ms)
        }
    }
}

/// FNV-1a, used only to bucket near-duplicate text for dedup, never for security.
fn fnv1a(text: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in text.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

fn is_boundary_kind(kind: EventKind) -> bool {
    matches!(kind, EventKind::SessionStart | EventKind::SessionEnd | EventKind::RunStart | EventKind::RunEnd)
}

fn split(events: Vec<NormalizedEvent>, config: &ChainConfig) -> Vec<ConversationChain> {
    let mut chains = Vec::new();
    let mut current: Vec<NormalizedEvent> = Vec::new();
    let mut prev_kind_ts: Option<(EventKind, i64)> = None;

    for event in events {
        let should_split_before = current.is_empty().then_some(false).unwrap_or_else(|| {
            let Some((prev_kind, prev_ts)) = prev_kind_ts else { return false };
            let gap = event.timestamp_ms - prev_ts;
            let run_boundary_split =
                prev_kind == EventKind::RunEnd && event.kind == EventKind::RunStart && gap > RUN_BOUNDARY_GAP_MS;
            let inactivity_split = gap > config.inactivity_gap_ms;
            let session_start_split = event.kind == EventKind::SessionStart;
            let was_session_end = prev_kind == EventKind::SessionEnd;
            run_boundary_split || inactivity_split || session_start_split || was_session_end
        });

        if should_split_before && !current.is_empty() {
            chains.push(finish_chain(std::mem::take(&mut current)));
        }

        prev_kind_ts = Some((event.kind, event.timestamp_ms));
        current.push(event);

        if current.len() >= config.max_chain_events {
            chains.push(finish_chain(std::mem::take(&mut current)));
            prev_kind_ts = None;
        }
    }
    if !current.is_empty() {
        chains.push(finish_chain(current));
    }
    chains.into_iter().flatten().filter(|c| c.events.len() >= 2).collect()
}

fn finish_chain(events: Vec<NormalizedEvent>) -> Option<ConversationChain> {
    let first = events.first()?;
    let last = events.last()?;
    let boundary = if is_boundary_kind(first.kind) || is_boundary_kind(last.kind) {
        BoundaryTag::Lifecycle
    } else {
        BoundaryTag::Gap
    };
    let id = chain_id(&first.session, &first.agent, first.timestamp_ms);
    Some(ConversationChain {
        id,
        session: first.session.clone(),
        agent: first.agent.clone(),
        events,
        boundary,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "unit tests favor unwrap/expect for clarity")]
    use super::*;

    fn event(seq: u64, ts: i64, kind: EventKind, payload: Payload) -> NormalizedEvent {
        NormalizedEvent {
            id: format!("e{seq}"),
            timestamp_ms: ts,
            agent: AgentId::from("atlas"),
            session: SessionId::from("s1"),
            kind,
            payload,
            seq,
        }
    }

    fn tool_call(seq: u64, ts: i64, name: &str) -> NormalizedEvent {
        event(seq, ts, EventKind::ToolCall, Payload::ToolCall { tool_name: name.to_string(), params: serde_json::Map::new() })
    }

    #[test]
    fn duplicate_equivalent_events_collapse_to_one() {
        let a = tool_call(1, 1_700_000_000_000, "read");
        let b = tool_call(2, 1_700_000_000_400, "read");
        let chains = reconstruct(&[a, b.clone(), tool_call(3, 1_700_000_001_000, "read")], &ChainConfig::default());
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].events.len(), 2);
        assert_eq!(chains[0].events[0].seq, 2);
    }

    #[test]
    fn chains_shorter_than_two_events_are_dropped() {
        let chains = reconstruct(&[tool_call(1, 0, "read")], &ChainConfig::default());
        assert!(chains.is_empty());
    }

    #[test]
    fn inactivity_gap_splits_the_chain() {
        let events = vec![
            tool_call(1, 0, "read"),
            tool_call(2, 1000, "read"),
            tool_call(3, 1000 + 40 * 60_000, "write"),
            tool_call(4, 1000 + 41 * 60_000, "write"),
        ];
        let chains = reconstruct(&events, &ChainConfig::default());
        assert_eq!(chains.len(), 2);
        assert_eq!(chains[0].boundary, BoundaryTag::Gap);
    }

    #[test]
    fn session_start_forces_a_new_chain() {
        let events = vec![
            tool_call(1, 0, "read"),
            tool_call(2, 100, "read"),
            event(3, 200, EventKind::SessionStart, Payload::Lifecycle { detail: None }),
            tool_call(4, 300, "write"),
        ];
        let chains = reconstruct(&events, &ChainConfig::default());
        assert_eq!(chains.len(), 2);
        assert_eq!(chains[1].boundary, BoundaryTag::Lifecycle);
    }

    #[test]
    fn chain_id_is_deterministic() {
        let session = SessionId::from("s1");
        let agent = AgentId::from("atlas");
        assert_eq!(chain_id(&session, &agent, 100), chain_id(&session, &agent, 100));
        assert_ne!(chain_id(&session, &agent, 100), chain_id(&session, &agent, 200));
    }

    #[test]
    fn reconstruction_is_byte_identical_across_runs() {
        let events = vec![tool_call(1, 0, "read"), tool_call(2, 5000, "write")];
        let first = reconstruct(&events, &ChainConfig::default());
        let second = reconstruct(&events, &ChainConfig::default());
        assert_eq!(first[0].id, second[0].id);
        assert_eq!(first[0].events.len(), second[0].events.len());
    }
}
