// sentinel-broker/src/filter.rs
// ============================================================================
// Module: Event Filter
// Description: Kind/agent/count filters applied while walking the event store.
// Purpose: Let callers narrow what the fetcher hands back without a second pass.
// Dependencies: std::collections::HashSet, sentinel_core
// ============================================================================

use std::collections::HashSet;

use sentinel_core::AgentId;
use sentinel_core::EventKind;
use sentinel_core::NormalizedEvent;

/// Optional narrowing applied by [`crate::fetcher::EventFetcher::fetch`].
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Restrict to these kinds, when set.
    pub kinds: Option<HashSet<EventKind>>,
    /// Restrict to these agents, when set.
    pub agents: Option<HashSet<AgentId>>,
    /// Stop once this many matching events have been collected.
    pub max_count: Option<usize>,
}

impl EventFilter {
    /// Returns whether `event` passes the kind/agent restriction (count is
    /// enforced by the caller's loop, not here).
    #[must_use]
    pub fn matches(&self, event: &NormalizedEvent) -> bool {
        let kind_ok = self.kinds.as_ref().is_none_or(|kinds| kinds.contains(&event.kind));
        let agent_ok = self.agents.as_ref().is_none_or(|agents| agents.contains(&event.agent));
        kind_ok && agent_ok
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "unit tests favor unwrap/expect for clarity")]
    use super::*;
    use sentinel_core::Payload;
    use sentinel_core::SessionId;

    fn sample_event(kind: EventKind, agent: &str) -> NormalizedEvent {
        NormalizedEvent {
            id: "e1".to_string(),
            timestamp_ms: 0,
            agent: AgentId::from(agent),
            session: SessionId::from("s1"),
            kind,
            payload: Payload::Lifecycle { detail: None },
            seq: 1,
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = EventFilter::default();
        assert!(filter.matches(&sample_event(EventKind::SessionStart, "atlas")));
    }

    #[test]
    fn kind_filter_excludes_other_kinds() {
        let mut kinds = HashSet::new();
        kinds.insert(EventKind::ToolCall);
        let filter = EventFilter { kinds: Some(kinds), ..EventFilter::default() };
        assert!(!filter.matches(&sample_event(EventKind::SessionStart, "atlas")));
        assert!(filter.matches(&sample_event(EventKind::ToolCall, "atlas")));
    }

    #[test]
    fn agent_filter_excludes_other_agents() {
        let mut agents = HashSet::new();
        agents.insert(AgentId::from("atlas"));
        let filter = EventFilter { agents: Some(agents), ..EventFilter::default() };
        assert!(!filter.matches(&sample_event(EventKind::SessionStart, "nova")));
        assert!(filter.matches(&sample_event(EventKind::SessionStart, "atlas")));
    }
}
