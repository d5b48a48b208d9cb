// sentinel-governance/src/frequency.rs
// ============================================================================
// Module: Frequency Tracker
// Description: Ring-buffer count queries over recent events.
// Purpose: Back both the risk assessor's frequency factor and rate-limit conditions.
// Dependencies: sentinel_core
// ============================================================================

//! ## Overview
//! A fixed-capacity ring buffer of [`FrequencyEvent`]s, overwriting the
//! oldest entry once full. [`FrequencyTracker::count`] discards entries
//! older than the requested window and matches the requested scope
//! (`spec.md` §4.8, §3).

use std::collections::VecDeque;

use sentinel_core::AgentId;
use serde::Deserialize;
use serde::Serialize;

/// What a frequency query groups by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrequencyScope {
    /// Count events from one agent, any session.
    Agent,
    /// Count events from one agent within one session.
    Session,
    /// Count every event regardless of agent or session.
    Global,
}

/// (timestamp, agent, sessionKey, optional tool), held in the ring buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyEvent {
    /// Epoch ms the event was recorded.
    pub timestamp_ms: i64,
    /// Agent that produced the event.
    pub agent: AgentId,
    /// Session key the event belongs to.
    pub session_key: String,
    /// Tool invoked, if this was a tool call.
    pub tool: Option<String>,
}

/// Fixed-capacity ring buffer of recent [`FrequencyEvent`]s.
pub struct FrequencyTracker {
    capacity: usize,
    events: VecDeque<FrequencyEvent>,
}

impl FrequencyTracker {
    /// Creates a tracker holding at most `capacity` recent events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), events: VecDeque::with_capacity(capacity.max(1)) }
    }

    /// Records one event, evicting the oldest entry if the buffer is full.
    pub fn record(&mut self, event: FrequencyEvent) {
        if self.events.len() >= self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Counts live (within `window_sec`) events matching `scope`.
    #[must_use]
    pub fn count(
        &self,
        now_ms: i64,
        window_sec: u64,
        scope: FrequencyScope,
        agent: &AgentId,
        session_key: &str,
    ) -> u32 {
        let cutoff = now_ms - (window_sec as i64) * 1000;
        let count = self
            .events
            .iter()
            .filter(|e| e.timestamp_ms >= cutoff)
            .filter(|e| match scope {
                FrequencyScope::Agent => &e.agent == agent,
                FrequencyScope::Session => &e.agent == agent && e.session_key == session_key,
                FrequencyScope::Global => true,
            })
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "unit tests favor unwrap/expect for clarity")]
    use super::*;

    fn event(ts: i64, agent: &str, session: &str) -> FrequencyEvent {
        FrequencyEvent { timestamp_ms: ts, agent: AgentId::from(agent), session_key: session.to_string(), tool: None }
    }

    #[test]
    fn sixteen_events_in_thirty_seconds_trip_a_fifteen_count_window() {
        let mut tracker = FrequencyTracker::new(1000);
        for i in 0..16 {
            tracker.record(event(i * 1000, "atlas", "s1"));
        }
        let agent = AgentId::from("atlas");
        assert_eq!(tracker.count(16_000, 60, FrequencyScope::Agent, &agent, "s1"), 16);
    }

    #[test]
    fn fourteen_events_stay_under_the_threshold() {
        let mut tracker = FrequencyTracker::new(1000);
        for i in 0..14 {
            tracker.record(event(i * 1000, "atlas", "s1"));
        }
        let agent = AgentId::from("atlas");
        assert_eq!(tracker.count(14_000, 60, FrequencyScope::Agent, &agent, "s1"), 14);
    }

    #[test]
    fn entries_outside_the_window_are_discarded() {
        let mut tracker = FrequencyTracker::new(1000);
        tracker.record(event(0, "atlas", "s1"));
        tracker.record(event(100_000, "atlas", "s1"));
        let agent = AgentId::from("atlas");
        assert_eq!(tracker.count(100_000, 10, FrequencyScope::Agent, &agent, "s1"), 1);
    }

    #[test]
    fn session_scope_requires_matching_session_key() {
        let mut tracker = FrequencyTracker::new(1000);
        tracker.record(event(0, "atlas", "s1"));
        tracker.record(event(0, "atlas", "s2"));
        let agent = AgentId::from("atlas");
        assert_eq!(tracker.count(0, 60, FrequencyScope::Session, &agent, "s1"), 1);
        assert_eq!(tracker.count(0, 60, FrequencyScope::Agent, &agent, "s1"), 2);
    }

    #[test]
    fn capacity_overflow_evicts_the_oldest_entry() {
        let mut tracker = FrequencyTracker::new(2);
        tracker.record(event(0, "atlas", "s1"));
        tracker.record(event(1, "atlas", "s1"));
        tracker.record(event(2, "atlas", "s1"));
        let agent = AgentId::from("atlas");
        assert_eq!(tracker.count(2, 60, FrequencyScope::Agent, &agent, "s1"), 2);
    }

    #[test]
    fn global_scope_ignores_agent_and_session() {
        let mut tracker = FrequencyTracker::new(1000);
        tracker.record(event(0, "atlas", "s1"));
        tracker.record(event(0, "nova", "s2"));
        let agent = AgentId::from("atlas");
        assert_eq!(tracker.count(0, 60, FrequencyScope::Global, &agent, "s1"), 2);
    }
}
