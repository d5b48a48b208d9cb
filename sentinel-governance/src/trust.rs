// sentinel-governance/src/trust.rs
// ============================================================================
// Module: Trust Manager
// Description: Persistent per-agent trust score with decay and learning.
// Purpose: Give the policy evaluator and risk assessor a durable trust signal.
// Dependencies: sentinel_core, sentinel_config, sentinel_providers, serde_json
// ============================================================================

//! ## Overview
//! One [`TrustRecord`] per agent, scored by `spec.md` §4.9's formula:
//! `clamp(base + successCount·wS − violationCount·wV + ageDays·wA +
//! cleanStreak·wC + manualAdjustment, 0, 100)`, then floor and locked-tier
//! overrides. `base` is fixed at record creation to the configured default
//! score; everything else accrues via [`TrustManager::record_success`],
//! [`TrustManager::record_violation`], and [`TrustManager::set_score`].
//!
//! Persistence follows the `trust.json` shape from `spec.md` §6:
//! `{version:1, updated, agents:{id→record}}`, written atomically. Loading
//! recomputes `ageDays` from the stored creation timestamp, applies
//! inactivity decay directly to the stored score, and drops a legacy
//! `"unknown"` agent with a warning.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use sentinel_config::TrustSettings;
use sentinel_core::AgentId;
use sentinel_core::atomic::write_atomic;
use sentinel_core::interfaces::Logger;
use sentinel_providers::clock::epoch_ms_to_iso;
use serde::Deserialize;
use serde::Serialize;

const LEGACY_UNKNOWN_AGENT: &str = "unknown";
const MS_PER_DAY: f64 = 86_400_000.0;

/// Coarse banding of the numeric trust score (`spec.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustTier {
    /// score < 20
    Untrusted,
    /// score < 40
    Restricted,
    /// score < 60
    Standard,
    /// score < 80
    Trusted,
    /// score <= 100
    Privileged,
}

impl TrustTier {
    /// Quantizes a score into its tier.
    #[must_use]
    pub fn quantize(score: f64) -> Self {
        if score < 20.0 {
            Self::Untrusted
        } else if score < 40.0 {
            Self::Restricted
        } else if score < 60.0 {
            Self::Standard
        } else if score < 80.0 {
            Self::Trusted
        } else {
            Self::Privileged
        }
    }

    /// Lowercase label used in audit records and policy conditions.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Untrusted => "untrusted",
            Self::Restricted => "restricted",
            Self::Standard => "standard",
            Self::Trusted => "trusted",
            Self::Privileged => "privileged",
        }
    }
}

impl std::fmt::Display for TrustTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw counters that feed the score formula.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustSignals {
    /// Number of recorded successes.
    pub success_count: u64,
    /// Number of recorded violations.
    pub violation_count: u64,
    /// Age in days, recomputed from `created_at_ms` on every load.
    pub age_days: f64,
    /// Consecutive successes since the last violation.
    pub clean_streak: u64,
    /// Manual adjustment applied by [`TrustManager::set_score`].
    pub manual_adjustment: f64,
}

impl Default for TrustSignals {
    fn default() -> Self {
        Self { success_count: 0, violation_count: 0, age_days: 0.0, clean_streak: 0, manual_adjustment: 0.0 }
    }
}

/// What kind of event produced a [`TrustHistoryEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrustEventKind {
    /// A `recordSuccess` call.
    Success,
    /// A `recordViolation` call.
    Violation,
    /// A `setScore` call.
    ManualAdjustment,
}

/// One entry in a trust record's bounded history ring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrustHistoryEntry {
    /// When the event happened.
    pub at_ms: i64,
    /// What kind of event it was.
    pub kind: TrustEventKind,
    /// The score immediately after the event.
    pub score_after: f64,
}

/// Per-agent trust record (`spec.md` §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustRecord {
    /// Agent the record belongs to.
    pub agent: AgentId,
    /// Fixed at creation: the configured default score for a new agent.
    pub base: f64,
    /// Live counters feeding the score formula.
    pub signals: TrustSignals,
    /// Current score, 0..100.
    pub score: f64,
    /// Bounded history ring, newest last.
    pub history: VecDeque<TrustHistoryEntry>,
    /// Epoch ms the record was first created.
    pub created_at_ms: i64,
    /// Epoch ms of the most recent event.
    pub updated_at_ms: i64,
    /// When set, overrides the derived tier outright.
    pub locked_tier: Option<TrustTier>,
    /// When set, the score never decays or adjusts below this value.
    pub floor: Option<f64>,
}

impl TrustRecord {
    fn new(agent: AgentId, base: f64, now_ms: i64) -> Self {
        Self {
            agent,
            base,
            signals: TrustSignals::default(),
            score: base.clamp(0.0, 100.0),
            history: VecDeque::new(),
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
            locked_tier: None,
            floor: None,
        }
    }

    fn recompute(&mut self, settings: &TrustSettings) {
        let raw = self.base + self.signals.success_count as f64 * settings.weight_success
            - self.signals.violation_count as f64 * settings.weight_violation
            + self.signals.age_days * settings.weight_age
            + self.signals.clean_streak as f64 * settings.weight_clean_streak
            + self.signals.manual_adjustment;
        let floored = self.floor.map_or(raw, |floor| raw.max(floor));
        self.score = floored.clamp(0.0, 100.0);
    }

    fn push_history(&mut self, capacity: usize, kind: TrustEventKind, at_ms: i64) {
        self.history.push_back(TrustHistoryEntry { at_ms, kind, score_after: self.score });
        while self.history.len() > capacity {
            self.history.pop_front();
        }
    }

    /// The record's tier: the locked tier if set, else the score's quantized tier.
    #[must_use]
    pub fn tier(&self) -> TrustTier {
        self.locked_tier.unwrap_or_else(|| TrustTier::quantize(self.score))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TrustFile {
    version: u32,
    updated: String,
    agents: HashMap<String, TrustRecord>,
}

/// Manages every agent's [`TrustRecord`], applying the score formula,
/// inactivity decay, and atomic persistence (`spec.md` §4.9).
pub struct TrustManager {
    settings: TrustSettings,
    records: HashMap<AgentId, TrustRecord>,
    logger: Arc<dyn Logger>,
    in_memory_only: bool,
    warned_in_memory: bool,
}

impl TrustManager {
    /// Creates an empty manager, used when no `trust.json` exists yet.
    #[must_use]
    pub fn new(settings: TrustSettings, logger: Arc<dyn Logger>) -> Self {
        Self { settings, records: HashMap::new(), logger, in_memory_only: false, warned_in_memory: false }
    }

    /// Loads `trust.json` from `path`, applying per-agent age recomputation,
    /// inactivity decay, and legacy-`"unknown"`-agent migration. A missing
    /// or malformed file yields a fresh, empty manager rather than an error.
    #[must_use]
    pub fn load(path: &Path, settings: TrustSettings, logger: Arc<dyn Logger>, now_ms: i64) -> Self {
        let mut manager = Self::new(settings, logger);
        let Ok(raw) = std::fs::read_to_string(path) else { return manager };
        let Ok(file) = serde_json::from_str::<TrustFile>(&raw) else {
            manager.logger.warn("trust.json is malformed; starting from an empty trust store");
            return manager;
        };
        for (id, mut record) in file.agents {
            if id == LEGACY_UNKNOWN_AGENT {
                manager.logger.warn("dropping legacy \"unknown\" trust record during migration");
                continue;
            }
            record.signals.age_days = ((now_ms - record.created_at_ms) as f64 / MS_PER_DAY).max(0.0);
            let inactive_ms = (now_ms - record.updated_at_ms) as f64;
            if inactive_ms > manager.settings.decay_inactivity_days * MS_PER_DAY {
                let decayed = record.score * manager.settings.decay_rate;
                record.score = record.floor.map_or(decayed, |floor| decayed.max(floor)).clamp(0.0, 100.0);
            }
            manager.records.insert(AgentId::from(id), record);
        }
        manager
    }

    fn get_or_create(&mut self, agent: &AgentId, now_ms: i64) -> &mut TrustRecord {
        self.records
            .entry(agent.clone())
            .or_insert_with(|| TrustRecord::new(agent.clone(), self.settings.default_score, now_ms))
    }

    /// Reads an agent's current score, without creating a record for an
    /// unseen agent (returns the configured default instead).
    #[must_use]
    pub fn score(&self, agent: &AgentId) -> f64 {
        self.records.get(agent).map_or(self.settings.default_score.clamp(0.0, 100.0), |r| r.score)
    }

    /// Reads an agent's current tier, without creating a record.
    #[must_use]
    pub fn tier(&self, agent: &AgentId) -> TrustTier {
        self.records.get(agent).map_or_else(|| TrustTier::quantize(self.settings.default_score), TrustRecord::tier)
    }

    /// Borrows an agent's record, if one exists yet.
    #[must_use]
    pub fn get(&self, agent: &AgentId) -> Option<&TrustRecord> {
        self.records.get(agent)
    }

    /// Records a success: increments `successCount` and `cleanStreak`.
    pub fn record_success(&mut self, agent: &AgentId, now_ms: i64) {
        let capacity = self.settings.history_capacity;
        let settings = self.settings;
        let record = self.get_or_create(agent, now_ms);
        record.signals.success_count += 1;
        record.signals.clean_streak += 1;
        record.recompute(&settings);
        record.push_history(capacity, TrustEventKind::Success, now_ms);
        record.updated_at_ms = now_ms;
    }

    /// Records a violation: increments `violationCount`, zeroes `cleanStreak`.
    pub fn record_violation(&mut self, agent: &AgentId, now_ms: i64) {
        let capacity = self.settings.history_capacity;
        let settings = self.settings;
        let record = self.get_or_create(agent, now_ms);
        record.signals.violation_count += 1;
        record.signals.clean_streak = 0;
        record.recompute(&settings);
        record.push_history(capacity, TrustEventKind::Violation, now_ms);
        record.updated_at_ms = now_ms;
    }

    /// Adjusts `manualAdjustment` so the record's score hits `target`
    /// (subject to subsequent floor/clamp), then recomputes.
    pub fn set_score(&mut self, agent: &AgentId, target: f64, now_ms: i64) {
        let capacity = self.settings.history_capacity;
        let settings = self.settings;
        let record = self.get_or_create(agent, now_ms);
        let without_manual = record.base + record.signals.success_count as f64 * settings.weight_success
            - record.signals.violation_count as f64 * settings.weight_violation
            + record.signals.age_days * settings.weight_age
            + record.signals.clean_streak as f64 * settings.weight_clean_streak;
        record.signals.manual_adjustment = target - without_manual;
        record.recompute(&settings);
        record.push_history(capacity, TrustEventKind::ManualAdjustment, now_ms);
        record.updated_at_ms = now_ms;
    }

    /// Locks an agent's tier, overriding the derived value outright.
    pub fn lock_tier(&mut self, agent: &AgentId, tier: TrustTier, now_ms: i64) {
        self.get_or_create(agent, now_ms).locked_tier = Some(tier);
    }

    /// Removes a tier lock, restoring the derived tier.
    pub fn unlock_tier(&mut self, agent: &AgentId, now_ms: i64) {
        self.get_or_create(agent, now_ms).locked_tier = None;
    }

    /// Sets a floor below which the score never decays or adjusts.
    pub fn set_floor(&mut self, agent: &AgentId, floor: f64, now_ms: i64) {
        let settings = self.settings;
        let record = self.get_or_create(agent, now_ms);
        record.floor = Some(floor);
        record.recompute(&settings);
    }

    /// Whether persistence has fallen back to in-memory-only mode.
    #[must_use]
    pub fn is_in_memory_only(&self) -> bool {
        self.in_memory_only
    }

    /// Persists every record atomically to `path`, unless already running
    /// in-memory-only. A write failure switches to in-memory-only mode
    /// after a single warning (`spec.md` §4.9, §7).
    pub fn persist(&mut self, path: &Path, now_ms: i64) {
        if self.in_memory_only {
            return;
        }
        let file = TrustFile {
            version: 1,
            updated: epoch_ms_to_iso(now_ms),
            agents: self.records.iter().map(|(id, r)| (id.as_str().to_string(), r.clone())).collect(),
        };
        let Ok(bytes) = serde_json::to_vec_pretty(&file) else { return };
        if write_atomic(path, &bytes).is_err() && !self.warned_in_memory {
            self.logger.warn("trust.json is not writable; trust persistence is now in-memory-only");
            self.in_memory_only = true;
            self.warned_in_memory = true;
        }
    }

    /// Convenience: derives the default on-disk path under a workspace dir.
    #[must_use]
    pub fn default_path(workspace_dir: &Path) -> PathBuf {
        workspace_dir.join("governance").join("trust.json")
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "unit tests favor unwrap/expect for clarity")]
    use super::*;
    use sentinel_core::interfaces::NullLogger;

    fn manager() -> TrustManager {
        TrustManager::new(TrustSettings::default(), Arc::new(NullLogger))
    }

    #[test]
    fn unseen_agent_reads_the_configured_default() {
        let mgr = manager();
        let agent = AgentId::from("atlas");
        assert_eq!(mgr.score(&agent), 50.0);
        assert_eq!(mgr.tier(&agent), TrustTier::Standard);
    }

    #[test]
    fn successes_monotonically_raise_the_score() {
        let mut mgr = manager();
        let agent = AgentId::from("atlas");
        let before = mgr.score(&agent);
        for i in 0..5 {
            mgr.record_success(&agent, 1_000 * i);
        }
        assert!(mgr.score(&agent) >= before);
    }

    #[test]
    fn violation_zeroes_clean_streak_and_lowers_score() {
        let mut mgr = manager();
        let agent = AgentId::from("atlas");
        mgr.record_success(&agent, 0);
        mgr.record_success(&agent, 1);
        let after_successes = mgr.score(&agent);
        mgr.record_violation(&agent, 2);
        assert!(mgr.score(&agent) < after_successes);
        assert_eq!(mgr.get(&agent).unwrap().signals.clean_streak, 0);
    }

    #[test]
    fn locked_tier_overrides_derived_tier() {
        let mut mgr = manager();
        let agent = AgentId::from("atlas");
        mgr.lock_tier(&agent, TrustTier::Privileged, 0);
        assert_eq!(mgr.tier(&agent), TrustTier::Privileged);
    }

    #[test]
    fn floor_bounds_a_manual_downward_adjustment() {
        let mut mgr = manager();
        let agent = AgentId::from("atlas");
        mgr.set_floor(&agent, 40.0, 0);
        mgr.set_score(&agent, 0.0, 1);
        assert!(mgr.score(&agent) >= 40.0);
    }

    #[test]
    fn load_recomputes_age_days_from_created_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trust.json");
        let mut mgr = manager();
        let agent = AgentId::from("atlas");
        mgr.get_or_create(&agent, 0);
        mgr.persist(&path, 0);

        let three_days_ms = 3 * 24 * 60 * 60 * 1000;
        let reloaded = TrustManager::load(&path, TrustSettings::default(), Arc::new(NullLogger), three_days_ms);
        let record = reloaded.get(&agent).unwrap();
        assert!((record.signals.age_days - 3.0).abs() < 0.01);
    }

    #[test]
    fn load_drops_legacy_unknown_agent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trust.json");
        std::fs::write(
            &path,
            serde_json::json!({
                "version": 1,
                "updated": "2026-01-01T00:00:00Z",
                "agents": {
                    "unknown": {
                        "agent": "unknown", "base": 50.0, "signals": {}, "score": 50.0,
                        "history": [], "created_at_ms": 0, "updated_at_ms": 0,
                        "locked_tier": null, "floor": null
                    }
                }
            })
            .to_string(),
        )
        .unwrap();
        let reloaded = TrustManager::load(&path, TrustSettings::default(), Arc::new(NullLogger), 0);
        assert!(reloaded.get(&AgentId::from("unknown")).is_none());
    }

    #[test]
    fn missing_file_loads_as_empty_manager() {
        let reloaded = TrustManager::load(Path::new("/nonexistent/trust.json"), TrustSettings::default(), Arc::new(NullLogger), 0);
        assert_eq!(reloaded.score(&AgentId::from("atlas")), 50.0);
    }
}
