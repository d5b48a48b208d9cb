// sentinel-governance/src/audit.rs
// ============================================================================
// Module: Audit Journal
// Description: Day-sharded, append-only record of every governance decision.
// Purpose: Give operators a queryable, tamper-evident trail of allow/deny verdicts.
// Dependencies: sentinel_core, sentinel_config, sentinel_providers, time
// ============================================================================

//! ## Overview
//! One JSONL shard per UTC day (`<workspace>/governance/audit/YYYY-MM-DD.jsonl`),
//! appended atomically via [`sentinel_core::atomic::append_line`] (`spec.md`
//! §4.12, §6). Records are buffered in memory and flushed on the
//! orchestrator's 1Hz tick, or immediately once
//! [`AuditSettings::immediate_flush_threshold`] records are pending.
//! Construction prunes shards older than [`AuditSettings::retention_days`].
//! Every context value is redacted before it is ever written to disk; a
//! deny verdict always adds the fixed baseline controls `A.5.24`/`A.5.28`
//! on top of whatever the matched policies carried.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use sentinel_config::AuditSettings;
use sentinel_core::AgentId;
use sentinel_core::AuditRecordId;
use sentinel_core::atomic::append_line;
use sentinel_core::interfaces::HookName;
use sentinel_core::interfaces::Logger;
use sentinel_core::redact::Redactor;
use sentinel_core::redact::StatelessMinter;
use sentinel_providers::clock::Clock;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;

use crate::policy::PolicyMatch;
use crate::policy::PolicyVerdict;
use crate::risk::RiskAssessment;
use crate::trust::TrustTier;

const BASELINE_DENY_CONTROLS: [&str; 2] = ["A.5.24", "A.5.28"];

fn epoch_ms_to_date(epoch_ms: i64) -> String {
    let nanos = i128::from(epoch_ms) * 1_000_000;
    OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .map(|dt| format!("{:04}-{:02}-{:02}", dt.year(), dt.month() as u8, dt.day()))
        .unwrap_or_default()
}

fn date_to_epoch_ms(date_str: &str) -> Option<i64> {
    let mut parts = date_str.splitn(3, '-');
    let year: i32 = parts.next()?.parse().ok()?;
    let month: u8 = parts.next()?.parse().ok()?;
    let day: u8 = parts.next()?.parse().ok()?;
    let month = time::Month::try_from(month).ok()?;
    let date = time::Date::from_calendar_date(year, month, day).ok()?;
    Some(date.midnight().assume_utc().unix_timestamp() * 1000)
}

// ============================================================================
// SECTION: Record
// ============================================================================

/// One persisted governance decision (`spec.md` §3 "Audit Record").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Unique record identifier.
    pub id: AuditRecordId,
    /// When the decision was made, epoch ms.
    pub timestamp_ms: i64,
    /// Acting agent.
    pub agent: AgentId,
    /// Hook this decision was made for.
    pub hook: HookName,
    /// Tool name, for tool-call hooks.
    pub tool_name: Option<String>,
    /// `"allow"`, `"deny"`, `"audit"`, or `"error-fallback"`.
    pub verdict: String,
    /// Human-readable reason for the verdict.
    pub reason: String,
    /// Assessed risk score at decision time.
    pub risk_score: f64,
    /// Assessed risk level at decision time.
    pub risk_level: String,
    /// Agent's trust score at decision time.
    pub trust_score: f64,
    /// Agent's trust tier at decision time.
    pub trust_tier: String,
    /// Ids of every policy that matched.
    pub policy_ids: Vec<String>,
    /// Compliance controls attached to this decision.
    pub controls: Vec<String>,
    /// Redacted context (tool params, message metadata) at decision time.
    pub context: Value,
}

/// Union of every matched policy's controls, plus the fixed baseline on a
/// deny verdict (`spec.md` §4.12).
#[must_use]
pub fn derive_controls(matches: &[PolicyMatch], verdict: &str) -> Vec<String> {
    let mut set: BTreeSet<String> = matches.iter().flat_map(|m| m.controls.iter().cloned()).collect();
    if verdict == "deny" {
        for control in BASELINE_DENY_CONTROLS {
            set.insert(control.to_string());
        }
    }
    set.into_iter().collect()
}

/// Builds an [`AuditRecord`] from a policy verdict and the risk/trust
/// snapshot that produced it, redacting `raw_context` before it is stored.
#[allow(clippy::too_many_arguments)]
#[must_use]
pub fn build_record(
    id: AuditRecordId,
    timestamp_ms: i64,
    agent: AgentId,
    hook: HookName,
    tool_name: Option<String>,
    verdict: &PolicyVerdict,
    risk: &RiskAssessment,
    trust_score: f64,
    trust_tier: TrustTier,
    raw_context: &Value,
    redactor: &Redactor,
) -> AuditRecord {
    let mut minter = StatelessMinter;
    let context = redactor.redact_value(raw_context, &mut minter);
    let policy_ids = verdict.matches.iter().map(|m| m.policy_id.as_str().to_string()).collect();
    let verdict_label = if verdict.allow { "allow" } else { "deny" };
    let controls = derive_controls(&verdict.matches, verdict_label);
    AuditRecord {
        id,
        timestamp_ms,
        agent,
        hook,
        tool_name,
        verdict: verdict_label.to_string(),
        reason: verdict.reason.clone(),
        risk_score: risk.score,
        risk_level: risk.level.as_str().to_string(),
        trust_score,
        trust_tier: trust_tier.as_str().to_string(),
        policy_ids,
        controls,
        context,
    }
}

// ============================================================================
// SECTION: Query
// ============================================================================

/// Filters for [`AuditJournal::query`]. All fields are conjunctive.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    /// Restrict to this agent.
    pub agent: Option<AgentId>,
    /// Restrict to this verdict label.
    pub verdict: Option<String>,
    /// Restrict to records at or after this timestamp.
    pub since_ms: Option<i64>,
    /// Restrict to records at or before this timestamp.
    pub until_ms: Option<i64>,
    /// Maximum records to return; defaults to [`AuditSettings::default_query_limit`].
    pub limit: Option<usize>,
}

impl AuditQuery {
    fn matches(&self, record: &AuditRecord) -> bool {
        if let Some(agent) = &self.agent {
            if &record.agent != agent {
                return false;
            }
        }
        if let Some(verdict) = &self.verdict {
            if &record.verdict != verdict {
                return false;
            }
        }
        if self.since_ms.is_some_and(|since| record.timestamp_ms < since) {
            return false;
        }
        if self.until_ms.is_some_and(|until| record.timestamp_ms > until) {
            return false;
        }
        true
    }
}

// ============================================================================
// SECTION: Journal
// ============================================================================

/// Day-sharded, append-only audit journal.
pub struct AuditJournal {
    dir: PathBuf,
    settings: AuditSettings,
    logger: Arc<dyn Logger>,
    clock: Arc<dyn Clock>,
    buffer: Mutex<Vec<AuditRecord>>,
}

impl AuditJournal {
    /// Opens (creating if needed) the journal directory at `dir`, pruning
    /// shards older than `settings.retention_days`.
    ///
    /// # Errors
    ///
    /// Returns an [`io::Error`] if the directory cannot be created.
    pub fn open(
        dir: impl Into<PathBuf>,
        settings: AuditSettings,
        logger: Arc<dyn Logger>,
        clock: Arc<dyn Clock>,
    ) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let journal = Self { dir, settings, logger, clock, buffer: Mutex::new(Vec::new()) };
        journal.prune_expired_shards();
        Ok(journal)
    }

    /// Default journal directory: `<workspace>/governance/audit`.
    #[must_use]
    pub fn default_dir(workspace: &Path) -> PathBuf {
        workspace.join("governance").join("audit")
    }

    /// Queues `record` for persistence, flushing immediately once the
    /// buffer reaches the configured threshold.
    #[allow(clippy::missing_panics_doc, reason = "mutex is never held across a panic in this module")]
    pub fn record(&self, record: AuditRecord) {
        let should_flush = {
            let mut buffer = self.buffer.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            buffer.push(record);
            buffer.len() >= self.settings.immediate_flush_threshold
        };
        if should_flush {
            if let Err(err) = self.flush() {
                self.logger.error(&format!("audit flush failed: {err}"));
            }
        }
    }

    /// Appends every buffered record to its day's shard, clearing the buffer.
    ///
    /// # Errors
    ///
    /// Returns the first [`io::Error`] encountered. The buffer is already
    /// drained by that point, so a caller that wants at-least-once delivery
    /// must log the failure rather than retry the same records.
    #[allow(clippy::missing_panics_doc, reason = "mutex is never held across a panic in this module")]
    pub fn flush(&self) -> io::Result<()> {
        let pending = {
            let mut buffer = self.buffer.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            std::mem::take(&mut *buffer)
        };
        for record in pending {
            let date = epoch_ms_to_date(record.timestamp_ms);
            let path = self.dir.join(format!("{date}.jsonl"));
            let line = serde_json::to_string(&record).unwrap_or_default();
            append_line(&path, &line)?;
        }
        Ok(())
    }

    /// Number of records already on disk for the current UTC day.
    #[must_use]
    pub fn count_today(&self) -> usize {
        let date = epoch_ms_to_date(self.clock.now_ms());
        let path = self.dir.join(format!("{date}.jsonl"));
        fs::read_to_string(path).map(|content| content.lines().count()).unwrap_or(0)
    }

    /// Deletes shard files older than `retention_days`.
    fn prune_expired_shards(&self) {
        let cutoff_ms = self.clock.now_ms() - i64::from(self.settings.retention_days) * 86_400_000;
        let Ok(entries) = fs::read_dir(&self.dir) else { return };
        for entry in entries.filter_map(Result::ok) {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else { continue };
            let Some(shard_ms) = date_to_epoch_ms(stem) else { continue };
            if shard_ms < cutoff_ms {
                if let Err(err) = fs::remove_file(&path) {
                    self.logger.warn(&format!("failed to prune audit shard {}: {err}", path.display()));
                }
            }
        }
    }

    /// Reverse-scans shards (newest day first, newest line first within a
    /// day), returning up to `filter.limit` matching records. Malformed
    /// lines are skipped rather than aborting the scan.
    #[must_use]
    pub fn query(&self, filter: &AuditQuery) -> Vec<AuditRecord> {
        let limit = filter.limit.unwrap_or(self.settings.default_query_limit);
        let mut shard_paths: Vec<PathBuf> = fs::read_dir(&self.dir)
            .into_iter()
            .flatten()
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("jsonl"))
            .collect();
        shard_paths.sort();
        shard_paths.reverse();

        let mut results = Vec::new();
        'shards: for path in shard_paths {
            let Ok(content) = fs::read_to_string(&path) else { continue };
            for line in content.lines().rev() {
                if results.len() >= limit {
                    break 'shards;
                }
                let Ok(record) = serde_json::from_str::<AuditRecord>(line) else { continue };
                if filter.matches(&record) {
                    results.push(record);
                }
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "unit tests favor unwrap/expect for clarity")]
    use super::*;
    use sentinel_core::NullLogger;
    use sentinel_providers::clock::FixedClock;

    fn sample_record(id: u8, timestamp_ms: i64, agent: &str, verdict: &str) -> AuditRecord {
        AuditRecord {
            id: AuditRecordId::new_v4(),
            timestamp_ms,
            agent: AgentId::from(agent),
            hook: HookName::BeforeToolCall,
            tool_name: Some("exec".to_string()),
            verdict: verdict.to_string(),
            reason: format!("record {id}"),
            risk_score: 10.0,
            risk_level: "low".to_string(),
            trust_score: 50.0,
            trust_tier: "standard".to_string(),
            policy_ids: vec![],
            controls: vec![],
            context: serde_json::json!({}),
        }
    }

    #[test]
    fn derive_controls_unions_and_adds_baseline_on_deny() {
        let matches = vec![
            PolicyMatch {
                policy_id: sentinel_core::PolicyId::from("p1"),
                rule_id: sentinel_core::RuleId::from("r1"),
                effect: crate::policy::Effect::Deny { reason: "x".to_string() },
                controls: vec!["A.8.11".to_string()],
            },
        ];
        let controls = derive_controls(&matches, "deny");
        assert!(controls.contains(&"A.8.11".to_string()));
        assert!(controls.contains(&"A.5.24".to_string()));
        assert!(controls.contains(&"A.5.28".to_string()));
    }

    #[test]
    fn allow_verdict_does_not_add_baseline_controls() {
        let controls = derive_controls(&[], "allow");
        assert!(controls.is_empty());
    }

    #[test]
    fn flush_writes_to_the_correct_day_shard() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(FixedClock(1_700_000_000_000));
        let journal = AuditJournal::open(
            dir.path().join("audit"),
            AuditSettings::default(),
            Arc::new(NullLogger),
            clock.clone(),
        )
        .unwrap();
        journal.record(sample_record(1, clock.0, "atlas", "allow"));
        journal.flush().unwrap();
        let expected = dir.path().join("audit").join(format!("{}.jsonl", epoch_ms_to_date(clock.0)));
        assert!(expected.exists());
    }

    #[test]
    fn immediate_flush_threshold_triggers_without_manual_flush() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(FixedClock(1_700_000_000_000));
        let mut settings = AuditSettings::default();
        settings.immediate_flush_threshold = 2;
        let journal =
            AuditJournal::open(dir.path().join("audit"), settings, Arc::new(NullLogger), clock.clone()).unwrap();
        journal.record(sample_record(1, clock.0, "atlas", "allow"));
        journal.record(sample_record(2, clock.0, "atlas", "deny"));
        assert_eq!(journal.count_today(), 2);
    }

    #[test]
    fn query_filters_by_agent_and_respects_limit() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(FixedClock(1_700_000_000_000));
        let journal = AuditJournal::open(
            dir.path().join("audit"),
            AuditSettings::default(),
            Arc::new(NullLogger),
            clock.clone(),
        )
        .unwrap();
        journal.record(sample_record(1, clock.0, "atlas", "allow"));
        journal.record(sample_record(2, clock.0, "nova", "deny"));
        journal.record(sample_record(3, clock.0, "atlas", "deny"));
        journal.flush().unwrap();

        let results = journal.query(&AuditQuery { agent: Some(AgentId::from("atlas")), ..AuditQuery::default() });
        assert_eq!(results.len(), 2);

        let limited = journal.query(&AuditQuery { limit: Some(1), ..AuditQuery::default() });
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn malformed_lines_are_skipped_during_query() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(FixedClock(1_700_000_000_000));
        let journal = AuditJournal::open(
            dir.path().join("audit"),
            AuditSettings::default(),
            Arc::new(NullLogger),
            clock.clone(),
        )
        .unwrap();
        let shard = dir.path().join("audit").join(format!("{}.jsonl", epoch_ms_to_date(clock.0)));
        append_line(&shard, "not json").unwrap();
        journal.record(sample_record(1, clock.0, "atlas", "allow"));
        journal.flush().unwrap();
        let results = journal.query(&AuditQuery::default());
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn expired_shards_are_pruned_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let old_shard = dir.path().join("audit").join("2000-01-01.jsonl");
        fs::create_dir_all(old_shard.parent().unwrap()).unwrap();
        fs::write(&old_shard, "{}\n").unwrap();
        let clock = Arc::new(FixedClock(1_700_000_000_000));
        let _journal =
            AuditJournal::open(dir.path().join("audit"), AuditSettings::default(), Arc::new(NullLogger), clock)
                .unwrap();
        assert!(!old_shard.exists());
    }
}
