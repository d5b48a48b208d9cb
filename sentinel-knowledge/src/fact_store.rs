// sentinel-knowledge/src/fact_store.rs
// ============================================================================
// Module: Fact Store
// Description: Debounced, atomically persisted key-value store of semantic triples.
// Purpose: Give the governance output validator (and future embedding sync) durable facts.
// Dependencies: sentinel_core, sentinel_config, sentinel_providers
// ============================================================================

//! ## Overview
//! One [`Fact`] per `(subject, predicate, object)` triple, keyed internally
//! by a [`FactId`] (`spec.md` §4.13). [`FactStore::add_fact`] deduplicates
//! on the triple: a repeat boosts the existing entry's relevance by
//! [`KnowledgeSettings::relevance_boost`] of the remaining distance to
//! `1.0` rather than inserting a second row. [`FactStore::get_fact`] applies
//! the same boost on read; [`FactStore::query`] does not, since it may
//! return many facts at once.
//!
//! Persistence is debounced rather than synchronous: a write marks the
//! store dirty with the current time, and [`FactStore::tick`] flushes once
//! [`KnowledgeSettings::persist_debounce_ms`] has elapsed since the last
//! dirty mark, mirroring [`crate`]'s host-driven tick convention rather
//! than self-scheduling a timer. [`FactStore::flush`] forces an immediate
//! write, for callers that need to persist before shutdown.

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use sentinel_config::KnowledgeSettings;
use sentinel_core::FactId;
use sentinel_core::atomic::write_atomic;
use sentinel_core::interfaces::Logger;
use sentinel_providers::clock::Clock;
use sentinel_providers::clock::epoch_ms_to_iso;
use serde::Deserialize;
use serde::Serialize;

/// A `source` tag commonly seen on an ingested fact. The field itself is a
/// plain string (`spec.md` §3's "source tag ∈ {ingested, extracted-llm, …}"
/// is an open set, not a closed enum).
pub const SOURCE_INGESTED: &str = "ingested";
/// Source tag for a fact an LLM stage extracted from conversation text.
pub const SOURCE_EXTRACTED_LLM: &str = "extracted-llm";

/// One `(subject, predicate, object)` triple with relevance and access
/// bookkeeping (`spec.md` §3 "Fact (triple)").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    /// Stable identifier.
    pub id: FactId,
    /// The thing the fact is about.
    pub subject: String,
    /// The relation asserted between subject and object.
    pub predicate: String,
    /// The asserted value.
    pub object: String,
    /// Where the fact came from (`"ingested"`, `"extracted-llm"`, ...).
    pub source: String,
    /// Epoch ms the fact was first recorded.
    pub created_at_ms: i64,
    /// Epoch ms the fact was last touched by `addFact` or `getFact`.
    pub last_accessed_ms: i64,
    /// Relevance, always in `0.1..=1.0`.
    pub relevance: f64,
    /// Epoch ms the fact was last embedded, if ever.
    pub embedded_at_ms: Option<i64>,
}

fn boost(relevance: f64, fraction: f64) -> f64 {
    (relevance + (1.0 - relevance) * fraction).clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FactFile {
    updated: String,
    facts: Vec<Fact>,
}

struct FactStoreState {
    facts: HashMap<FactId, Fact>,
    dirty_since_ms: Option<i64>,
}

/// Debounced, atomically persisted fact store (`spec.md` §4.13).
pub struct FactStore {
    path: PathBuf,
    settings: KnowledgeSettings,
    logger: Arc<dyn Logger>,
    clock: Arc<dyn Clock>,
    state: Mutex<FactStoreState>,
}

impl FactStore {
    /// Creates an empty store backed by `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, settings: KnowledgeSettings, logger: Arc<dyn Logger>, clock: Arc<dyn Clock>) -> Self {
        Self { path: path.into(), settings, logger, clock, state: Mutex::new(FactStoreState { facts: HashMap::new(), dirty_since_ms: None }) }
    }

    /// Loads `facts.json` from `path`. A missing or malformed file yields an
    /// empty store rather than an error.
    #[must_use]
    pub fn load(path: impl Into<PathBuf>, settings: KnowledgeSettings, logger: Arc<dyn Logger>, clock: Arc<dyn Clock>) -> Self {
        let path = path.into();
        let store = Self::new(path.clone(), settings, logger, clock);
        let Ok(raw) = std::fs::read_to_string(&path) else { return store };
        let Ok(file) = serde_json::from_str::<FactFile>(&raw) else {
            store.logger.warn("facts.json is malformed; starting from an empty fact store");
            return store;
        };
        let mut state = store.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        for fact in file.facts {
            state.facts.insert(fact.id, fact);
        }
        drop(state);
        store
    }

    /// Default on-disk path under a workspace directory.
    #[must_use]
    pub fn default_path(workspace_dir: &Path) -> PathBuf {
        workspace_dir.join("facts.json")
    }

    fn mark_dirty(&self, state: &mut FactStoreState, now_ms: i64) {
        if state.dirty_since_ms.is_none() {
            state.dirty_since_ms = Some(now_ms);
        }
    }

    fn prune_locked(&self, state: &mut FactStoreState) {
        if state.facts.len() <= self.settings.max_facts {
            return;
        }
        let mut ordered: Vec<FactId> = state.facts.keys().copied().collect();
        ordered.sort_by(|a, b| {
            let fa = &state.facts[a];
            let fb = &state.facts[b];
            fa.relevance.total_cmp(&fb.relevance).then(fa.last_accessed_ms.cmp(&fb.last_accessed_ms))
        });
        let overflow = state.facts.len() - self.settings.max_facts;
        for id in ordered.into_iter().take(overflow) {
            state.facts.remove(&id);
        }
    }

    /// Records `(subject, predicate, object)`. A matching existing triple is
    /// boosted and touched rather than duplicated; pruning then runs if the
    /// store exceeds `maxFacts`.
    #[allow(clippy::missing_panics_doc, reason = "mutex is never held across a panic in this module")]
    pub fn add_fact(&self, subject: &str, predicate: &str, object: &str, source: &str, now_ms: i64) -> FactId {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let existing = state.facts.values().find(|f| f.subject == subject && f.predicate == predicate && f.object == object).map(|f| f.id);

        let id = if let Some(id) = existing {
            let boost_fraction = self.settings.relevance_boost;
            if let Some(fact) = state.facts.get_mut(&id) {
                fact.relevance = boost(fact.relevance, boost_fraction);
                fact.last_accessed_ms = now_ms;
            }
            id
        } else {
            let id = FactId::new_v4();
            state.facts.insert(
                id,
                Fact {
                    id,
                    subject: subject.to_string(),
                    predicate: predicate.to_string(),
                    object: object.to_string(),
                    source: source.to_string(),
                    created_at_ms: now_ms,
                    last_accessed_ms: now_ms,
                    relevance: 1.0,
                    embedded_at_ms: None,
                },
            );
            id
        };
        self.prune_locked(&mut state);
        self.mark_dirty(&mut state, now_ms);
        id
    }

    /// Reads a fact by id, boosting its relevance and touching
    /// `lastAccessed` exactly as `addFact` does for a repeat triple.
    #[allow(clippy::missing_panics_doc, reason = "mutex is never held across a panic in this module")]
    pub fn get_fact(&self, id: FactId, now_ms: i64) -> Option<Fact> {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let boost_fraction = self.settings.relevance_boost;
        let fact = state.facts.get_mut(&id)?;
        fact.relevance = boost(fact.relevance, boost_fraction);
        fact.last_accessed_ms = now_ms;
        let result = fact.clone();
        self.mark_dirty(&mut state, now_ms);
        Some(result)
    }

    /// Returns every fact matching all of the given (optional) fields,
    /// sorted by relevance descending. Does not boost relevance.
    #[allow(clippy::missing_panics_doc, reason = "mutex is never held across a panic in this module")]
    #[must_use]
    pub fn query(&self, subject: Option<&str>, predicate: Option<&str>, object: Option<&str>) -> Vec<Fact> {
        let state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut results: Vec<Fact> = state
            .facts
            .values()
            .filter(|f| subject.is_none_or(|s| f.subject == s))
            .filter(|f| predicate.is_none_or(|p| f.predicate == p))
            .filter(|f| object.is_none_or(|o| f.object == o))
            .cloned()
            .collect();
        results.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
        results
    }

    /// Multiplies every fact's relevance by `(1 - rate)`, floored at
    /// [`KnowledgeSettings::decay_floor`]. Marks the store dirty if any
    /// relevance actually changed.
    #[allow(clippy::missing_panics_doc, reason = "mutex is never held across a panic in this module")]
    pub fn decay_facts(&self, rate: f64, now_ms: i64) {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let floor = self.settings.decay_floor;
        let mut changed = false;
        for fact in state.facts.values_mut() {
            let decayed = (fact.relevance * (1.0 - rate)).max(floor);
            if (decayed - fact.relevance).abs() > f64::EPSILON {
                fact.relevance = decayed;
                changed = true;
            }
        }
        if changed {
            self.mark_dirty(&mut state, now_ms);
        }
    }

    /// Facts that have never been embedded.
    #[allow(clippy::missing_panics_doc, reason = "mutex is never held across a panic in this module")]
    #[must_use]
    pub fn get_unembedded_facts(&self) -> Vec<Fact> {
        let state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        state.facts.values().filter(|f| f.embedded_at_ms.is_none()).cloned().collect()
    }

    /// Marks every fact in `ids` as embedded at `now_ms`. Unknown ids are
    /// silently skipped.
    #[allow(clippy::missing_panics_doc, reason = "mutex is never held across a panic in this module")]
    pub fn mark_facts_as_embedded(&self, ids: &[FactId], now_ms: i64) {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        for id in ids {
            if let Some(fact) = state.facts.get_mut(id) {
                fact.embedded_at_ms = Some(now_ms);
            }
        }
        self.mark_dirty(&mut state, now_ms);
    }

    /// Flushes the store to disk if it has been dirty for at least
    /// `persistDebounceMs`. Call roughly once per second; a no-op when
    /// nothing is pending or the debounce window hasn't elapsed.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`io::Error`] if the write fails.
    #[allow(clippy::missing_panics_doc, reason = "mutex is never held across a panic in this module")]
    pub fn tick(&self, now_ms: i64) -> io::Result<()> {
        let should_flush = {
            let state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            let debounce_ms = i64::try_from(self.settings.persist_debounce_ms).unwrap_or(i64::MAX);
            state.dirty_since_ms.is_some_and(|since| now_ms - since >= debounce_ms)
        };
        if should_flush { self.flush() } else { Ok(()) }
    }

    /// Forces an immediate write regardless of the debounce window.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`io::Error`] if the write fails.
    #[allow(clippy::missing_panics_doc, reason = "mutex is never held across a panic in this module")]
    pub fn flush(&self) -> io::Result<()> {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let file = FactFile {
            updated: epoch_ms_to_iso(self.clock.now_ms()),
            facts: {
                let mut facts: Vec<Fact> = state.facts.values().cloned().collect();
                facts.sort_by(|a, b| (&a.subject, &a.predicate, &a.object).cmp(&(&b.subject, &b.predicate, &b.object)));
                facts
            },
        };
        let bytes = serde_json::to_vec_pretty(&file).unwrap_or_default();
        write_atomic(&self.path, &bytes)?;
        state.dirty_since_ms = None;
        Ok(())
    }

    /// Current fact count.
    #[allow(clippy::missing_panics_doc, reason = "mutex is never held across a panic in this module")]
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner).facts.len()
    }

    /// True if the store currently holds no facts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "unit tests favor unwrap/expect for clarity")]
    use super::*;
    use sentinel_core::interfaces::NullLogger;
    use sentinel_providers::clock::FixedClock;

    fn store() -> FactStore {
        FactStore::new("facts.json", KnowledgeSettings::default(), Arc::new(NullLogger), Arc::new(FixedClock(0)))
    }

    #[test]
    fn repeat_triple_boosts_relevance_instead_of_duplicating() {
        let store = store();
        let first = store.add_fact("payments", "status", "online", SOURCE_INGESTED, 0);
        assert_eq!(store.len(), 1);
        let second = store.add_fact("payments", "status", "online", SOURCE_INGESTED, 1000);
        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
        let fact = store.get_fact(first, 2000).unwrap();
        assert!(fact.relevance > 0.9, "boosted twice from 1.0 should stay pinned near 1.0");
    }

    #[test]
    fn new_fact_starts_at_full_relevance() {
        let store = store();
        let id = store.add_fact("atlas", "role", "operator", SOURCE_INGESTED, 0);
        let fact = store.get_fact(id, 0).unwrap();
        assert!((fact.relevance - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn get_fact_boosts_and_touches_last_accessed() {
        let store = store();
        let mut settings = KnowledgeSettings::default();
        settings.relevance_boost = 0.5;
        let id = store.add_fact("atlas", "role", "operator", SOURCE_INGESTED, 0);
        store.decay_facts(0.5, 1000);
        let decayed = store.query(None, None, None)[0].relevance;
        let fact = store.get_fact(id, 2000).unwrap();
        assert!(fact.relevance > decayed);
        assert_eq!(fact.last_accessed_ms, 2000);
    }

    #[test]
    fn query_filters_by_any_combination_of_fields_and_sorts_by_relevance() {
        let store = store();
        store.add_fact("atlas", "role", "operator", SOURCE_INGESTED, 0);
        store.add_fact("nova", "role", "observer", SOURCE_INGESTED, 0);
        let id = store.add_fact("atlas", "status", "online", SOURCE_INGESTED, 0);
        store.get_fact(id, 10);

        let by_subject = store.query(Some("atlas"), None, None);
        assert_eq!(by_subject.len(), 2);
        assert!(by_subject[0].relevance >= by_subject[1].relevance);

        let by_predicate = store.query(None, Some("role"), None);
        assert_eq!(by_predicate.len(), 2);
    }

    #[test]
    fn decay_facts_multiplies_and_floors_relevance() {
        let store = store();
        let id = store.add_fact("atlas", "role", "operator", SOURCE_INGESTED, 0);
        store.decay_facts(0.95, 1000);
        let fact = store.query(None, None, None).into_iter().find(|f| f.id == id).unwrap();
        assert!((fact.relevance - KnowledgeSettings::default().decay_floor).abs() < 1e-9);
    }

    #[test]
    fn prune_drops_least_relevant_oldest_entries_past_max_facts() {
        let mut settings = KnowledgeSettings::default();
        settings.max_facts = 2;
        let store = FactStore::new("facts.json", settings, Arc::new(NullLogger), Arc::new(FixedClock(0)));
        store.add_fact("a", "p", "1", SOURCE_INGESTED, 0);
        store.add_fact("b", "p", "2", SOURCE_INGESTED, 1);
        store.add_fact("c", "p", "3", SOURCE_INGESTED, 2);
        assert_eq!(store.len(), 2);
        assert!(store.query(Some("a"), None, None).is_empty());
    }

    #[test]
    fn unembedded_facts_are_reported_until_marked() {
        let store = store();
        let id = store.add_fact("atlas", "role", "operator", SOURCE_INGESTED, 0);
        assert_eq!(store.get_unembedded_facts().len(), 1);
        store.mark_facts_as_embedded(&[id], 5);
        assert!(store.get_unembedded_facts().is_empty());
    }

    #[test]
    fn tick_flushes_only_after_the_debounce_window_elapses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facts.json");
        let mut settings = KnowledgeSettings::default();
        settings.persist_debounce_ms = 1000;
        let store = FactStore::new(&path, settings, Arc::new(NullLogger), Arc::new(FixedClock(0)));
        store.add_fact("atlas", "role", "operator", SOURCE_INGESTED, 0);
        store.tick(500).unwrap();
        assert!(!path.exists());
        store.tick(1000).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn load_recovers_a_previously_flushed_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facts.json");
        let store = FactStore::new(&path, KnowledgeSettings::default(), Arc::new(NullLogger), Arc::new(FixedClock(0)));
        store.add_fact("atlas", "role", "operator", SOURCE_INGESTED, 0);
        store.flush().unwrap();

        let reloaded = FactStore::load(&path, KnowledgeSettings::default(), Arc::new(NullLogger), Arc::new(FixedClock(0)));
        assert_eq!(reloaded.len(), 1);
    }

    #[test]
    fn missing_file_loads_as_empty_store() {
        let reloaded = FactStore::load(
            "/nonexistent/facts.json",
            KnowledgeSettings::default(),
            Arc::new(NullLogger),
            Arc::new(FixedClock(0)),
        );
        assert!(reloaded.is_empty());
    }
}
