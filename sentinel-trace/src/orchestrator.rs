// sentinel-trace/src/orchestrator.rs
// ============================================================================
// Module: Trace Orchestrator
// Description: Fetch -> reconstruct -> detect -> classify -> persist pipeline.
// Purpose: Glue the Trace Analyzer's stages into one scheduled or on-demand run.
// Dependencies: sentinel_broker, sentinel_core, sentinel_config, sentinel_providers
// ============================================================================

//! ## Overview
//! `spec.md` §4.15. For each run, determines `[startMs, endMs)` — a full run
//! is `[0, now)`; an incremental run is
//! `[lastProcessedTs - incrementalContextWindowMin*60_000, now)`, the
//! context window defending against out-of-order event arrival. Pulls
//! events (§4.2), reconstructs chains (§4.3), detects signals, and
//! optionally classifies (§4.6) — always redacting the chain before
//! handing it to the model. Emits `trace-analysis-report.json` and
//! `trace-analyzer-state.json` atomically. A run in progress rejects
//! re-entry (§4.15 "Ordering guarantees": single-caller pattern).

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use sentinel_broker::EventFetcher;
use sentinel_broker::EventFilter;
use sentinel_config::LlmSettings;
use sentinel_config::TraceSettings;
use sentinel_core::interfaces::EventStoreTransport;
use sentinel_core::interfaces::Logger;
use sentinel_providers::clock::epoch_ms_to_iso;
use sentinel_providers::llm::LlmClient;
use uuid::Uuid;

use crate::chain;
use crate::chain::ChainConfig;
use crate::chain::ConversationChain;
use crate::classify;
use crate::detectors::DetectorConfig;
use crate::detectors::RepeatFailState;
use crate::detectors::detect_all;
use crate::state::ReportFinding;
use crate::state::TraceAnalysisReport;
use crate::state::TraceAnalyzerState;

/// Failure modes for [`TraceOrchestrator::run`].
#[derive(Debug, thiserror::Error)]
pub enum TraceRunError {
    /// A run is already in progress; this call was rejected rather than queued.
    #[error("a trace analysis run is already in progress")]
    AlreadyRunning,
    /// State or report persistence failed.
    #[error("trace state I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Glues the fetch -> reconstruct -> detect -> classify -> persist pipeline.
pub struct TraceOrchestrator<T> {
    fetcher: EventFetcher<T>,
    llm_client: LlmClient,
    trace_settings: TraceSettings,
    llm_settings: LlmSettings,
    state_path: PathBuf,
    report_path: PathBuf,
    logger: Arc<dyn Logger>,
    running: AtomicBool,
}

impl<T: EventStoreTransport> TraceOrchestrator<T> {
    /// Builds an orchestrator over `transport`/`stream`, persisting state
    /// and reports under `workspace_dir`.
    pub fn new(
        transport: T,
        stream: impl Into<String>,
        workspace_dir: &std::path::Path,
        trace_settings: TraceSettings,
        llm_settings: LlmSettings,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            fetcher: EventFetcher::new(transport, stream, logger.clone()),
            llm_client: LlmClient::new(),
            trace_settings,
            llm_settings,
            state_path: workspace_dir.join("trace-analyzer-state.json"),
            report_path: workspace_dir.join("trace-analysis-report.json"),
            logger,
            running: AtomicBool::new(false),
        }
    }

    /// Runs one full or incremental pass. Rejects re-entry while a run is
    /// already in progress, per the single-caller ordering guarantee.
    ///
    /// # Errors
    ///
    /// Returns [`TraceRunError::AlreadyRunning`] on re-entry, or
    /// [`TraceRunError::Io`] if state/report persistence fails.
    pub async fn run(&self, full: bool, now_ms: i64) -> Result<TraceAnalysisReport, TraceRunError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(TraceRunError::AlreadyRunning);
        }
        let result = self.run_inner(full, now_ms).await;
        self.running.store(false, Ordering::SeqCst);
        result
    }

    async fn run_inner(&self, full: bool, now_ms: i64) -> Result<TraceAnalysisReport, TraceRunError> {
        let mut state = TraceAnalyzerState::load(&self.state_path)?;
        let start_ms = if full {
            0
        } else {
            let window_ms = i64::try_from(self.trace_settings.incremental_context_window_min).unwrap_or(i64::MAX) * 60_000;
            (state.last_processed_ts - window_ms).max(0)
        };
        let end_ms = now_ms;

        let events = self.fetcher.fetch(start_ms, end_ms, &EventFilter::default()).await;
        let chain_config = ChainConfig {
            inactivity_gap_ms: i64::try_from(self.trace_settings.inactivity_gap_min).unwrap_or(i64::MAX) * 60_000,
            max_chain_events: self.trace_settings.max_chain_events,
        };
        let chains = chain::reconstruct(&events, &chain_config);

        let mut repeat_state = RepeatFailState::default();
        let mut findings = detect_all(&chains, &DetectorConfig::default(), &mut repeat_state);

        if self.llm_settings.endpoint.is_some() {
            self.classify_findings(&mut findings, &chains).await;
        }

        let max_ts = events.iter().map(|e| e.timestamp_ms).max();
        if let Some(ts) = max_ts {
            state.last_processed_ts = state.last_processed_ts.max(ts);
        }
        state.total_events_processed += u64::try_from(events.len()).unwrap_or(u64::MAX);
        state.total_findings += u64::try_from(findings.len()).unwrap_or(u64::MAX);

        let report_id = Uuid::new_v4();
        let generated_at = epoch_ms_to_iso(now_ms);
        state.last_report_id = Some(report_id);
        state.updated_at.clone_from(&generated_at);

        let report = TraceAnalysisReport {
            id: report_id,
            full_run: full,
            window: (start_ms, end_ms),
            chain_count: chains.len(),
            findings: findings.iter().map(ReportFinding::from).collect(),
            generated_at,
        };
        report.save(&self.report_path)?;
        state.save(&self.state_path)?;
        Ok(report)
    }

    /// Runs triage (if configured) then deep analysis for every surviving
    /// finding, redacting each chain slice before it reaches the model.
    async fn classify_findings(&self, findings: &mut Vec<crate::detectors::Finding>, chains: &[ConversationChain]) {
        let mut kept = Vec::with_capacity(findings.len());
        for mut finding in std::mem::take(findings) {
            if !classify::triage(&self.llm_client, &self.llm_settings, &mut finding).await {
                continue;
            }
            if let Some(owning_chain) = chains.iter().find(|c| c.id == finding.chain_id) {
                finding.classification = classify::classify(
                    &self.llm_client,
                    &self.llm_settings,
                    owning_chain,
                    &finding,
                    self.trace_settings.classify_context_radius,
                )
                .await;
                if finding.classification.is_none() {
                    self.logger.warn(&format!("classification failed for finding {}", finding.id));
                }
            }
            kept.push(finding);
        }
        *findings = kept;
    }
}
