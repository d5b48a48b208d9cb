// sentinel-trace/src/lib.rs
// ============================================================================
// Crate: sentinel-trace
// Description: Chain reconstruction, signal detection, and LLM classification.
// Purpose: Public surface for the Trace Analyzer subsystem.
// ============================================================================

//! Trace Analyzer: reconstructs conversation chains from a raw event
//! stream, detects failure signals over them, optionally classifies those
//! signals with a language model, and persists an analysis report
//! (`spec.md` §4.2-4.6, §4.15).

pub mod chain;
pub mod classify;
pub mod detectors;
pub mod orchestrator;
pub mod state;

pub use chain::BoundaryTag;
pub use chain::ChainConfig;
pub use chain::ConversationChain;
pub use chain::chain_id;
pub use chain::reconstruct;
pub use classify::ClassifierOverride;
pub use classify::DEFAULT_CONTEXT_RADIUS;
pub use classify::classify;
pub use classify::merge_llm_settings;
pub use classify::render_transcript;
pub use classify::triage;
pub use detectors::ActionType;
pub use detectors::Classification;
pub use detectors::DetectorConfig;
pub use detectors::Finding;
pub use detectors::RepeatFailState;
pub use detectors::Severity;
pub use detectors::SignalKind;
pub use detectors::detect_all;
pub use orchestrator::TraceOrchestrator;
pub use orchestrator::TraceRunError;
pub use state::ReportFinding;
pub use state::TraceAnalysisReport;
pub use state::TraceAnalyzerState;
