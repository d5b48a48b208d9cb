// sentinel-governance/src/lib.rs
// ============================================================================
// Crate: sentinel-governance
// Description: Policy evaluation, trust, risk, redaction, output validation, and audit.
// Purpose: Public surface for the Governance Engine subsystem.
// ============================================================================

//! Governance Engine: evaluates every hook-dispatched event against a
//! compiled policy set, scored by trust and risk, with reversible
//! redaction and a day-sharded audit trail (`spec.md` §4.7-§4.14).

pub mod audit;
pub mod frequency;
pub mod orchestrator;
pub mod output_validator;
pub mod policy;
pub mod risk;
pub mod trust;
pub mod vault;

pub use audit::AuditJournal;
pub use audit::AuditQuery;
pub use audit::AuditRecord;
pub use audit::build_record;
pub use audit::derive_controls;
pub use frequency::FrequencyEvent;
pub use frequency::FrequencyScope;
pub use frequency::FrequencyTracker;
pub use orchestrator::GovernanceDecision;
pub use orchestrator::GovernanceOrchestrator;
pub use orchestrator::GovernanceRequest;
pub use output_validator::Claim;
pub use output_validator::ClaimDetector;
pub use output_validator::ClaimKind;
pub use output_validator::ClaimVerdict;
pub use output_validator::FactRegistry;
pub use output_validator::ValidationAction;
pub use output_validator::ValidationOutcome;
pub use output_validator::llm_fact_check;
pub use output_validator::validate;
pub use policy::Effect;
pub use policy::PolicyCompileError;
pub use policy::PolicyContext;
pub use policy::PolicyIndex;
pub use policy::PolicyMatch;
pub use policy::PolicyScope;
pub use policy::PolicyVerdict;
pub use policy::RawCondition;
pub use policy::RawPolicy;
pub use policy::RawRule;
pub use risk::RiskAssessment;
pub use risk::RiskContext;
pub use risk::RiskFactor;
pub use risk::RiskLevel;
pub use risk::assess;
pub use trust::TrustEventKind;
pub use trust::TrustManager;
pub use trust::TrustRecord;
pub use trust::TrustSignals;
pub use trust::TrustTier;
pub use vault::Vault;
pub use vault::VaultMinter;
