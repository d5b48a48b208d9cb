// sentinel-core/src/lib.rs
// ============================================================================
// Crate: sentinel-core
// Description: Shared data model, host interfaces, and redaction primitives.
// ============================================================================

//! ## Overview
//! `sentinel-core` is the one crate every other member of the suite depends
//! on. It owns:
//!
//! - Identifiers ([`ids`]),
//! - Event normalization ([`event`]),
//! - Hashing helpers ([`hashing`]),
//! - Atomic file persistence ([`atomic`]),
//! - Secret redaction ([`redact`]),
//! - The traits the plugin host supplies ([`interfaces`]).
//!
//! Nothing policy- or trace-specific lives here; those belong to
//! `sentinel-governance` and `sentinel-trace` respectively, both of which
//! build on top of these primitives.

pub mod atomic;
pub mod event;
pub mod hashing;
pub mod ids;
pub mod interfaces;
pub mod redact;

pub use event::EventKind;
pub use event::NormalizedEvent;
pub use event::Payload;
pub use event::SkipReason;
pub use event::canonicalize_session_label;
pub use event::normalize;
pub use ids::AgentId;
pub use ids::AuditRecordId;
pub use ids::ChainId;
pub use ids::ChannelId;
pub use ids::FactId;
pub use ids::FindingId;
pub use ids::PolicyId;
pub use ids::RuleId;
pub use ids::SessionId;
pub use interfaces::HookDispatcher;
pub use interfaces::HostConfig;
pub use interfaces::Logger;
pub use interfaces::NullLogger;
pub use interfaces::PluginConfig;
pub use redact::PlaceholderMinter;
pub use redact::RedactionCategory;
pub use redact::Redactor;
pub use redact::StatelessMinter;
