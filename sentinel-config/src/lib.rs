// sentinel-config/src/lib.rs
// ============================================================================
// Crate: sentinel-config
// Description: JSON config.json bootstrapping shared by every plugin.
// ============================================================================

//! ## Overview
//! Every plugin in the suite loads its settings the same way: resolve an
//! inline `{enabled, configPath}` pointer from the host's plugin config,
//! then load (or bootstrap) the JSON file it names. See [`loader::load`].

pub mod loader;
pub mod settings;

pub use loader::ConfigError;
pub use loader::default_workspace_dir;
pub use loader::load;
pub use settings::AuditSettings;
pub use settings::ClaimPolicy;
pub use settings::GovernanceSettings;
pub use settings::KnowledgeSettings;
pub use settings::LlmSettings;
pub use settings::OutputValidatorSettings;
pub use settings::PluginSettings;
pub use settings::RiskSettings;
pub use settings::TraceSettings;
pub use settings::TrustSettings;
pub use settings::VaultSettings;
