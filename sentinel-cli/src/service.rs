// sentinel-cli/src/service.rs
// ============================================================================
// Module: Maintenance Service
// Description: Background periodic maintenance over governance and knowledge state.
// Purpose: Implement the host's `registerService` contract for this suite.
// Dependencies: sentinel_core, sentinel_governance, sentinel_knowledge, sentinel_providers, tokio
// ============================================================================

//! The host starts one background [`sentinel_core::interfaces::Service`] at
//! plugin load (`spec.md` §5, §6's `registerService`). This is it: a single
//! `tokio::time::interval` loop that evicts expired vault entries, flushes
//! the audit journal, debounce-flushes the fact store, and periodically
//! persists the trust store, then stops cleanly when the host unloads the
//! plugin.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use sentinel_core::interfaces::Logger;
use sentinel_core::interfaces::Service;
use sentinel_governance::GovernanceOrchestrator;
use sentinel_knowledge::FactStore;
use sentinel_providers::clock::Clock;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Periodic governance and knowledge maintenance, registered with the host
/// as a single long-lived [`Service`].
pub struct MaintenanceService {
    governance: Arc<GovernanceOrchestrator>,
    facts: Arc<FactStore>,
    clock: Arc<dyn Clock>,
    logger: Arc<dyn Logger>,
    trust_path: PathBuf,
    persist_interval_seconds: u64,
    stop_signal: Arc<Notify>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl MaintenanceService {
    /// Builds the service. `trust_path` and `persist_interval_seconds`
    /// mirror [`sentinel_governance::GovernanceOrchestrator::persist_trust`]'s
    /// intended cadence (`GovernanceSettings::persist_interval_seconds`).
    #[must_use]
    pub fn new(
        governance: Arc<GovernanceOrchestrator>,
        facts: Arc<FactStore>,
        clock: Arc<dyn Clock>,
        logger: Arc<dyn Logger>,
        trust_path: impl Into<PathBuf>,
        persist_interval_seconds: u64,
    ) -> Self {
        Self {
            governance,
            facts,
            clock,
            logger,
            trust_path: trust_path.into(),
            persist_interval_seconds: persist_interval_seconds.max(1),
            stop_signal: Arc::new(Notify::new()),
            handle: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Service for MaintenanceService {
    fn id(&self) -> &str {
        "sentinel-governance-maintenance"
    }

    async fn start(&self) {
        let governance = self.governance.clone();
        let facts = self.facts.clone();
        let clock = self.clock.clone();
        let logger = self.logger.clone();
        let trust_path = self.trust_path.clone();
        let persist_interval_seconds = self.persist_interval_seconds;
        let stop_signal = self.stop_signal.clone();

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK_PERIOD);
            let mut elapsed_seconds: u64 = 0;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let now_ms = clock.now_ms();
                        governance.tick(now_ms);
                        if let Err(err) = facts.tick(now_ms) {
                            logger.error(&format!("fact store tick failed: {err}"));
                        }
                        elapsed_seconds = elapsed_seconds.saturating_add(1);
                        if elapsed_seconds >= persist_interval_seconds {
                            elapsed_seconds = 0;
                            governance.persist_trust(&trust_path, now_ms);
                        }
                    }
                    () = stop_signal.notified() => break,
                }
            }
        });

        *self.handle.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = Some(task);
    }

    async fn stop(&self) {
        self.stop_signal.notify_one();
        let task = self.handle.lock().unwrap_or_else(std::sync::PoisonError::into_inner).take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}
