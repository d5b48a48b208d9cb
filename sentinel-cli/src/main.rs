// sentinel-cli/src/main.rs
// ============================================================================
// Module: Sentinel CLI Entry Point
// Description: Standalone offline invocation of the non-transport command handlers.
// Purpose: Let an operator query governance/knowledge/trace state without a host.
// Dependencies: clap, sentinel_config, sentinel_core, sentinel_governance, sentinel_knowledge, sentinel_trace, tokio
// ============================================================================

//! ## Overview
//! The plugin host normally registers these [`sentinel_core::interfaces::CommandHandler`]s
//! itself (`spec.md` §6). This binary exists for operators without a host
//! running: it builds the same governance/knowledge stack the host would
//! and dispatches to the same handlers. `trace-analyze` is absent here
//! because it requires a live event-store transport only the host
//! supplies; use [`sentinel_trace::TraceOrchestrator`] directly when one is
//! available.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use clap::Subcommand;
use sentinel_core::interfaces::CommandHandler;
use sentinel_core::interfaces::NullLogger;
use sentinel_governance::AuditJournal;
use sentinel_governance::GovernanceOrchestrator;
use sentinel_governance::PolicyIndex;
use sentinel_governance::TrustManager;
use sentinel_governance::Vault;
use sentinel_knowledge::FactStore;
use sentinel_providers::clock::Clock;
use sentinel_providers::clock::SystemClock;

use sentinel_cli::CortexStatusCommand;
use sentinel_cli::GovernanceCommand;
use sentinel_cli::SitrepCommand;
use sentinel_cli::TraceStatusCommand;

const PLUGIN_NAME: &str = "sentinel";
const FREQUENCY_CAPACITY: usize = 4096;

#[derive(Debug, Parser)]
#[command(name = "sentinel-cli", about = "Offline reporting over the Sentinel governance and knowledge state")]
struct Cli {
    /// Overrides the workspace directory; defaults to the plugin's standard location.
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Vault, audit, and fact-store counters.
    Cortexstatus,
    /// Trace analyzer cursor and last report.
    TraceStatus,
    /// Recent governance audit records. Accepts `agent=`, `verdict=`, `limit=` filters.
    Governance {
        /// Filter arguments, e.g. `agent=atlas verdict=deny limit=5`.
        filters: Vec<String>,
    },
    /// Cross-subsystem situational report. Accepts `refresh` or `collectors`.
    Sitrep {
        /// `refresh` force-flushes pending state first; `collectors` lists data sources.
        mode: Option<String>,
    },
}

fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(stdout, "{message}")
}

fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(stderr, "{message}")
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let workspace_dir = cli.workspace.unwrap_or_else(|| sentinel_config::loader::default_workspace_dir(PLUGIN_NAME));

    let settings = match sentinel_config::loader::load(PLUGIN_NAME, &serde_json::Value::Null) {
        Ok(settings) => settings,
        Err(err) => {
            let _ = write_stderr_line(&format!("failed to load configuration: {err}"));
            return ExitCode::FAILURE;
        }
    };

    let logger: Arc<dyn sentinel_core::interfaces::Logger> = Arc::new(NullLogger);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let now_ms = clock.now_ms();

    let trust = TrustManager::load(&TrustManager::default_path(&workspace_dir), settings.governance.trust, logger.clone(), now_ms);
    let vault = Vault::new(&settings.governance.vault);
    let audit = match AuditJournal::open(AuditJournal::default_dir(&workspace_dir), settings.governance.audit, logger.clone(), clock.clone()) {
        Ok(audit) => audit,
        Err(err) => {
            let _ = write_stderr_line(&format!("failed to open audit journal: {err}"));
            return ExitCode::FAILURE;
        }
    };
    let policies = PolicyIndex::build(&[]).ok();
    let governance = Arc::new(GovernanceOrchestrator::new(
        settings.governance,
        policies,
        trust,
        FREQUENCY_CAPACITY,
        vault,
        audit,
        logger.clone(),
        clock.clone(),
    ));
    let facts = Arc::new(FactStore::load(FactStore::default_path(&workspace_dir), settings.knowledge, logger.clone(), clock));

    // One-shot maintenance: a standalone invocation has no background
    // `MaintenanceService` ticking on its behalf, so run the same
    // vault-eviction/audit-flush/fact-flush/trust-persist work once before
    // reporting, ensuring state is durable even for a single-command run.
    governance.tick(now_ms);
    if let Err(err) = facts.flush() {
        let _ = write_stderr_line(&format!("failed to flush fact store: {err}"));
    }
    governance.persist_trust(&TrustManager::default_path(&workspace_dir), now_ms);

    let output = match cli.command {
        Commands::Cortexstatus => CortexStatusCommand::new(governance, facts).handle(&[]).await,
        Commands::TraceStatus => TraceStatusCommand::new(workspace_dir).handle(&[]).await,
        Commands::Governance { filters } => GovernanceCommand::new(governance).handle(&filters).await,
        Commands::Sitrep { mode } => {
            let args: Vec<String> = mode.into_iter().collect();
            SitrepCommand::new(governance, facts, workspace_dir).handle(&args).await
        }
    };

    match write_stdout_line(&output.text) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let _ = write_stderr_line(&format!("failed to write output: {err}"));
            ExitCode::FAILURE
        }
    }
}
