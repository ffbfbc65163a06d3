//! rigger CLI: load a project directory, build an execution context, and
//! run deployment jobs.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Invalid usage / project load error
//!   2 - Job execution failure

use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand};
use rigger_core::{EngineEvent, EventSink, Severity};
use rigger_engine::artifacts::ContractRepository;
use rigger_engine::engine::{Engine, EngineOptions};
use rigger_engine::loader::Project;
use rigger_engine::rpc::HttpChain;
use rigger_engine::signer::LocalWalletSigner;
use rigger_engine::verification::PlatformRegistry;
use rigger_engine::{scheduler, Constants, ExecutionContext};
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "rigger", version, about = "Declarative EVM deployment and on-chain operations")]
struct Cli {
    /// Log filter (tracing env-filter syntax)
    #[arg(long, global = true, default_value = "info", env = "RIGGER_LOG")]
    log: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ProjectArgs {
    /// Project directory (jobs/, templates/, constants.yaml, networks.yaml)
    #[arg(long, default_value = ".")]
    project: PathBuf,

    /// Artifact root scanned for build-info bundles
    /// (default: PROJECT/artifacts)
    #[arg(long)]
    artifacts: Option<PathBuf>,
}

#[derive(Args)]
struct RunArgs {
    /// Network name from networks.yaml
    #[arg(long)]
    network: String,

    /// Private key for transaction signing (0x-prefixed hex, or env:VAR_NAME)
    #[arg(long, env = "RIGGER_PRIVATE_KEY")]
    private_key: String,

    /// Etherscan API key for contract verification
    #[arg(long, env = "ETHERSCAN_API_KEY")]
    etherscan_api_key: Option<String>,

    /// Disable the post-execution skip-check
    #[arg(long, default_value_t = false)]
    no_post_check: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single job
    Run {
        #[command(flatten)]
        project: ProjectArgs,

        #[command(flatten)]
        run: RunArgs,

        /// Job name
        #[arg(long)]
        job: String,
    },

    /// Run every job, in job-dependency order
    RunAll {
        #[command(flatten)]
        project: ProjectArgs,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Print the scheduled action order of a job without executing
    Plan {
        #[command(flatten)]
        project: ProjectArgs,

        /// Job name
        #[arg(long)]
        job: String,
    },

    /// List the project's jobs and templates
    List {
        #[command(flatten)]
        project: ProjectArgs,
    },
}

/// Renders engine events through tracing at their severity.
struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: EngineEvent) {
        match event.severity() {
            Severity::Debug => tracing::debug!("{}", event),
            Severity::Info => tracing::info!("{}", event),
            Severity::Warn => tracing::warn!("{}", event),
            Severity::Error => tracing::error!("{}", event),
        }
    }
}

enum CliError {
    Usage(anyhow::Error),
    Execution(anyhow::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log);

    match dispatch(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Usage(e)) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
        Err(CliError::Execution(e)) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

fn init_tracing(filter: &str) {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Run { project, run, job } => {
            let loaded = load_project(&project)?;
            let names = vec![job];
            run_jobs(&project, &loaded, &run, &names).await
        }
        Commands::RunAll { project, run } => {
            let loaded = load_project(&project)?;
            let names = loaded.job_order().map_err(|e| CliError::Usage(e.into()))?;
            run_jobs(&project, &loaded, &run, &names).await
        }
        Commands::Plan { project, job } => {
            let loaded = load_project(&project)?;
            plan_job(&loaded, &job)
        }
        Commands::List { project } => {
            let loaded = load_project(&project)?;
            list_project(&loaded);
            Ok(())
        }
    }
}

fn load_project(args: &ProjectArgs) -> Result<Project, CliError> {
    Project::load(&args.project)
        .with_context(|| format!("loading project {}", args.project.display()))
        .map_err(CliError::Usage)
}

async fn run_jobs(
    project_args: &ProjectArgs,
    project: &Project,
    run: &RunArgs,
    names: &[String],
) -> Result<(), CliError> {
    let network = project
        .networks
        .get(&run.network)
        .ok_or_else(|| {
            CliError::Usage(anyhow!(
                "network '{}' not found in networks.yaml (known: {})",
                run.network,
                project.networks.keys().cloned().collect::<Vec<_>>().join(", ")
            ))
        })?
        .clone();

    let key = resolve_key(&run.private_key).map_err(CliError::Usage)?;
    let signer = alloy::signers::local::PrivateKeySigner::from_str(&key)
        .map_err(|e| CliError::Usage(anyhow!("invalid private key: {}", e)))?;

    let artifacts_root = project_args
        .artifacts
        .clone()
        .unwrap_or_else(|| project_args.project.join("artifacts"));
    // Read-only after loading; shared by every job's context.
    let repository = Arc::new(
        ContractRepository::load(&artifacts_root).map_err(|e| CliError::Usage(e.into()))?,
    );
    tracing::info!(
        "loaded {} contract artifact(s) from {}",
        repository.len(),
        artifacts_root.display()
    );

    let engine = Engine::new(
        project.templates.clone(),
        PlatformRegistry::with_default_platforms(run.etherscan_api_key.clone()),
        Arc::new(TracingSink),
        EngineOptions {
            post_check: !run.no_post_check,
        },
    );

    // Each job gets a fresh context: outputs do not persist across runs.
    for name in names {
        let job = project
            .jobs
            .get(name)
            .ok_or_else(|| CliError::Usage(anyhow!("job '{}' not found in project", name)))?;
        let mut ctx = ExecutionContext::new(
            network.clone(),
            Arc::new(HttpChain::new(&network.rpc_url, signer.clone())),
            Arc::new(LocalWalletSigner::new(signer.clone())),
            repository.clone(),
            Constants::new(project.constants.clone()),
        );
        engine
            .execute_job(job, &mut ctx)
            .await
            .with_context(|| format!("job '{}' failed", name))
            .map_err(CliError::Execution)?;
    }
    Ok(())
}

fn plan_job(project: &Project, name: &str) -> Result<(), CliError> {
    let job = project
        .jobs
        .get(name)
        .ok_or_else(|| CliError::Usage(anyhow!("job '{}' not found in project", name)))?;
    let order = scheduler::schedule(job).map_err(|e| CliError::Usage(e.into()))?;

    println!("job '{}' ({} actions):", job.name, job.actions.len());
    for (position, index) in order.iter().enumerate() {
        let action = &job.actions[*index];
        let key = scheduler::action_key(action.name.as_deref(), *index);
        let kind = action.kind().unwrap_or("?");
        match action.dependencies() {
            [] => println!("  {}. {} ({})", position + 1, key, kind),
            deps => println!(
                "  {}. {} ({}) after {}",
                position + 1,
                key,
                kind,
                deps.join(", ")
            ),
        }
    }
    Ok(())
}

fn list_project(project: &Project) {
    println!("jobs:");
    for job in project.jobs.values() {
        match job.depends_on.as_slice() {
            [] => println!("  {} ({} actions)", job.name, job.actions.len()),
            deps => println!(
                "  {} ({} actions, depends on {})",
                job.name,
                job.actions.len(),
                deps.join(", ")
            ),
        }
    }
    println!("templates:");
    for template in project.templates.values() {
        println!("  {} ({} actions)", template.name, template.actions.len());
    }
    println!("networks:");
    for network in project.networks.values() {
        println!("  {} (chain id {})", network.name, network.chain_id);
    }
}

/// Resolves a key argument that may be a direct hex value or an env:VAR
/// reference.
fn resolve_key(value: &str) -> anyhow::Result<String> {
    if let Some(var_name) = value.strip_prefix("env:") {
        std::env::var(var_name)
            .with_context(|| format!("failed to read env var '{}'", var_name))
    } else {
        Ok(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_key_passthrough_and_env() {
        assert_eq!(resolve_key("0xabc").unwrap(), "0xabc");
        std::env::set_var("RIGGER_TEST_KEY", "0xdef");
        assert_eq!(resolve_key("env:RIGGER_TEST_KEY").unwrap(), "0xdef");
        assert!(resolve_key("env:RIGGER_MISSING_KEY").is_err());
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "rigger",
            "run",
            "--project",
            "/tmp/p",
            "--job",
            "deploy",
            "--network",
            "sepolia",
            "--private-key",
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        ])
        .unwrap();
        match cli.command {
            Commands::Run { job, run, .. } => {
                assert_eq!(job, "deploy");
                assert_eq!(run.network, "sepolia");
                assert!(!run.no_post_check);
            }
            _ => panic!("expected run"),
        }
    }
}
