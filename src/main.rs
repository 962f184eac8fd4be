use clap::{Parser, Subcommand};
use std::path::PathBuf;

use shadectl::cmd;
use shadectl::errors::LifecycleError;

#[derive(Parser)]
#[command(name = "shadectl")]
#[command(version, about = "Deploy and administer the Shade contracts on Stellar networks")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Answer yes to confirmation prompts
    #[arg(long, global = true)]
    pub yes: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Target network (e.g. testnet, futurenet). Falls back to
    /// defaults.network in shadectl.toml.
    #[arg(short, long, global = true)]
    pub network: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Deploy a contract's current build artifact
    Deploy {
        contract: String,
        /// Redeploy even if already deployed (creates a fresh instance)
        #[arg(long)]
        force: bool,
        /// Source account signing the deploy transaction
        #[arg(long)]
        source: Option<String>,
    },
    /// Initialize a deployed contract with its admin address
    Initialize {
        contract: String,
        #[arg(long)]
        admin: String,
    },
    /// Pause an active contract (admin only)
    Pause {
        contract: String,
        #[arg(long)]
        admin: String,
    },
    /// Unpause a paused contract (admin only)
    Unpause {
        contract: String,
        #[arg(long)]
        admin: String,
    },
    /// Install the current build artifact as new code without activating it
    Upgrade {
        contract: String,
        #[arg(long)]
        admin: String,
    },
    /// Activate the most recently installed code hash
    Activate {
        contract: String,
        #[arg(long)]
        admin: String,
    },
    /// Query the contract's admin and cross-check the ledger
    GetAdmin {
        contract: String,
        #[arg(long)]
        source: Option<String>,
    },
    /// Query the contract's paused flag and cross-check the ledger
    IsPaused {
        contract: String,
        #[arg(long)]
        source: Option<String>,
    },
    /// Re-query the network's authoritative state and repair the ledger
    Reconcile {
        contract: String,
        #[arg(long)]
        source: Option<String>,
    },
    /// Show tracked ledger state (all contracts if none given)
    Status { contract: Option<String> },
    /// Forget a contract's local ledger state
    Reset {
        contract: String,
        #[arg(long)]
        force: bool,
    },
    /// List configured networks
    Networks,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let project_dir = match &cli.project_dir {
        Some(dir) => dir.clone(),
        None => match std::env::current_dir() {
            Ok(dir) => dir,
            Err(e) => {
                eprintln!("{} failed to get current directory: {}", error_tag(), e);
                std::process::exit(9);
            }
        },
    };

    if let Err(err) = run(&cli, &project_dir).await {
        eprintln!("{} {}", error_tag(), err);
        std::process::exit(err.exit_code());
    }
}

async fn run(cli: &Cli, project_dir: &std::path::Path) -> Result<(), LifecycleError> {
    let network = cli.network.as_deref();
    match &cli.command {
        Commands::Deploy {
            contract,
            force,
            source,
        } => {
            cmd::cmd_deploy(
                project_dir,
                contract,
                network,
                source.as_deref(),
                *force,
                cli.yes,
            )
            .await
        }
        Commands::Initialize { contract, admin } => {
            cmd::cmd_initialize(project_dir, contract, network, admin).await
        }
        Commands::Pause { contract, admin } => {
            cmd::cmd_pause(project_dir, contract, network, admin).await
        }
        Commands::Unpause { contract, admin } => {
            cmd::cmd_unpause(project_dir, contract, network, admin).await
        }
        Commands::Upgrade { contract, admin } => {
            cmd::cmd_upgrade(project_dir, contract, network, admin).await
        }
        Commands::Activate { contract, admin } => {
            cmd::cmd_activate(project_dir, contract, network, admin).await
        }
        Commands::GetAdmin { contract, source } => {
            cmd::cmd_get_admin(project_dir, contract, network, source.as_deref()).await
        }
        Commands::IsPaused { contract, source } => {
            cmd::cmd_is_paused(project_dir, contract, network, source.as_deref()).await
        }
        Commands::Reconcile { contract, source } => {
            cmd::cmd_reconcile(project_dir, contract, network, source.as_deref()).await
        }
        Commands::Status { contract } => {
            cmd::cmd_status(project_dir, contract.as_deref(), network)
        }
        Commands::Reset { contract, force } => {
            cmd::cmd_reset(project_dir, contract, network, *force)
        }
        Commands::Networks => cmd::cmd_networks(project_dir),
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default_filter = if verbose { "shadectl=debug" } else { "shadectl=warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn error_tag() -> console::StyledObject<&'static str> {
    console::style("error:").red().bold()
}
