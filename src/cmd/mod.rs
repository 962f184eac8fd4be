//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module      | Commands handled                                        |
//! |-------------|---------------------------------------------------------|
//! | `lifecycle` | `Deploy`, `Initialize`, `Pause`, `Unpause`, `Upgrade`, `Activate` |
//! | `inspect`   | `GetAdmin`, `IsPaused`, `Status`, `Networks`            |
//! | `maintain`  | `Reconcile`, `Reset`                                    |

pub mod inspect;
pub mod lifecycle;
pub mod maintain;

pub use inspect::{cmd_get_admin, cmd_is_paused, cmd_networks, cmd_status};
pub use lifecycle::{
    cmd_activate, cmd_deploy, cmd_initialize, cmd_pause, cmd_unpause, cmd_upgrade,
};
pub use maintain::{cmd_reconcile, cmd_reset};

use anyhow::Context as _;
use std::path::Path;
use std::sync::Arc;

use crate::artifact::ArtifactStore;
use crate::audit::AuditLog;
use crate::config::{Config, STATE_DIR};
use crate::contract::{Address, Network};
use crate::errors::LifecycleError;
use crate::ledger::Ledger;
use crate::network::StellarCli;
use crate::orchestrator::Orchestrator;

/// Everything a command needs: the orchestrator wired to the resolved
/// network profile, plus the resolved network name for ledger keying.
pub(crate) struct CommandContext {
    pub orchestrator: Orchestrator,
    pub network: Network,
}

/// Resolve config, network profile, and signer, and wire up an orchestrator
/// against the real `stellar` CLI client.
///
/// `signer` is the identity for fee-bearing calls: the `--admin` address for
/// admin-gated commands, otherwise the configured default source account.
pub(crate) fn build_context(
    project_dir: &Path,
    cli_network: Option<&str>,
    signer: Option<&str>,
) -> Result<CommandContext, LifecycleError> {
    let config = Config::load(project_dir).context("Failed to load configuration")?;
    let source = config.resolve_source_account(signer)?;
    wire(project_dir, &config, cli_network, source)
}

/// Like [`build_context`], for commands that never reach the network
/// (`status`, `reset`): no signer is required.
pub(crate) fn build_local_context(
    project_dir: &Path,
    cli_network: Option<&str>,
) -> Result<CommandContext, LifecycleError> {
    let config = Config::load(project_dir).context("Failed to load configuration")?;
    let source = config.defaults.source_account.clone().unwrap_or_default();
    wire(project_dir, &config, cli_network, source)
}

fn wire(
    project_dir: &Path,
    config: &Config,
    cli_network: Option<&str>,
    source: String,
) -> Result<CommandContext, LifecycleError> {
    let network_name = config.resolve_network(cli_network)?;
    let profile = config.network_profile(&network_name)?;

    let client = StellarCli::new(
        config.defaults.stellar_cmd.clone(),
        profile.rpc_url.clone(),
        profile.network_passphrase.clone(),
        Address(source),
        config.defaults.network_timeout_secs,
    );

    let state_dir = project_dir.join(STATE_DIR);
    let orchestrator = Orchestrator::new(
        Ledger::new(&state_dir),
        ArtifactStore::new(
            project_dir.join(&config.artifacts.wasm_dir),
            Some(project_dir.join(&config.artifacts.contracts_dir)),
        ),
        Arc::new(client),
        AuditLog::new(&state_dir),
    );

    Ok(CommandContext {
        orchestrator,
        network: Network(network_name),
    })
}
