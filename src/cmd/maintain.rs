//! Ledger repair and reset commands.

use console::style;
use std::path::Path;

use super::build_context;
use crate::errors::LifecycleError;

pub async fn cmd_reconcile(
    project_dir: &Path,
    contract: &str,
    network: Option<&str>,
    source: Option<&str>,
) -> Result<(), LifecycleError> {
    let ctx = build_context(project_dir, network, source)?;
    let before = ctx.orchestrator.status(contract, &ctx.network)?;
    let repaired = ctx.orchestrator.reconcile(contract, &ctx.network).await?;

    if before.status == repaired.status
        && before.admin == repaired.admin
        && before.active_code_hash == repaired.active_code_hash
    {
        println!(
            "{} ledger already matches the network ({})",
            style("ok").green(),
            repaired.status
        );
    } else {
        println!(
            "{} ledger repaired from network state: {} -> {}",
            style("ok").green(),
            before.status,
            repaired.status
        );
        if before.admin != repaired.admin {
            println!(
                "  admin: {} -> {}",
                display(&before.admin),
                display(&repaired.admin)
            );
        }
        if before.active_code_hash != repaired.active_code_hash {
            println!(
                "  active code: {} -> {}",
                display(&before.active_code_hash),
                display(&repaired.active_code_hash)
            );
        }
    }
    Ok(())
}

pub fn cmd_reset(
    project_dir: &Path,
    contract: &str,
    network: Option<&str>,
    force: bool,
) -> Result<(), LifecycleError> {
    let ctx = super::build_local_context(project_dir, network)?;

    let record = ctx.orchestrator.status(contract, &ctx.network)?;
    if record.status.is_deployed() && !force {
        println!(
            "Contract '{}' on {} is {} ({}).",
            contract,
            ctx.network,
            record.status,
            record
                .contract_id
                .as_ref()
                .map(|id| id.to_string())
                .unwrap_or_default()
        );
        let confirmed = dialoguer::Confirm::new()
            .with_prompt("Forget this contract's local state? The on-chain contract is untouched")
            .default(false)
            .interact()
            .map_err(|e| LifecycleError::Other(anyhow::anyhow!("Failed to read confirmation: {e}")))?;
        if !confirmed {
            println!("Aborted.");
            return Ok(());
        }
    }

    let existed = ctx.orchestrator.reset(contract, &ctx.network)?;
    if existed {
        println!(
            "{} forgot ledger state for '{}' on {}",
            style("ok").green(),
            contract,
            ctx.network
        );
    } else {
        println!("Nothing to reset for '{}' on {}", contract, ctx.network);
    }
    Ok(())
}

fn display<T: std::fmt::Display>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "unset".to_string())
}
