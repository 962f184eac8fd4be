//! Read-only inspection commands.

use console::style;
use std::path::Path;

use super::build_context;
use crate::config::Config;
use crate::errors::LifecycleError;

pub async fn cmd_get_admin(
    project_dir: &Path,
    contract: &str,
    network: Option<&str>,
    source: Option<&str>,
) -> Result<(), LifecycleError> {
    let ctx = build_context(project_dir, network, source)?;
    let admin = ctx.orchestrator.get_admin(contract, &ctx.network).await?;
    println!("{}", admin);
    Ok(())
}

pub async fn cmd_is_paused(
    project_dir: &Path,
    contract: &str,
    network: Option<&str>,
    source: Option<&str>,
) -> Result<(), LifecycleError> {
    let ctx = build_context(project_dir, network, source)?;
    let paused = ctx.orchestrator.is_paused(contract, &ctx.network).await?;
    println!("{}", paused);
    Ok(())
}

/// Show the ledger record for one contract, or all records when no contract
/// is given. Local only: no network call, no mutation.
pub fn cmd_status(
    project_dir: &Path,
    contract: Option<&str>,
    network: Option<&str>,
) -> Result<(), LifecycleError> {
    let records = match contract {
        Some(name) => {
            let ctx = super::build_local_context(project_dir, network)?;
            vec![ctx.orchestrator.status(name, &ctx.network)?]
        }
        None => {
            // Listing spans networks; resolve against any configured one.
            let ctx = super::build_local_context(project_dir, network.or(Some("testnet")))?;
            ctx.orchestrator.list_records()?
        }
    };

    if records.is_empty() {
        println!("No contracts tracked yet. Run 'shadectl deploy <contract>' first.");
        return Ok(());
    }

    println!();
    println!(
        "{:<12} {:<12} {:<11} {:<58} Admin",
        "Contract", "Network", "Status", "Contract ID"
    );
    for record in &records {
        println!(
            "{:<12} {:<12} {:<11} {:<58} {}",
            record.name,
            record.network.to_string(),
            record.status.to_string(),
            record
                .contract_id
                .as_ref()
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string()),
            record
                .admin
                .as_ref()
                .map(|a| a.to_string())
                .unwrap_or_else(|| "-".to_string()),
        );
        if !record.installed_code_hashes.is_empty() {
            let active = record
                .active_code_hash
                .as_ref()
                .map(|h| h.to_string())
                .unwrap_or_else(|| "none".to_string());
            println!(
                "  {} {} installed, active: {}",
                style("code:").dim(),
                record.installed_code_hashes.len(),
                style(active).dim()
            );
        }
    }
    println!();
    Ok(())
}

/// List the configured networks.
pub fn cmd_networks(project_dir: &Path) -> Result<(), LifecycleError> {
    let config = Config::load(project_dir).map_err(LifecycleError::Other)?;
    let mut names: Vec<&String> = config.networks.keys().collect();
    names.sort();

    println!();
    println!("{:<14} RPC URL", "Network");
    for name in names {
        let profile = &config.networks[name];
        let marker = if config.defaults.network.as_deref() == Some(name.as_str()) {
            " (default)"
        } else {
            ""
        };
        println!("{:<14} {}{}", name, profile.rpc_url, marker);
    }
    println!();
    Ok(())
}
