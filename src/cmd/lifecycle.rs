//! State-mutating lifecycle commands.

use console::style;
use std::path::Path;

use super::build_context;
use crate::contract::Address;
use crate::errors::LifecycleError;

pub async fn cmd_deploy(
    project_dir: &Path,
    contract: &str,
    network: Option<&str>,
    source: Option<&str>,
    force: bool,
    assume_yes: bool,
) -> Result<(), LifecycleError> {
    let ctx = build_context(project_dir, network, source)?;

    if force {
        let record = ctx.orchestrator.status(contract, &ctx.network)?;
        if let Some(existing) = &record.contract_id {
            println!(
                "Contract '{}' on {} is currently {} ({})",
                contract, ctx.network, record.status, existing
            );
            if !assume_yes && !confirm("Redeploy as a fresh instance? The old instance keeps running but is forgotten locally")? {
                println!("Aborted.");
                return Ok(());
            }
        }
    }

    let outcome = ctx.orchestrator.deploy(contract, &ctx.network, force).await?;
    if outcome.is_noop() {
        println!(
            "{} '{}' already deployed on {} as {}",
            style("unchanged").yellow(),
            contract,
            ctx.network,
            outcome.value()
        );
    } else {
        println!(
            "{} '{}' deployed on {} as {}",
            style("ok").green(),
            contract,
            ctx.network,
            outcome.value()
        );
    }
    Ok(())
}

pub async fn cmd_initialize(
    project_dir: &Path,
    contract: &str,
    network: Option<&str>,
    admin: &str,
) -> Result<(), LifecycleError> {
    let ctx = build_context(project_dir, network, Some(admin))?;
    let outcome = ctx
        .orchestrator
        .initialize(contract, &ctx.network, &Address::from(admin))
        .await?;
    if outcome.is_noop() {
        println!(
            "{} '{}' already initialized with admin {}",
            style("unchanged").yellow(),
            contract,
            outcome.value()
        );
    } else {
        println!(
            "{} '{}' initialized on {}; admin is {}, contract is active",
            style("ok").green(),
            contract,
            ctx.network,
            outcome.value()
        );
    }
    Ok(())
}

pub async fn cmd_pause(
    project_dir: &Path,
    contract: &str,
    network: Option<&str>,
    admin: &str,
) -> Result<(), LifecycleError> {
    let ctx = build_context(project_dir, network, Some(admin))?;
    let outcome = ctx
        .orchestrator
        .pause(contract, &ctx.network, &Address::from(admin))
        .await?;
    report_transition(contract, &ctx.network.to_string(), "paused", outcome.is_noop());
    Ok(())
}

pub async fn cmd_unpause(
    project_dir: &Path,
    contract: &str,
    network: Option<&str>,
    admin: &str,
) -> Result<(), LifecycleError> {
    let ctx = build_context(project_dir, network, Some(admin))?;
    let outcome = ctx
        .orchestrator
        .unpause(contract, &ctx.network, &Address::from(admin))
        .await?;
    report_transition(contract, &ctx.network.to_string(), "active", outcome.is_noop());
    Ok(())
}

pub async fn cmd_upgrade(
    project_dir: &Path,
    contract: &str,
    network: Option<&str>,
    admin: &str,
) -> Result<(), LifecycleError> {
    let ctx = build_context(project_dir, network, Some(admin))?;
    let outcome = ctx
        .orchestrator
        .upgrade(contract, &ctx.network, &Address::from(admin))
        .await?;
    if outcome.is_noop() {
        println!(
            "{} code {} was already installed",
            style("unchanged").yellow(),
            outcome.value()
        );
    } else {
        println!(
            "{} installed code {} for '{}' on {}",
            style("ok").green(),
            outcome.value(),
            contract,
            ctx.network
        );
        println!(
            "The running contract is unchanged. Activate with: shadectl activate {} --admin {} --network {}",
            contract, admin, ctx.network
        );
    }
    Ok(())
}

pub async fn cmd_activate(
    project_dir: &Path,
    contract: &str,
    network: Option<&str>,
    admin: &str,
) -> Result<(), LifecycleError> {
    let ctx = build_context(project_dir, network, Some(admin))?;
    let outcome = ctx
        .orchestrator
        .activate(contract, &ctx.network, &Address::from(admin))
        .await?;
    if outcome.is_noop() {
        println!(
            "{} code {} is already active",
            style("unchanged").yellow(),
            outcome.value()
        );
    } else {
        println!(
            "{} '{}' on {} now runs code {}",
            style("ok").green(),
            contract,
            ctx.network,
            outcome.value()
        );
    }
    Ok(())
}

fn report_transition(contract: &str, network: &str, state: &str, noop: bool) {
    if noop {
        println!(
            "{} '{}' on {} is already {}",
            style("unchanged").yellow(),
            contract,
            network,
            state
        );
    } else {
        println!(
            "{} '{}' on {} is now {}",
            style("ok").green(),
            contract,
            network,
            state
        );
    }
}

fn confirm(prompt: &str) -> Result<bool, LifecycleError> {
    use anyhow::Context as _;
    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .context("Failed to read confirmation")
        .map_err(LifecycleError::from)
}
