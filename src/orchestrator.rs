//! The contract lifecycle orchestrator.
//!
//! Sequences every operation as one logical transaction: read the ledger
//! record, validate preconditions and authorization, perform the single
//! network call, then commit the confirmed effect back to the ledger.
//! Failed preconditions are explicit errors and never touch the ledger;
//! retries of an already-succeeded operation with identical arguments are
//! answered as idempotent no-ops via the record's operation log.
//!
//! The ledger is a cache of the network's state, not the other way around:
//! `reconcile` re-queries the network and overwrites the record when the two
//! disagree (e.g. after a crash between a confirmed network call and the
//! ledger write).

use std::sync::Arc;
use std::time::Instant;

use crate::artifact::ArtifactStore;
use crate::audit::{AuditEntry, AuditLog};
use crate::contract::{
    fingerprint, Address, CodeHash, ContractId, ContractRecord, LifecycleState, Network,
    OperationKind, OperationLog,
};
use crate::errors::{LedgerError, LifecycleError, NetworkError};
use crate::ledger::Ledger;
use crate::network::NetworkClient;

/// How often a post-network ledger commit is retried when concurrent writers
/// keep moving the record. The network effect is already confirmed at that
/// point, so giving up loses information; three attempts has been enough in
/// practice because each retry re-reads the fresh version.
const MAX_COMMIT_ATTEMPTS: u32 = 3;

/// Result of a mutating operation: either the state changed, or the
/// operation was recognized as an idempotent retry of an already-applied
/// change and nothing moved.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied<T> {
    Changed(T),
    Noop(T),
}

impl<T> Applied<T> {
    pub fn value(&self) -> &T {
        match self {
            Applied::Changed(v) | Applied::Noop(v) => v,
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, Applied::Noop(_))
    }
}

pub struct Orchestrator {
    ledger: Ledger,
    artifacts: ArtifactStore,
    network: Arc<dyn NetworkClient>,
    audit: AuditLog,
}

impl Orchestrator {
    pub fn new(
        ledger: Ledger,
        artifacts: ArtifactStore,
        network: Arc<dyn NetworkClient>,
        audit: AuditLog,
    ) -> Self {
        Self {
            ledger,
            artifacts,
            network,
            audit,
        }
    }

    /// Deploy a contract's current build artifact.
    ///
    /// Without `force`, a second deploy is either an idempotent no-op (same
    /// artifact, previous deploy confirmed) or `AlreadyDeployed`. A forced
    /// redeploy creates a fresh on-chain instance: the record gets the new
    /// identifier and drops back to `Deployed` with no admin.
    pub async fn deploy(
        &self,
        name: &str,
        network: &Network,
        force: bool,
    ) -> Result<Applied<ContractId>, LifecycleError> {
        let entry = AuditEntry::new(OperationKind::Deploy, name, network, None);
        let started = Instant::now();
        let result = self.deploy_inner(name, network, force).await;
        self.record_audit(entry, started, &result);
        result
    }

    async fn deploy_inner(
        &self,
        name: &str,
        network: &Network,
        force: bool,
    ) -> Result<Applied<ContractId>, LifecycleError> {
        let record = self.ledger.get(name, network)?;
        let artifact = self.artifacts.resolve(name)?;
        let fp = fingerprint(&["deploy", name, network.as_str(), artifact.hash.as_str()]);

        if record.status.is_deployed() && !force {
            if let Some(log) = &record.last_operation {
                if log.matches(OperationKind::Deploy, &fp) {
                    let id = record.contract_id.clone().expect("deployed record has id");
                    tracing::info!(%name, %network, %id, "deploy already confirmed, no-op");
                    return Ok(Applied::Noop(id));
                }
            }
            return Err(LifecycleError::AlreadyDeployed {
                name: name.to_string(),
                network: network.clone(),
                contract_id: record
                    .contract_id
                    .as_ref()
                    .map(|id| id.to_string())
                    .unwrap_or_default(),
            });
        }

        let wasm = self.artifacts.read(&artifact)?;
        let contract_id = self.network.deploy(&wasm).await?;
        tracing::info!(%name, %network, %contract_id, "deploy confirmed");

        let hash = artifact.hash.clone();
        let id = contract_id.clone();
        self.commit(name, network, move |mut r| {
            r.contract_id = Some(id.clone());
            r.status = LifecycleState::Deployed;
            // A fresh instance has no admin and no activated upgrade yet.
            r.admin = None;
            r.active_code_hash = None;
            if r.installed_code_hashes.last() != Some(&hash) {
                r.installed_code_hashes.push(hash.clone());
            }
            r.last_operation = Some(OperationLog::succeeded(OperationKind::Deploy, fp.clone()));
            r
        })
        .await?;

        Ok(Applied::Changed(contract_id))
    }

    /// Initialize a deployed contract with its admin address.
    pub async fn initialize(
        &self,
        name: &str,
        network: &Network,
        admin: &Address,
    ) -> Result<Applied<Address>, LifecycleError> {
        let entry = AuditEntry::new(OperationKind::Initialize, name, network, Some(admin));
        let started = Instant::now();
        let result = self.initialize_inner(name, network, admin).await;
        self.record_audit(entry, started, &result);
        result
    }

    async fn initialize_inner(
        &self,
        name: &str,
        network: &Network,
        admin: &Address,
    ) -> Result<Applied<Address>, LifecycleError> {
        if admin.is_empty() {
            return Err(LifecycleError::EmptyAdmin);
        }

        let record = self.ledger.get(name, network)?;
        let fp = fingerprint(&["initialize", name, network.as_str(), admin.as_str()]);

        match record.status {
            LifecycleState::Undeployed => {
                return Err(LifecycleError::NotDeployed {
                    name: name.to_string(),
                    network: network.clone(),
                });
            }
            LifecycleState::Active | LifecycleState::Paused => {
                if let Some(log) = &record.last_operation {
                    if log.matches(OperationKind::Initialize, &fp) {
                        return Ok(Applied::Noop(admin.clone()));
                    }
                }
                return Err(LifecycleError::AlreadyInitialized {
                    name: name.to_string(),
                    admin: record.admin.clone().expect("initialized record has admin"),
                });
            }
            LifecycleState::Deployed => {}
        }

        let contract_id = record.contract_id.clone().expect("deployed record has id");
        self.network
            .invoke(&contract_id, "initialize", &[admin.to_string()], admin)
            .await?;
        tracing::info!(%name, %network, %admin, "initialize confirmed");

        let admin_owned = admin.clone();
        self.commit(name, network, move |mut r| {
            r.admin = Some(admin_owned.clone());
            r.status = LifecycleState::Active;
            r.last_operation = Some(OperationLog::succeeded(
                OperationKind::Initialize,
                fp.clone(),
            ));
            r
        })
        .await?;

        Ok(Applied::Changed(admin.clone()))
    }

    /// Pause an active contract. Caller must be the stored admin.
    pub async fn pause(
        &self,
        name: &str,
        network: &Network,
        caller: &Address,
    ) -> Result<Applied<LifecycleState>, LifecycleError> {
        let entry = AuditEntry::new(OperationKind::Pause, name, network, Some(caller));
        let started = Instant::now();
        let result = self
            .toggle_pause(name, network, caller, OperationKind::Pause)
            .await;
        self.record_audit(entry, started, &result);
        result
    }

    /// Unpause a paused contract. Caller must be the stored admin.
    pub async fn unpause(
        &self,
        name: &str,
        network: &Network,
        caller: &Address,
    ) -> Result<Applied<LifecycleState>, LifecycleError> {
        let entry = AuditEntry::new(OperationKind::Unpause, name, network, Some(caller));
        let started = Instant::now();
        let result = self
            .toggle_pause(name, network, caller, OperationKind::Unpause)
            .await;
        self.record_audit(entry, started, &result);
        result
    }

    /// Shared pause/unpause transition: the two operations are exact mirrors.
    async fn toggle_pause(
        &self,
        name: &str,
        network: &Network,
        caller: &Address,
        kind: OperationKind,
    ) -> Result<Applied<LifecycleState>, LifecycleError> {
        let (function, from, to) = match kind {
            OperationKind::Pause => ("pause", LifecycleState::Active, LifecycleState::Paused),
            OperationKind::Unpause => ("unpause", LifecycleState::Paused, LifecycleState::Active),
            other => unreachable!("toggle_pause called with {other}"),
        };

        let record = self.ledger.get(name, network)?;
        let fp = fingerprint(&[function, name, network.as_str(), caller.as_str()]);

        if record.status == to {
            // Already in the target state: an idempotent retry of our own
            // confirmed transition is a success; anything else is an
            // explicit precondition error, not a silent no-op.
            if record.is_admin(caller) {
                if let Some(log) = &record.last_operation {
                    if log.matches(kind, &fp) {
                        return Ok(Applied::Noop(to));
                    }
                }
            }
        }
        if record.status != from {
            return Err(match kind {
                OperationKind::Pause => LifecycleError::NotActive {
                    name: name.to_string(),
                    status: record.status.to_string(),
                },
                _ => LifecycleError::NotPaused {
                    name: name.to_string(),
                    status: record.status.to_string(),
                },
            });
        }
        if !record.is_admin(caller) {
            return Err(LifecycleError::Unauthorized {
                name: name.to_string(),
                caller: caller.clone(),
            });
        }

        let contract_id = record.contract_id.clone().expect("deployed record has id");
        self.network
            .invoke(&contract_id, function, &[], caller)
            .await?;
        tracing::info!(%name, %network, %caller, function, "state transition confirmed");

        self.commit(name, network, move |mut r| {
            r.status = to;
            r.last_operation = Some(OperationLog::succeeded(kind, fp.clone()));
            r
        })
        .await?;

        Ok(Applied::Changed(to))
    }

    /// Install the contract's current build artifact as new code without
    /// activating it. The running behavior is unchanged until an explicit
    /// `activate` confirms the switch; the two phases are deliberately
    /// separate.
    pub async fn upgrade(
        &self,
        name: &str,
        network: &Network,
        caller: &Address,
    ) -> Result<Applied<CodeHash>, LifecycleError> {
        let entry = AuditEntry::new(OperationKind::Upgrade, name, network, Some(caller));
        let started = Instant::now();
        let result = self.upgrade_inner(name, network, caller).await;
        self.record_audit(entry, started, &result);
        result
    }

    async fn upgrade_inner(
        &self,
        name: &str,
        network: &Network,
        caller: &Address,
    ) -> Result<Applied<CodeHash>, LifecycleError> {
        let record = self.ledger.get(name, network)?;
        if !record.status.is_deployed() {
            return Err(LifecycleError::NotDeployed {
                name: name.to_string(),
                network: network.clone(),
            });
        }
        // Pre-initialization there is no admin yet; installing code is a
        // network upload that does not touch the running contract, so it is
        // allowed. Once an admin exists, only the admin may stage upgrades.
        if record.admin.is_some() && !record.is_admin(caller) {
            return Err(LifecycleError::Unauthorized {
                name: name.to_string(),
                caller: caller.clone(),
            });
        }

        let artifact = self.artifacts.resolve(name)?;
        let fp = fingerprint(&[
            "upgrade",
            name,
            network.as_str(),
            caller.as_str(),
            artifact.hash.as_str(),
        ]);

        if record.latest_installed_hash() == Some(&artifact.hash) {
            if let Some(log) = &record.last_operation {
                if log.matches(OperationKind::Upgrade, &fp) {
                    return Ok(Applied::Noop(artifact.hash.clone()));
                }
            }
        }

        let wasm = self.artifacts.read(&artifact)?;
        let installed = self.network.install(&wasm).await?;
        tracing::info!(%name, %network, hash = %installed, "code install confirmed");

        let hash = installed.clone();
        self.commit(name, network, move |mut r| {
            if r.installed_code_hashes.last() != Some(&hash) {
                r.installed_code_hashes.push(hash.clone());
            }
            // active_code_hash is deliberately untouched here.
            r.last_operation = Some(OperationLog::succeeded(OperationKind::Upgrade, fp.clone()));
            r
        })
        .await?;

        Ok(Applied::Changed(installed))
    }

    /// Activate the most recently installed code hash: the second phase of
    /// an upgrade. Invokes the contract's own `upgrade` entrypoint and, on
    /// confirmation, records the hash as active.
    pub async fn activate(
        &self,
        name: &str,
        network: &Network,
        caller: &Address,
    ) -> Result<Applied<CodeHash>, LifecycleError> {
        let entry = AuditEntry::new(OperationKind::Activate, name, network, Some(caller));
        let started = Instant::now();
        let result = self.activate_inner(name, network, caller).await;
        self.record_audit(entry, started, &result);
        result
    }

    async fn activate_inner(
        &self,
        name: &str,
        network: &Network,
        caller: &Address,
    ) -> Result<Applied<CodeHash>, LifecycleError> {
        let record = self.ledger.get(name, network)?;
        if !record.status.is_deployed() {
            return Err(LifecycleError::NotDeployed {
                name: name.to_string(),
                network: network.clone(),
            });
        }
        if !record.is_admin(caller) {
            return Err(LifecycleError::Unauthorized {
                name: name.to_string(),
                caller: caller.clone(),
            });
        }

        let target = record
            .latest_installed_hash()
            .cloned()
            .ok_or_else(|| LifecycleError::NothingToActivate {
                name: name.to_string(),
            })?;
        let fp = fingerprint(&[
            "activate",
            name,
            network.as_str(),
            caller.as_str(),
            target.as_str(),
        ]);

        if record.active_code_hash.as_ref() == Some(&target) {
            if let Some(log) = &record.last_operation {
                if log.matches(OperationKind::Activate, &fp) {
                    return Ok(Applied::Noop(target));
                }
            }
            return Err(LifecycleError::NothingToActivate {
                name: name.to_string(),
            });
        }

        let contract_id = record.contract_id.clone().expect("deployed record has id");
        self.network
            .invoke(&contract_id, "upgrade", &[target.to_string()], caller)
            .await?;
        tracing::info!(%name, %network, hash = %target, "activation confirmed");

        let hash = target.clone();
        self.commit(name, network, move |mut r| {
            r.active_code_hash = Some(hash.clone());
            r.last_operation = Some(OperationLog::succeeded(OperationKind::Activate, fp.clone()));
            r
        })
        .await?;

        Ok(Applied::Changed(target))
    }

    /// Query the contract's admin from the network and cross-check the
    /// ledger. Read-only; never mutates the record.
    pub async fn get_admin(
        &self,
        name: &str,
        network: &Network,
    ) -> Result<Address, LifecycleError> {
        let record = self.require_deployed(name, network)?;
        let contract_id = record.contract_id.clone().expect("deployed record has id");

        let observed = match self.network.query(&contract_id, "get_admin", &[]).await {
            Ok(value) => value.as_str().map(Address::from),
            // The contract rejects get_admin before initialization. When the
            // ledger agrees there is no admin yet, surface the contract's
            // own refusal; when it disagrees, the ledger is stale.
            Err(NetworkError::Rejected(reason)) => {
                if record.admin.is_none() {
                    return Err(NetworkError::Rejected(reason).into());
                }
                None
            }
            Err(e) => return Err(e.into()),
        };

        match (observed, &record.admin) {
            (Some(network_admin), Some(ledger_admin)) if &network_admin == ledger_admin => {
                Ok(network_admin)
            }
            (observed, ledger_admin) => Err(LifecycleError::ReconciliationRequired {
                name: name.to_string(),
                network: network.clone(),
                detail: format!(
                    "ledger admin is {}, network reports {}",
                    display_option(ledger_admin.as_ref()),
                    display_option(observed.as_ref()),
                ),
            }),
        }
    }

    /// Query the contract's paused flag from the network and cross-check the
    /// ledger. Read-only; never mutates the record.
    pub async fn is_paused(&self, name: &str, network: &Network) -> Result<bool, LifecycleError> {
        let record = self.require_deployed(name, network)?;
        let contract_id = record.contract_id.clone().expect("deployed record has id");

        let value = self.network.query(&contract_id, "is_paused", &[]).await?;
        let observed = value.as_bool().ok_or_else(|| {
            NetworkError::Rejected(format!("is_paused returned a non-boolean: {value}"))
        })?;

        let expected = record.status == LifecycleState::Paused;
        if observed != expected {
            return Err(LifecycleError::ReconciliationRequired {
                name: name.to_string(),
                network: network.clone(),
                detail: format!(
                    "ledger status is {}, network reports paused={}",
                    record.status, observed
                ),
            });
        }
        Ok(observed)
    }

    /// Re-query the network's authoritative state and overwrite the ledger
    /// record to match. The network always wins; the ledger is a cache with
    /// explicit repair.
    pub async fn reconcile(
        &self,
        name: &str,
        network: &Network,
    ) -> Result<ContractRecord, LifecycleError> {
        let entry = AuditEntry::new(OperationKind::Reconcile, name, network, None);
        let started = Instant::now();
        let result = self.reconcile_inner(name, network).await;
        self.record_audit(entry, started, &result);
        result
    }

    async fn reconcile_inner(
        &self,
        name: &str,
        network: &Network,
    ) -> Result<ContractRecord, LifecycleError> {
        let record = self.require_deployed(name, network)?;
        let contract_id = record.contract_id.clone().expect("deployed record has id");

        let admin = match self.network.query(&contract_id, "get_admin", &[]).await {
            Ok(value) => value.as_str().map(Address::from),
            Err(NetworkError::Rejected(_)) => None,
            Err(e) => return Err(e.into()),
        };
        let paused = match admin {
            // An uninitialized contract cannot be paused; skip the query.
            None => false,
            Some(_) => self
                .network
                .query(&contract_id, "is_paused", &[])
                .await?
                .as_bool()
                .unwrap_or(false),
        };
        let code = self.network.code_hash(&contract_id).await?;

        let status = match (&admin, paused) {
            (None, _) => LifecycleState::Deployed,
            (Some(_), false) => LifecycleState::Active,
            (Some(_), true) => LifecycleState::Paused,
        };
        tracing::info!(%name, %network, %status, "reconciled from network state");

        let repaired = self.ledger.overwrite(name, network, move |mut r| {
            r.admin = admin.clone();
            r.status = status;
            // The hash the ledger believes is in effect: the last activated
            // one, or the originally deployed code before any activation.
            let predicted = r
                .active_code_hash
                .clone()
                .or_else(|| r.installed_code_hashes.first().cloned());
            if predicted.as_ref() != Some(&code) {
                if !r.installed_code_hashes.contains(&code) {
                    r.installed_code_hashes.push(code.clone());
                }
                r.active_code_hash = Some(code.clone());
            }
            r
        })?;

        Ok(repaired)
    }

    /// The current ledger record, without touching the network.
    pub fn status(&self, name: &str, network: &Network) -> Result<ContractRecord, LifecycleError> {
        Ok(self.ledger.get(name, network)?)
    }

    /// All ledger records, for listings.
    pub fn list_records(&self) -> Result<Vec<ContractRecord>, LifecycleError> {
        Ok(self.ledger.list()?)
    }

    /// Delete the ledger record for a pair. Returns false if none existed.
    /// The on-chain contract is untouched; this only forgets local state.
    pub fn reset(&self, name: &str, network: &Network) -> Result<bool, LifecycleError> {
        let existed = self.ledger.reset(name, network)?;
        let mut entry = AuditEntry::new(OperationKind::Reset, name, network, None);
        entry.outcome = if existed { "succeeded" } else { "noop" }.to_string();
        if let Err(e) = self.audit.append(&entry) {
            tracing::warn!(error = %e, "failed to write audit entry");
        }
        Ok(existed)
    }

    fn require_deployed(
        &self,
        name: &str,
        network: &Network,
    ) -> Result<ContractRecord, LifecycleError> {
        let record = self.ledger.get(name, network)?;
        if !record.status.is_deployed() {
            return Err(LifecycleError::NotDeployed {
                name: name.to_string(),
                network: network.clone(),
            });
        }
        Ok(record)
    }

    /// Commit a confirmed network effect to the ledger. Conflicts here mean
    /// a concurrent writer moved the record while our network call was in
    /// flight; the effect is real, so re-read and re-apply the transform
    /// rather than losing it.
    async fn commit<F>(
        &self,
        name: &str,
        network: &Network,
        transform: F,
    ) -> Result<ContractRecord, LifecycleError>
    where
        F: Fn(ContractRecord) -> ContractRecord,
    {
        let mut conflict: Option<LedgerError> = None;
        for attempt in 0..MAX_COMMIT_ATTEMPTS {
            let current = self.ledger.get(name, network)?;
            match self.ledger.update(name, network, current.version, &transform) {
                Ok(record) => return Ok(record),
                Err(e @ LedgerError::WriteConflict { .. }) => {
                    tracing::warn!(%name, %network, attempt, "ledger commit conflict, retrying");
                    conflict = Some(e);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(conflict.expect("loop ran at least once").into())
    }

    fn record_audit<T: AuditOutcome>(
        &self,
        mut entry: AuditEntry,
        started: Instant,
        result: &Result<T, LifecycleError>,
    ) {
        entry.duration_ms = started.elapsed().as_millis() as u64;
        match result {
            Ok(outcome) if outcome.is_noop() => entry.outcome = "noop".to_string(),
            Ok(_) => entry.outcome = "succeeded".to_string(),
            Err(e) => {
                entry.outcome = e.kind_label().to_string();
                entry.authorization_failure =
                    matches!(e, LifecycleError::Unauthorized { .. });
            }
        }
        if let Err(e) = self.audit.append(&entry) {
            tracing::warn!(error = %e, "failed to write audit entry");
        }
    }
}

/// Successful results that can report themselves as idempotent no-ops for
/// the audit trail.
trait AuditOutcome {
    fn is_noop(&self) -> bool {
        false
    }
}

impl<T> AuditOutcome for Applied<T> {
    fn is_noop(&self) -> bool {
        Applied::is_noop(self)
    }
}

impl AuditOutcome for ContractRecord {}

fn display_option<T: std::fmt::Display>(value: Option<&T>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "unset".to_string(),
    }
}
