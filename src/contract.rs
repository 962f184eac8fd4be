//! Domain types for tracked contracts.
//!
//! This module provides:
//! - `ContractRecord` — the durable per-`(contract, network)` state
//! - `LifecycleState` — the orchestrator's state machine states
//! - `OperationLog` — the last attempted operation, for idempotent retry detection
//! - Identifier newtypes (`ContractId`, `CodeHash`, `Address`, `Network`)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// A target network, e.g. "testnet" or "futurenet".
///
/// Networks are an open set driven by configuration; two records with the
/// same contract name but different networks are fully independent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Network(pub String);

impl Network {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Network {
    fn from(s: &str) -> Self {
        Network(s.to_string())
    }
}

/// On-chain contract identifier, assigned by the network at deploy time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractId(pub String);

impl ContractId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContractId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Content hash of an installed wasm binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CodeHash(pub String);

impl CodeHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CodeHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A Stellar account address (e.g. "GADMIN...").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(pub String);

impl Address {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Address(s.to_string())
    }
}

/// Lifecycle states of a tracked contract.
///
/// Transitions: `Undeployed → Deployed → Active ⇄ Paused`. Confirmed
/// initialization activates the contract immediately, so there is no
/// separate post-initialize state. Code installation (upgrade) is orthogonal
/// and allowed from any post-deploy state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    #[default]
    Undeployed,
    Deployed,
    Active,
    Paused,
}

impl LifecycleState {
    /// True once the contract exists on the network.
    pub fn is_deployed(&self) -> bool {
        !matches!(self, LifecycleState::Undeployed)
    }

    /// True once the contract has a confirmed admin.
    pub fn is_initialized(&self) -> bool {
        matches!(self, LifecycleState::Active | LifecycleState::Paused)
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Undeployed => write!(f, "undeployed"),
            LifecycleState::Deployed => write!(f, "deployed"),
            LifecycleState::Active => write!(f, "active"),
            LifecycleState::Paused => write!(f, "paused"),
        }
    }
}

/// The kind of orchestrator operation, as recorded in the operation log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Deploy,
    Initialize,
    Pause,
    Unpause,
    Upgrade,
    Activate,
    Reconcile,
    Reset,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OperationKind::Deploy => "deploy",
            OperationKind::Initialize => "initialize",
            OperationKind::Pause => "pause",
            OperationKind::Unpause => "unpause",
            OperationKind::Upgrade => "upgrade",
            OperationKind::Activate => "activate",
            OperationKind::Reconcile => "reconcile",
            OperationKind::Reset => "reset",
        };
        write!(f, "{}", s)
    }
}

/// Outcome of a logged operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationOutcome {
    Succeeded,
    Failed,
}

/// Record of the last attempted operation against a contract.
///
/// A retry of a previously succeeded operation with identical arguments is
/// detected by comparing kind and argument fingerprint, and is answered with
/// an idempotent success instead of a precondition error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationLog {
    pub id: Uuid,
    pub kind: OperationKind,
    /// Sha256 over the operation's arguments; see [`fingerprint`].
    pub fingerprint: String,
    pub outcome: OperationOutcome,
    pub timestamp: DateTime<Utc>,
}

impl OperationLog {
    pub fn succeeded(kind: OperationKind, fingerprint: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            fingerprint,
            outcome: OperationOutcome::Succeeded,
            timestamp: Utc::now(),
        }
    }

    /// True if this log entry proves `kind` with these arguments already
    /// succeeded, making a repeat call an idempotent no-op.
    pub fn matches(&self, kind: OperationKind, fingerprint: &str) -> bool {
        self.outcome == OperationOutcome::Succeeded
            && self.kind == kind
            && self.fingerprint == fingerprint
    }
}

/// Compute the argument fingerprint for an operation.
///
/// The parts are joined with a separator that cannot appear inside Stellar
/// addresses or hex hashes, so distinct argument lists never collide.
pub fn fingerprint(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update(b"\x1f");
    }
    format!("{:x}", hasher.finalize())
}

/// Durable state for one `(contract name, network)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractRecord {
    pub name: String,
    pub network: Network,
    /// Set once deployment succeeds. A forced redeploy replaces it with the
    /// new identifier; it is never mutated in place.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_id: Option<ContractId>,
    /// Every code hash successfully installed, append-only, most recent last.
    #[serde(default)]
    pub installed_code_hashes: Vec<CodeHash>,
    /// The hash in effect after the last confirmed activation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_code_hash: Option<CodeHash>,
    pub status: LifecycleState,
    /// The authorized administrator, set at initialization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_operation: Option<OperationLog>,
    /// Optimistic-concurrency counter, bumped by the ledger on every persist.
    #[serde(default)]
    pub version: u64,
}

impl ContractRecord {
    /// A fresh record for a pair that has never been touched.
    pub fn undeployed(name: &str, network: &Network) -> Self {
        Self {
            name: name.to_string(),
            network: network.clone(),
            contract_id: None,
            installed_code_hashes: Vec::new(),
            active_code_hash: None,
            status: LifecycleState::Undeployed,
            admin: None,
            last_operation: None,
            version: 0,
        }
    }

    /// True if `caller` is the stored admin.
    pub fn is_admin(&self, caller: &Address) -> bool {
        self.admin.as_ref() == Some(caller)
    }

    /// The most recently installed code hash, if any.
    pub fn latest_installed_hash(&self) -> Option<&CodeHash> {
        self.installed_code_hashes.last()
    }

    /// Check the structural invariants that every persisted record must hold.
    /// Used by the ledger before writing and by tests.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.contract_id.is_some() != self.status.is_deployed() {
            return Err(format!(
                "contract_id presence does not match status {}",
                self.status
            ));
        }
        if self.admin.is_some() != self.status.is_initialized() {
            return Err(format!(
                "admin presence does not match status {}",
                self.status
            ));
        }
        if let Some(active) = &self.active_code_hash {
            if !self.installed_code_hashes.contains(active) {
                return Err(format!(
                    "active code hash {} is not among installed hashes",
                    active
                ));
            }
        }
        Ok(())
    }
}
