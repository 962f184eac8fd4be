//! Typed error hierarchy for the shadectl orchestrator.
//!
//! Three lower-level enums cover the collaborator boundaries:
//! - `NetworkError` — failures surfaced by the network client
//! - `ArtifactError` — artifact store resolution failures
//! - `LedgerError` — deployment ledger persistence failures
//!
//! `LifecycleError` is the orchestrator's top-level taxonomy; every CLI
//! command maps it to a distinguishing exit code so automation can decide
//! retry vs. abort.

use std::path::PathBuf;
use thiserror::Error;

use crate::contract::{Address, Network};

/// Failures at the network client boundary.
///
/// The orchestrator never assumes a transaction landed without explicit
/// confirmation; any of these leaves the ledger unchanged.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Network unavailable: {0}")]
    Unavailable(String),

    #[error("Network call timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// The network executed the transaction and explicitly refused it,
    /// e.g. a contract-side assertion failed. Surfaced verbatim.
    #[error("Rejected by network: {0}")]
    Rejected(String),
}

impl NetworkError {
    /// Transient failures are safe to retry with the same arguments.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            NetworkError::Unavailable(_) | NetworkError::Timeout { .. }
        )
    }
}

/// Failures resolving a contract's build artifact.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("No build output for contract '{name}' (looked in {dir})")]
    Missing { name: String, dir: PathBuf },

    #[error(
        "Build output for contract '{name}' is older than its sources ({wasm} predates {newer_source}); rebuild before deploying"
    )]
    Stale {
        name: String,
        wasm: PathBuf,
        newer_source: PathBuf,
    },

    #[error("Failed to read artifact {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures in the deployment ledger store.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A concurrent writer modified the record since it was read. The caller
    /// must re-read and re-validate preconditions before retrying.
    #[error(
        "Ledger record for {name} on {network} changed concurrently (expected version {expected}, found {found})"
    )]
    WriteConflict {
        name: String,
        network: Network,
        expected: u64,
        found: u64,
    },

    #[error("Ledger record at {path} violates invariants: {reason}")]
    CorruptRecord { path: PathBuf, reason: String },

    #[error("Failed to read ledger record at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write ledger record at {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse ledger record at {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Top-level error taxonomy for orchestrator operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    // Precondition errors: the operation was rejected before any network
    // effect; the ledger is unchanged.
    #[error("Contract '{name}' is not deployed on {network}")]
    NotDeployed { name: String, network: Network },

    #[error(
        "Contract '{name}' is already deployed on {network} as {contract_id} (use --force to redeploy)"
    )]
    AlreadyDeployed {
        name: String,
        network: Network,
        contract_id: String,
    },

    #[error("Contract '{name}' is already initialized with admin {admin}")]
    AlreadyInitialized { name: String, admin: Address },

    #[error("Contract '{name}' is not active (status: {status})")]
    NotActive { name: String, status: String },

    #[error("Contract '{name}' is not paused (status: {status})")]
    NotPaused { name: String, status: String },

    #[error("Contract '{name}' has no installed code hash newer than the active one")]
    NothingToActivate { name: String },

    #[error("Admin address must not be empty")]
    EmptyAdmin,

    /// Caller is not the stored admin. Logged distinctly for audit.
    #[error("Caller {caller} is not the admin of contract '{name}'")]
    Unauthorized { name: String, caller: Address },

    /// The ledger and the network disagree; run `reconcile`.
    #[error(
        "Ledger and network disagree for '{name}' on {network} ({detail}); run 'shadectl reconcile {name} --network {network}'"
    )]
    ReconciliationRequired {
        name: String,
        network: Network,
        detail: String,
    },

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LifecycleError {
    /// Process exit code for this error kind. Zero is success; each kind in
    /// the taxonomy gets its own code so scripted callers can branch.
    pub fn exit_code(&self) -> i32 {
        match self {
            LifecycleError::NotDeployed { .. }
            | LifecycleError::AlreadyDeployed { .. }
            | LifecycleError::AlreadyInitialized { .. }
            | LifecycleError::NotActive { .. }
            | LifecycleError::NotPaused { .. }
            | LifecycleError::NothingToActivate { .. }
            | LifecycleError::EmptyAdmin => 2,
            LifecycleError::Unauthorized { .. } => 3,
            LifecycleError::Network(e) if e.is_transient() => 4,
            LifecycleError::Network(_) => 5,
            LifecycleError::Ledger(LedgerError::WriteConflict { .. }) => 6,
            LifecycleError::ReconciliationRequired { .. } => 7,
            LifecycleError::Artifact(_) => 8,
            LifecycleError::Ledger(_) | LifecycleError::Other(_) => 9,
        }
    }

    /// True for failures that are safe to retry with identical arguments.
    pub fn is_transient(&self) -> bool {
        match self {
            LifecycleError::Network(e) => e.is_transient(),
            LifecycleError::Ledger(LedgerError::WriteConflict { .. }) => true,
            _ => false,
        }
    }

    /// Stable label for the audit trail.
    pub fn kind_label(&self) -> &'static str {
        match self {
            LifecycleError::NotDeployed { .. } => "not_deployed",
            LifecycleError::AlreadyDeployed { .. } => "already_deployed",
            LifecycleError::AlreadyInitialized { .. } => "already_initialized",
            LifecycleError::NotActive { .. } => "not_active",
            LifecycleError::NotPaused { .. } => "not_paused",
            LifecycleError::NothingToActivate { .. } => "nothing_to_activate",
            LifecycleError::EmptyAdmin => "empty_admin",
            LifecycleError::Unauthorized { .. } => "unauthorized",
            LifecycleError::ReconciliationRequired { .. } => "reconciliation_required",
            LifecycleError::Network(NetworkError::Unavailable(_)) => "network_unavailable",
            LifecycleError::Network(NetworkError::Timeout { .. }) => "network_timeout",
            LifecycleError::Network(NetworkError::Rejected(_)) => "rejected_by_network",
            LifecycleError::Ledger(LedgerError::WriteConflict { .. }) => "ledger_write_conflict",
            LifecycleError::Ledger(_) => "ledger_error",
            LifecycleError::Artifact(_) => "artifact_error",
            LifecycleError::Other(_) => "internal_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_error_transience() {
        assert!(NetworkError::Unavailable("conn refused".into()).is_transient());
        assert!(NetworkError::Timeout { seconds: 30 }.is_transient());
        assert!(!NetworkError::Rejected("assertion failed".into()).is_transient());
    }

    #[test]
    fn rejected_reason_is_surfaced_verbatim() {
        let err = NetworkError::Rejected("Error(Contract, #2)".into());
        assert!(err.to_string().contains("Error(Contract, #2)"));
    }

    #[test]
    fn exit_codes_distinguish_error_kinds() {
        let precondition = LifecycleError::NotDeployed {
            name: "shade".into(),
            network: "testnet".into(),
        };
        let unauthorized = LifecycleError::Unauthorized {
            name: "shade".into(),
            caller: "GOTHER".into(),
        };
        let transient = LifecycleError::Network(NetworkError::Timeout { seconds: 30 });
        let rejected = LifecycleError::Network(NetworkError::Rejected("no".into()));
        let conflict = LifecycleError::Ledger(LedgerError::WriteConflict {
            name: "shade".into(),
            network: "testnet".into(),
            expected: 1,
            found: 2,
        });

        let codes = [
            precondition.exit_code(),
            unauthorized.exit_code(),
            transient.exit_code(),
            rejected.exit_code(),
            conflict.exit_code(),
        ];
        let mut deduped = codes.to_vec();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(deduped.len(), codes.len(), "exit codes must be distinct");
        assert!(codes.iter().all(|c| *c != 0));
    }

    #[test]
    fn write_conflict_is_transient() {
        let err = LifecycleError::Ledger(LedgerError::WriteConflict {
            name: "shade".into(),
            network: "testnet".into(),
            expected: 3,
            found: 4,
        });
        assert!(err.is_transient());
    }

    #[test]
    fn unauthorized_names_the_caller() {
        let err = LifecycleError::Unauthorized {
            name: "shade".into(),
            caller: "GIMPOSTOR".into(),
        };
        assert!(err.to_string().contains("GIMPOSTOR"));
    }

    #[test]
    fn reconciliation_error_points_at_the_command() {
        let err = LifecycleError::ReconciliationRequired {
            name: "shade".into(),
            network: "testnet".into(),
            detail: "ledger says active, network reports paused".into(),
        };
        assert!(err.to_string().contains("shadectl reconcile shade"));
    }
}
