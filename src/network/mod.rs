//! Network client boundary.
//!
//! The orchestrator talks to a target network exclusively through the
//! [`NetworkClient`] trait: deploy and install take wasm bytes, invoke and
//! query address a deployed contract by identifier. Every call either
//! returns an explicit confirmation or a structured [`NetworkError`]
//! (`Unavailable`, `Timeout`, `Rejected`); the orchestrator never assumes a
//! transaction landed.

pub mod stellar;

#[cfg(test)]
pub mod mock;

use async_trait::async_trait;
use serde_json::Value;

use crate::contract::{Address, CodeHash, ContractId};
use crate::errors::NetworkError;

pub use stellar::StellarCli;

/// Synchronous-looking RPC boundary to a target network. Calls block (in the
/// async sense) for the duration of one network round trip; timeouts are the
/// implementation's responsibility and surface as `NetworkError::Timeout`.
#[async_trait]
pub trait NetworkClient: Send + Sync {
    /// Upload and instantiate a contract. Returns the new contract identifier.
    async fn deploy(&self, wasm: &[u8]) -> Result<ContractId, NetworkError>;

    /// Upload contract code without instantiating it. Returns the on-chain
    /// hash of the installed code.
    async fn install(&self, wasm: &[u8]) -> Result<CodeHash, NetworkError>;

    /// Invoke a state-mutating contract function, signed by `signer`.
    async fn invoke(
        &self,
        contract_id: &ContractId,
        function: &str,
        args: &[String],
        signer: &Address,
    ) -> Result<Value, NetworkError>;

    /// Read-only contract call; no signer, no fees.
    async fn query(
        &self,
        contract_id: &ContractId,
        function: &str,
        args: &[String],
    ) -> Result<Value, NetworkError>;

    /// The hash of the code currently executing for a contract. Used by
    /// reconciliation, where the network's answer overrides the ledger.
    async fn code_hash(&self, contract_id: &ContractId) -> Result<CodeHash, NetworkError>;
}
