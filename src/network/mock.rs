//! Scripted in-memory network client for orchestrator tests.
//!
//! Mirrors the on-chain contract's observable behavior (initialize-once,
//! admin-gated pause/unpause, wasm-hash upgrade) and supports injecting one
//! failure for the next call to exercise partial-failure paths.

use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::contract::{Address, CodeHash, ContractId};
use crate::errors::NetworkError;
use crate::network::NetworkClient;

#[derive(Debug, Clone)]
pub struct MockContract {
    pub admin: Option<Address>,
    pub paused: bool,
    pub code_hash: CodeHash,
}

#[derive(Default)]
struct MockState {
    next_id: u32,
    contracts: HashMap<String, MockContract>,
    installed: Vec<CodeHash>,
    fail_next: Option<NetworkError>,
    calls: Vec<String>,
}

#[derive(Default)]
pub struct MockNetwork {
    state: Mutex<MockState>,
}

impl MockNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next network call fail with the given error. The call is
    /// still recorded in the journal; state is not touched.
    pub fn fail_next(&self, err: NetworkError) {
        self.state.lock().unwrap().fail_next = Some(err);
    }

    /// Directly mutate on-network contract state, simulating effects the
    /// ledger never saw (crash between network call and ledger write).
    pub fn set_contract_state(&self, id: &ContractId, admin: Option<Address>, paused: bool) {
        let mut state = self.state.lock().unwrap();
        let contract = state
            .contracts
            .get_mut(id.as_str())
            .expect("unknown mock contract");
        contract.admin = admin;
        contract.paused = paused;
    }

    pub fn contract(&self, id: &ContractId) -> Option<MockContract> {
        self.state.lock().unwrap().contracts.get(id.as_str()).cloned()
    }

    /// Journal of calls made, e.g. `"deploy"`, `"invoke:pause"`.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    fn record_call(&self, state: &mut MockState, call: &str) -> Result<(), NetworkError> {
        state.calls.push(call.to_string());
        if let Some(err) = state.fail_next.take() {
            return Err(err);
        }
        Ok(())
    }
}

fn hash_of(wasm: &[u8]) -> CodeHash {
    CodeHash(format!("{:x}", Sha256::digest(wasm)))
}

#[async_trait]
impl NetworkClient for MockNetwork {
    async fn deploy(&self, wasm: &[u8]) -> Result<ContractId, NetworkError> {
        let mut state = self.state.lock().unwrap();
        self.record_call(&mut state, "deploy")?;
        state.next_id += 1;
        let id = format!("CMOCK{:04}", state.next_id);
        state.contracts.insert(
            id.clone(),
            MockContract {
                admin: None,
                paused: false,
                code_hash: hash_of(wasm),
            },
        );
        Ok(ContractId(id))
    }

    async fn install(&self, wasm: &[u8]) -> Result<CodeHash, NetworkError> {
        let mut state = self.state.lock().unwrap();
        self.record_call(&mut state, "install")?;
        let hash = hash_of(wasm);
        state.installed.push(hash.clone());
        Ok(hash)
    }

    async fn invoke(
        &self,
        contract_id: &ContractId,
        function: &str,
        args: &[String],
        signer: &Address,
    ) -> Result<Value, NetworkError> {
        let mut state = self.state.lock().unwrap();
        self.record_call(&mut state, &format!("invoke:{}", function))?;
        let contract = state
            .contracts
            .get_mut(contract_id.as_str())
            .ok_or_else(|| NetworkError::Rejected("unknown contract".into()))?;

        match function {
            "initialize" => {
                if contract.admin.is_some() {
                    return Err(NetworkError::Rejected("Error(Contract, #2)".into()));
                }
                let admin = args
                    .first()
                    .ok_or_else(|| NetworkError::Rejected("missing admin arg".into()))?;
                contract.admin = Some(Address(admin.clone()));
                Ok(Value::Null)
            }
            "pause" => {
                if contract.admin.as_ref() != Some(signer) {
                    return Err(NetworkError::Rejected("Error(Contract, #1)".into()));
                }
                if contract.paused {
                    return Err(NetworkError::Rejected("Error(Contract, #9)".into()));
                }
                contract.paused = true;
                Ok(Value::Null)
            }
            "unpause" => {
                if contract.admin.as_ref() != Some(signer) {
                    return Err(NetworkError::Rejected("Error(Contract, #1)".into()));
                }
                if !contract.paused {
                    return Err(NetworkError::Rejected("Error(Contract, #10)".into()));
                }
                contract.paused = false;
                Ok(Value::Null)
            }
            "upgrade" => {
                if contract.admin.as_ref() != Some(signer) {
                    return Err(NetworkError::Rejected("Error(Contract, #1)".into()));
                }
                let hash = args
                    .first()
                    .ok_or_else(|| NetworkError::Rejected("missing wasm hash arg".into()))?;
                contract.code_hash = CodeHash(hash.clone());
                Ok(Value::Null)
            }
            other => Err(NetworkError::Rejected(format!("unknown function {other}"))),
        }
    }

    async fn query(
        &self,
        contract_id: &ContractId,
        function: &str,
        _args: &[String],
    ) -> Result<Value, NetworkError> {
        let mut state = self.state.lock().unwrap();
        self.record_call(&mut state, &format!("query:{}", function))?;
        let contract = state
            .contracts
            .get(contract_id.as_str())
            .ok_or_else(|| NetworkError::Rejected("unknown contract".into()))?;

        match function {
            "get_admin" => match &contract.admin {
                Some(admin) => Ok(Value::String(admin.to_string())),
                None => Err(NetworkError::Rejected("Error(Contract, #3)".into())),
            },
            "is_paused" => Ok(Value::Bool(contract.paused)),
            other => Err(NetworkError::Rejected(format!("unknown function {other}"))),
        }
    }

    async fn code_hash(&self, contract_id: &ContractId) -> Result<CodeHash, NetworkError> {
        let mut state = self.state.lock().unwrap();
        self.record_call(&mut state, "code_hash")?;
        let contract = state
            .contracts
            .get(contract_id.as_str())
            .ok_or_else(|| NetworkError::Rejected("unknown contract".into()))?;
        Ok(contract.code_hash.clone())
    }
}
