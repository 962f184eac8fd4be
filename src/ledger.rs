//! Durable deployment ledger.
//!
//! One pretty-printed JSON file per `(contract, network)` pair under
//! `.shadectl/ledger/`, so operators can inspect state with any editor.
//! Writes are atomic (temp file + rename) and serialized per key with an
//! advisory file lock; readers never block. Concurrent writers are detected
//! with a per-record version counter: `update` fails with
//! `LedgerError::WriteConflict` when the on-disk version moved since the
//! caller's read, and the caller must re-read and re-validate.

use fs2::FileExt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::contract::{ContractRecord, Network};
use crate::errors::LedgerError;

pub const LEDGER_DIR: &str = "ledger";

pub struct Ledger {
    dir: PathBuf,
}

impl Ledger {
    /// Open a ledger rooted at the given state directory (`.shadectl/`).
    /// The ledger subdirectory is created on first use.
    pub fn new(state_dir: &Path) -> Self {
        Self {
            dir: state_dir.join(LEDGER_DIR),
        }
    }

    /// Path of the record file for a `(name, network)` key.
    pub fn record_path(&self, name: &str, network: &Network) -> PathBuf {
        self.dir.join(format!("{}.{}.json", name, network))
    }

    fn lock_path(&self, name: &str, network: &Network) -> PathBuf {
        self.dir.join(format!(".{}.{}.lock", name, network))
    }

    /// Load the record for a key, creating a default `Undeployed` record in
    /// memory if none exists on disk. Never fails on absence.
    pub fn get(&self, name: &str, network: &Network) -> Result<ContractRecord, LedgerError> {
        let path = self.record_path(name, network);
        if !path.exists() {
            return Ok(ContractRecord::undeployed(name, network));
        }
        let content = fs::read_to_string(&path).map_err(|source| LedgerError::ReadFailed {
            path: path.clone(),
            source,
        })?;
        let record: ContractRecord =
            serde_json::from_str(&content).map_err(|source| LedgerError::ParseFailed {
                path: path.clone(),
                source,
            })?;
        if let Err(reason) = record.check_invariants() {
            return Err(LedgerError::CorruptRecord { path, reason });
        }
        Ok(record)
    }

    /// Apply a pure transformation to the record and persist it atomically.
    ///
    /// `expected_version` is the version of the record as the caller last
    /// read it. If the on-disk record has moved past that version, no write
    /// happens and `WriteConflict` is returned. The persisted record gets
    /// `expected_version + 1`.
    pub fn update<F>(
        &self,
        name: &str,
        network: &Network,
        expected_version: u64,
        transform: F,
    ) -> Result<ContractRecord, LedgerError>
    where
        F: FnOnce(ContractRecord) -> ContractRecord,
    {
        self.ensure_dir()?;
        let lock = self.acquire_write_lock(name, network)?;

        // Re-read under the lock so the version comparison is race-free.
        let current = self.get(name, network)?;
        if current.version != expected_version {
            return Err(LedgerError::WriteConflict {
                name: name.to_string(),
                network: network.clone(),
                expected: expected_version,
                found: current.version,
            });
        }

        let mut next = transform(current);
        next.version = expected_version + 1;

        let path = self.record_path(name, network);
        if let Err(reason) = next.check_invariants() {
            return Err(LedgerError::CorruptRecord { path, reason });
        }

        self.persist(&path, &next)?;
        drop(lock);
        Ok(next)
    }

    /// Overwrite the record unconditionally, bumping past whatever version is
    /// on disk. Used by reconciliation, where the network's answer wins over
    /// any concurrent ledger state.
    pub fn overwrite<F>(
        &self,
        name: &str,
        network: &Network,
        transform: F,
    ) -> Result<ContractRecord, LedgerError>
    where
        F: FnOnce(ContractRecord) -> ContractRecord,
    {
        self.ensure_dir()?;
        let lock = self.acquire_write_lock(name, network)?;

        let current = self.get(name, network)?;
        let current_version = current.version;
        let mut next = transform(current);
        next.version = current_version + 1;

        let path = self.record_path(name, network);
        if let Err(reason) = next.check_invariants() {
            return Err(LedgerError::CorruptRecord { path, reason });
        }

        self.persist(&path, &next)?;
        drop(lock);
        Ok(next)
    }

    /// Delete the record for a key. The only way a record leaves the ledger.
    pub fn reset(&self, name: &str, network: &Network) -> Result<bool, LedgerError> {
        let path = self.record_path(name, network);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).map_err(|source| LedgerError::WriteFailed {
            path: path.clone(),
            source,
        })?;
        let lock_path = self.lock_path(name, network);
        let _ = fs::remove_file(lock_path);
        Ok(true)
    }

    /// All records currently on disk, for status listings.
    pub fn list(&self) -> Result<Vec<ContractRecord>, LedgerError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.dir).map_err(|source| LedgerError::ReadFailed {
            path: self.dir.clone(),
            source,
        })?;
        let mut records = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                let content =
                    fs::read_to_string(&path).map_err(|source| LedgerError::ReadFailed {
                        path: path.clone(),
                        source,
                    })?;
                let record: ContractRecord = serde_json::from_str(&content)
                    .map_err(|source| LedgerError::ParseFailed { path, source })?;
                records.push(record);
            }
        }
        records.sort_by(|a, b| {
            (a.name.as_str(), a.network.as_str()).cmp(&(b.name.as_str(), b.network.as_str()))
        });
        Ok(records)
    }

    fn ensure_dir(&self) -> Result<(), LedgerError> {
        fs::create_dir_all(&self.dir).map_err(|source| LedgerError::WriteFailed {
            path: self.dir.clone(),
            source,
        })
    }

    /// Exclusive advisory lock serializing writers for one key. Readers do
    /// not take the lock; they only ever see complete files thanks to the
    /// atomic rename in `persist`.
    fn acquire_write_lock(&self, name: &str, network: &Network) -> Result<fs::File, LedgerError> {
        let path = self.lock_path(name, network);
        let file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| LedgerError::WriteFailed {
                path: path.clone(),
                source,
            })?;
        file.lock_exclusive()
            .map_err(|source| LedgerError::WriteFailed { path, source })?;
        Ok(file)
    }

    /// Write the record to a temp file in the same directory, then rename
    /// over the destination. A crash mid-write leaves the old record intact.
    fn persist(&self, path: &Path, record: &ContractRecord) -> Result<(), LedgerError> {
        let json = serde_json::to_string_pretty(record).map_err(|source| {
            LedgerError::ParseFailed {
                path: path.to_path_buf(),
                source,
            }
        })?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|source| LedgerError::WriteFailed {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, path).map_err(|source| LedgerError::WriteFailed {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{Address, ContractId, LifecycleState};
    use tempfile::tempdir;

    fn make_ledger() -> (Ledger, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        (Ledger::new(dir.path()), dir)
    }

    fn testnet() -> Network {
        Network::from("testnet")
    }

    #[test]
    fn test_get_absent_returns_undeployed_default() {
        let (ledger, _dir) = make_ledger();
        let record = ledger.get("shade", &testnet()).unwrap();
        assert_eq!(record.status, LifecycleState::Undeployed);
        assert_eq!(record.version, 0);
        // Absent keys are not materialized on disk by a read
        assert!(!ledger.record_path("shade", &testnet()).exists());
    }

    #[test]
    fn test_update_persists_and_bumps_version() {
        let (ledger, _dir) = make_ledger();
        let updated = ledger
            .update("shade", &testnet(), 0, |mut r| {
                r.status = LifecycleState::Deployed;
                r.contract_id = Some(ContractId("C1".into()));
                r
            })
            .unwrap();
        assert_eq!(updated.version, 1);

        let reloaded = ledger.get("shade", &testnet()).unwrap();
        assert_eq!(reloaded.status, LifecycleState::Deployed);
        assert_eq!(reloaded.version, 1);
    }

    #[test]
    fn test_update_with_stale_version_conflicts() {
        let (ledger, _dir) = make_ledger();
        ledger
            .update("shade", &testnet(), 0, |mut r| {
                r.status = LifecycleState::Deployed;
                r.contract_id = Some(ContractId("C1".into()));
                r
            })
            .unwrap();

        // A second writer still holding version 0 must be refused
        let err = ledger
            .update("shade", &testnet(), 0, |r| r)
            .unwrap_err();
        match err {
            LedgerError::WriteConflict {
                expected, found, ..
            } => {
                assert_eq!(expected, 0);
                assert_eq!(found, 1);
            }
            other => panic!("Expected WriteConflict, got {other:?}"),
        }

        // And the conflicting write must not have touched the record
        let record = ledger.get("shade", &testnet()).unwrap();
        assert_eq!(record.version, 1);
        assert_eq!(record.status, LifecycleState::Deployed);
    }

    #[test]
    fn test_update_rejects_invariant_violations() {
        let (ledger, _dir) = make_ledger();
        // Deployed without a contract_id is never a legal persisted state
        let err = ledger
            .update("shade", &testnet(), 0, |mut r| {
                r.status = LifecycleState::Deployed;
                r
            })
            .unwrap_err();
        assert!(matches!(err, LedgerError::CorruptRecord { .. }));
        assert!(!ledger.record_path("shade", &testnet()).exists());
    }

    #[test]
    fn test_keys_are_independent() {
        let (ledger, _dir) = make_ledger();
        ledger
            .update("shade", &testnet(), 0, |mut r| {
                r.status = LifecycleState::Deployed;
                r.contract_id = Some(ContractId("C1".into()));
                r
            })
            .unwrap();

        let futurenet = Network::from("futurenet");
        let other = ledger.get("shade", &futurenet).unwrap();
        assert_eq!(other.status, LifecycleState::Undeployed);

        let account = ledger.get("account", &testnet()).unwrap();
        assert_eq!(account.status, LifecycleState::Undeployed);
    }

    #[test]
    fn test_overwrite_ignores_version() {
        let (ledger, _dir) = make_ledger();
        ledger
            .update("shade", &testnet(), 0, |mut r| {
                r.status = LifecycleState::Deployed;
                r.contract_id = Some(ContractId("C1".into()));
                r
            })
            .unwrap();

        let repaired = ledger
            .overwrite("shade", &testnet(), |mut r| {
                r.status = LifecycleState::Active;
                r.admin = Some(Address::from("GADMIN"));
                r
            })
            .unwrap();
        assert_eq!(repaired.version, 2);
        assert_eq!(repaired.status, LifecycleState::Active);
    }

    #[test]
    fn test_reset_removes_record() {
        let (ledger, _dir) = make_ledger();
        ledger
            .update("shade", &testnet(), 0, |mut r| {
                r.status = LifecycleState::Deployed;
                r.contract_id = Some(ContractId("C1".into()));
                r
            })
            .unwrap();

        assert!(ledger.reset("shade", &testnet()).unwrap());
        assert!(!ledger.record_path("shade", &testnet()).exists());
        // Resetting an absent record reports false, not an error
        assert!(!ledger.reset("shade", &testnet()).unwrap());

        let record = ledger.get("shade", &testnet()).unwrap();
        assert_eq!(record.status, LifecycleState::Undeployed);
    }

    #[test]
    fn test_record_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let ledger = Ledger::new(dir.path());
            ledger
                .update("shade", &testnet(), 0, |mut r| {
                    r.status = LifecycleState::Deployed;
                    r.contract_id = Some(ContractId("CDLZ".into()));
                    r
                })
                .unwrap();
        }
        {
            let ledger = Ledger::new(dir.path());
            let record = ledger.get("shade", &testnet()).unwrap();
            assert_eq!(record.contract_id.as_ref().unwrap().as_str(), "CDLZ");
        }
    }

    #[test]
    fn test_record_file_is_human_inspectable_json() {
        let (ledger, _dir) = make_ledger();
        ledger
            .update("shade", &testnet(), 0, |mut r| {
                r.status = LifecycleState::Deployed;
                r.contract_id = Some(ContractId("C1".into()));
                r
            })
            .unwrap();

        let content = fs::read_to_string(ledger.record_path("shade", &testnet())).unwrap();
        assert!(content.contains("\"status\": \"deployed\""));
        assert!(content.contains("\"contract_id\": \"C1\""));
    }

    #[test]
    fn test_list_returns_all_records_sorted() {
        let (ledger, _dir) = make_ledger();
        for (name, net) in [("shade", "testnet"), ("account", "testnet"), ("shade", "futurenet")] {
            ledger
                .update(name, &Network::from(net), 0, |mut r| {
                    r.status = LifecycleState::Deployed;
                    r.contract_id = Some(ContractId(format!("C-{name}-{net}")));
                    r
                })
                .unwrap();
        }
        let records = ledger.list().unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].name, "account");
        assert_eq!(records[1].network, Network::from("futurenet"));
    }
}
