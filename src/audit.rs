//! Operation audit trail.
//!
//! Every orchestrator operation attempt appends one JSON line to
//! `.shadectl/audit/operations.jsonl`, whether it succeeded or failed.
//! Authorization failures are flagged so they can be filtered out of the
//! trail without parsing error strings.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::contract::{Address, Network, OperationKind};

pub const AUDIT_DIR: &str = "audit";
const AUDIT_FILE: &str = "operations.jsonl";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub operation: OperationKind,
    pub contract: String,
    pub network: Network,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller: Option<Address>,
    /// "succeeded", "noop" (idempotent retry), or the error kind.
    pub outcome: String,
    /// Set when the operation failed because the caller was not the admin.
    #[serde(default)]
    pub authorization_failure: bool,
    pub duration_ms: u64,
}

impl AuditEntry {
    pub fn new(
        operation: OperationKind,
        contract: &str,
        network: &Network,
        caller: Option<&Address>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            operation,
            contract: contract.to_string(),
            network: network.clone(),
            caller: caller.cloned(),
            outcome: String::new(),
            authorization_failure: false,
            duration_ms: 0,
        }
    }
}

pub struct AuditLog {
    file: PathBuf,
}

impl AuditLog {
    /// Open the audit log under the given state directory (`.shadectl/`).
    pub fn new(state_dir: &Path) -> Self {
        Self {
            file: state_dir.join(AUDIT_DIR).join(AUDIT_FILE),
        }
    }

    /// Append one entry. The line is flushed before returning so a crash
    /// right after an operation still leaves the attempt on record.
    pub fn append(&self, entry: &AuditEntry) -> Result<()> {
        if let Some(parent) = self.file.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create audit directory: {}", parent.display()))?;
        }
        let line = serde_json::to_string(entry).context("Failed to serialize audit entry")?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file)
            .with_context(|| format!("Failed to open audit log: {}", self.file.display()))?;
        writeln!(file, "{}", line).context("Failed to write audit entry")?;
        file.flush().context("Failed to flush audit log")?;
        Ok(())
    }

    /// All recorded entries, oldest first. Lines that fail to parse are
    /// skipped so one corrupt line cannot make the whole trail unreadable.
    pub fn entries(&self) -> Result<Vec<AuditEntry>> {
        if !self.file.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.file)
            .with_context(|| format!("Failed to read audit log: {}", self.file.display()))?;
        Ok(content
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }

    /// Entries flagged as authorization failures, for audit review.
    pub fn authorization_failures(&self) -> Result<Vec<AuditEntry>> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|e| e.authorization_failure)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entry(outcome: &str, authz: bool) -> AuditEntry {
        let mut e = AuditEntry::new(
            OperationKind::Pause,
            "shade",
            &Network::from("testnet"),
            Some(&Address::from("GADMIN")),
        );
        e.outcome = outcome.to_string();
        e.authorization_failure = authz;
        e
    }

    #[test]
    fn test_append_and_read_back() {
        let dir = tempdir().unwrap();
        let log = AuditLog::new(dir.path());

        log.append(&entry("succeeded", false)).unwrap();
        log.append(&entry("unauthorized", true)).unwrap();

        let entries = log.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].outcome, "succeeded");
        assert_eq!(entries[1].contract, "shade");
    }

    #[test]
    fn test_empty_log_reads_empty() {
        let dir = tempdir().unwrap();
        let log = AuditLog::new(dir.path());
        assert!(log.entries().unwrap().is_empty());
    }

    #[test]
    fn test_authorization_failures_are_filterable() {
        let dir = tempdir().unwrap();
        let log = AuditLog::new(dir.path());

        log.append(&entry("succeeded", false)).unwrap();
        log.append(&entry("unauthorized", true)).unwrap();
        log.append(&entry("succeeded", false)).unwrap();

        let failures = log.authorization_failures().unwrap();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].authorization_failure);
    }

    #[test]
    fn test_corrupt_line_does_not_poison_trail() {
        let dir = tempdir().unwrap();
        let log = AuditLog::new(dir.path());
        log.append(&entry("succeeded", false)).unwrap();

        let path = dir.path().join(AUDIT_DIR).join(AUDIT_FILE);
        let mut content = fs::read_to_string(&path).unwrap();
        content.push_str("{ not json\n");
        fs::write(&path, content).unwrap();

        log.append(&entry("noop", false)).unwrap();
        let entries = log.entries().unwrap();
        assert_eq!(entries.len(), 2);
    }
}
