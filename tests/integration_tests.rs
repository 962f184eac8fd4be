//! Integration tests for shadectl
//!
//! These drive the real binary against a temporary project directory. No
//! live network is needed: precondition and configuration failures are
//! detected before any transaction would be submitted, which also pins down
//! the exit-code contract that automation relies on.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to create a shadectl Command
fn shadectl() -> Command {
    cargo_bin_cmd!("shadectl")
}

/// Helper to create a temporary project directory
fn create_temp_project() -> TempDir {
    TempDir::new().unwrap()
}

/// Write a ledger record the way the tool itself persists it, simulating
/// state left behind by earlier invocations.
fn write_ledger_record(dir: &TempDir, name: &str, network: &str, json: &str) {
    let ledger_dir = dir.path().join(".shadectl").join("ledger");
    fs::create_dir_all(&ledger_dir).unwrap();
    fs::write(ledger_dir.join(format!("{name}.{network}.json")), json).unwrap();
}

const ACTIVE_RECORD: &str = r#"{
  "name": "shade",
  "network": "testnet",
  "contract_id": "CDLZFC3SYJYDZT7K67VZ75HPJVIEUVNIXF47ZG2FB2RMQQVU2HHGCYSC",
  "installed_code_hashes": ["aa11bb22"],
  "status": "active",
  "admin": "GADMINADDRESS",
  "version": 3
}"#;

// =============================================================================
// Basic CLI tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_help() {
        shadectl().arg("--help").assert().success();
    }

    #[test]
    fn test_version() {
        shadectl().arg("--version").assert().success();
    }

    #[test]
    fn test_status_with_empty_ledger() {
        let dir = create_temp_project();
        shadectl()
            .current_dir(dir.path())
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("No contracts tracked yet"));
    }

    #[test]
    fn test_networks_lists_builtins() {
        let dir = create_temp_project();
        shadectl()
            .current_dir(dir.path())
            .arg("networks")
            .assert()
            .success()
            .stdout(predicate::str::contains("testnet"))
            .stdout(predicate::str::contains("futurenet"));
    }

    #[test]
    fn test_networks_includes_config_defined_network() {
        let dir = create_temp_project();
        fs::write(
            dir.path().join("shadectl.toml"),
            r#"
[defaults]
network = "standalone"

[networks.standalone]
rpc_url = "http://localhost:8000/soroban/rpc"
network_passphrase = "Standalone Network ; February 2017"
"#,
        )
        .unwrap();

        shadectl()
            .current_dir(dir.path())
            .arg("networks")
            .assert()
            .success()
            .stdout(predicate::str::contains("standalone"))
            .stdout(predicate::str::contains("(default)"));
    }
}

// =============================================================================
// Exit-code contract
// =============================================================================

mod exit_codes {
    use super::*;

    #[test]
    fn test_missing_network_is_a_usage_error() {
        let dir = create_temp_project();
        shadectl()
            .current_dir(dir.path())
            .args(["pause", "shade", "--admin", "GADMINADDRESS"])
            .assert()
            .failure()
            .code(9)
            .stderr(predicate::str::contains("--network"));
    }

    #[test]
    fn test_unknown_network_names_known_ones() {
        let dir = create_temp_project();
        shadectl()
            .current_dir(dir.path())
            .args([
                "pause",
                "shade",
                "--admin",
                "GADMINADDRESS",
                "--network",
                "mainnet-typo",
            ])
            .assert()
            .failure()
            .code(9)
            .stderr(predicate::str::contains("testnet"));
    }

    #[test]
    fn test_pause_undeployed_contract_is_a_precondition_error() {
        let dir = create_temp_project();
        shadectl()
            .current_dir(dir.path())
            .args([
                "pause",
                "shade",
                "--admin",
                "GADMINADDRESS",
                "--network",
                "testnet",
            ])
            .assert()
            .failure()
            .code(2)
            .stderr(predicate::str::contains("not active"));
    }

    #[test]
    fn test_initialize_undeployed_contract_fails() {
        let dir = create_temp_project();
        shadectl()
            .current_dir(dir.path())
            .args([
                "initialize",
                "shade",
                "--admin",
                "GADMINADDRESS",
                "--network",
                "testnet",
            ])
            .assert()
            .failure()
            .code(2)
            .stderr(predicate::str::contains("not deployed"));
    }

    #[test]
    fn test_get_admin_undeployed_contract_fails() {
        let dir = create_temp_project();
        shadectl()
            .current_dir(dir.path())
            .args([
                "get-admin",
                "shade",
                "--source",
                "GSOURCE",
                "--network",
                "testnet",
            ])
            .assert()
            .failure()
            .code(2);
    }

    #[test]
    fn test_deploy_without_build_output_is_an_artifact_error() {
        let dir = create_temp_project();
        shadectl()
            .current_dir(dir.path())
            .args([
                "deploy",
                "shade",
                "--source",
                "GSOURCE",
                "--network",
                "testnet",
            ])
            .assert()
            .failure()
            .code(8)
            .stderr(predicate::str::contains("No build output"));
    }

    #[test]
    fn test_unpause_active_contract_is_a_precondition_error() {
        let dir = create_temp_project();
        write_ledger_record(&dir, "shade", "testnet", ACTIVE_RECORD);

        shadectl()
            .current_dir(dir.path())
            .args([
                "unpause",
                "shade",
                "--admin",
                "GADMINADDRESS",
                "--network",
                "testnet",
            ])
            .assert()
            .failure()
            .code(2)
            .stderr(predicate::str::contains("not paused"));
    }
}

// =============================================================================
// Ledger state handling
// =============================================================================

mod ledger_state {
    use super::*;

    #[test]
    fn test_status_renders_persisted_record() {
        let dir = create_temp_project();
        write_ledger_record(&dir, "shade", "testnet", ACTIVE_RECORD);

        shadectl()
            .current_dir(dir.path())
            .args(["status", "shade", "--network", "testnet"])
            .assert()
            .success()
            .stdout(predicate::str::contains("shade"))
            .stdout(predicate::str::contains("active"))
            .stdout(predicate::str::contains("GADMINADDRESS"));
    }

    #[test]
    fn test_status_of_untracked_contract_shows_undeployed() {
        let dir = create_temp_project();
        shadectl()
            .current_dir(dir.path())
            .args(["status", "shade", "--network", "testnet"])
            .assert()
            .success()
            .stdout(predicate::str::contains("undeployed"));
    }

    #[test]
    fn test_status_lists_records_across_networks() {
        let dir = create_temp_project();
        write_ledger_record(&dir, "shade", "testnet", ACTIVE_RECORD);
        write_ledger_record(
            &dir,
            "account",
            "futurenet",
            r#"{
  "name": "account",
  "network": "futurenet",
  "contract_id": "CACCOUNT",
  "status": "deployed",
  "version": 1
}"#,
        );

        shadectl()
            .current_dir(dir.path())
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("shade"))
            .stdout(predicate::str::contains("account"))
            .stdout(predicate::str::contains("futurenet"));
    }

    #[test]
    fn test_corrupt_record_is_reported_not_swallowed() {
        let dir = create_temp_project();
        // Active without an admin violates the record invariants
        write_ledger_record(
            &dir,
            "shade",
            "testnet",
            r#"{
  "name": "shade",
  "network": "testnet",
  "contract_id": "C1",
  "status": "active",
  "version": 1
}"#,
        );

        shadectl()
            .current_dir(dir.path())
            .args(["status", "shade", "--network", "testnet"])
            .assert()
            .failure()
            .code(9)
            .stderr(predicate::str::contains("violates invariants"));
    }

    #[test]
    fn test_reset_forgets_tracked_record() {
        let dir = create_temp_project();
        write_ledger_record(&dir, "shade", "testnet", ACTIVE_RECORD);

        shadectl()
            .current_dir(dir.path())
            .args(["reset", "shade", "--force", "--network", "testnet"])
            .assert()
            .success()
            .stdout(predicate::str::contains("forgot ledger state"));

        assert!(
            !dir.path()
                .join(".shadectl/ledger/shade.testnet.json")
                .exists()
        );
    }

    #[test]
    fn test_reset_untracked_record_is_a_clean_noop() {
        let dir = create_temp_project();
        shadectl()
            .current_dir(dir.path())
            .args(["reset", "shade", "--network", "testnet"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Nothing to reset"));
    }

    #[test]
    fn test_reset_writes_an_audit_entry() {
        let dir = create_temp_project();
        write_ledger_record(&dir, "shade", "testnet", ACTIVE_RECORD);

        shadectl()
            .current_dir(dir.path())
            .args(["reset", "shade", "--force", "--network", "testnet"])
            .assert()
            .success();

        let audit = fs::read_to_string(
            dir.path().join(".shadectl/audit/operations.jsonl"),
        )
        .unwrap();
        assert!(audit.contains("\"operation\":\"reset\""));
    }
}

// =============================================================================
// Project-dir flag
// =============================================================================

mod project_dir {
    use super::*;

    #[test]
    fn test_project_dir_flag_overrides_cwd() {
        let dir = create_temp_project();
        write_ledger_record(&dir, "shade", "testnet", ACTIVE_RECORD);

        shadectl()
            .args([
                "--project-dir",
                dir.path().to_str().unwrap(),
                "status",
                "shade",
                "--network",
                "testnet",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("active"));
    }
}
