//! Unified configuration for shadectl.
//!
//! Reads `shadectl.toml` from the project directory and layers overrides on
//! top (file → environment → CLI flags). Example:
//!
//! ```toml
//! [defaults]
//! network = "testnet"
//! source_account = "GOPERATOR..."
//! stellar_cmd = "stellar"
//! network_timeout_secs = 60
//!
//! [networks.testnet]
//! rpc_url = "https://soroban-testnet.stellar.org"
//! network_passphrase = "Test SDF Network ; September 2015"
//!
//! [networks.futurenet]
//! rpc_url = "https://rpc-futurenet.stellar.org"
//! network_passphrase = "Test SDF Future Network ; October 2022"
//!
//! [artifacts]
//! wasm_dir = "target/wasm32-unknown-unknown/release"
//! contracts_dir = "contracts"
//! ```
//!
//! Testnet and futurenet profiles are built in; a config file is only needed
//! to add networks or change defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "shadectl.toml";

/// Directory holding the ledger, audit trail, and other durable state.
pub const STATE_DIR: &str = ".shadectl";

/// Connection profile for one target network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkProfile {
    pub rpc_url: String,
    pub network_passphrase: String,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Network used when `--network` is not given.
    #[serde(default)]
    pub network: Option<String>,
    /// Identity signing fee-bearing calls that have no dedicated signer.
    #[serde(default)]
    pub source_account: Option<String>,
    #[serde(default = "default_stellar_cmd")]
    pub stellar_cmd: String,
    #[serde(default = "default_network_timeout")]
    pub network_timeout_secs: u64,
}

fn default_stellar_cmd() -> String {
    "stellar".to_string()
}

fn default_network_timeout() -> u64 {
    60
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            network: None,
            source_account: None,
            stellar_cmd: default_stellar_cmd(),
            network_timeout_secs: default_network_timeout(),
        }
    }
}

/// `[artifacts]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    #[serde(default = "default_wasm_dir")]
    pub wasm_dir: PathBuf,
    /// Root of the contract source trees, used for the staleness check.
    #[serde(default = "default_contracts_dir")]
    pub contracts_dir: PathBuf,
}

fn default_wasm_dir() -> PathBuf {
    PathBuf::from("target/wasm32-unknown-unknown/release")
}

fn default_contracts_dir() -> PathBuf {
    PathBuf::from("contracts")
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            wasm_dir: default_wasm_dir(),
            contracts_dir: default_contracts_dir(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub networks: HashMap<String, NetworkProfile>,
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
}

impl Config {
    /// Load configuration for a project directory, layering:
    /// 1. built-in defaults (including testnet/futurenet profiles)
    /// 2. `shadectl.toml` in the project directory, if present
    /// 3. `SHADECTL_*` environment variables
    pub fn load(project_dir: &Path) -> Result<Self> {
        let mut config = match Self::read_file(&project_dir.join(CONFIG_FILE))? {
            Some(config) => config,
            None => Config::default(),
        };

        for (name, profile) in builtin_networks() {
            config.networks.entry(name).or_insert(profile);
        }

        config.apply_env();
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(Some(config))
    }

    fn apply_env(&mut self) {
        if let Ok(network) = std::env::var("SHADECTL_NETWORK") {
            if !network.is_empty() {
                self.defaults.network = Some(network);
            }
        }
        if let Ok(source) = std::env::var("SHADECTL_SOURCE_ACCOUNT") {
            if !source.is_empty() {
                self.defaults.source_account = Some(source);
            }
        }
        if let Ok(cmd) = std::env::var("SHADECTL_STELLAR_CMD") {
            if !cmd.is_empty() {
                self.defaults.stellar_cmd = cmd;
            }
        }
    }

    /// Resolve the profile for a network name, failing with the list of
    /// known networks when the name is unknown.
    pub fn network_profile(&self, name: &str) -> Result<&NetworkProfile> {
        self.networks.get(name).ok_or_else(|| {
            let mut known: Vec<&str> = self.networks.keys().map(String::as_str).collect();
            known.sort_unstable();
            anyhow::anyhow!(
                "Unknown network '{}'. Known networks: {}",
                name,
                known.join(", ")
            )
        })
    }

    /// The network to use given an optional CLI override.
    pub fn resolve_network(&self, cli_network: Option<&str>) -> Result<String> {
        cli_network
            .map(str::to_string)
            .or_else(|| self.defaults.network.clone())
            .context("No network given: pass --network or set defaults.network in shadectl.toml")
    }

    /// The source account for calls without a dedicated signer.
    pub fn resolve_source_account(&self, cli_source: Option<&str>) -> Result<String> {
        cli_source
            .map(str::to_string)
            .or_else(|| self.defaults.source_account.clone())
            .context(
                "No source account given: pass --source or set defaults.source_account in shadectl.toml",
            )
    }
}

fn builtin_networks() -> Vec<(String, NetworkProfile)> {
    vec![
        (
            "testnet".to_string(),
            NetworkProfile {
                rpc_url: "https://soroban-testnet.stellar.org".to_string(),
                network_passphrase: "Test SDF Network ; September 2015".to_string(),
            },
        ),
        (
            "futurenet".to_string(),
            NetworkProfile {
                rpc_url: "https://rpc-futurenet.stellar.org".to_string(),
                network_passphrase: "Test SDF Future Network ; October 2022".to_string(),
            },
        ),
    ]
}
