//! Network client backed by the `stellar` CLI.
//!
//! Each operation spawns one `stellar contract ...` subprocess with captured
//! stdio, bounded by a wall-clock timeout, and parses the result from
//! stdout. The CLI owns transaction assembly, signing, and submission; this
//! module owns classifying its failures into the [`NetworkError`] taxonomy.

use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use uuid::Uuid;

use crate::contract::{Address, CodeHash, ContractId};
use crate::errors::NetworkError;
use crate::network::NetworkClient;
use crate::util::{last_line, parse_cli_value};

/// Stderr fragments that indicate the node never executed the transaction,
/// as opposed to executing it and refusing.
const TRANSIENT_MARKERS: &[&str] = &[
    "connection refused",
    "connection reset",
    "dns error",
    "timed out",
    "temporarily unavailable",
    "502 bad gateway",
    "503 service unavailable",
];

pub struct StellarCli {
    stellar_cmd: String,
    rpc_url: String,
    network_passphrase: String,
    /// Identity used to sign read-only simulations and fee-bearing calls
    /// when the operation has no dedicated signer.
    source_account: Address,
    timeout: Duration,
}

impl StellarCli {
    pub fn new(
        stellar_cmd: String,
        rpc_url: String,
        network_passphrase: String,
        source_account: Address,
        timeout_secs: u64,
    ) -> Self {
        Self {
            stellar_cmd,
            rpc_url,
            network_passphrase,
            source_account,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    fn base_args(&self) -> Vec<String> {
        vec![
            "--rpc-url".into(),
            self.rpc_url.clone(),
            "--network-passphrase".into(),
            self.network_passphrase.clone(),
        ]
    }

    /// Run one `stellar` subprocess and return its stdout, classifying spawn
    /// failures, timeouts, and nonzero exits into the error taxonomy.
    async fn run(&self, args: Vec<String>) -> Result<String, NetworkError> {
        tracing::debug!(cmd = %self.stellar_cmd, ?args, "spawning stellar CLI");

        let mut child = Command::new(&self.stellar_cmd)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                NetworkError::Unavailable(format!(
                    "failed to spawn '{}': {}",
                    self.stellar_cmd, e
                ))
            })?;

        let output = match tokio::time::timeout(self.timeout, async {
            let stdout = child
                .stdout
                .take()
                .ok_or_else(|| std::io::Error::other("stdout not captured"))?;
            let stderr = child
                .stderr
                .take()
                .ok_or_else(|| std::io::Error::other("stderr not captured"))?;
            let (stdout, stderr) = tokio::join!(read_all(stdout), read_all(stderr));
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, stdout?, stderr?))
        })
        .await
        {
            Ok(result) => {
                result.map_err(|e| NetworkError::Unavailable(format!("subprocess I/O: {}", e)))?
            }
            Err(_) => {
                return Err(NetworkError::Timeout {
                    seconds: self.timeout.as_secs(),
                });
            }
        };

        let (status, stdout, stderr) = output;
        if status.success() {
            return Ok(stdout);
        }

        let detail = if stderr.trim().is_empty() {
            format!("exit code {}", status.code().unwrap_or(-1))
        } else {
            stderr.trim().to_string()
        };
        let lowered = detail.to_lowercase();
        if TRANSIENT_MARKERS.iter().any(|m| lowered.contains(m)) {
            Err(NetworkError::Unavailable(detail))
        } else {
            Err(NetworkError::Rejected(detail))
        }
    }

    /// The CLI takes wasm by path; stage the bytes in a scratch file for the
    /// duration of one call.
    fn stage_wasm(&self, wasm: &[u8]) -> Result<ScratchFile, NetworkError> {
        let path = std::env::temp_dir().join(format!("shadectl-{}.wasm", Uuid::new_v4()));
        std::fs::write(&path, wasm)
            .map_err(|e| NetworkError::Unavailable(format!("failed to stage wasm: {}", e)))?;
        Ok(ScratchFile { path })
    }
}

#[async_trait]
impl NetworkClient for StellarCli {
    async fn deploy(&self, wasm: &[u8]) -> Result<ContractId, NetworkError> {
        let staged = self.stage_wasm(wasm)?;
        let mut args = vec![
            "contract".to_string(),
            "deploy".to_string(),
            "--wasm".to_string(),
            staged.path.display().to_string(),
            "--source-account".to_string(),
            self.source_account.to_string(),
        ];
        args.extend(self.base_args());

        let stdout = self.run(args).await?;
        let id = last_line(&stdout)
            .filter(|l| l.starts_with('C'))
            .ok_or_else(|| {
                NetworkError::Rejected(format!("deploy printed no contract id: {}", stdout.trim()))
            })?;
        Ok(ContractId(id.to_string()))
    }

    async fn install(&self, wasm: &[u8]) -> Result<CodeHash, NetworkError> {
        let staged = self.stage_wasm(wasm)?;
        let mut args = vec![
            "contract".to_string(),
            "upload".to_string(),
            "--wasm".to_string(),
            staged.path.display().to_string(),
            "--source-account".to_string(),
            self.source_account.to_string(),
        ];
        args.extend(self.base_args());

        let stdout = self.run(args).await?;
        let hash = last_line(&stdout)
            .filter(|l| l.len() == 64 && l.chars().all(|c| c.is_ascii_hexdigit()))
            .ok_or_else(|| {
                NetworkError::Rejected(format!("upload printed no wasm hash: {}", stdout.trim()))
            })?;
        Ok(CodeHash(hash.to_string()))
    }

    async fn invoke(
        &self,
        contract_id: &ContractId,
        function: &str,
        args: &[String],
        signer: &Address,
    ) -> Result<Value, NetworkError> {
        let mut cli_args = vec![
            "contract".to_string(),
            "invoke".to_string(),
            "--id".to_string(),
            contract_id.to_string(),
            "--source-account".to_string(),
            signer.to_string(),
        ];
        cli_args.extend(self.base_args());
        cli_args.push("--".to_string());
        cli_args.push(function.to_string());
        cli_args.extend(args.iter().cloned());

        let stdout = self.run(cli_args).await?;
        Ok(parse_cli_value(&stdout))
    }

    async fn query(
        &self,
        contract_id: &ContractId,
        function: &str,
        args: &[String],
    ) -> Result<Value, NetworkError> {
        let mut cli_args = vec![
            "contract".to_string(),
            "invoke".to_string(),
            "--id".to_string(),
            contract_id.to_string(),
            "--source-account".to_string(),
            self.source_account.to_string(),
            "--is-view".to_string(),
        ];
        cli_args.extend(self.base_args());
        cli_args.push("--".to_string());
        cli_args.push(function.to_string());
        cli_args.extend(args.iter().cloned());

        let stdout = self.run(cli_args).await?;
        Ok(parse_cli_value(&stdout))
    }

    async fn code_hash(&self, contract_id: &ContractId) -> Result<CodeHash, NetworkError> {
        let mut args = vec![
            "contract".to_string(),
            "fetch".to_string(),
            "--id".to_string(),
            contract_id.to_string(),
        ];
        args.extend(self.base_args());

        let scratch = ScratchFile {
            path: std::env::temp_dir().join(format!("shadectl-fetch-{}.wasm", Uuid::new_v4())),
        };
        args.push("--out-file".to_string());
        args.push(scratch.path.display().to_string());

        self.run(args).await?;
        let bytes = std::fs::read(&scratch.path)
            .map_err(|e| NetworkError::Rejected(format!("fetch produced no wasm: {}", e)))?;
        use sha2::{Digest, Sha256};
        Ok(CodeHash(format!("{:x}", Sha256::digest(&bytes))))
    }
}

/// Temp file removed on drop, including on error paths.
struct ScratchFile {
    path: PathBuf,
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

async fn read_all(mut stream: impl tokio::io::AsyncRead + Unpin) -> std::io::Result<String> {
    use tokio::io::AsyncReadExt;
    let mut buf = String::new();
    stream.read_to_string(&mut buf).await?;
    Ok(buf)
}
