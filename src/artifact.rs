//! Artifact store: maps a contract name to its freshest built wasm binary.
//!
//! Resolution prefers the size-optimized build output
//! (`<name>.optimized.wasm`) over the plain one and fails rather than hand
//! out stale code: if any source file under the contract's source tree is
//! newer than the wasm, the caller gets `ArtifactError::Stale` and must
//! rebuild first. Triggering the build itself is an external step.

use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

use crate::contract::CodeHash;
use crate::errors::ArtifactError;

/// A resolved, fresh build artifact.
#[derive(Debug, Clone)]
pub struct ResolvedArtifact {
    pub path: PathBuf,
    pub hash: CodeHash,
}

pub struct ArtifactStore {
    /// Directory holding built wasm files, e.g.
    /// `target/wasm32-unknown-unknown/release`.
    wasm_dir: PathBuf,
    /// Root of the contract source trees, e.g. `contracts/`. `None` disables
    /// the staleness check (artifacts supplied out-of-tree).
    contracts_dir: Option<PathBuf>,
}

impl ArtifactStore {
    pub fn new(wasm_dir: PathBuf, contracts_dir: Option<PathBuf>) -> Self {
        Self {
            wasm_dir,
            contracts_dir,
        }
    }

    /// Resolve a contract name to its freshest binary and content hash.
    pub fn resolve(&self, name: &str) -> Result<ResolvedArtifact, ArtifactError> {
        let path = self.find_wasm(name)?;
        self.check_freshness(name, &path)?;

        let bytes = fs::read(&path).map_err(|source| ArtifactError::ReadFailed {
            path: path.clone(),
            source,
        })?;
        let hash = CodeHash(format!("{:x}", Sha256::digest(&bytes)));
        Ok(ResolvedArtifact { path, hash })
    }

    /// Read the resolved artifact's bytes.
    pub fn read(&self, artifact: &ResolvedArtifact) -> Result<Vec<u8>, ArtifactError> {
        fs::read(&artifact.path).map_err(|source| ArtifactError::ReadFailed {
            path: artifact.path.clone(),
            source,
        })
    }

    /// Optimized output wins over the plain build when both exist.
    fn find_wasm(&self, name: &str) -> Result<PathBuf, ArtifactError> {
        let file_name = name.replace('-', "_");
        let candidates = [
            self.wasm_dir.join(format!("{}.optimized.wasm", file_name)),
            self.wasm_dir.join(format!("{}.wasm", file_name)),
        ];
        candidates
            .into_iter()
            .find(|p| p.exists())
            .ok_or_else(|| ArtifactError::Missing {
                name: name.to_string(),
                dir: self.wasm_dir.clone(),
            })
    }

    fn check_freshness(&self, name: &str, wasm: &Path) -> Result<(), ArtifactError> {
        let Some(contracts_dir) = &self.contracts_dir else {
            return Ok(());
        };
        let src_dir = contracts_dir.join(name).join("src");
        if !src_dir.exists() {
            return Ok(());
        }

        let wasm_mtime = mtime(wasm).map_err(|source| ArtifactError::ReadFailed {
            path: wasm.to_path_buf(),
            source,
        })?;

        for entry in WalkDir::new(&src_dir).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(source_mtime) = mtime(entry.path()) else {
                continue;
            };
            if source_mtime > wasm_mtime {
                return Err(ArtifactError::Stale {
                    name: name.to_string(),
                    wasm: wasm.to_path_buf(),
                    newer_source: entry.path().to_path_buf(),
                });
            }
        }
        Ok(())
    }
}

fn mtime(path: &Path) -> std::io::Result<SystemTime> {
    fs::metadata(path)?.modified()
}
