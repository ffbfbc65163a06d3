//! Contract repository: hydrates compiled-contract descriptors from
//! standard-JSON build-info bundles.
//!
//! A build-info file is the compiler's input/output pair for one
//! compilation unit. The repository scans a root directory for
//! `**/build-info/*.json`, hydrates a [`Contract`] per emitted
//! `(sourceName, contractName)`, and resolves references written in job and
//! template files. Read-only after loading; safe to share across contexts.

use crate::error::{EngineError, Result};
use alloy::primitives::keccak256;
use rigger_core::Contract;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

pub struct ContractRepository {
    contracts: Vec<Contract>,
    by_name: BTreeMap<String, Vec<usize>>,
    by_qualified: BTreeMap<String, usize>,
}

impl ContractRepository {
    pub fn empty() -> Self {
        Self::from_contracts(Vec::new())
    }

    pub fn from_contracts(contracts: Vec<Contract>) -> Self {
        let mut by_name: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        let mut by_qualified = BTreeMap::new();
        for (i, contract) in contracts.iter().enumerate() {
            by_name
                .entry(contract.contract_name.clone())
                .or_default()
                .push(i);
            by_qualified.insert(contract.fully_qualified_name(), i);
        }
        Self {
            contracts,
            by_name,
            by_qualified,
        }
    }

    /// Scans `root` for build-info bundles and hydrates every contract.
    pub fn load(root: &Path) -> Result<Self> {
        let mut files = Vec::new();
        collect_build_info_files(root, &mut files)?;
        files.sort();

        let mut contracts = Vec::new();
        for path in files {
            let text = std::fs::read_to_string(&path).map_err(|e| {
                EngineError::Artifact(format!(
                    "Failed to read build-info {}: {}",
                    path.display(),
                    e
                ))
            })?;
            let build_info: serde_json::Value = serde_json::from_str(&text).map_err(|e| {
                EngineError::Artifact(format!(
                    "Failed to parse build-info {}: {}",
                    path.display(),
                    e
                ))
            })?;
            hydrate(&path, &build_info, &mut contracts);
        }
        Ok(Self::from_contracts(contracts))
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    pub fn contracts(&self) -> &[Contract] {
        &self.contracts
    }

    /// Resolves a reference: a `Source.sol:Name` pair, a bare contract
    /// name, or a source path (optionally relative to `context_path`'s
    /// directory).
    ///
    /// Ambiguous references fail and name the candidates.
    pub fn lookup(&self, reference: &str, context_path: Option<&Path>) -> Result<Option<&Contract>> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Ok(None);
        }

        if reference.contains(':') {
            return Ok(self
                .by_qualified
                .get(reference)
                .map(|&i| &self.contracts[i]));
        }

        if let Some(hits) = self.by_name.get(reference) {
            if hits.len() == 1 {
                return Ok(Some(&self.contracts[hits[0]]));
            }
            let candidates: Vec<String> = hits
                .iter()
                .map(|&i| self.contracts[i].fully_qualified_name())
                .collect();
            return Err(EngineError::Artifact(format!(
                "Contract reference '{}' is ambiguous; candidates: {}",
                reference,
                candidates.join(", ")
            )));
        }

        // Path-style reference, possibly relative to the referencing file.
        if reference.contains('/') || reference.ends_with(".sol") {
            let relative = context_path
                .and_then(Path::parent)
                .map(|dir| normalize(&dir.join(reference)));
            let matches: Vec<usize> = self
                .contracts
                .iter()
                .enumerate()
                .filter(|(_, c)| {
                    let source = Path::new(&c.source_name);
                    source == Path::new(reference)
                        || relative.as_deref().map(|r| r.ends_with(source)).unwrap_or(false)
                })
                .map(|(i, _)| i)
                .collect();
            match matches.as_slice() {
                [] => return Ok(None),
                [single] => return Ok(Some(&self.contracts[*single])),
                many => {
                    let candidates: Vec<String> = many
                        .iter()
                        .map(|&i| self.contracts[i].fully_qualified_name())
                        .collect();
                    return Err(EngineError::Artifact(format!(
                        "Contract reference '{}' is ambiguous; candidates: {}",
                        reference,
                        candidates.join(", ")
                    )));
                }
            }
        }

        Ok(None)
    }
}

fn collect_build_info_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_build_info_files(&path, out)?;
        } else if is_build_info_file(&path) {
            out.push(path);
        }
    }
    Ok(())
}

/// `.../build-info/<id>.json`
pub fn is_build_info_file(path: &Path) -> bool {
    path.extension().map(|e| e == "json").unwrap_or(false)
        && path
            .parent()
            .and_then(Path::file_name)
            .map(|d| d == "build-info")
            .unwrap_or(false)
}

/// Hydrates every contract a build-info bundle emitted bytecode for.
/// Interfaces and abstract contracts (empty bytecode) are skipped.
fn hydrate(path: &Path, build_info: &serde_json::Value, out: &mut Vec<Contract>) {
    let build_info_id = build_info
        .get("id")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .or_else(|| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .map(str::to_string)
        })
        .unwrap_or_default();
    let solc_long = build_info
        .get("solcLongVersion")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown");

    let input_sources = build_info
        .pointer("/input/sources")
        .and_then(|v| v.as_object());
    let Some(output_contracts) = build_info
        .pointer("/output/contracts")
        .and_then(|v| v.as_object())
    else {
        return;
    };

    for (source_name, unit) in output_contracts {
        let Some(unit) = unit.as_object() else { continue };
        for (contract_name, artifact) in unit {
            let bytecode = artifact
                .pointer("/evm/bytecode/object")
                .and_then(|v| v.as_str())
                .unwrap_or("");
            if bytecode.is_empty() {
                continue;
            }
            let creation_code = normalize_hex(bytecode);
            let runtime_bytecode = artifact
                .pointer("/evm/deployedBytecode/object")
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(normalize_hex);

            let compiler = artifact
                .get("metadata")
                .and_then(|v| v.as_str())
                .and_then(|m| serde_json::from_str::<serde_json::Value>(m).ok())
                .and_then(|m| {
                    m.pointer("/compiler/version")
                        .and_then(|v| v.as_str())
                        .map(str::to_string)
                })
                .unwrap_or_else(|| solc_long.to_string());

            let source = input_sources
                .and_then(|s| s.get(source_name))
                .and_then(|s| s.get("content"))
                .and_then(|s| s.as_str())
                .map(str::to_string);

            let mut sources: BTreeSet<PathBuf> = BTreeSet::new();
            sources.insert(path.to_path_buf());
            if let Some(input_sources) = input_sources {
                sources.extend(input_sources.keys().map(PathBuf::from));
            }

            out.push(Contract {
                unique_hash: unique_hash(&creation_code),
                creation_code,
                runtime_bytecode,
                abi: artifact.get("abi").cloned(),
                source_name: source_name.clone(),
                contract_name: contract_name.clone(),
                source,
                compiler,
                build_info_id: build_info_id.clone(),
                sources,
            });
        }
    }
}

fn normalize_hex(s: &str) -> String {
    let clean = s.strip_prefix("0x").unwrap_or(s);
    format!("0x{}", clean.to_lowercase())
}

/// Keccak of the creation code. Unlinked bytecode with library placeholders
/// is not valid hex; hash the raw text in that case so the id stays stable.
fn unique_hash(creation_code: &str) -> String {
    let clean = creation_code.strip_prefix("0x").unwrap_or(creation_code);
    let hash = match hex::decode(clean) {
        Ok(bytes) => keccak256(&bytes),
        Err(_) => keccak256(creation_code.as_bytes()),
    };
    format!("0x{}", hex::encode(hash))
}

/// Lexically removes `.` and `..` segments.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::CurDir => {}
            std::path::Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}
