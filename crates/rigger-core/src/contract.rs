//! Compiled-contract artifact descriptor.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// A compiled contract hydrated from a build-info bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    /// Keccak-256 of the creation code, 0x-prefixed.
    pub unique_hash: String,

    /// Deployment bytecode, 0x-prefixed hex.
    pub creation_code: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_bytecode: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abi: Option<serde_json::Value>,

    /// Source unit path as the compiler saw it, e.g. `src/Token.sol`.
    pub source_name: String,

    pub contract_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Long compiler version, e.g. `0.8.24+commit.e11b9ed9`.
    pub compiler: String,

    /// Identifier of the build-info bundle this contract came from.
    pub build_info_id: String,

    /// Files backing this contract: the build-info JSON plus the unit's
    /// source paths. Scanned by verification to find the build-info bundle.
    /// Not an addressable property, hence the private-by-convention name.
    #[serde(rename = "_sources", default)]
    pub sources: BTreeSet<PathBuf>,
}

/// Property names readable through `Contract(X).PROP` references.
pub const CONTRACT_PROPERTIES: &[&str] = &[
    "creationCode",
    "runtimeBytecode",
    "abi",
    "buildInfoId",
    "sourceName",
    "contractName",
    "compiler",
    "uniqueHash",
    "source",
];

impl Contract {
    /// Reads an allowlisted property. Returns `None` for unknown names and
    /// for optional properties that are unset.
    pub fn property(&self, name: &str) -> Option<serde_json::Value> {
        let value = match name {
            "creationCode" => serde_json::json!(self.creation_code),
            "runtimeBytecode" => serde_json::json!(self.runtime_bytecode.as_ref()?),
            "abi" => self.abi.clone()?,
            "buildInfoId" => serde_json::json!(self.build_info_id),
            "sourceName" => serde_json::json!(self.source_name),
            "contractName" => serde_json::json!(self.contract_name),
            "compiler" => serde_json::json!(self.compiler),
            "uniqueHash" => serde_json::json!(self.unique_hash),
            "source" => serde_json::json!(self.source.as_ref()?),
            _ => return None,
        };
        Some(value)
    }

    /// The `Source.sol:Name` form used in verification submissions.
    pub fn fully_qualified_name(&self) -> String {
        format!("{}:{}", self.source_name, self.contract_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract() -> Contract {
        Contract {
            unique_hash: "0xabc".to_string(),
            creation_code: "0x6080".to_string(),
            runtime_bytecode: None,
            abi: Some(serde_json::json!([])),
            source_name: "src/Token.sol".to_string(),
            contract_name: "Token".to_string(),
            source: None,
            compiler: "0.8.24+commit.e11b9ed9".to_string(),
            build_info_id: "b1".to_string(),
            sources: BTreeSet::new(),
        }
    }

    #[test]
    fn test_property_allowlist() {
        let c = contract();
        assert_eq!(c.property("creationCode").unwrap(), serde_json::json!("0x6080"));
        assert_eq!(c.property("contractName").unwrap(), serde_json::json!("Token"));
        assert_eq!(c.property("abi").unwrap(), serde_json::json!([]));
        // Optional and unset
        assert_eq!(c.property("runtimeBytecode"), None);
        // Not allowlisted
        assert_eq!(c.property("sources"), None);
        assert_eq!(c.property("constructor"), None);
    }

    #[test]
    fn test_fully_qualified_name() {
        assert_eq!(contract().fully_qualified_name(), "src/Token.sol:Token");
    }
}
