//! Typed network descriptor.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A network descriptor, immutable for the lifetime of a run.
///
/// Serialized camelCase so `Network().chainId` style attribute reads match
/// the field names users write in configuration files. Extension attributes
/// live under `custom`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    pub name: String,
    pub chain_id: u64,
    pub rpc_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evm_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub testnet: Option<bool>,

    /// Verification platforms this network opts into. Interpretation is
    /// per-platform: some treat absence as "all", others as "none".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supports: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom: BTreeMap<String, serde_json::Value>,
}

impl Network {
    /// Reads an attribute by dotted path, e.g. `chainId` or `custom.a.b`.
    ///
    /// `testnet` coerces an unset value to `false`; every other miss returns
    /// `None` and the caller decides how to fail.
    pub fn attribute(&self, path: &str) -> Option<serde_json::Value> {
        if path == "testnet" {
            return Some(serde_json::Value::Bool(self.testnet.unwrap_or(false)));
        }
        let root = serde_json::to_value(self).ok()?;
        let mut current = &root;
        for segment in path.split('.') {
            current = current.get(segment)?;
        }
        if current.is_null() {
            None
        } else {
            Some(current.clone())
        }
    }

    pub fn is_testnet(&self) -> bool {
        self.testnet.unwrap_or(false)
    }

    /// Whether `supports` names the given platform. `None` when the network
    /// declares no `supports` list at all.
    pub fn supports_platform(&self, platform: &str) -> Option<bool> {
        self.supports
            .as_ref()
            .map(|list| list.iter().any(|p| p == platform))
    }

    /// A string-valued custom attribute, if present.
    pub fn custom_str(&self, key: &str) -> Option<&str> {
        self.custom.get(key).and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network() -> Network {
        serde_yaml::from_str(
            r#"
name: sepolia
chainId: 11155111
rpcUrl: https://rpc.sepolia.org
testnet: true
supports: [etherscan]
custom:
  registry:
    v1: "0x0000000000000000000000000000000000000001"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_attribute_reads() {
        let n = network();
        assert_eq!(n.attribute("name").unwrap(), serde_json::json!("sepolia"));
        assert_eq!(n.attribute("chainId").unwrap(), serde_json::json!(11155111u64));
        assert_eq!(
            n.attribute("custom.registry.v1").unwrap(),
            serde_json::json!("0x0000000000000000000000000000000000000001")
        );
        assert_eq!(n.attribute("gasLimit"), None);
        assert_eq!(n.attribute("custom.registry.v2"), None);
    }

    #[test]
    fn test_testnet_defaults_false() {
        let mut n = network();
        n.testnet = None;
        assert_eq!(n.attribute("testnet").unwrap(), serde_json::json!(false));
        assert!(!n.is_testnet());
    }

    #[test]
    fn test_supports_platform() {
        let n = network();
        assert_eq!(n.supports_platform("etherscan"), Some(true));
        assert_eq!(n.supports_platform("sourcify"), Some(false));

        let mut bare = network();
        bare.supports = None;
        assert_eq!(bare.supports_platform("etherscan"), None);
    }
}
