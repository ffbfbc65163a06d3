//! Etherscan-style verification: submit standard JSON, then poll.

use super::{VerificationOutcome, VerificationPlatform, VerificationRequest};
use crate::error::{EngineError, Result};
use alloy::primitives::Address;
use async_trait::async_trait;
use rigger_core::Network;
use std::time::Duration;

const DEFAULT_API_URL: &str = "https://api.etherscan.io/v2/api";

const SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);
const STATUS_TIMEOUT: Duration = Duration::from_secs(15);
const POLL_INTERVAL: Duration = Duration::from_secs(5);
const POLL_TIMEOUT: Duration = Duration::from_secs(300);

/// Input `settings` keys forwarded in the verification submission.
const SETTINGS_ALLOWLIST: &[&str] = &[
    "optimizer",
    "evmVersion",
    "remappings",
    "viaIR",
    "libraries",
    "outputSelection",
    "metadata",
];

/// The multichain Etherscan API.
///
/// Opt-out network policy: supported unless the network's `supports` list
/// exists and omits `etherscan`. The endpoint can be overridden per network
/// via `custom.etherscanApiUrl`, the key via `custom.etherscanApiKey`.
pub struct EtherscanPlatform {
    api_key: Option<String>,
    http: reqwest::Client,
}

/// Outcome of one `verifysourcecode` submission.
enum SubmitResult {
    Accepted(String),
    AlreadyVerified(String),
    Retry(String),
    Fatal(String),
}

impl EtherscanPlatform {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.is_empty()),
            http: reqwest::Client::new(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(std::env::var("ETHERSCAN_API_KEY").ok())
    }

    fn api_url(&self, network: &Network) -> String {
        network
            .custom_str("etherscanApiUrl")
            .unwrap_or(DEFAULT_API_URL)
            .trim_end_matches('/')
            .to_string()
    }

    fn api_key_for(&self, network: &Network) -> String {
        network
            .custom_str("etherscanApiKey")
            .map(str::to_string)
            .or_else(|| self.api_key.clone())
            .unwrap_or_default()
    }

    /// `getsourcecode` returns a populated `SourceCode` for verified
    /// contracts.
    async fn fetch_source_code(&self, address: Address, network: &Network) -> Result<bool> {
        let response: serde_json::Value = self
            .http
            .get(self.api_url(network))
            .query(&[
                ("chainid", network.chain_id.to_string()),
                ("module", "contract".to_string()),
                ("action", "getsourcecode".to_string()),
                ("address", format!("0x{}", hex::encode(address))),
                ("apikey", self.api_key_for(network)),
            ])
            .timeout(STATUS_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let source = response
            .pointer("/result/0/SourceCode")
            .and_then(|v| v.as_str())
            .unwrap_or("");
        Ok(!source.is_empty())
    }

    async fn submit(&self, request: &VerificationRequest) -> Result<SubmitResult> {
        let standard_json = build_standard_json(&request.build_info)?;
        let compiler_version = compiler_version(request);

        // The vendor API spells it "constructorArguements".
        let params = [
            ("chainid", request.network.chain_id.to_string()),
            ("module", "contract".to_string()),
            ("action", "verifysourcecode".to_string()),
            ("apikey", self.api_key_for(&request.network)),
            ("codeformat", "solidity-standard-json-input".to_string()),
            (
                "contractaddress",
                format!("0x{}", hex::encode(request.address)),
            ),
            ("sourceCode", serde_json::to_string(&standard_json)?),
            ("contractname", request.fully_qualified_name()),
            ("compilerversion", compiler_version),
            (
                "constructorArguements",
                request.constructor_arguments.clone().unwrap_or_default(),
            ),
        ];

        let response: serde_json::Value = self
            .http
            .post(self.api_url(&request.network))
            .form(&params)
            .timeout(SUBMIT_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let status = response.get("status").and_then(|v| v.as_str()).unwrap_or("");
        let result = response
            .get("result")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        if status == "1" {
            return Ok(SubmitResult::Accepted(result));
        }
        Ok(classify_failure(result))
    }

    /// Polls `checkverifystatus` until the submission is terminal.
    async fn poll(&self, guid: &str, network: &Network) -> Result<VerificationOutcome> {
        let deadline = tokio::time::Instant::now() + POLL_TIMEOUT;
        loop {
            let response: serde_json::Value = self
                .http
                .get(self.api_url(network))
                .query(&[
                    ("chainid", network.chain_id.to_string()),
                    ("module", "contract".to_string()),
                    ("action", "checkverifystatus".to_string()),
                    ("guid", guid.to_string()),
                    ("apikey", self.api_key_for(network)),
                ])
                .timeout(STATUS_TIMEOUT)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            let status = response.get("status").and_then(|v| v.as_str()).unwrap_or("");
            let result = response
                .get("result")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let lowered = result.to_lowercase();

            if lowered.contains("pending") {
                if tokio::time::Instant::now() + POLL_INTERVAL > deadline {
                    return Err(EngineError::Verification(format!(
                        "etherscan: verification status polling timed out for guid {}",
                        guid
                    )));
                }
                tokio::time::sleep(POLL_INTERVAL).await;
                continue;
            }
            if lowered.contains("already verified") {
                return Ok(VerificationOutcome::already_verified(result));
            }
            if status == "1" {
                return Ok(VerificationOutcome::verified(result, Some(guid.to_string())));
            }
            return Err(EngineError::Verification(format!(
                "etherscan: verification failed: {}",
                result
            )));
        }
    }
}

/// Sorts a submission failure message into the protocol's retry classes.
fn classify_failure(result: String) -> SubmitResult {
    let lowered = result.to_lowercase();
    if lowered.contains("already verified") {
        return SubmitResult::AlreadyVerified(result);
    }
    const RETRYABLE: &[&str] = &[
        "unable to locate contractcode",
        "contract source code not verified",
        "contract not found",
    ];
    if RETRYABLE.iter().any(|p| lowered.contains(p)) {
        return SubmitResult::Retry(result);
    }
    SubmitResult::Fatal(result)
}

/// Prunes the build-info input down to the standard-JSON payload Etherscan
/// accepts: `language`, `sources`, and an allowlisted `settings`.
fn build_standard_json(build_info: &serde_json::Value) -> Result<serde_json::Value> {
    let input = build_info.get("input").ok_or_else(|| {
        EngineError::Verification("etherscan: build-info has no compiler input".to_string())
    })?;
    let sources = input.get("sources").cloned().ok_or_else(|| {
        EngineError::Verification("etherscan: build-info input has no sources".to_string())
    })?;

    let mut settings = serde_json::Map::new();
    if let Some(all) = input.get("settings").and_then(|s| s.as_object()) {
        for key in SETTINGS_ALLOWLIST {
            if let Some(value) = all.get(*key) {
                settings.insert((*key).to_string(), value.clone());
            }
        }
    }

    Ok(serde_json::json!({
        "language": input.get("language").cloned().unwrap_or_else(|| "Solidity".into()),
        "sources": sources,
        "settings": settings,
    }))
}

/// Full compiler version in the `v<long>` form: from the contract metadata
/// in the build-info output, falling back to `solcLongVersion`, then the
/// artifact's own compiler field.
fn compiler_version(request: &VerificationRequest) -> String {
    let from_metadata = request
        .build_info
        .pointer("/output/contracts")
        .and_then(|contracts| contracts.get(&request.source_name))
        .and_then(|unit| unit.get(&request.contract_name))
        .and_then(|artifact| artifact.get("metadata"))
        .and_then(|m| m.as_str())
        .and_then(|m| serde_json::from_str::<serde_json::Value>(m).ok())
        .and_then(|m| {
            m.pointer("/compiler/version")
                .and_then(|v| v.as_str())
                .map(str::to_string)
        });
    let version = from_metadata
        .or_else(|| {
            request
                .build_info
                .get("solcLongVersion")
                .and_then(|v| v.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| request.compiler.clone());
    if version.starts_with('v') {
        version
    } else {
        format!("v{}", version)
    }
}

#[async_trait]
impl VerificationPlatform for EtherscanPlatform {
    fn name(&self) -> &'static str {
        "etherscan"
    }

    fn supports_network(&self, network: &Network) -> bool {
        network.supports_platform("etherscan") != Some(false)
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn configuration_requirements(&self) -> String {
        "set ETHERSCAN_API_KEY (or the network's custom.etherscanApiKey)".to_string()
    }

    async fn is_contract_verified(&self, address: Address, network: &Network) -> Result<bool> {
        self.fetch_source_code(address, network).await
    }

    async fn verify_contract(&self, request: &VerificationRequest) -> Result<VerificationOutcome> {
        // 1. Short-circuit when the source is already published.
        if self
            .fetch_source_code(request.address, &request.network)
            .await
            .unwrap_or(false)
        {
            return Ok(VerificationOutcome::already_verified(
                "Contract source code already verified",
            ));
        }

        // 2. Submit, retrying the not-yet-indexed class.
        let mut attempt = 0;
        let guid = loop {
            match self.submit(request).await? {
                SubmitResult::Accepted(guid) => break guid,
                SubmitResult::AlreadyVerified(message) => {
                    return Ok(VerificationOutcome::already_verified(message));
                }
                SubmitResult::Retry(message) => {
                    if attempt >= request.max_retries {
                        return Err(EngineError::Verification(format!(
                            "etherscan: giving up after {} retries: {}",
                            request.max_retries, message
                        )));
                    }
                    attempt += 1;
                    tokio::time::sleep(request.retry_delay).await;
                }
                SubmitResult::Fatal(message) => {
                    return Err(EngineError::Verification(format!(
                        "etherscan: submission rejected: {}",
                        message
                    )));
                }
            }
        };

        // 3. Poll the submission to a terminal state.
        self.poll(&guid, &request.network).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_network;
    use std::str::FromStr;

    fn request() -> VerificationRequest {
        VerificationRequest {
            address: Address::from_str("0x9Ef5bAB590AFdE8036D57b89ccD2947D4E3b1EFA").unwrap(),
            network: test_network(),
            source_name: "src/Token.sol".to_string(),
            contract_name: "Token".to_string(),
            compiler: "0.8.24+commit.e11b9ed9".to_string(),
            constructor_arguments: None,
            build_info: serde_json::json!({
                "solcLongVersion": "0.8.24+commit.e11b9ed9",
                "input": {
                    "language": "Solidity",
                    "sources": { "src/Token.sol": { "content": "contract Token {}" } },
                    "settings": {
                        "optimizer": { "enabled": true, "runs": 200 },
                        "outputSelection": { "*": { "*": ["*"] } },
                        "debug": { "revertStrings": "default" }
                    }
                },
                "output": { "contracts": {} }
            }),
            max_retries: 3,
            retry_delay: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_standard_json_prunes_settings() {
        let standard = build_standard_json(&request().build_info).unwrap();
        assert_eq!(standard["language"], "Solidity");
        assert!(standard["sources"].get("src/Token.sol").is_some());
        assert!(standard["settings"].get("optimizer").is_some());
        assert!(standard["settings"].get("outputSelection").is_some());
        // Not on the allowlist
        assert!(standard["settings"].get("debug").is_none());
    }

    #[test]
    fn test_compiler_version_prefers_metadata_then_long_version() {
        let mut req = request();
        assert_eq!(compiler_version(&req), "v0.8.24+commit.e11b9ed9");

        req.build_info["output"]["contracts"]["src/Token.sol"]["Token"] = serde_json::json!({
            "metadata": "{\"compiler\":{\"version\":\"0.8.19+commit.7dd6d404\"}}"
        });
        assert_eq!(compiler_version(&req), "v0.8.19+commit.7dd6d404");
    }

    #[test]
    fn test_classify_failure() {
        assert!(matches!(
            classify_failure("Contract source code already verified".into()),
            SubmitResult::AlreadyVerified(_)
        ));
        assert!(matches!(
            classify_failure("Unable to locate ContractCode at 0xabc".into()),
            SubmitResult::Retry(_)
        ));
        assert!(matches!(
            classify_failure("Contract not found, unable to verify".into()),
            SubmitResult::Retry(_)
        ));
        assert!(matches!(
            classify_failure("Invalid API key".into()),
            SubmitResult::Fatal(_)
        ));
    }

    #[test]
    fn test_network_policy_is_opt_out() {
        let platform = EtherscanPlatform::new(Some("key".into()));
        let mut network = test_network();
        assert!(platform.supports_network(&network));
        network.supports = Some(vec!["sourcify".into()]);
        assert!(!platform.supports_network(&network));
        network.supports = Some(vec!["etherscan".into()]);
        assert!(platform.supports_network(&network));
    }

    #[test]
    fn test_configuration() {
        assert!(EtherscanPlatform::new(Some("key".into())).is_configured());
        assert!(!EtherscanPlatform::new(None).is_configured());
        assert!(!EtherscanPlatform::new(Some(String::new())).is_configured());
    }
}
