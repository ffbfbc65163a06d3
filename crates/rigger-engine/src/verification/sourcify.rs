//! Sourcify verification: one-shot multipart upload.

use super::{VerificationOutcome, VerificationPlatform, VerificationRequest};
use crate::error::{EngineError, Result};
use alloy::primitives::Address;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use rigger_core::Network;
use std::time::Duration;

const DEFAULT_API_URL: &str = "https://sourcify.dev/server";

const CHECK_TIMEOUT: Duration = Duration::from_secs(15);
const VERIFY_TIMEOUT: Duration = Duration::from_secs(60);

/// The public Sourcify repository.
///
/// Opt-in network policy: a network must name `sourcify` in its `supports`
/// list. No credentials; `custom.sourcifyApiUrl` overrides the server.
pub struct SourcifyPlatform {
    http: reqwest::Client,
}

impl SourcifyPlatform {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    fn api_url(&self, network: &Network) -> String {
        network
            .custom_str("sourcifyApiUrl")
            .unwrap_or(DEFAULT_API_URL)
            .trim_end_matches('/')
            .to_string()
    }

    async fn check(&self, address: Address, network: &Network) -> Result<bool> {
        let response: serde_json::Value = self
            .http
            .get(format!("{}/check-by-addresses", self.api_url(network)))
            .query(&[
                ("addresses", format!("0x{}", hex::encode(address))),
                ("chainIds", network.chain_id.to_string()),
            ])
            .timeout(CHECK_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let verified = response
            .as_array()
            .map(|entries| {
                entries.iter().any(|entry| {
                    matches!(
                        entry.get("status").and_then(|s| s.as_str()),
                        Some("perfect") | Some("partial")
                    )
                })
            })
            .unwrap_or(false);
        Ok(verified)
    }
}

impl Default for SourcifyPlatform {
    fn default() -> Self {
        Self::new()
    }
}

/// Picks the metadata document to upload: the contract's own metadata from
/// the build-info output when present, otherwise a minimal document
/// synthesized from the compiler input.
fn metadata_json(request: &VerificationRequest) -> Result<String> {
    let from_output = request
        .build_info
        .pointer("/output/contracts")
        .and_then(|contracts| contracts.get(&request.source_name))
        .and_then(|unit| unit.get(&request.contract_name))
        .and_then(|artifact| artifact.get("metadata"))
        .and_then(|m| m.as_str())
        .map(str::to_string);
    if let Some(metadata) = from_output {
        return Ok(metadata);
    }

    let input = request.build_info.get("input").ok_or_else(|| {
        EngineError::Verification("sourcify: build-info has no compiler input".to_string())
    })?;
    let synthesized = serde_json::json!({
        "compiler": { "version": request.compiler },
        "language": input.get("language").cloned().unwrap_or_else(|| "Solidity".into()),
        "settings": input.get("settings").cloned().unwrap_or_else(|| serde_json::json!({})),
        "sources": input.get("sources").cloned().unwrap_or_else(|| serde_json::json!({})),
    });
    Ok(synthesized.to_string())
}

/// Every source file in the compiler input, as `(path, content)`.
fn source_files(build_info: &serde_json::Value) -> Vec<(String, String)> {
    build_info
        .pointer("/input/sources")
        .and_then(|sources| sources.as_object())
        .map(|sources| {
            sources
                .iter()
                .filter_map(|(path, entry)| {
                    entry
                        .get("content")
                        .and_then(|c| c.as_str())
                        .map(|content| (path.clone(), content.to_string()))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Whether a verify response body reports a perfect or partial match.
fn response_is_verified(body: &serde_json::Value) -> bool {
    body.get("result")
        .and_then(|r| r.as_array())
        .map(|entries| {
            entries.iter().any(|entry| {
                matches!(
                    entry.get("status").and_then(|s| s.as_str()),
                    Some("perfect") | Some("partial")
                )
            })
        })
        .unwrap_or(false)
}

#[async_trait]
impl VerificationPlatform for SourcifyPlatform {
    fn name(&self) -> &'static str {
        "sourcify"
    }

    fn supports_network(&self, network: &Network) -> bool {
        network.supports_platform("sourcify") == Some(true)
    }

    fn is_configured(&self) -> bool {
        true
    }

    fn configuration_requirements(&self) -> String {
        "none; add 'sourcify' to the network's supports list".to_string()
    }

    async fn is_contract_verified(&self, address: Address, network: &Network) -> Result<bool> {
        self.check(address, network).await
    }

    async fn verify_contract(&self, request: &VerificationRequest) -> Result<VerificationOutcome> {
        // 1. Skip the upload when Sourcify already has a match.
        if self
            .check(request.address, &request.network)
            .await
            .unwrap_or(false)
        {
            return Ok(VerificationOutcome::already_verified(
                "Contract already verified on Sourcify",
            ));
        }

        // 2. Assemble metadata.json plus every source file.
        let mut form = Form::new()
            .text("address", format!("0x{}", hex::encode(request.address)))
            .text("chain", request.network.chain_id.to_string())
            .part(
                "files",
                Part::text(metadata_json(request)?).file_name("metadata.json"),
            );
        for (path, content) in source_files(&request.build_info) {
            form = form.part("files", Part::text(content).file_name(path));
        }

        // 3. One-shot upload.
        let response = self
            .http
            .post(format!("{}/verify", self.api_url(&request.network)))
            .multipart(form)
            .timeout(VERIFY_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        let body_text = response.text().await.unwrap_or_default();

        // 409 with a partial-match message means someone already uploaded.
        if status.as_u16() == 409 && body_text.to_lowercase().contains("partial") {
            return Ok(VerificationOutcome::already_verified(
                "Contract already partially verified on Sourcify",
            ));
        }
        if !status.is_success() {
            return Err(EngineError::Verification(format!(
                "sourcify: verify returned {}: {}",
                status, body_text
            )));
        }

        let body: serde_json::Value = serde_json::from_str(&body_text).unwrap_or_default();
        if response_is_verified(&body) {
            Ok(VerificationOutcome::verified(
                "Verified on Sourcify",
                None,
            ))
        } else {
            Ok(VerificationOutcome::failed(format!(
                "sourcify: unexpected verify response: {}",
                body_text
            )))
        }
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
                "input": {
                    "language": "Solidity",
                    "sources": {
                        "src/Token.sol": { "content": "contract Token {}" },
                        "src/Base.sol": { "content": "contract Base {}" }
                    },
                    "settings": {}
                },
                "output": { "contracts": {} }
            }),
            max_retries: 3,
            retry_delay: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_network_policy_is_opt_in() {
        let platform = SourcifyPlatform::new();
        let mut network = test_network();
        assert!(!platform.supports_network(&network));
        network.supports = Some(vec!["sourcify".into()]);
        assert!(platform.supports_network(&network));
    }

    #[test]
    fn test_metadata_prefers_build_output() {
        let mut req = request();
        req.build_info["output"]["contracts"]["src/Token.sol"]["Token"] =
            serde_json::json!({ "metadata": "{\"compiler\":{\"version\":\"x\"}}" });
        assert_eq!(
            metadata_json(&req).unwrap(),
            "{\"compiler\":{\"version\":\"x\"}}"
        );
    }

    #[test]
    fn test_metadata_synthesized_fallback() {
        let metadata = metadata_json(&request()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&metadata).unwrap();
        assert_eq!(parsed["compiler"]["version"], "0.8.24+commit.e11b9ed9");
        assert!(parsed["sources"].get("src/Token.sol").is_some());
    }

    #[test]
    fn test_source_files_collected() {
        let files = source_files(&request().build_info);
        assert_eq!(files.len(), 2);
        assert!(files.iter().any(|(p, _)| p == "src/Base.sol"));
    }

    #[test]
    fn test_response_interpretation() {
        assert!(response_is_verified(&serde_json::json!({
            "result": [{ "status": "perfect" }]
        })));
        assert!(response_is_verified(&serde_json::json!({
            "result": [{ "status": "partial" }]
        })));
        assert!(!response_is_verified(&serde_json::json!({
            "result": [{ "status": "false" }]
        })));
        assert!(!response_is_verified(&serde_json::json!({ "error": "boom" })));
    }
}
