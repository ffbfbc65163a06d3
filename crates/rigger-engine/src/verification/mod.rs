//! Source verification against third-party platforms.
//!
//! A pluggable registry maps platform names to [`VerificationPlatform`]
//! implementations. Each platform runs its own small protocol state
//! machine: Etherscan-style back-ends submit and poll, Sourcify-style
//! back-ends upload once.

pub mod etherscan;
pub mod sourcify;

pub use etherscan::EtherscanPlatform;
pub use sourcify::SourcifyPlatform;

use crate::error::Result;
use alloy::primitives::Address;
use async_trait::async_trait;
use rigger_core::Network;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// A verification job for one deployed contract.
#[derive(Debug, Clone)]
pub struct VerificationRequest {
    pub address: Address,
    pub network: Network,
    pub source_name: String,
    pub contract_name: String,
    /// Long compiler version from the artifact; the platform may prefer the
    /// version recorded in the build-info metadata.
    pub compiler: String,
    /// ABI-encoded constructor arguments, hex without the 0x prefix.
    pub constructor_arguments: Option<String>,
    /// The standard-JSON build-info bundle (input + output).
    pub build_info: serde_json::Value,
    /// Bounded retry for "contract not yet indexed" responses.
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl VerificationRequest {
    pub fn fully_qualified_name(&self) -> String {
        format!("{}:{}", self.source_name, self.contract_name)
    }
}

/// Terminal result of a platform's verification attempt.
#[derive(Debug, Clone)]
pub struct VerificationOutcome {
    pub success: bool,
    /// Platform-assigned submission identifier, when one exists.
    pub guid: Option<String>,
    pub message: String,
    pub already_verified: bool,
}

impl VerificationOutcome {
    pub fn verified(message: impl Into<String>, guid: Option<String>) -> Self {
        Self {
            success: true,
            guid,
            message: message.into(),
            already_verified: false,
        }
    }

    pub fn already_verified(message: impl Into<String>) -> Self {
        Self {
            success: true,
            guid: None,
            message: message.into(),
            already_verified: true,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            guid: None,
            message: message.into(),
            already_verified: false,
        }
    }
}

/// A verification back-end.
#[async_trait]
pub trait VerificationPlatform: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the platform serves this network. Absence of the network's
    /// `supports` list is interpreted per-platform.
    fn supports_network(&self, network: &Network) -> bool;

    /// Whether credentials/configuration are in place.
    fn is_configured(&self) -> bool;

    /// Human-readable description of what configuration is missing.
    fn configuration_requirements(&self) -> String;

    async fn is_contract_verified(&self, address: Address, network: &Network) -> Result<bool>;

    async fn verify_contract(&self, request: &VerificationRequest) -> Result<VerificationOutcome>;
}

/// Registry of verification platforms.
#[derive(Default, Clone)]
pub struct PlatformRegistry {
    platforms: Vec<Arc<dyn VerificationPlatform>>,
}

impl PlatformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in platforms.
    pub fn with_default_platforms(etherscan_api_key: Option<String>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(EtherscanPlatform::new(etherscan_api_key)));
        registry.register(Arc::new(SourcifyPlatform::new()));
        registry
    }

    pub fn register(&mut self, platform: Arc<dyn VerificationPlatform>) {
        self.platforms.push(platform);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn VerificationPlatform>> {
        self.platforms.iter().find(|p| p.name() == name).cloned()
    }

    /// Platforms that both support the network and are configured.
    pub fn configured_platforms(&self, network: &Network) -> Vec<Arc<dyn VerificationPlatform>> {
        self.platforms
            .iter()
            .filter(|p| p.supports_network(network) && p.is_configured())
            .cloned()
            .collect()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.platforms.iter().map(|p| p.name()).collect()
    }
}
