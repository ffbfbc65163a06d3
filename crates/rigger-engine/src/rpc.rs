//! RPC provider seam and the alloy-backed HTTP implementation.
//!
//! The engine talks to the chain through [`ChainClient`] so tests can
//! substitute a mock. [`HttpChain`] builds an alloy HTTP provider per
//! operation; connections are dropped with the client at run end.

use crate::error::{EngineError, Result};
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;

/// A transaction the engine wants executed.
#[derive(Debug, Clone)]
pub struct TxPlan {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    /// Explicit gas limit; `None` lets the provider choose.
    pub gas_limit: Option<u64>,
}

/// The confirmed result of a sent or broadcast transaction.
#[derive(Debug, Clone)]
pub struct TxOutcome {
    /// 0x-prefixed transaction hash.
    pub hash: String,
    /// Receipt status flag; `false` means the transaction reverted.
    pub status: bool,
    pub block_number: Option<u64>,
    /// The full receipt as JSON, stored under `<action>.receipt`.
    pub receipt: serde_json::Value,
}

/// Chain access used by the resolver and the primitive handlers.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Account balance at current head.
    async fn get_balance(&self, address: Address) -> Result<U256>;

    /// Deployed code at an address (`0x` when none).
    async fn get_code(&self, address: Address) -> Result<Bytes>;

    /// `eth_call` against current head.
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes>;

    /// Gas estimate for a planned transaction, from the signer's account.
    async fn estimate_gas(&self, tx: &TxPlan) -> Result<u64>;

    /// Signs and sends a transaction, then waits for one confirmation.
    async fn send_transaction(&self, tx: TxPlan) -> Result<TxOutcome>;

    /// Broadcasts a pre-signed raw transaction and waits for one
    /// confirmation.
    async fn broadcast_raw(&self, raw: Vec<u8>) -> Result<TxOutcome>;
}

/// [`ChainClient`] over an alloy HTTP provider.
pub struct HttpChain {
    rpc_url: String,
    wallet: EthereumWallet,
    sender: Address,
}

impl HttpChain {
    pub fn new(rpc_url: &str, signer: PrivateKeySigner) -> Self {
        let sender = signer.address();
        Self {
            rpc_url: rpc_url.to_string(),
            wallet: EthereumWallet::from(signer),
            sender,
        }
    }

    fn url(&self) -> Result<reqwest::Url> {
        self.rpc_url
            .parse()
            .map_err(|_| EngineError::Rpc(format!("Failed to parse RPC URL: {}", self.rpc_url)))
    }

    fn request(&self, tx: &TxPlan) -> TransactionRequest {
        let mut request = TransactionRequest::default()
            .with_from(self.sender)
            .with_to(tx.to)
            .with_input(tx.data.clone())
            .with_value(tx.value);
        if let Some(gas) = tx.gas_limit {
            request.set_gas_limit(gas);
        }
        request
    }
}

fn outcome(receipt: alloy::rpc::types::TransactionReceipt) -> Result<TxOutcome> {
    Ok(TxOutcome {
        hash: format!("0x{}", hex::encode(receipt.transaction_hash)),
        status: receipt.status(),
        block_number: receipt.block_number,
        receipt: serde_json::to_value(&receipt)?,
    })
}

#[async_trait]
impl ChainClient for HttpChain {
    async fn get_balance(&self, address: Address) -> Result<U256> {
        let provider = ProviderBuilder::new().on_http(self.url()?);
        provider
            .get_balance(address)
            .await
            .map_err(|e| EngineError::Rpc(format!("Failed to read balance: {}", e)))
    }

    async fn get_code(&self, address: Address) -> Result<Bytes> {
        let provider = ProviderBuilder::new().on_http(self.url()?);
        provider
            .get_code_at(address)
            .await
            .map_err(|e| EngineError::Rpc(format!("Failed to read code: {}", e)))
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes> {
        let provider = ProviderBuilder::new().on_http(self.url()?);
        let request = TransactionRequest::default().with_to(to).with_input(data);
        provider
            .call(&request)
            .await
            .map_err(|e| EngineError::Rpc(format!("eth_call failed: {}", e)))
    }

    async fn estimate_gas(&self, tx: &TxPlan) -> Result<u64> {
        let provider = ProviderBuilder::new().on_http(self.url()?);
        provider
            .estimate_gas(&self.request(tx))
            .await
            .map_err(|e| EngineError::Rpc(format!("Gas estimation failed: {}", e)))
    }

    async fn send_transaction(&self, tx: TxPlan) -> Result<TxOutcome> {
        tracing::debug!(to = %tx.to, value = %tx.value, "sending transaction");
        let provider = ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(self.wallet.clone())
            .on_http(self.url()?);
        let pending = provider
            .send_transaction(self.request(&tx))
            .await
            .map_err(|e| EngineError::Rpc(format!("Failed to send transaction: {}", e)))?;
        let receipt = pending
            .get_receipt()
            .await
            .map_err(|e| EngineError::Rpc(format!("Failed to await receipt: {}", e)))?;
        outcome(receipt)
    }

    async fn broadcast_raw(&self, raw: Vec<u8>) -> Result<TxOutcome> {
        let provider = ProviderBuilder::new().on_http(self.url()?);
        let pending = provider
            .send_raw_transaction(&raw)
            .await
            .map_err(|e| EngineError::Rpc(format!("Failed to broadcast transaction: {}", e)))?;
        let receipt = pending
            .get_receipt()
            .await
            .map_err(|e| EngineError::Rpc(format!("Failed to await receipt: {}", e)))?;
        outcome(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_invalid_rpc_url() {
        let signer = PrivateKeySigner::from_str(
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        )
        .unwrap();
        let chain = HttpChain::new("not a url", signer);
        assert!(chain.url().is_err());
    }

    #[test]
    fn test_request_carries_gas_limit() {
        let signer = PrivateKeySigner::from_str(
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        )
        .unwrap();
        let chain = HttpChain::new("http://localhost:8545", signer);
        let plan = TxPlan {
            to: Address::ZERO,
            data: Bytes::new(),
            value: U256::ZERO,
            gas_limit: Some(21_000),
        };
        let request = chain.request(&plan);
        assert_eq!(request.gas, Some(21_000));
    }
}
