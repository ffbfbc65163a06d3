//! Signing seam.
//!
//! [`EngineSigner`] covers the three signing shapes the engine needs:
//! EIP-191 personal messages, EIP-712 typed data, and raw 32-byte digests.
//! The digest capability is the adapter over plain ECDSA that remote-only
//! signers may lack; the local implementation always has it.

use crate::error::{EngineError, Result};
use alloy::primitives::{Address, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use alloy_dyn_abi::TypedData;
use async_trait::async_trait;

/// Signing operations consumed by the `sign-*` primitives.
#[async_trait]
pub trait EngineSigner: Send + Sync {
    fn address(&self) -> Address;

    /// EIP-191 personal-sign over an arbitrary message.
    async fn sign_message(&self, message: &[u8]) -> Result<String>;

    /// EIP-712 signature over typed data.
    async fn sign_typed_data(&self, typed: &TypedData) -> Result<String>;

    /// Raw ECDSA over a 32-byte digest, no prefixing.
    async fn sign_digest(&self, digest: B256) -> Result<String>;
}

/// [`EngineSigner`] over an in-memory private key.
pub struct LocalWalletSigner {
    inner: PrivateKeySigner,
}

impl LocalWalletSigner {
    pub fn new(inner: PrivateKeySigner) -> Self {
        Self { inner }
    }
}

fn signature_hex(signature: &[u8]) -> String {
    format!("0x{}", hex::encode(signature))
}

#[async_trait]
impl EngineSigner for LocalWalletSigner {
    fn address(&self) -> Address {
        self.inner.address()
    }

    async fn sign_message(&self, message: &[u8]) -> Result<String> {
        let signature = self
            .inner
            .sign_message(message)
            .await
            .map_err(|e| EngineError::Execution(format!("Message signing failed: {}", e)))?;
        Ok(signature_hex(&signature.as_bytes()))
    }

    async fn sign_typed_data(&self, typed: &TypedData) -> Result<String> {
        // Hash locally, then raw-sign: keeps one signing path for both
        // typed data and digests.
        let digest = typed
            .eip712_signing_hash()
            .map_err(|e| EngineError::Validation(format!("Invalid typed data: {}", e)))?;
        self.sign_digest(digest).await
    }

    async fn sign_digest(&self, digest: B256) -> Result<String> {
        let signature = self
            .inner
            .sign_hash(&digest)
            .await
            .map_err(|e| EngineError::Execution(format!("Digest signing failed: {}", e)))?;
        Ok(signature_hex(&signature.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    // Well-known test key; never holds funds.
    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn signer() -> LocalWalletSigner {
        LocalWalletSigner::new(PrivateKeySigner::from_str(TEST_KEY).unwrap())
    }

    #[tokio::test]
    async fn test_sign_message_is_65_bytes() {
        let sig = signer().sign_message(b"hello").await.unwrap();
        assert!(sig.starts_with("0x"));
        assert_eq!(sig.len(), 2 + 65 * 2);
    }

    #[tokio::test]
    async fn test_sign_digest_is_deterministic() {
        let digest = B256::repeat_byte(0x11);
        let a = signer().sign_digest(digest).await.unwrap();
        let b = signer().sign_digest(digest).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_sign_typed_data() {
        let typed: TypedData = serde_json::from_value(serde_json::json!({
            "types": {
                "EIP712Domain": [
                    { "name": "name", "type": "string" },
                    { "name": "chainId", "type": "uint256" }
                ],
                "Transfer": [
                    { "name": "to", "type": "address" },
                    { "name": "amount", "type": "uint256" }
                ]
            },
            "primaryType": "Transfer",
            "domain": { "name": "Rigger", "chainId": 1 },
            "message": {
                "to": "0x0000000000000000000000000000000000000001",
                "amount": "1000"
            }
        }))
        .unwrap();
        let sig = signer().sign_typed_data(&typed).await.unwrap();
        assert_eq!(sig.len(), 2 + 65 * 2);
    }

    #[test]
    fn test_address_derivation() {
        // First Anvil dev account
        assert_eq!(
            signer().address(),
            Address::from_str("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266").unwrap()
        );
    }
}
