//! Test doubles for engine tests: an in-memory chain, a collecting event
//! sink, and context builders.
//!
//! Signing needs no double; [`LocalWalletSigner`] is pure and works
//! offline with a throwaway key.

use crate::artifacts::ContractRepository;
use crate::context::{Constants, ExecutionContext};
use crate::error::{EngineError, Result};
use crate::rpc::{ChainClient, TxOutcome, TxPlan};
use crate::signer::LocalWalletSigner;
use alloy::primitives::{Address, Bytes, U256};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use rigger_core::{EngineEvent, EventSink, Network};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Well-known throwaway key (first Anvil dev account).
pub const TEST_PRIVATE_KEY: &str =
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// In-memory [`ChainClient`].
#[derive(Default)]
pub struct MockChain {
    pub balances: Mutex<BTreeMap<Address, U256>>,
    pub codes: Mutex<BTreeMap<Address, Bytes>>,
    /// Canned `eth_call` results keyed `"<to>:<calldata>"`, both lowercase
    /// 0x hex.
    pub call_results: Mutex<BTreeMap<String, Bytes>>,
    /// Every transaction sent through the wallet path.
    pub sent: Mutex<Vec<TxPlan>>,
    /// Every raw broadcast.
    pub broadcasts: Mutex<Vec<Vec<u8>>>,
    pub gas_estimate: AtomicU64,
    /// When set, the next send/broadcast reports a reverted receipt.
    pub revert_next: AtomicBool,
    tx_counter: AtomicU64,
}

impl MockChain {
    pub fn new() -> Self {
        let chain = Self::default();
        chain.gas_estimate.store(100_000, Ordering::SeqCst);
        chain
    }

    pub fn set_balance(&self, address: Address, balance: U256) {
        self.balances.lock().unwrap().insert(address, balance);
    }

    pub fn set_code(&self, address: Address, code: &str) {
        let clean = code.strip_prefix("0x").unwrap_or(code);
        self.codes
            .lock()
            .unwrap()
            .insert(address, Bytes::from(hex::decode(clean).unwrap()));
    }

    pub fn set_call_result(&self, to: Address, data: &[u8], result: &[u8]) {
        self.call_results.lock().unwrap().insert(
            format!("0x{}:0x{}", hex::encode(to), hex::encode(data)),
            Bytes::from(result.to_vec()),
        );
    }

    fn next_outcome(&self) -> TxOutcome {
        let n = self.tx_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let status = !self.revert_next.swap(false, Ordering::SeqCst);
        TxOutcome {
            hash: format!("0x{:064x}", n),
            status,
            block_number: Some(n),
            receipt: serde_json::json!({ "status": status, "transactionIndex": 0 }),
        }
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn get_balance(&self, address: Address) -> Result<U256> {
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(&address)
            .copied()
            .unwrap_or(U256::ZERO))
    }

    async fn get_code(&self, address: Address) -> Result<Bytes> {
        Ok(self
            .codes
            .lock()
            .unwrap()
            .get(&address)
            .cloned()
            .unwrap_or_default())
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes> {
        let key = format!("0x{}:0x{}", hex::encode(to), hex::encode(&data));
        self.call_results
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or_else(|| EngineError::Rpc(format!("no canned result for {}", key)))
    }

    async fn estimate_gas(&self, _tx: &TxPlan) -> Result<u64> {
        Ok(self.gas_estimate.load(Ordering::SeqCst))
    }

    async fn send_transaction(&self, tx: TxPlan) -> Result<TxOutcome> {
        self.sent.lock().unwrap().push(tx);
        Ok(self.next_outcome())
    }

    async fn broadcast_raw(&self, raw: Vec<u8>) -> Result<TxOutcome> {
        self.broadcasts.lock().unwrap().push(raw);
        Ok(self.next_outcome())
    }
}

/// Collects events in emission order.
#[derive(Default)]
pub struct CollectingSink {
    pub events: Mutex<Vec<EngineEvent>>,
}

impl CollectingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Names of started actions, in order. The seam used by ordering tests.
    pub fn started_actions(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                EngineEvent::ActionStarted { action, .. } => Some(action),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub fn test_network() -> Network {
    Network {
        name: "testnet".to_string(),
        chain_id: 31337,
        rpc_url: "http://localhost:8545".to_string(),
        gas_limit: None,
        evm_version: None,
        testnet: Some(true),
        supports: None,
        custom: BTreeMap::new(),
    }
}

pub fn test_signer() -> LocalWalletSigner {
    LocalWalletSigner::new(PrivateKeySigner::from_str(TEST_PRIVATE_KEY).unwrap())
}

/// A context over the given mock chain with an empty repository and no
/// constants.
pub fn test_context(chain: Arc<MockChain>) -> ExecutionContext {
    test_context_with(chain, ContractRepository::empty(), BTreeMap::new())
}

pub fn test_context_with(
    chain: Arc<MockChain>,
    repository: ContractRepository,
    constants: BTreeMap<String, serde_json::Value>,
) -> ExecutionContext {
    ExecutionContext::new(
        test_network(),
        chain,
        Arc::new(test_signer()),
        Arc::new(repository),
        Constants::new(constants),
    )
}
