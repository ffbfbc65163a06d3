//! Per-run execution state.

use crate::artifacts::ContractRepository;
use crate::error::{EngineError, Result};
use crate::rpc::ChainClient;
use crate::signer::EngineSigner;
use rigger_core::Network;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// A template's local scope: its resolved arguments.
///
/// A fresh owned map per invocation; it never chains to the caller's scope.
pub type Scope = BTreeMap<String, serde_json::Value>;

/// Two-tier constants: job-level entries override top-level entries.
#[derive(Debug, Default, Clone)]
pub struct Constants {
    top: BTreeMap<String, serde_json::Value>,
    job: BTreeMap<String, serde_json::Value>,
}

impl Constants {
    pub fn new(top: BTreeMap<String, serde_json::Value>) -> Self {
        Self {
            top,
            job: BTreeMap::new(),
        }
    }

    /// Job first, then top-level.
    pub fn lookup(&self, name: &str) -> Option<&serde_json::Value> {
        self.job.get(name).or_else(|| self.top.get(name))
    }

    pub fn set_job_constants(&mut self, job: BTreeMap<String, serde_json::Value>) {
        self.job = job;
    }

    pub fn clear_job_constants(&mut self) {
        self.job.clear();
    }
}

/// Per-run execution state, owned by a single job run.
///
/// The engine is the only mutator of `outputs`; `context_path` is saved and
/// restored around every job and template entry, including failure paths.
pub struct ExecutionContext {
    pub network: Network,
    pub chain: Arc<dyn ChainClient>,
    pub signer: Arc<dyn EngineSigner>,
    pub repository: Arc<ContractRepository>,
    pub constants: Constants,

    /// Global output namespace, keyed `<action-name>.<field>`. Insert-only
    /// during a run.
    outputs: BTreeMap<String, serde_json::Value>,

    /// File path of the currently-executing job or template; drives
    /// path-relative artifact lookup.
    pub context_path: PathBuf,
}

impl ExecutionContext {
    pub fn new(
        network: Network,
        chain: Arc<dyn ChainClient>,
        signer: Arc<dyn EngineSigner>,
        repository: Arc<ContractRepository>,
        constants: Constants,
    ) -> Self {
        Self {
            network,
            chain,
            signer,
            repository,
            constants,
            outputs: BTreeMap::new(),
            context_path: PathBuf::new(),
        }
    }

    /// Stores an output value. Keys are never overwritten within a run.
    pub fn store_output(&mut self, key: String, value: serde_json::Value) -> Result<()> {
        if self.outputs.contains_key(&key) {
            return Err(EngineError::Execution(format!(
                "output key '{}' already stored in this run",
                key
            )));
        }
        self.outputs.insert(key, value);
        Ok(())
    }

    pub fn output(&self, key: &str) -> Option<&serde_json::Value> {
        self.outputs.get(key)
    }

    pub fn outputs(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.outputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants_two_tier_lookup() {
        let mut constants = Constants::new(BTreeMap::from([
            ("a".to_string(), serde_json::json!(1)),
            ("b".to_string(), serde_json::json!(2)),
        ]));
        constants.set_job_constants(BTreeMap::from([("a".to_string(), serde_json::json!(10))]));

        assert_eq!(constants.lookup("a"), Some(&serde_json::json!(10)));
        assert_eq!(constants.lookup("b"), Some(&serde_json::json!(2)));
        assert_eq!(constants.lookup("c"), None);

        constants.clear_job_constants();
        assert_eq!(constants.lookup("a"), Some(&serde_json::json!(1)));
    }
}
