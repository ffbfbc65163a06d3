//! Deployment address derivation: `compute-create`, `compute-create2`.

use crate::error::{EngineError, Result};
use crate::resolver::args::{self, ResolvedArgs};
use alloy::primitives::B256;

/// `compute-create { deployerAddress, nonce }`: the standard RLP-based
/// CREATE address.
pub fn compute_create(resolved: &ResolvedArgs) -> Result<serde_json::Value> {
    const OP: &str = "compute-create";
    let deployer = args::parse_address(args::require(resolved, "deployerAddress", OP)?, OP, "deployerAddress")?;
    let nonce = args::parse_u64(args::require(resolved, "nonce", OP)?, OP, "nonce")?;
    let address = deployer.create(nonce);
    Ok(serde_json::Value::String(address.to_checksum(None)))
}

/// `compute-create2 { deployerAddress, salt, initCode }`:
/// `keccak256(0xff || deployer || salt || keccak256(initCode))[12..]`.
pub fn compute_create2(resolved: &ResolvedArgs) -> Result<serde_json::Value> {
    const OP: &str = "compute-create2";
    let deployer = args::parse_address(args::require(resolved, "deployerAddress", OP)?, OP, "deployerAddress")?;

    let salt_bytes = args::parse_hex_bytes(args::require(resolved, "salt", OP)?, OP, "salt")?;
    if salt_bytes.len() != 32 {
        return Err(EngineError::Validation(format!(
            "{}: 'salt' must be exactly 32 bytes, got {}",
            OP,
            salt_bytes.len()
        )));
    }
    let salt = B256::from_slice(&salt_bytes);

    let init_code = args::parse_hex_bytes(args::require(resolved, "initCode", OP)?, OP, "initCode")?;

    let address = deployer.create2_from_code(salt, &init_code);
    Ok(serde_json::Value::String(address.to_checksum(None)))
}
