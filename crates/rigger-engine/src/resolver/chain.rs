//! On-chain read specs: `read-balance`, `call`, `contract-exists`.

use crate::context::ExecutionContext;
use crate::error::{EngineError, Result};
use crate::resolver::args::{self, ResolvedArgs};
use crate::resolver::coerce::sol_to_json;
use crate::resolver::encode;
use alloy::primitives::Bytes;
use alloy_dyn_abi::DynSolType;

/// `read-balance { address }`: account balance at current head, as a
/// decimal string.
pub async fn read_balance(
    resolved: &ResolvedArgs,
    ctx: &ExecutionContext,
) -> Result<serde_json::Value> {
    const OP: &str = "read-balance";
    let address = args::parse_address(args::require(resolved, "address", OP)?, OP, "address")?;
    let balance = ctx.chain.get_balance(address).await?;
    Ok(serde_json::Value::String(balance.to_string()))
}

/// `contract-exists { address }`: whether code is deployed at an address.
pub async fn contract_exists(
    resolved: &ResolvedArgs,
    ctx: &ExecutionContext,
) -> Result<serde_json::Value> {
    const OP: &str = "contract-exists";
    let address = args::parse_address(args::require(resolved, "address", OP)?, OP, "address")?;
    let code = ctx.chain.get_code(address).await?;
    Ok(serde_json::Value::Bool(!code.is_empty()))
}

/// `call { to, signature, values[] }`: encode, `eth_call`, decode.
///
/// A single return value comes back unwrapped, none as null, several as an
/// ordered list.
pub async fn call(resolved: &ResolvedArgs, ctx: &ExecutionContext) -> Result<serde_json::Value> {
    const OP: &str = "call";
    let to = args::parse_address(args::require(resolved, "to", OP)?, OP, "to")?;
    let signature = args::require_str(resolved, "signature", OP)?;
    let values = args::require_array(resolved, "values", OP)?;

    let function = encode::parse_function(signature, OP)?;
    let data = encode::encode_call(&function, values, OP).map_err(wrap)?;

    let returned = ctx.chain.call(to, Bytes::from(data)).await.map_err(wrap)?;

    let types = encode::output_types(&function, OP)?;
    if types.is_empty() {
        return Ok(serde_json::Value::Null);
    }

    let decoded = DynSolType::Tuple(types)
        .abi_decode_params(&returned)
        .map_err(|e| {
            wrap(EngineError::Validation(format!(
                "{}: could not decode return data: {}",
                OP, e
            )))
        })?;
    let mut items: Vec<serde_json::Value> = match decoded {
        alloy_dyn_abi::DynSolValue::Tuple(items) => items.iter().map(sol_to_json).collect(),
        single => vec![sol_to_json(&single)],
    };
    Ok(if items.len() == 1 {
        items.remove(0)
    } else {
        serde_json::Value::Array(items)
    })
}

fn wrap(e: EngineError) -> EngineError {
    EngineError::Rpc(format!("call: Failed to execute contract call: {}", e))
}
