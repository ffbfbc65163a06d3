//! ABI encoding specs: `abi-encode`, `abi-pack`, `constructor-encode`.

use crate::error::{EngineError, Result};
use crate::resolver::args::{self, ResolvedArgs};
use crate::resolver::coerce::coerce;
use alloy_dyn_abi::{DynSolType, DynSolValue, Specifier};
use alloy_json_abi::Function;

/// Parses a human-readable function signature like
/// `transfer(address,uint256)` or `balanceOf(address)(uint256)`.
pub(crate) fn parse_function(signature: &str, op: &str) -> Result<Function> {
    Function::parse(signature).map_err(|e| {
        EngineError::Validation(format!("{}: invalid signature '{}': {}", op, signature, e))
    })
}

pub(crate) fn input_types(function: &Function, op: &str) -> Result<Vec<DynSolType>> {
    function
        .inputs
        .iter()
        .map(|param| {
            param.resolve().map_err(|e| {
                EngineError::Validation(format!("{}: unresolvable parameter type: {}", op, e))
            })
        })
        .collect()
}

pub(crate) fn output_types(function: &Function, op: &str) -> Result<Vec<DynSolType>> {
    function
        .outputs
        .iter()
        .map(|param| {
            param.resolve().map_err(|e| {
                EngineError::Validation(format!("{}: unresolvable return type: {}", op, e))
            })
        })
        .collect()
}

/// Produces `selector || abi-encoded arguments` for a call.
pub(crate) fn encode_call(
    function: &Function,
    values: &[serde_json::Value],
    op: &str,
) -> Result<Vec<u8>> {
    let types = input_types(function, op)?;
    if types.len() != values.len() {
        return Err(EngineError::Validation(format!(
            "{}: signature '{}' takes {} arguments, got {}",
            op,
            function.signature(),
            types.len(),
            values.len()
        )));
    }
    let coerced = types
        .iter()
        .zip(values)
        .map(|(ty, value)| coerce(ty, value, op))
        .collect::<Result<Vec<_>>>()?;

    let mut data = function.selector().to_vec();
    data.extend(DynSolValue::Tuple(coerced).abi_encode_params());
    Ok(data)
}

/// `abi-encode { signature, values[] }`: full calldata for a function call.
pub fn abi_encode(resolved: &ResolvedArgs) -> Result<serde_json::Value> {
    const OP: &str = "abi-encode";
    let signature = args::require_str(resolved, "signature", OP)?;
    let values = args::require_array(resolved, "values", OP)?;

    let data = parse_function(signature, OP)
        .and_then(|function| encode_call(&function, values, OP))
        .map_err(|e| {
            EngineError::Validation(format!("{}: Failed to encode function data: {}", OP, e))
        })?;
    Ok(serde_json::Value::String(format!("0x{}", hex::encode(data))))
}

/// `abi-pack { types[], values[] }`: Solidity packed (non-padded) encoding.
pub fn abi_pack(resolved: &ResolvedArgs) -> Result<serde_json::Value> {
    const OP: &str = "abi-pack";
    let types = args::require_array(resolved, "types", OP)?;
    let values = args::require_array(resolved, "values", OP)?;
    if types.len() != values.len() {
        return Err(EngineError::Validation(format!(
            "{}: {} types but {} values",
            OP,
            types.len(),
            values.len()
        )));
    }

    let mut packed = Vec::new();
    for (ty_value, value) in types.iter().zip(values) {
        let ty_str = ty_value.as_str().ok_or_else(|| {
            EngineError::Validation(format!("{}: every type must be a string, got {}", OP, ty_value))
        })?;
        let ty = DynSolType::parse(ty_str).map_err(|e| {
            EngineError::Validation(format!("{}: invalid type '{}': {}", OP, ty_str, e))
        })?;
        packed.extend(coerce(&ty, value, OP)?.abi_encode_packed());
    }
    Ok(serde_json::Value::String(format!("0x{}", hex::encode(packed))))
}

/// `constructor-encode { creationCode?, types[], values[] }`: constructor
/// arguments, optionally appended to the creation code.
pub fn constructor_encode(resolved: &ResolvedArgs) -> Result<serde_json::Value> {
    const OP: &str = "constructor-encode";
    let types = args::require_array(resolved, "types", OP)?;
    let values = args::require_array(resolved, "values", OP)?;
    if types.len() != values.len() {
        return Err(EngineError::Validation(format!(
            "{}: {} types but {} values",
            OP,
            types.len(),
            values.len()
        )));
    }

    let encoded_args = if types.is_empty() {
        Vec::new()
    } else {
        let coerced = types
            .iter()
            .zip(values)
            .map(|(ty_value, value)| {
                let ty_str = ty_value.as_str().ok_or_else(|| {
                    EngineError::Validation(format!(
                        "{}: every type must be a string, got {}",
                        OP, ty_value
                    ))
                })?;
                let ty = DynSolType::parse(ty_str).map_err(|e| {
                    EngineError::Validation(format!("{}: invalid type '{}': {}", OP, ty_str, e))
                })?;
                coerce(&ty, value, OP)
            })
            .collect::<Result<Vec<_>>>()?;
        DynSolValue::Tuple(coerced).abi_encode_params()
    };

    match args::optional(resolved, "creationCode") {
        None => Ok(serde_json::Value::String(format!(
            "0x{}",
            hex::encode(&encoded_args)
        ))),
        Some(code_value) => {
            let code = args::parse_hex_bytes(code_value, OP, "creationCode")?;
            if encoded_args.is_empty() {
                // No arguments: hand the creation code back untouched.
                return Ok(code_value.clone());
            }
            let mut data = code;
            data.extend(encoded_args);
            Ok(serde_json::Value::String(format!("0x{}", hex::encode(data))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(
        f: fn(&ResolvedArgs) -> Result<serde_json::Value>,
        json: serde_json::Value,
    ) -> Result<serde_json::Value> {
        f(&serde_json::from_value(json).unwrap())
    }

    #[test]
    fn test_abi_encode_transfer() {
        let result = run(
            abi_encode,
            serde_json::json!({
                "signature": "transfer(address,uint256)",
                "values": ["0x0000000000000000000000000000000000000001", "1000"],
            }),
        )
        .unwrap();
        let data = result.as_str().unwrap();
        // selector of transfer(address,uint256)
        assert!(data.starts_with("0xa9059cbb"));
        // 4-byte selector + 2 words
        assert_eq!(data.len(), 2 + 8 + 64 * 2);
        assert!(data.ends_with("03e8"));
    }

    #[test]
    fn test_abi_encode_arity_mismatch() {
        let err = run(
            abi_encode,
            serde_json::json!({
                "signature": "transfer(address,uint256)",
                "values": ["0x0000000000000000000000000000000000000001"],
            }),
        )
        .unwrap_err();
        assert!(err
            .to_string()
            .contains("abi-encode: Failed to encode function data:"));
    }

    #[test]
    fn test_abi_pack_non_padded() {
        let result = run(
            abi_pack,
            serde_json::json!({
                "types": ["uint16", "bytes2"],
                "values": ["258", "0xbeef"],
            }),
        )
        .unwrap();
        assert_eq!(result, "0x0102beef");
    }

    #[test]
    fn test_abi_pack_empty_is_0x() {
        let result = run(abi_pack, serde_json::json!({ "types": [], "values": [] })).unwrap();
        assert_eq!(result, "0x");
    }

    #[test]
    fn test_abi_pack_rejects_non_string_type() {
        assert!(run(abi_pack, serde_json::json!({ "types": [3], "values": [1] })).is_err());
    }

    #[test]
    fn test_constructor_encode_without_code() {
        let empty = run(
            constructor_encode,
            serde_json::json!({ "types": [], "values": [] }),
        )
        .unwrap();
        assert_eq!(empty, "0x");

        let encoded = run(
            constructor_encode,
            serde_json::json!({ "types": ["uint256"], "values": ["7"] }),
        )
        .unwrap();
        assert_eq!(
            encoded,
            "0x0000000000000000000000000000000000000000000000000000000000000007"
        );
    }

    #[test]
    fn test_constructor_encode_with_code() {
        // No args: code passes through as-is.
        let passthrough = run(
            constructor_encode,
            serde_json::json!({ "creationCode": "0x6080", "types": [], "values": [] }),
        )
        .unwrap();
        assert_eq!(passthrough, "0x6080");

        // With args: concatenated.
        let concatenated = run(
            constructor_encode,
            serde_json::json!({ "creationCode": "0x6080", "types": ["uint8"], "values": [1] }),
        )
        .unwrap();
        assert_eq!(
            concatenated,
            "0x60800000000000000000000000000000000000000000000000000000000000000001"
        );
    }

    #[test]
    fn test_constructor_encode_invalid_code() {
        assert!(run(
            constructor_encode,
            serde_json::json!({ "creationCode": "zz", "types": [], "values": [] }),
        )
        .is_err());
    }
}
