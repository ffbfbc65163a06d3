//! JSON ⇄ `DynSolValue` conversion for the ABI codec specs.

use crate::error::{EngineError, Result};
use alloy::primitives::{Address, I256, U256};
use alloy_dyn_abi::{DynSolType, DynSolValue};
use std::str::FromStr;

/// Coerces a resolved JSON value into the given Solidity type.
pub fn coerce(ty: &DynSolType, value: &serde_json::Value, op: &str) -> Result<DynSolValue> {
    let mismatch = |expected: &str| {
        EngineError::Validation(format!(
            "{}: cannot coerce {} into {} ({})",
            op, value, ty, expected
        ))
    };

    match ty {
        DynSolType::Address => {
            let s = value.as_str().ok_or_else(|| mismatch("address string"))?;
            let address = Address::from_str(s).map_err(|_| mismatch("valid address"))?;
            Ok(DynSolValue::Address(address))
        }
        DynSolType::Bool => match value {
            serde_json::Value::Bool(b) => Ok(DynSolValue::Bool(*b)),
            serde_json::Value::String(s) if s == "true" => Ok(DynSolValue::Bool(true)),
            serde_json::Value::String(s) if s == "false" => Ok(DynSolValue::Bool(false)),
            _ => Err(mismatch("boolean")),
        },
        DynSolType::Uint(size) => {
            let parsed = parse_uint(value).ok_or_else(|| mismatch("unsigned integer"))?;
            Ok(DynSolValue::Uint(parsed, *size))
        }
        DynSolType::Int(size) => {
            let parsed = parse_int(value).ok_or_else(|| mismatch("signed integer"))?;
            Ok(DynSolValue::Int(parsed, *size))
        }
        DynSolType::Bytes => {
            let s = value.as_str().ok_or_else(|| mismatch("hex string"))?;
            let bytes =
                hex::decode(s.strip_prefix("0x").unwrap_or(s)).map_err(|_| mismatch("valid hex"))?;
            Ok(DynSolValue::Bytes(bytes))
        }
        DynSolType::FixedBytes(size) => {
            let s = value.as_str().ok_or_else(|| mismatch("hex string"))?;
            let bytes =
                hex::decode(s.strip_prefix("0x").unwrap_or(s)).map_err(|_| mismatch("valid hex"))?;
            if bytes.len() != *size {
                return Err(mismatch(&format!("{} bytes", size)));
            }
            let mut word = [0u8; 32];
            word[..bytes.len()].copy_from_slice(&bytes);
            Ok(DynSolValue::FixedBytes(word.into(), *size))
        }
        DynSolType::String => {
            let s = value.as_str().ok_or_else(|| mismatch("string"))?;
            Ok(DynSolValue::String(s.to_string()))
        }
        DynSolType::Array(inner) => {
            let items = value.as_array().ok_or_else(|| mismatch("array"))?;
            let coerced = items
                .iter()
                .map(|item| coerce(inner, item, op))
                .collect::<Result<Vec<_>>>()?;
            Ok(DynSolValue::Array(coerced))
        }
        DynSolType::FixedArray(inner, size) => {
            let items = value.as_array().ok_or_else(|| mismatch("array"))?;
            if items.len() != *size {
                return Err(mismatch(&format!("array of {} elements", size)));
            }
            let coerced = items
                .iter()
                .map(|item| coerce(inner, item, op))
                .collect::<Result<Vec<_>>>()?;
            Ok(DynSolValue::FixedArray(coerced))
        }
        DynSolType::Tuple(types) => {
            let items = value.as_array().ok_or_else(|| mismatch("array"))?;
            if items.len() != types.len() {
                return Err(mismatch(&format!("tuple of {} elements", types.len())));
            }
            let coerced = types
                .iter()
                .zip(items)
                .map(|(t, item)| coerce(t, item, op))
                .collect::<Result<Vec<_>>>()?;
            Ok(DynSolValue::Tuple(coerced))
        }
        other => Err(EngineError::Validation(format!(
            "{}: unsupported ABI type {}",
            op, other
        ))),
    }
}

fn parse_uint(value: &serde_json::Value) -> Option<U256> {
    match value {
        serde_json::Value::Number(n) => n.as_u64().map(U256::from),
        serde_json::Value::String(s) => {
            let s = s.trim();
            match s.strip_prefix("0x") {
                Some(hex) => U256::from_str_radix(hex, 16).ok(),
                None => U256::from_str_radix(s, 10).ok(),
            }
        }
        _ => None,
    }
}

fn parse_int(value: &serde_json::Value) -> Option<I256> {
    match value {
        serde_json::Value::Number(n) => n.as_i64().map(I256::try_from).and_then(|r| r.ok()),
        serde_json::Value::String(s) => {
            let s = s.trim();
            match s.strip_prefix("0x") {
                Some(hex) => U256::from_str_radix(hex, 16).ok().map(I256::from_raw),
                None => I256::from_dec_str(s).ok(),
            }
        }
        _ => None,
    }
}

/// Converts a decoded `DynSolValue` back to JSON.
///
/// Numbers come back as decimal strings so downstream arithmetic and
/// comparisons never lose precision; addresses are checksummed.
pub fn sol_to_json(value: &DynSolValue) -> serde_json::Value {
    match value {
        DynSolValue::Address(a) => serde_json::Value::String(a.to_checksum(None)),
        DynSolValue::Bool(b) => serde_json::Value::Bool(*b),
        DynSolValue::Uint(v, _) => serde_json::Value::String(v.to_string()),
        DynSolValue::Int(v, _) => serde_json::Value::String(v.to_string()),
        DynSolValue::Bytes(b) => serde_json::Value::String(format!("0x{}", hex::encode(b))),
        DynSolValue::FixedBytes(word, size) => {
            serde_json::Value::String(format!("0x{}", hex::encode(&word[..*size])))
        }
        DynSolValue::String(s) => serde_json::Value::String(s.clone()),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) | DynSolValue::Tuple(items) => {
            serde_json::Value::Array(items.iter().map(sol_to_json).collect())
        }
        DynSolValue::CustomStruct { tuple, .. } => {
            serde_json::Value::Array(tuple.iter().map(sol_to_json).collect())
        }
        DynSolValue::Function(f) => {
            serde_json::Value::String(format!("0x{}", hex::encode(f.as_slice())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ty(s: &str) -> DynSolType {
        DynSolType::parse(s).unwrap()
    }

    #[test]
    fn test_coerce_address() {
        let v = coerce(
            &ty("address"),
            &serde_json::json!("0x9Ef5bAB590AFdE8036D57b89ccD2947D4E3b1EFA"),
            "t",
        )
        .unwrap();
        assert!(matches!(v, DynSolValue::Address(_)));
    }

    #[test]
    fn test_coerce_uint_forms() {
        for value in [
            serde_json::json!(1000),
            serde_json::json!("1000"),
            serde_json::json!("0x3e8"),
        ] {
            let v = coerce(&ty("uint256"), &value, "t").unwrap();
            assert_eq!(v, DynSolValue::Uint(U256::from(1000), 256));
        }
    }

    #[test]
    fn test_coerce_negative_int() {
        let v = coerce(&ty("int128"), &serde_json::json!("-42"), "t").unwrap();
        assert_eq!(v, DynSolValue::Int(I256::try_from(-42i64).unwrap(), 128));
    }

    #[test]
    fn test_coerce_fixed_bytes_length_checked() {
        assert!(coerce(&ty("bytes4"), &serde_json::json!("0xdeadbeef"), "t").is_ok());
        assert!(coerce(&ty("bytes4"), &serde_json::json!("0xdead"), "t").is_err());
    }

    #[test]
    fn test_coerce_nested_array() {
        let v = coerce(
            &ty("uint8[][]"),
            &serde_json::json!([[1, 2], [3]]),
            "t",
        )
        .unwrap();
        match v {
            DynSolValue::Array(outer) => assert_eq!(outer.len(), 2),
            other => panic!("expected array, got {:?}", other),
        }
    }

    #[test]
    fn test_coerce_tuple_arity() {
        assert!(coerce(
            &ty("(address,uint256)"),
            &serde_json::json!(["0x9Ef5bAB590AFdE8036D57b89ccD2947D4E3b1EFA", 1]),
            "t"
        )
        .is_ok());
        assert!(coerce(
            &ty("(address,uint256)"),
            &serde_json::json!(["0x9Ef5bAB590AFdE8036D57b89ccD2947D4E3b1EFA"]),
            "t"
        )
        .is_err());
    }

    #[test]
    fn test_sol_to_json_roundtrip_shapes() {
        assert_eq!(
            sol_to_json(&DynSolValue::Uint(U256::from(7), 256)),
            serde_json::json!("7")
        );
        assert_eq!(
            sol_to_json(&DynSolValue::Bytes(vec![0xde, 0xad])),
            serde_json::json!("0xdead")
        );
        assert_eq!(sol_to_json(&DynSolValue::Bool(true)), serde_json::json!(true));
    }
}
