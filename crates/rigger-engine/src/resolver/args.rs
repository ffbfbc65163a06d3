//! Argument extraction and validation shared by spec handlers and
//! primitive actions.
//!
//! Every failure names the operation and the offending field so errors read
//! like `send-transaction: 'to' is not a valid address`.

use crate::error::{EngineError, Result};
use alloy::primitives::{Address, U256};
use std::collections::BTreeMap;
use std::str::FromStr;

pub type ResolvedArgs = BTreeMap<String, serde_json::Value>;

pub fn require<'a>(args: &'a ResolvedArgs, key: &str, op: &str) -> Result<&'a serde_json::Value> {
    args.get(key)
        .filter(|v| !v.is_null())
        .ok_or_else(|| EngineError::Validation(format!("{}: missing required argument '{}'", op, key)))
}

pub fn require_str<'a>(args: &'a ResolvedArgs, key: &str, op: &str) -> Result<&'a str> {
    require(args, key, op)?.as_str().ok_or_else(|| {
        EngineError::Validation(format!("{}: argument '{}' must be a string", op, key))
    })
}

pub fn require_array<'a>(
    args: &'a ResolvedArgs,
    key: &str,
    op: &str,
) -> Result<&'a Vec<serde_json::Value>> {
    require(args, key, op)?.as_array().ok_or_else(|| {
        EngineError::Validation(format!("{}: argument '{}' must be an array", op, key))
    })
}

pub fn optional<'a>(args: &'a ResolvedArgs, key: &str) -> Option<&'a serde_json::Value> {
    args.get(key).filter(|v| !v.is_null())
}

/// Parses an Ethereum address from a resolved value.
pub fn parse_address(value: &serde_json::Value, op: &str, field: &str) -> Result<Address> {
    let s = value.as_str().ok_or_else(|| {
        EngineError::Validation(format!("{}: argument '{}' must be an address string", op, field))
    })?;
    Address::from_str(s).map_err(|_| {
        EngineError::Validation(format!("{}: '{}' is not a valid address: {}", op, field, s))
    })
}

/// Decodes a hex value (0x-prefixed or bare) into bytes.
pub fn parse_hex_bytes(value: &serde_json::Value, op: &str, field: &str) -> Result<Vec<u8>> {
    let s = value.as_str().ok_or_else(|| {
        EngineError::Validation(format!("{}: argument '{}' must be a hex string", op, field))
    })?;
    let clean = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(clean).map_err(|e| {
        EngineError::Validation(format!("{}: '{}' is not valid hex: {}", op, field, e))
    })
}

/// Parses a big unsigned integer from a number, a decimal string, or a
/// 0x-prefixed hex string.
pub fn parse_u256(value: &serde_json::Value, op: &str, field: &str) -> Result<U256> {
    match value {
        serde_json::Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                return Ok(U256::from(v));
            }
            Err(EngineError::Validation(format!(
                "{}: '{}' must be a non-negative integer, got {}",
                op, field, n
            )))
        }
        serde_json::Value::String(s) => {
            let (radix, digits) = match s.strip_prefix("0x") {
                Some(hex) => (16, hex),
                None => (10, s.as_str()),
            };
            U256::from_str_radix(digits, radix).map_err(|_| {
                EngineError::Validation(format!(
                    "{}: '{}' is not a valid big integer: {}",
                    op, field, s
                ))
            })
        }
        other => Err(EngineError::Validation(format!(
            "{}: '{}' must be an integer or integer string, got {}",
            op, field, other
        ))),
    }
}

/// Parses a u64 from a number or string.
pub fn parse_u64(value: &serde_json::Value, op: &str, field: &str) -> Result<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64().ok_or_else(|| {
            EngineError::Validation(format!(
                "{}: '{}' must be a non-negative integer, got {}",
                op, field, n
            ))
        }),
        serde_json::Value::String(s) => s.parse().map_err(|_| {
            EngineError::Validation(format!("{}: '{}' is not a valid integer: {}", op, field, s))
        }),
        other => Err(EngineError::Validation(format!(
            "{}: '{}' must be an integer, got {}",
            op, field, other
        ))),
    }
}
