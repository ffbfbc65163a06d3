//! `basic-arithmetic`: arbitrary-precision integer arithmetic and
//! comparisons, used heavily inside skip conditions.

use crate::error::{EngineError, Result};
use crate::resolver::args::{self, ResolvedArgs};
use num_bigint::BigInt;
use num_traits::Zero;

const OP: &str = "basic-arithmetic";

/// Evaluates `{ operation, values[] }`.
///
/// `add` reduces left-to-right over all values; `sub`/`mul`/`div` are binary
/// on the first two; `div` is truncating integer division. Arithmetic
/// results are decimal strings; comparisons return booleans.
pub fn evaluate(resolved: &ResolvedArgs) -> Result<serde_json::Value> {
    let operation = args::require_str(resolved, "operation", OP)?;
    let values = args::require_array(resolved, "values", OP)?;
    if values.len() < 2 {
        return Err(EngineError::Validation(format!(
            "{}: requires at least 2 values, got {}",
            OP,
            values.len()
        )));
    }

    let ints = values
        .iter()
        .map(parse_bigint)
        .collect::<Result<Vec<BigInt>>>()?;

    let decimal = |n: BigInt| serde_json::Value::String(n.to_str_radix(10));
    let result = match operation {
        "add" => decimal(ints.iter().sum()),
        "sub" => decimal(&ints[0] - &ints[1]),
        "mul" => decimal(&ints[0] * &ints[1]),
        "div" => {
            if ints[1].is_zero() {
                return Err(EngineError::Validation(format!("{}: division by zero", OP)));
            }
            decimal(&ints[0] / &ints[1])
        }
        "eq" => serde_json::Value::Bool(ints[0] == ints[1]),
        "neq" => serde_json::Value::Bool(ints[0] != ints[1]),
        "gt" => serde_json::Value::Bool(ints[0] > ints[1]),
        "gte" => serde_json::Value::Bool(ints[0] >= ints[1]),
        "lt" => serde_json::Value::Bool(ints[0] < ints[1]),
        "lte" => serde_json::Value::Bool(ints[0] <= ints[1]),
        other => {
            return Err(EngineError::Validation(format!(
                "{}: unknown operation '{}'",
                OP, other
            )))
        }
    };
    Ok(result)
}

/// Parses a resolved value as a signed big integer.
///
/// Accepts integers, booleans, decimal strings (optionally signed), and
/// 0x-prefixed hex strings.
pub fn parse_bigint(value: &serde_json::Value) -> Result<BigInt> {
    match value {
        serde_json::Value::Bool(b) => Ok(BigInt::from(*b as u8)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(BigInt::from(i))
            } else if let Some(u) = n.as_u64() {
                Ok(BigInt::from(u))
            } else {
                Err(EngineError::Validation(format!(
                    "{}: {} is not an integer",
                    OP, n
                )))
            }
        }
        serde_json::Value::String(s) => {
            let s = s.trim();
            let (negative, body) = match s.strip_prefix('-') {
                Some(rest) => (true, rest),
                None => (false, s.strip_prefix('+').unwrap_or(s)),
            };
            let parsed = match body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
                Some(hex) => BigInt::parse_bytes(hex.as_bytes(), 16),
                None => BigInt::parse_bytes(body.as_bytes(), 10),
            };
            let n = parsed.ok_or_else(|| {
                EngineError::Validation(format!("{}: cannot parse '{}' as an integer", OP, s))
            })?;
            Ok(if negative { -n } else { n })
        }
        other => Err(EngineError::Validation(format!(
            "{}: cannot interpret {} as an integer",
            OP, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(operation: &str, values: serde_json::Value) -> Result<serde_json::Value> {
        let resolved = serde_json::from_value(serde_json::json!({
            "operation": operation,
            "values": values,
        }))
        .unwrap();
        evaluate(&resolved)
    }

    #[test]
    fn test_add_reduces_all_values() {
        assert_eq!(eval("add", serde_json::json!([1, 2, 3, 4])).unwrap(), "10");
    }

    #[test]
    fn test_binary_operations() {
        assert_eq!(eval("sub", serde_json::json!([5, 9])).unwrap(), "-4");
        assert_eq!(eval("mul", serde_json::json!(["7", 6])).unwrap(), "42");
        assert_eq!(eval("div", serde_json::json!([7, 2])).unwrap(), "3");
    }

    #[test]
    fn test_division_by_zero() {
        assert!(eval("div", serde_json::json!([1, 0])).is_err());
    }

    #[test]
    fn test_comparisons_match_integer_ordering() {
        for (op, a, b, expected) in [
            ("eq", 3, 3, true),
            ("eq", 3, 4, false),
            ("neq", 3, 4, true),
            ("gt", 4, 3, true),
            ("gt", 3, 3, false),
            ("gte", 3, 3, true),
            ("lt", 2, 3, true),
            ("lte", 3, 2, false),
        ] {
            assert_eq!(
                eval(op, serde_json::json!([a, b])).unwrap(),
                serde_json::json!(expected),
                "{} {} {}",
                a,
                op,
                b
            );
        }
    }

    #[test]
    fn test_arbitrary_precision() {
        let big = "340282366920938463463374607431768211456"; // 2^128
        assert_eq!(
            eval("mul", serde_json::json!([big, big])).unwrap(),
            "115792089237316195423570985008687907853269984665640564039457584007913129639936"
        );
    }

    #[test]
    fn test_hex_and_signed_strings() {
        assert_eq!(eval("add", serde_json::json!(["0xff", "1"])).unwrap(), "256");
        assert_eq!(eval("add", serde_json::json!(["-5", "2"])).unwrap(), "-3");
    }

    #[test]
    fn test_requires_two_values() {
        assert!(eval("add", serde_json::json!([1])).is_err());
    }

    #[test]
    fn test_unknown_operation() {
        assert!(eval("pow", serde_json::json!([2, 3])).is_err());
    }
}
