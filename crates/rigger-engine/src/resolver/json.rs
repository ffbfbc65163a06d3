//! `read-json`: dotted-path extraction from a JSON value.

use crate::error::{EngineError, Result};
use crate::resolver::args::{self, ResolvedArgs};

const OP: &str = "read-json";

/// Evaluates `{ json, path }`.
pub fn read_json_spec(resolved: &ResolvedArgs) -> Result<serde_json::Value> {
    let json = args::require(resolved, "json", OP)?;
    if !json.is_object() && !json.is_array() {
        return Err(EngineError::Validation(format!(
            "{}: 'json' must be an object or array",
            OP
        )));
    }
    let path = args::require_str(resolved, "path", OP)?;
    read_json(json, path)
}

/// Walks a dotted path. An empty path returns the whole value. A segment
/// that parses as a non-negative integer indexes arrays; otherwise it is an
/// object key.
pub fn read_json(json: &serde_json::Value, path: &str) -> Result<serde_json::Value> {
    if path.is_empty() {
        return Ok(json.clone());
    }
    let mut current = json;
    for segment in path.split('.') {
        let next = match current {
            serde_json::Value::Array(items) => {
                segment.parse::<usize>().ok().and_then(|i| items.get(i))
            }
            serde_json::Value::Object(map) => map.get(segment),
            _ => None,
        };
        current = next.ok_or_else(|| {
            EngineError::Resolution(format!(
                "{}: Failed to access path \"{}\": no value at segment '{}'",
                OP, path, segment
            ))
        })?;
    }
    Ok(current.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> serde_json::Value {
        serde_json::json!({
            "token": {
                "holders": [
                    { "addr": "0x01", "balance": "100" },
                    { "addr": "0x02", "balance": "250" }
                ],
                "decimals": 18
            }
        })
    }

    #[test]
    fn test_empty_path_returns_whole() {
        assert_eq!(read_json(&doc(), "").unwrap(), doc());
    }

    #[test]
    fn test_object_and_array_traversal() {
        assert_eq!(
            read_json(&doc(), "token.holders.1.balance").unwrap(),
            serde_json::json!("250")
        );
        assert_eq!(read_json(&doc(), "token.decimals").unwrap(), serde_json::json!(18));
    }

    #[test]
    fn test_numeric_key_on_object_is_a_key() {
        let json = serde_json::json!({ "0": "zero" });
        assert_eq!(read_json(&json, "0").unwrap(), serde_json::json!("zero"));
    }

    #[test]
    fn test_missing_path_error_cites_path() {
        let err = read_json(&doc(), "token.owner").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("read-json: Failed to access path \"token.owner\""));
    }

    #[test]
    fn test_composition_law() {
        // read_json(read_json(J, p1), p2) == read_json(J, p1 + "." + p2)
        let step = read_json(&doc(), "token").unwrap();
        let composed = read_json(&step, "holders.0.addr").unwrap();
        let direct = read_json(&doc(), "token.holders.0.addr").unwrap();
        assert_eq!(composed, direct);
    }

    #[test]
    fn test_spec_requires_container() {
        let resolved = serde_json::from_value(
            serde_json::json!({ "json": "scalar", "path": "" }),
        )
        .unwrap();
        assert!(read_json_spec(&resolved).is_err());
    }
}
