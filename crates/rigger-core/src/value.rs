//! The recursive `Value` language.
//!
//! A value appearing in a job or template file is one of:
//!
//! - a primitive literal (string, number, boolean, null, plain object, array)
//! - a reference string `"{{EXPR}}"`, resolved at execution time against the
//!   current scope, constants, and outputs
//! - a tagged spec `{ type: kind, arguments: {...} }` describing a value to
//!   be computed at resolution time (ABI encoding, arithmetic, on-chain
//!   reads, address derivation, ...)
//!
//! Parsing populates the correct variant once, so the resolver can
//! pattern-match instead of re-sniffing strings at every call site.

use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A value in a job or template file.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    /// A `{{EXPR}}` reference; holds the inner expression, trimmed.
    Reference(String),
    Array(Vec<Value>),
    /// A plain object with no recognized `type` tag. Passed through verbatim
    /// by the resolver (used to hand JSON payloads to actions).
    Object(BTreeMap<String, Value>),
    /// A tagged value-computation spec.
    Spec(Box<ValueSpec>),
}

/// A tagged spec: `{ type: kind, arguments: {...} }`.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueSpec {
    pub kind: SpecKind,
    pub arguments: BTreeMap<String, Value>,
}

/// The closed set of value-computation primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecKind {
    AbiEncode,
    AbiPack,
    ConstructorEncode,
    ComputeCreate,
    ComputeCreate2,
    ReadBalance,
    BasicArithmetic,
    Call,
    ContractExists,
    JobCompleted,
    ReadJson,
    ResolveJson,
    SliceBytes,
}

impl SpecKind {
    /// Parses a spec kind from its wire tag.
    pub fn parse(tag: &str) -> Option<Self> {
        Some(match tag {
            "abi-encode" => Self::AbiEncode,
            "abi-pack" => Self::AbiPack,
            "constructor-encode" => Self::ConstructorEncode,
            "compute-create" => Self::ComputeCreate,
            "compute-create2" => Self::ComputeCreate2,
            "read-balance" => Self::ReadBalance,
            "basic-arithmetic" => Self::BasicArithmetic,
            "call" => Self::Call,
            "contract-exists" => Self::ContractExists,
            "job-completed" => Self::JobCompleted,
            "read-json" => Self::ReadJson,
            "resolve-json" => Self::ResolveJson,
            "slice-bytes" => Self::SliceBytes,
            _ => return None,
        })
    }

    /// The wire tag for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AbiEncode => "abi-encode",
            Self::AbiPack => "abi-pack",
            Self::ConstructorEncode => "constructor-encode",
            Self::ComputeCreate => "compute-create",
            Self::ComputeCreate2 => "compute-create2",
            Self::ReadBalance => "read-balance",
            Self::BasicArithmetic => "basic-arithmetic",
            Self::Call => "call",
            Self::ContractExists => "contract-exists",
            Self::JobCompleted => "job-completed",
            Self::ReadJson => "read-json",
            Self::ResolveJson => "resolve-json",
            Self::SliceBytes => "slice-bytes",
        }
    }
}

impl fmt::Display for SpecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Value {
    /// Converts a raw JSON tree into the typed value model.
    ///
    /// Strings shaped `{{...}}` become [`Value::Reference`] with the inner
    /// expression trimmed. Maps whose `type` key names a known spec kind
    /// become [`Value::Spec`]; any other map is a literal object.
    pub fn from_json(raw: serde_json::Value) -> Self {
        match raw {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => {
                if let Some(expr) = reference_expr(&s) {
                    Value::Reference(expr.to_string())
                } else {
                    Value::String(s)
                }
            }
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => {
                let kind = map
                    .get("type")
                    .and_then(|t| t.as_str())
                    .and_then(SpecKind::parse);
                match kind {
                    Some(kind) => {
                        let arguments = match map.get("arguments") {
                            Some(serde_json::Value::Object(args)) => args
                                .iter()
                                .map(|(k, v)| (k.clone(), Value::from_json(v.clone())))
                                .collect(),
                            _ => BTreeMap::new(),
                        };
                        Value::Spec(Box::new(ValueSpec { kind, arguments }))
                    }
                    None => Value::Object(
                        map.into_iter()
                            .map(|(k, v)| (k, Value::from_json(v)))
                            .collect(),
                    ),
                }
            }
        }
    }

    /// Serializes the value back to its wire JSON form.
    ///
    /// References round-trip to `"{{EXPR}}"` strings, specs to their tagged
    /// map form. Literal objects keep nested references unresolved, which is
    /// what the resolver's verbatim passthrough relies on.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Value::Number(n.clone()),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Reference(expr) => serde_json::Value::String(format!("{{{{{}}}}}", expr)),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Value::Spec(spec) => {
                let mut map = serde_json::Map::new();
                map.insert(
                    "type".to_string(),
                    serde_json::Value::String(spec.kind.as_str().to_string()),
                );
                map.insert(
                    "arguments".to_string(),
                    serde_json::Value::Object(
                        spec.arguments
                            .iter()
                            .map(|(k, v)| (k.clone(), v.to_json()))
                            .collect(),
                    ),
                );
                serde_json::Value::Object(map)
            }
        }
    }

    /// Wraps a plain literal, without reference or spec detection.
    pub fn literal(raw: serde_json::Value) -> Self {
        match raw {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::literal).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter().map(|(k, v)| (k, Value::literal(v))).collect(),
            ),
        }
    }
}

/// Extracts the inner expression of a `{{...}}` reference string, trimmed.
///
/// The match is whole-string and greedy, so `"{{ a }}"` yields `a` and a
/// string with interior braces keeps them.
fn reference_expr(s: &str) -> Option<&str> {
    let inner = s.strip_prefix("{{")?.strip_suffix("}}")?;
    Some(inner.trim())
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Ok(Value::from_json(raw))
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Spec(spec) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", spec.kind.as_str())?;
                map.serialize_entry("arguments", &spec.arguments)?;
                map.end()
            }
            other => other.to_json().serialize(serializer),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(raw: serde_json::Value) -> Self {
        Value::from_json(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Value {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_reference_parsing() {
        assert_eq!(parse("'{{foo}}'"), Value::Reference("foo".to_string()));
        assert_eq!(
            parse("'{{ Contract(Token).creationCode }}'"),
            Value::Reference("Contract(Token).creationCode".to_string())
        );
        // Whole-string match only
        assert_eq!(
            parse("'prefix {{foo}}'"),
            Value::String("prefix {{foo}}".to_string())
        );
    }

    #[test]
    fn test_spec_detection() {
        let v = parse("{ type: basic-arithmetic, arguments: { operation: add, values: [1, 2] } }");
        match v {
            Value::Spec(spec) => {
                assert_eq!(spec.kind, SpecKind::BasicArithmetic);
                assert!(spec.arguments.contains_key("operation"));
                assert!(spec.arguments.contains_key("values"));
            }
            other => panic!("expected spec, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_is_literal_object() {
        let v = parse("{ type: erc20, symbol: TOK }");
        assert!(matches!(v, Value::Object(_)));
    }

    #[test]
    fn test_nested_reference_in_object_stays_unresolved() {
        let v = parse("{ to: '{{owner}}', amount: 5 }");
        match &v {
            Value::Object(map) => {
                assert_eq!(map["to"], Value::Reference("owner".to_string()));
            }
            other => panic!("expected object, got {:?}", other),
        }
        // Round-trips back to the wire form
        assert_eq!(v.to_json()["to"], serde_json::json!("{{owner}}"));
    }

    #[test]
    fn test_spec_kind_roundtrip() {
        for tag in [
            "abi-encode",
            "abi-pack",
            "constructor-encode",
            "compute-create",
            "compute-create2",
            "read-balance",
            "basic-arithmetic",
            "call",
            "contract-exists",
            "job-completed",
            "read-json",
            "resolve-json",
            "slice-bytes",
        ] {
            let kind = SpecKind::parse(tag).expect(tag);
            assert_eq!(kind.as_str(), tag);
        }
        assert_eq!(SpecKind::parse("not-a-kind"), None);
    }

    #[test]
    fn test_serialize_spec() {
        let v = parse("{ type: read-balance, arguments: { address: '{{wallet}}' } }");
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["type"], "read-balance");
        assert_eq!(json["arguments"]["address"], "{{wallet}}");
    }
}
