//! The recursive value resolver.
//!
//! Interprets a [`Value`] into a concrete JSON datum: literals pass
//! through, `{{...}}` references resolve against contracts, the network
//! descriptor, the local scope, constants, and outputs, and tagged specs
//! dispatch to their computation handlers. Spec arguments are always fully
//! resolved before the handler runs.

pub mod address;
pub mod args;
pub mod arithmetic;
pub mod bytes;
pub mod chain;
pub mod coerce;
pub mod encode;
pub mod json;

use crate::context::{ExecutionContext, Scope};
use crate::error::{EngineError, Result};
use args::ResolvedArgs;
use futures::future::BoxFuture;
use rigger_core::{SpecKind, Value, ValueSpec};

/// Resolves a value to a concrete JSON datum.
///
/// Plain objects are returned verbatim, nested references included; use the
/// `resolve-json` spec to force deep resolution.
pub fn resolve<'a>(
    value: &'a Value,
    ctx: &'a ExecutionContext,
    scope: &'a Scope,
) -> BoxFuture<'a, Result<serde_json::Value>> {
    Box::pin(async move {
        match value {
            Value::Null => Ok(serde_json::Value::Null),
            Value::Bool(b) => Ok(serde_json::Value::Bool(*b)),
            Value::Number(n) => Ok(serde_json::Value::Number(n.clone())),
            Value::String(s) => Ok(serde_json::Value::String(s.clone())),
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(resolve(item, ctx, scope).await?);
                }
                Ok(serde_json::Value::Array(out))
            }
            Value::Object(_) => Ok(value.to_json()),
            Value::Reference(expr) => resolve_expression(expr, ctx, scope).await,
            Value::Spec(spec) => resolve_spec(spec, ctx, scope).await,
        }
    })
}

/// Resolves every entry of an argument map.
pub async fn resolve_arguments(
    arguments: &std::collections::BTreeMap<String, Value>,
    ctx: &ExecutionContext,
    scope: &Scope,
) -> Result<ResolvedArgs> {
    let mut resolved = ResolvedArgs::new();
    for (key, value) in arguments {
        resolved.insert(key.clone(), resolve(value, ctx, scope).await?);
    }
    Ok(resolved)
}

/// Resolves a `{{EXPR}}` expression.
pub async fn resolve_expression(
    expr: &str,
    ctx: &ExecutionContext,
    scope: &Scope,
) -> Result<serde_json::Value> {
    // Contract(ID) or Contract(ID).PROP
    if let Some(rest) = expr.strip_prefix("Contract(") {
        let close = rest.find(')').ok_or_else(|| {
            EngineError::Resolution(format!("Malformed contract reference '{{{{{}}}}}'", expr))
        })?;
        let id = rest[..close].trim();
        let tail = &rest[close + 1..];
        let property = match tail {
            "" => None,
            tail => {
                let property = tail.strip_prefix('.').filter(|p| is_identifier(p));
                Some(property.ok_or_else(|| {
                    EngineError::Resolution(format!(
                        "Malformed contract reference '{{{{{}}}}}'",
                        expr
                    ))
                })?)
            }
        };

        let contract = ctx
            .repository
            .lookup(id, Some(&ctx.context_path))?
            .ok_or_else(|| {
                EngineError::Resolution(format!(
                    "Contract '{}' not found (resolved relative to {})",
                    id,
                    ctx.context_path.display()
                ))
            })?;
        return match property {
            None => Ok(serde_json::to_value(contract)?),
            Some(property) => contract.property(property).ok_or_else(|| {
                EngineError::Resolution(format!(
                    "Contract '{}' has no property '{}'",
                    id, property
                ))
            }),
        };
    }

    // Network().PROP, dot paths allowed
    if let Some(path) = expr.strip_prefix("Network().") {
        if path.is_empty() || !path.split('.').all(is_identifier) {
            return Err(EngineError::Resolution(format!(
                "Malformed network reference '{{{{{}}}}}'",
                expr
            )));
        }
        return ctx.network.attribute(path).ok_or_else(|| {
            EngineError::Resolution(format!(
                "Network attribute '{}' is undefined for network '{}'",
                path, ctx.network.name
            ))
        });
    }

    // Bare identifier: scope, then constants (job, top-level), then outputs.
    if let Some(value) = scope.get(expr) {
        return Ok(value.clone());
    }
    if let Some(value) = ctx.constants.lookup(expr) {
        return Ok(value.clone());
    }
    if let Some(value) = ctx.output(expr) {
        return Ok(value.clone());
    }
    Err(EngineError::Resolution(format!(
        "Cannot resolve '{{{{{}}}}}': searched template scope, constants (job then top-level), and outputs",
        expr
    )))
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Dispatches a tagged spec after fully resolving its arguments.
async fn resolve_spec(
    spec: &ValueSpec,
    ctx: &ExecutionContext,
    scope: &Scope,
) -> Result<serde_json::Value> {
    // resolve-json deep-resolves its raw argument instead; the generic
    // pre-resolution would pass nested objects through verbatim.
    if spec.kind == SpecKind::ResolveJson {
        let value = spec.arguments.get("value").ok_or_else(|| {
            EngineError::Validation("resolve-json: missing required argument 'value'".to_string())
        })?;
        return deep_resolve(value, ctx, scope).await;
    }

    let resolved = resolve_arguments(&spec.arguments, ctx, scope).await?;
    match spec.kind {
        SpecKind::BasicArithmetic => arithmetic::evaluate(&resolved),
        SpecKind::AbiEncode => encode::abi_encode(&resolved),
        SpecKind::AbiPack => encode::abi_pack(&resolved),
        SpecKind::ConstructorEncode => encode::constructor_encode(&resolved),
        SpecKind::ComputeCreate => address::compute_create(&resolved),
        SpecKind::ComputeCreate2 => address::compute_create2(&resolved),
        SpecKind::ReadBalance => chain::read_balance(&resolved, ctx).await,
        SpecKind::Call => chain::call(&resolved, ctx).await,
        SpecKind::ContractExists => chain::contract_exists(&resolved, ctx).await,
        SpecKind::ReadJson => json::read_json_spec(&resolved),
        SpecKind::SliceBytes => bytes::slice_bytes(&resolved),
        SpecKind::JobCompleted => {
            // Cross-job ordering is enforced outside the engine; this spec
            // is the machine-readable guard left in job files.
            args::require(&resolved, "job", "job-completed")?;
            Ok(serde_json::Value::Bool(true))
        }
        SpecKind::ResolveJson => unreachable!("handled above"),
    }
}

/// Recursively resolves every field of an object or array; other values go
/// through the normal resolver.
fn deep_resolve<'a>(
    value: &'a Value,
    ctx: &'a ExecutionContext,
    scope: &'a Scope,
) -> BoxFuture<'a, Result<serde_json::Value>> {
    Box::pin(async move {
        match value {
            Value::Object(map) => {
                let mut out = serde_json::Map::new();
                for (key, nested) in map {
                    out.insert(key.clone(), deep_resolve(nested, ctx, scope).await?);
                }
                Ok(serde_json::Value::Object(out))
            }
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(deep_resolve(item, ctx, scope).await?);
                }
                Ok(serde_json::Value::Array(out))
            }
            other => resolve(other, ctx, scope).await,
        }
    })
}

/// Truthiness of a resolved condition value: null and false are false,
/// numbers are compared to zero, strings to empty, containers are true.
pub fn truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => true,
    }
}
