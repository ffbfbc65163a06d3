//! `verify-contract`: dispatch source verification across platforms.
//!
//! This is the one handler that absorbs per-platform errors: with the
//! default `"all"` selection (or a multi-platform array), each failure is
//! reported at warn severity and the next platform is tried; the action
//! only fails when every platform failed. A single named platform is
//! fatal on its first failure. Misconfigured or unsupported platforms are
//! a domain condition, not a failure: the action is skipped with a warning
//! and the job continues.

use super::{action_label, output_prefix, store_output, validation};
use crate::artifacts::is_build_info_file;
use crate::context::{ExecutionContext, Scope};
use crate::error::{EngineError, Result};
use crate::resolver::{self, args};
use crate::verification::{
    PlatformRegistry, VerificationPlatform, VerificationRequest, DEFAULT_MAX_RETRIES,
    DEFAULT_RETRY_DELAY,
};
use rigger_core::{Action, EngineEvent, EventSink};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const OP: &str = "verify-contract";

/// Which platforms the action asked for.
#[derive(Debug)]
enum PlatformSelection {
    All,
    Named(Vec<String>),
}

pub async fn verify_contract(
    action: &Action,
    ctx: &mut ExecutionContext,
    scope: &Scope,
    sink: &dyn EventSink,
    platforms: &PlatformRegistry,
    has_custom_output: bool,
) -> Result<()> {
    let resolved = resolver::resolve_arguments(&action.arguments, ctx, scope).await?;

    // 1. Validate the core arguments.
    let address = args::parse_address(args::require(&resolved, "address", OP)?, OP, "address")?;
    let contract = args::require(&resolved, "contract", OP)?;
    if !contract.is_object() {
        return Err(validation(OP, "'contract' must be a contract object"));
    }
    let contract_field = |field: &str| -> Result<String> {
        contract
            .get(field)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| validation(OP, format!("contract is missing '{}'", field)))
    };
    let source_name = contract_field("sourceName")?;
    let contract_name = contract_field("contractName")?;
    let compiler = contract_field("compiler")?;
    // Required on the contract even though the bundle is re-read from disk.
    let _build_info_id = contract_field("buildInfoId")?;

    let constructor_arguments = args::optional(&resolved, "constructorArguments")
        .map(|v| {
            let bytes = args::parse_hex_bytes(v, OP, "constructorArguments")?;
            Ok::<_, EngineError>(hex::encode(bytes))
        })
        .transpose()?;

    let selection = parse_platform_selection(args::optional(&resolved, "platform"))?;

    // 2. Locate and parse the build-info bundle from the contract's
    //    source set.
    let build_info_path = contract
        .get("_sources")
        .and_then(|v| v.as_array())
        .into_iter()
        .flatten()
        .filter_map(|v| v.as_str())
        .map(PathBuf::from)
        .find(|p| is_build_info_file(p))
        .ok_or_else(|| {
            EngineError::Artifact(format!(
                "{}: no build-info file among the sources of {}:{}",
                OP, source_name, contract_name
            ))
        })?;
    let build_info = read_build_info(&build_info_path)?;

    // 3. Select platforms, dropping domain-level misfits with a warning.
    let label = action_label(action);
    let (selected, absorb_failures) = select_platforms(&selection, platforms, ctx, sink, &label)?;
    if selected.is_empty() {
        sink.emit(EngineEvent::ActionSkipped {
            action: label,
            reason: Some("no verification platform is configured for this network".to_string()),
        });
        return Ok(());
    }

    let request = VerificationRequest {
        address,
        network: ctx.network.clone(),
        source_name,
        contract_name,
        compiler,
        constructor_arguments,
        build_info,
        max_retries: DEFAULT_MAX_RETRIES,
        retry_delay: DEFAULT_RETRY_DELAY,
    };

    // 4. Try each platform; success on any one platform completes the
    //    action.
    for platform in &selected {
        sink.emit(EngineEvent::VerificationStarted {
            action: label.clone(),
            platform: platform.name().to_string(),
            address: address.to_checksum(None),
        });
        match platform.verify_contract(&request).await {
            Ok(outcome) if outcome.success => {
                if let Some(guid) = &outcome.guid {
                    sink.emit(EngineEvent::VerificationSubmitted {
                        platform: platform.name().to_string(),
                        guid: guid.clone(),
                    });
                }
                sink.emit(EngineEvent::VerificationCompleted {
                    platform: platform.name().to_string(),
                    address: address.to_checksum(None),
                });
                if let Some(name) = output_prefix(action) {
                    if !has_custom_output {
                        let name = name.to_string();
                        store_output(
                            ctx,
                            sink,
                            format!("{}.verified", name),
                            serde_json::Value::Bool(true),
                        )?;
                        if let Some(guid) = outcome.guid {
                            store_output(ctx, sink, format!("{}.guid", name), guid.into())?;
                        }
                    }
                }
                return Ok(());
            }
            Ok(outcome) => {
                sink.emit(EngineEvent::VerificationFailed {
                    platform: platform.name().to_string(),
                    message: outcome.message.clone(),
                });
                if !absorb_failures {
                    return Err(EngineError::Verification(format!(
                        "{} failed on {}: {}",
                        OP,
                        platform.name(),
                        outcome.message
                    )));
                }
            }
            Err(e) => {
                sink.emit(EngineEvent::VerificationFailed {
                    platform: platform.name().to_string(),
                    message: e.to_string(),
                });
                if !absorb_failures {
                    return Err(e);
                }
            }
        }
    }

    Err(EngineError::Verification(
        "Verification failed on all configured platforms".to_string(),
    ))
}

/// Validates the `platform` argument shape: a string, an array of strings,
/// or the literal `"all"` (the default).
fn parse_platform_selection(value: Option<&serde_json::Value>) -> Result<PlatformSelection> {
    match value {
        None => Ok(PlatformSelection::All),
        Some(serde_json::Value::String(s)) if s == "all" => Ok(PlatformSelection::All),
        Some(serde_json::Value::String(s)) => Ok(PlatformSelection::Named(vec![s.clone()])),
        Some(serde_json::Value::Array(items)) => {
            let mut names = Vec::with_capacity(items.len());
            for item in items {
                let name = item.as_str().ok_or_else(|| {
                    validation(
                        OP,
                        format!(
                            "'platform' array must contain only strings, found {}",
                            item
                        ),
                    )
                })?;
                names.push(name.to_string());
            }
            if names.is_empty() {
                return Err(validation(OP, "'platform' array must not be empty"));
            }
            Ok(PlatformSelection::Named(names))
        }
        Some(other) => Err(validation(
            OP,
            format!(
                "'platform' must be a string, an array of strings, or \"all\", got {}",
                other
            ),
        )),
    }
}

/// Resolves the selection against the registry. Named platforms that exist
/// but are unusable on this network are dropped with a warning; an unknown
/// name is an error. Returns the platforms plus whether per-platform
/// failures are absorbed.
fn select_platforms(
    selection: &PlatformSelection,
    platforms: &PlatformRegistry,
    ctx: &ExecutionContext,
    sink: &dyn EventSink,
    label: &str,
) -> Result<(Vec<Arc<dyn VerificationPlatform>>, bool)> {
    match selection {
        PlatformSelection::All => Ok((platforms.configured_platforms(&ctx.network), true)),
        PlatformSelection::Named(names) => {
            let mut selected = Vec::with_capacity(names.len());
            for name in names {
                let platform = platforms.get(name).ok_or_else(|| {
                    EngineError::Verification(format!("Unknown verification platform '{}'", name))
                })?;
                if !platform.supports_network(&ctx.network) {
                    sink.emit(EngineEvent::ActionSkipped {
                        action: label.to_string(),
                        reason: Some(format!(
                            "platform '{}' does not support network '{}'",
                            name, ctx.network.name
                        )),
                    });
                    continue;
                }
                if !platform.is_configured() {
                    sink.emit(EngineEvent::ActionSkipped {
                        action: label.to_string(),
                        reason: Some(format!(
                            "platform '{}' is not configured: {}",
                            name,
                            platform.configuration_requirements()
                        )),
                    });
                    continue;
                }
                selected.push(platform);
            }
            Ok((selected, names.len() > 1))
        }
    }
}

fn read_build_info(path: &Path) -> Result<serde_json::Value> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        EngineError::Artifact(format!(
            "{}: failed to read build-info {}: {}",
            OP,
            path.display(),
            e
        ))
    })?;
    serde_json::from_str(&text).map_err(|e| {
        EngineError::Artifact(format!(
            "{}: failed to parse build-info {}: {}",
            OP,
            path.display(),
            e
        ))
    })
}
