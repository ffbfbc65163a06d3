//! Primitive action handlers: the effectful operations a job can perform.
//!
//! Every handler resolves its arguments through the value resolver,
//! performs its side effect, and writes its default outputs under
//! `<action-name>.<field>`. When the calling action supplied a custom
//! `output` map, the defaults are suppressed entirely.

pub mod signing;
pub mod statics;
pub mod transaction;
pub mod verify;

use crate::context::{ExecutionContext, Scope};
use crate::error::{EngineError, Result};
use crate::verification::PlatformRegistry;
use rigger_core::{Action, EngineEvent, EventSink};

/// The closed set of primitive action kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    SendTransaction,
    SendSignedTransaction,
    VerifyContract,
    SignDigest,
    SignTypedData,
    SignMessage,
    Static,
}

impl PrimitiveKind {
    pub fn parse(kind: &str) -> Option<Self> {
        Some(match kind {
            "send-transaction" => Self::SendTransaction,
            "send-signed-transaction" => Self::SendSignedTransaction,
            "verify-contract" => Self::VerifyContract,
            "sign-digest" => Self::SignDigest,
            "sign-typed-data" => Self::SignTypedData,
            "sign-message" => Self::SignMessage,
            "static" => Self::Static,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SendTransaction => "send-transaction",
            Self::SendSignedTransaction => "send-signed-transaction",
            Self::VerifyContract => "verify-contract",
            Self::SignDigest => "sign-digest",
            Self::SignTypedData => "sign-typed-data",
            Self::SignMessage => "sign-message",
            Self::Static => "static",
        }
    }
}

/// Dispatches a primitive action to its handler.
pub async fn execute(
    kind: PrimitiveKind,
    action: &Action,
    ctx: &mut ExecutionContext,
    scope: &Scope,
    sink: &dyn EventSink,
    platforms: &PlatformRegistry,
    has_custom_output: bool,
) -> Result<()> {
    sink.emit(EngineEvent::PrimitiveAction {
        action: action_label(action),
        kind: kind.as_str().to_string(),
    });
    match kind {
        PrimitiveKind::SendTransaction => {
            transaction::send_transaction(action, ctx, scope, sink, has_custom_output).await
        }
        PrimitiveKind::SendSignedTransaction => {
            transaction::send_signed_transaction(action, ctx, scope, sink, has_custom_output).await
        }
        PrimitiveKind::SignDigest => {
            signing::sign_digest(action, ctx, scope, sink, has_custom_output).await
        }
        PrimitiveKind::SignTypedData => {
            signing::sign_typed_data(action, ctx, scope, sink, has_custom_output).await
        }
        PrimitiveKind::SignMessage => {
            signing::sign_message(action, ctx, scope, sink, has_custom_output).await
        }
        PrimitiveKind::Static => {
            statics::capture(action, ctx, scope, sink, has_custom_output).await
        }
        PrimitiveKind::VerifyContract => {
            verify::verify_contract(action, ctx, scope, sink, platforms, has_custom_output).await
        }
    }
}

/// Display name for events: the action's name, else its kind.
pub(crate) fn action_label(action: &Action) -> String {
    action
        .name
        .clone()
        .unwrap_or_else(|| action.kind().unwrap_or("unnamed").to_string())
}

/// Stores a default output key and announces it.
pub(crate) fn store_output(
    ctx: &mut ExecutionContext,
    sink: &dyn EventSink,
    key: String,
    value: serde_json::Value,
) -> Result<()> {
    ctx.store_output(key.clone(), value)?;
    sink.emit(EngineEvent::OutputStored { key });
    Ok(())
}

/// The named prefix for default outputs, when the action has a name.
pub(crate) fn output_prefix(action: &Action) -> Option<&str> {
    action.name.as_deref()
}

pub(crate) fn validation(op: &str, message: impl std::fmt::Display) -> EngineError {
    EngineError::Validation(format!("{}: {}", op, message))
}
