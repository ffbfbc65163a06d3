//! `send-transaction` and `send-signed-transaction`.

use super::{action_label, output_prefix, store_output, validation};
use crate::context::{ExecutionContext, Scope};
use crate::error::{EngineError, Result};
use crate::resolver::{self, args};
use crate::rpc::{TxOutcome, TxPlan};
use alloy::primitives::{Bytes, U256};
use rigger_core::{Action, EngineEvent, EventSink};

/// `send-transaction { to, data?, value?, gasMultiplier? }`.
pub async fn send_transaction(
    action: &Action,
    ctx: &mut ExecutionContext,
    scope: &Scope,
    sink: &dyn EventSink,
    has_custom_output: bool,
) -> Result<()> {
    const OP: &str = "send-transaction";
    let resolved = resolver::resolve_arguments(&action.arguments, ctx, scope).await?;

    // 1. Validate arguments.
    let to = args::parse_address(args::require(&resolved, "to", OP)?, OP, "to")?;
    let data = match args::optional(&resolved, "data") {
        Some(data) => Bytes::from(args::parse_hex_bytes(data, OP, "data")?),
        None => Bytes::new(),
    };
    let value = match args::optional(&resolved, "value") {
        Some(value) => args::parse_u256(value, OP, "value")?,
        None => U256::ZERO,
    };
    let gas_multiplier = args::optional(&resolved, "gasMultiplier")
        .map(|m| parse_gas_multiplier(m, OP))
        .transpose()?;

    // 2. Gas limit policy: declared network limit first, scaled if a
    //    multiplier is given; otherwise estimate when scaling was asked
    //    for; otherwise leave the choice to the provider.
    let mut plan = TxPlan {
        to,
        data,
        value,
        gas_limit: None,
    };
    plan.gas_limit = match (ctx.network.gas_limit, gas_multiplier) {
        (Some(limit), Some(multiplier)) => Some(scale_gas(limit, multiplier)),
        (Some(limit), None) => Some(limit),
        (None, Some(multiplier)) => {
            let estimated = ctx.chain.estimate_gas(&plan).await?;
            Some(scale_gas(estimated, multiplier))
        }
        (None, None) => None,
    };

    // 3. Send and await one confirmation.
    let outcome = ctx.chain.send_transaction(plan).await?;
    finish(action, ctx, sink, outcome, OP, has_custom_output)
}

/// `send-signed-transaction { transaction }`: broadcast a pre-signed blob.
pub async fn send_signed_transaction(
    action: &Action,
    ctx: &mut ExecutionContext,
    scope: &Scope,
    sink: &dyn EventSink,
    has_custom_output: bool,
) -> Result<()> {
    const OP: &str = "send-signed-transaction";
    let resolved = resolver::resolve_arguments(&action.arguments, ctx, scope).await?;
    let raw = args::parse_hex_bytes(
        args::require(&resolved, "transaction", OP)?,
        OP,
        "transaction",
    )?;
    if raw.is_empty() {
        return Err(validation(OP, "'transaction' must not be empty"));
    }

    let outcome = ctx.chain.broadcast_raw(raw).await?;
    finish(action, ctx, sink, outcome, OP, has_custom_output)
}

/// Shared confirmation handling: events, revert check, default outputs.
fn finish(
    action: &Action,
    ctx: &mut ExecutionContext,
    sink: &dyn EventSink,
    outcome: TxOutcome,
    op: &str,
    has_custom_output: bool,
) -> Result<()> {
    let label = action_label(action);
    sink.emit(EngineEvent::TransactionSent {
        action: label.clone(),
        hash: outcome.hash.clone(),
    });

    if !outcome.status {
        return Err(EngineError::Execution(format!(
            "{}: transaction {} reverted (status 0)",
            op, outcome.hash
        )));
    }
    sink.emit(EngineEvent::TransactionConfirmed {
        action: label,
        hash: outcome.hash.clone(),
        block: outcome.block_number,
    });

    if let Some(name) = output_prefix(action) {
        if !has_custom_output {
            let name = name.to_string();
            store_output(
                ctx,
                sink,
                format!("{}.hash", name),
                serde_json::Value::String(outcome.hash),
            )?;
            store_output(ctx, sink, format!("{}.receipt", name), outcome.receipt)?;
        }
    }
    Ok(())
}

fn parse_gas_multiplier(value: &serde_json::Value, op: &str) -> Result<f64> {
    let multiplier = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    };
    match multiplier {
        Some(m) if m > 0.0 && m.is_finite() => Ok(m),
        _ => Err(validation(
            op,
            format!("'gasMultiplier' must be a positive finite number, got {}", value),
        )),
    }
}

fn scale_gas(gas: u64, multiplier: f64) -> u64 {
    (gas as f64 * multiplier).floor() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_context, CollectingSink, MockChain};
    use rigger_core::Value;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn action(arguments: serde_json::Value) -> Action {
        Action {
            name: Some("tx".to_string()),
            action_type: Some("send-transaction".to_string()),
            arguments: serde_json::from_value::<BTreeMap<String, Value>>(arguments).unwrap(),
            ..Default::default()
        }
    }

    const TO: &str = "0x9Ef5bAB590AFdE8036D57b89ccD2947D4E3b1EFA";

    #[tokio::test]
    async fn test_send_stores_hash_and_receipt() {
        let chain = Arc::new(MockChain::new());
        let mut ctx = test_context(chain.clone());
        let sink = CollectingSink::new();

        send_transaction(
            &action(serde_json::json!({ "to": TO, "value": "7" })),
            &mut ctx,
            &Scope::new(),
            sink.as_ref(),
            false,
        )
        .await
        .unwrap();

        assert!(ctx.output("tx.hash").is_some());
        assert!(ctx.output("tx.receipt").is_some());
        let sent = chain.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].value, U256::from(7));
        assert_eq!(sent[0].gas_limit, None);
    }

    #[tokio::test]
    async fn test_custom_output_suppresses_defaults() {
        let chain = Arc::new(MockChain::new());
        let mut ctx = test_context(chain);
        let sink = CollectingSink::new();

        send_transaction(
            &action(serde_json::json!({ "to": TO })),
            &mut ctx,
            &Scope::new(),
            sink.as_ref(),
            true,
        )
        .await
        .unwrap();

        assert!(ctx.output("tx.hash").is_none());
        assert!(ctx.output("tx.receipt").is_none());
    }

    #[tokio::test]
    async fn test_gas_multiplier_over_estimate() {
        let chain = Arc::new(MockChain::new());
        chain.gas_estimate.store(100_000, std::sync::atomic::Ordering::SeqCst);
        let mut ctx = test_context(chain.clone());
        let sink = CollectingSink::new();

        send_transaction(
            &action(serde_json::json!({ "to": TO, "gasMultiplier": 1.5 })),
            &mut ctx,
            &Scope::new(),
            sink.as_ref(),
            false,
        )
        .await
        .unwrap();

        assert_eq!(chain.sent.lock().unwrap()[0].gas_limit, Some(150_000));
    }

    #[tokio::test]
    async fn test_network_gas_limit_scaled() {
        let chain = Arc::new(MockChain::new());
        let mut ctx = test_context(chain.clone());
        ctx.network.gas_limit = Some(1_000_000);
        let sink = CollectingSink::new();

        send_transaction(
            &action(serde_json::json!({ "to": TO, "gasMultiplier": 1.2 })),
            &mut ctx,
            &Scope::new(),
            sink.as_ref(),
            false,
        )
        .await
        .unwrap();

        assert_eq!(chain.sent.lock().unwrap()[0].gas_limit, Some(1_200_000));
    }

    #[tokio::test]
    async fn test_reverted_transaction_fails() {
        let chain = Arc::new(MockChain::new());
        chain.revert_next.store(true, std::sync::atomic::Ordering::SeqCst);
        let mut ctx = test_context(chain);
        let sink = CollectingSink::new();

        let err = send_transaction(
            &action(serde_json::json!({ "to": TO })),
            &mut ctx,
            &Scope::new(),
            sink.as_ref(),
            false,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("reverted"));
        assert!(ctx.output("tx.hash").is_none());
    }

    #[tokio::test]
    async fn test_invalid_gas_multiplier() {
        let chain = Arc::new(MockChain::new());
        let mut ctx = test_context(chain);
        let sink = CollectingSink::new();
        for bad in [serde_json::json!(0), serde_json::json!(-2), serde_json::json!("nope")] {
            let err = send_transaction(
                &action(serde_json::json!({ "to": TO, "gasMultiplier": bad })),
                &mut ctx,
                &Scope::new(),
                sink.as_ref(),
                false,
            )
            .await
            .unwrap_err();
            assert!(err.to_string().contains("gasMultiplier"));
        }
    }

    #[tokio::test]
    async fn test_broadcast_accepts_prefixed_and_raw_hex() {
        let chain = Arc::new(MockChain::new());
        let mut ctx = test_context(chain.clone());
        let sink = CollectingSink::new();

        let mut signed = Action {
            name: Some("raw".to_string()),
            action_type: Some("send-signed-transaction".to_string()),
            arguments: serde_json::from_value(
                serde_json::json!({ "transaction": "0x02f86b82" }),
            )
            .unwrap(),
            ..Default::default()
        };
        send_signed_transaction(&signed, &mut ctx, &Scope::new(), sink.as_ref(), false)
            .await
            .unwrap();
        assert!(ctx.output("raw.hash").is_some());

        signed.name = Some("raw2".to_string());
        signed.arguments =
            serde_json::from_value(serde_json::json!({ "transaction": "02f86b82" })).unwrap();
        send_signed_transaction(&signed, &mut ctx, &Scope::new(), sink.as_ref(), false)
            .await
            .unwrap();

        let broadcasts = chain.broadcasts.lock().unwrap();
        assert_eq!(broadcasts.len(), 2);
        assert_eq!(broadcasts[0], broadcasts[1]);
    }
}
