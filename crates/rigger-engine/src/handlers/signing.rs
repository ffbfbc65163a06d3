//! Signing primitives: `sign-digest`, `sign-typed-data`, `sign-message`.

use super::{output_prefix, store_output, validation};
use crate::context::{ExecutionContext, Scope};
use crate::error::Result;
use crate::resolver::{self, args};
use alloy::primitives::B256;
use alloy_dyn_abi::TypedData;
use rigger_core::{Action, EventSink};

/// `sign-digest { digest }`: raw ECDSA over a 32-byte digest.
pub async fn sign_digest(
    action: &Action,
    ctx: &mut ExecutionContext,
    scope: &Scope,
    sink: &dyn EventSink,
    has_custom_output: bool,
) -> Result<()> {
    const OP: &str = "sign-digest";
    let resolved = resolver::resolve_arguments(&action.arguments, ctx, scope).await?;
    let digest_bytes =
        args::parse_hex_bytes(args::require(&resolved, "digest", OP)?, OP, "digest")?;
    if digest_bytes.len() != 32 {
        return Err(validation(
            OP,
            format!("'digest' must be exactly 32 bytes, got {}", digest_bytes.len()),
        ));
    }
    let digest = B256::from_slice(&digest_bytes);

    let signature = ctx.signer.sign_digest(digest).await?;

    if let Some(name) = output_prefix(action) {
        if !has_custom_output {
            let name = name.to_string();
            store_output(ctx, sink, format!("{}.signature", name), signature.into())?;
            store_output(
                ctx,
                sink,
                format!("{}.digest", name),
                format!("0x{}", hex::encode(digest)).into(),
            )?;
        }
    }
    Ok(())
}

/// `sign-typed-data { domain, types, message, primaryType }`: EIP-712.
pub async fn sign_typed_data(
    action: &Action,
    ctx: &mut ExecutionContext,
    scope: &Scope,
    sink: &dyn EventSink,
    has_custom_output: bool,
) -> Result<()> {
    const OP: &str = "sign-typed-data";
    let resolved = resolver::resolve_arguments(&action.arguments, ctx, scope).await?;
    let domain = args::require(&resolved, "domain", OP)?.clone();
    let types = args::require(&resolved, "types", OP)?.clone();
    let message = args::require(&resolved, "message", OP)?.clone();
    let primary_type = args::require_str(&resolved, "primaryType", OP)?.to_string();

    // The domain is carried separately; a stray EIP712Domain entry in
    // `types` is dropped before hashing.
    let mut stripped_types = types.clone();
    if let Some(map) = stripped_types.as_object_mut() {
        map.remove("EIP712Domain");
    }

    let typed: TypedData = serde_json::from_value(serde_json::json!({
        "types": stripped_types,
        "domain": domain,
        "primaryType": primary_type,
        "message": message,
    }))
    .map_err(|e| validation(OP, format!("invalid typed-data payload: {}", e)))?;

    let signature = ctx.signer.sign_typed_data(&typed).await?;

    if let Some(name) = output_prefix(action) {
        if !has_custom_output {
            let name = name.to_string();
            store_output(ctx, sink, format!("{}.signature", name), signature.into())?;
            store_output(ctx, sink, format!("{}.domain", name), domain)?;
            store_output(ctx, sink, format!("{}.types", name), types)?;
            store_output(ctx, sink, format!("{}.message", name), message)?;
            store_output(
                ctx,
                sink,
                format!("{}.primaryType", name),
                primary_type.into(),
            )?;
        }
    }
    Ok(())
}

/// `sign-message { message }`: EIP-191 personal sign.
pub async fn sign_message(
    action: &Action,
    ctx: &mut ExecutionContext,
    scope: &Scope,
    sink: &dyn EventSink,
    has_custom_output: bool,
) -> Result<()> {
    const OP: &str = "sign-message";
    let resolved = resolver::resolve_arguments(&action.arguments, ctx, scope).await?;
    let message = args::require_str(&resolved, "message", OP)?.to_string();

    let signature = ctx.signer.sign_message(message.as_bytes()).await?;

    if let Some(name) = output_prefix(action) {
        if !has_custom_output {
            let name = name.to_string();
            store_output(ctx, sink, format!("{}.signature", name), signature.into())?;
            store_output(ctx, sink, format!("{}.message", name), message.into())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_context, CollectingSink, MockChain};
    use rigger_core::Value;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn action(kind: &str, arguments: serde_json::Value) -> Action {
        Action {
            name: Some("sig".to_string()),
            action_type: Some(kind.to_string()),
            arguments: serde_json::from_value::<BTreeMap<String, Value>>(arguments).unwrap(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_sign_message_outputs() {
        let mut ctx = test_context(Arc::new(MockChain::new()));
        let sink = CollectingSink::new();
        sign_message(
            &action("sign-message", serde_json::json!({ "message": "hello" })),
            &mut ctx,
            &Scope::new(),
            sink.as_ref(),
            false,
        )
        .await
        .unwrap();

        assert_eq!(ctx.output("sig.message").unwrap(), &serde_json::json!("hello"));
        let signature = ctx.output("sig.signature").unwrap().as_str().unwrap();
        assert_eq!(signature.len(), 2 + 130);
    }

    #[tokio::test]
    async fn test_sign_digest_validates_length() {
        let mut ctx = test_context(Arc::new(MockChain::new()));
        let sink = CollectingSink::new();
        let err = sign_digest(
            &action("sign-digest", serde_json::json!({ "digest": "0x1234" })),
            &mut ctx,
            &Scope::new(),
            sink.as_ref(),
            false,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("32 bytes"));

        sign_digest(
            &action(
                "sign-digest",
                serde_json::json!({ "digest": format!("0x{}", "11".repeat(32)) }),
            ),
            &mut ctx,
            &Scope::new(),
            sink.as_ref(),
            false,
        )
        .await
        .unwrap();
        assert!(ctx.output("sig.signature").is_some());
        assert_eq!(
            ctx.output("sig.digest").unwrap(),
            &serde_json::json!(format!("0x{}", "11".repeat(32)))
        );
    }

    #[tokio::test]
    async fn test_sign_typed_data_strips_domain_type() {
        let mut ctx = test_context(Arc::new(MockChain::new()));
        let sink = CollectingSink::new();
        sign_typed_data(
            &action(
                "sign-typed-data",
                serde_json::json!({
                    "domain": { "name": "Rigger", "chainId": 1 },
                    "types": {
                        "EIP712Domain": [
                            { "name": "name", "type": "string" },
                            { "name": "chainId", "type": "uint256" }
                        ],
                        "Transfer": [
                            { "name": "to", "type": "address" },
                            { "name": "amount", "type": "uint256" }
                        ]
                    },
                    "primaryType": "Transfer",
                    "message": {
                        "to": "0x0000000000000000000000000000000000000001",
                        "amount": "10"
                    }
                }),
            ),
            &mut ctx,
            &Scope::new(),
            sink.as_ref(),
            false,
        )
        .await
        .unwrap();

        assert!(ctx.output("sig.signature").is_some());
        // Inputs are echoed as given, EIP712Domain included.
        assert!(ctx.output("sig.types").unwrap().get("EIP712Domain").is_some());
        assert_eq!(
            ctx.output("sig.primaryType").unwrap(),
            &serde_json::json!("Transfer")
        );
    }

    #[tokio::test]
    async fn test_custom_output_suppresses_defaults() {
        let mut ctx = test_context(Arc::new(MockChain::new()));
        let sink = CollectingSink::new();
        sign_message(
            &action("sign-message", serde_json::json!({ "message": "hello" })),
            &mut ctx,
            &Scope::new(),
            sink.as_ref(),
            true,
        )
        .await
        .unwrap();
        assert!(ctx.output("sig.signature").is_none());
        assert!(ctx.output("sig.message").is_none());
    }
}
