//! `static`: capture a resolved value into the output namespace.

use super::{output_prefix, store_output};
use crate::context::{ExecutionContext, Scope};
use crate::error::{EngineError, Result};
use crate::resolver;
use rigger_core::{Action, EventSink};

/// `static { value }`: resolve `value` and store it under `name.value`.
pub async fn capture(
    action: &Action,
    ctx: &mut ExecutionContext,
    scope: &Scope,
    sink: &dyn EventSink,
    has_custom_output: bool,
) -> Result<()> {
    let value = action.arguments.get("value").ok_or_else(|| {
        EngineError::Validation("static: missing required argument 'value'".to_string())
    })?;
    let resolved = resolver::resolve(value, ctx, scope).await?;

    if let Some(name) = output_prefix(action) {
        if !has_custom_output {
            store_output(ctx, sink, format!("{}.value", name), resolved)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_context, CollectingSink, MockChain};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_captures_expression_result() {
        let chain = Arc::new(MockChain::new());
        let mut ctx = test_context(chain);
        ctx.store_output("other.value".to_string(), serde_json::json!(9))
            .unwrap();
        let sink = CollectingSink::new();

        let action: Action = serde_yaml::from_str(
            "{ name: snapshot, type: static, arguments: { value: '{{other.value}}' } }",
        )
        .unwrap();
        capture(&action, &mut ctx, &Scope::new(), sink.as_ref(), false)
            .await
            .unwrap();
        assert_eq!(ctx.output("snapshot.value").unwrap(), &serde_json::json!(9));
    }

    #[tokio::test]
    async fn test_null_value_is_stored() {
        let mut ctx = test_context(Arc::new(MockChain::new()));
        let sink = CollectingSink::new();
        let action: Action =
            serde_yaml::from_str("{ name: n, type: static, arguments: { value: null } }").unwrap();
        capture(&action, &mut ctx, &Scope::new(), sink.as_ref(), false)
            .await
            .unwrap();
        assert_eq!(ctx.output("n.value").unwrap(), &serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_missing_value_argument() {
        let mut ctx = test_context(Arc::new(MockChain::new()));
        let sink = CollectingSink::new();
        let action: Action = serde_yaml::from_str("{ name: n, type: static }").unwrap();
        assert!(capture(&action, &mut ctx, &Scope::new(), sink.as_ref(), false)
            .await
            .is_err());
    }
}
