//! Tool registration, discovery, and validated dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use context::Context;
use serde_json::Value;

use crate::error::{RegistryError, Result};
use crate::tool::{Tool, ToolSpec};

/// Owns the tool-name → tool mapping and dispatches calls through a single
/// validation and error-wrapping boundary.
///
/// A registry is populated at startup and treated as read-only afterward;
/// share it behind an `Arc` for concurrent dispatch. There is deliberately
/// no global instance — the process entry point constructs one and passes it
/// to the transport adapter.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    /// Registration order, for stable discovery listings.
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Fails on an empty or already-taken name; the
    /// previously registered tool is left untouched on collision.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.spec().name;
        if name.is_empty() {
            return Err(RegistryError::EmptyToolName);
        }
        if self.tools.contains_key(&name) {
            return Err(RegistryError::DuplicateTool(name));
        }
        self.order.push(name.clone());
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Builder-style registration for startup wiring.
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Result<Self> {
        self.register(tool)?;
        Ok(self)
    }

    /// Remove a tool. Returns whether it existed; idempotent.
    pub fn unregister(&mut self, name: &str) -> bool {
        if self.tools.remove(name).is_some() {
            self.order.retain(|n| n != name);
            true
        } else {
            false
        }
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Public metadata for every registered tool, in registration order.
    pub fn list(&self) -> Vec<ToolSpec> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.spec())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Look up, validate, and dispatch a tool call.
    ///
    /// The invocation is recorded in the context's action log as
    /// `execute_tool:<name>` before arguments are examined, so calls that
    /// fail validation are still observable. Raw string arguments are parsed
    /// as JSON; parsed arguments are checked against the tool's declared
    /// schema; any failure inside the tool body is re-wrapped into
    /// [`RegistryError::ToolExecution`] carrying the tool name and original
    /// message. On success the tool's value is returned unchanged.
    pub async fn execute_with_validation(
        &self,
        name: &str,
        args: Value,
        ctx: &Context,
    ) -> Result<Value> {
        let tool = self
            .get(name)
            .ok_or_else(|| RegistryError::ToolNotFound(name.to_string()))?;

        ctx.track_action(format!("execute_tool:{name}"));

        let args = match args {
            Value::String(raw) => {
                serde_json::from_str(&raw).map_err(|e| RegistryError::MalformedArguments {
                    tool: name.to_string(),
                    message: format!("invalid JSON: {e}"),
                })?
            }
            other => other,
        };

        tool.spec()
            .input_schema
            .validate(&args)
            .map_err(|e| RegistryError::MalformedArguments {
                tool: name.to_string(),
                message: e.to_string(),
            })?;

        tracing::debug!(tool = name, "dispatching tool call");
        tool.execute(args, ctx)
            .await
            .map_err(|e| RegistryError::ToolExecution {
                tool: name.to_string(),
                message: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolError;
    use crate::schema::Schema;
    use async_trait::async_trait;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn spec(&self) -> ToolSpec {
            ToolSpec::new(
                "echo",
                "Echo the given text back",
                Schema::object([("text", Schema::String)], ["text"]),
            )
        }

        async fn execute(&self, args: Value, _ctx: &Context) -> std::result::Result<Value, ToolError> {
            Ok(args["text"].clone())
        }
    }

    struct BoomTool;

    #[async_trait]
    impl Tool for BoomTool {
        fn spec(&self) -> ToolSpec {
            ToolSpec::new("boom", "Always fails", Schema::Any)
        }

        async fn execute(&self, _args: Value, _ctx: &Context) -> std::result::Result<Value, ToolError> {
            Err(ToolError::Execution("boom".to_string()))
        }
    }

    /// A second tool registered under a name that collides with EchoTool.
    struct ShoutTool;

    #[async_trait]
    impl Tool for ShoutTool {
        fn spec(&self) -> ToolSpec {
            ToolSpec::new("echo", "Shout the given text back", Schema::Any)
        }

        async fn execute(&self, args: Value, _ctx: &Context) -> std::result::Result<Value, ToolError> {
            let text = args["text"].as_str().unwrap_or_default();
            Ok(json!(text.to_uppercase()))
        }
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::new()
            .with_tool(Arc::new(EchoTool))
            .and_then(|r| r.with_tool(Arc::new(BoomTool)))
            .unwrap()
    }

    #[tokio::test]
    async fn executes_registered_tool_and_tracks_action() {
        let registry = registry();
        let ctx = Context::new();

        let result = registry
            .execute_with_validation("echo", json!({"text": "hi"}), &ctx)
            .await
            .unwrap();

        assert_eq!(result, json!("hi"));
        assert!(ctx.actions().contains(&"execute_tool:echo".to_string()));
    }

    #[tokio::test]
    async fn unknown_tool_fails_without_touching_action_log() {
        let registry = registry();
        let ctx = Context::new();

        let err = registry
            .execute_with_validation("missing", json!({}), &ctx)
            .await
            .unwrap_err();

        assert!(matches!(err, RegistryError::ToolNotFound(name) if name == "missing"));
        assert!(ctx.actions().is_empty());
    }

    #[tokio::test]
    async fn tool_failure_is_wrapped_with_name_and_message() {
        let registry = registry();
        let ctx = Context::new();

        let err = registry
            .execute_with_validation("boom", json!({}), &ctx)
            .await
            .unwrap_err();

        match err {
            RegistryError::ToolExecution { tool, message } => {
                assert_eq!(tool, "boom");
                assert!(message.contains("boom"));
            }
            other => panic!("expected ToolExecution, got {other:?}"),
        }
        // The failed call still shows up in the action log.
        assert_eq!(ctx.actions(), vec!["execute_tool:boom"]);
    }

    #[tokio::test]
    async fn raw_string_arguments_are_parsed() {
        let registry = registry();
        let ctx = Context::new();

        let result = registry
            .execute_with_validation("echo", json!(r#"{"text": "raw"}"#), &ctx)
            .await
            .unwrap();
        assert_eq!(result, json!("raw"));

        let err = registry
            .execute_with_validation("echo", json!("{not json"), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::MalformedArguments { .. }));
    }

    #[tokio::test]
    async fn schema_mismatch_is_invalid_params_not_execution() {
        let registry = registry();
        let ctx = Context::new();

        let err = registry
            .execute_with_validation("echo", json!({"text": 42}), &ctx)
            .await
            .unwrap_err();

        match err {
            RegistryError::MalformedArguments { tool, message } => {
                assert_eq!(tool, "echo");
                assert!(message.contains("expected string"));
            }
            other => panic!("expected MalformedArguments, got {other:?}"),
        }
        // Validation failures are still recorded.
        assert_eq!(ctx.actions(), vec!["execute_tool:echo"]);
    }

    #[tokio::test]
    async fn duplicate_registration_fails_and_keeps_first() {
        let mut registry = registry();
        let err = registry.register(Arc::new(ShoutTool)).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateTool(name) if name == "echo"));

        // The original tool is unchanged.
        let ctx = Context::new();
        let result = registry
            .execute_with_validation("echo", json!({"text": "hi"}), &ctx)
            .await
            .unwrap();
        assert_eq!(result, json!("hi"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn empty_name_is_rejected() {
        struct Nameless;

        #[async_trait]
        impl Tool for Nameless {
            fn spec(&self) -> ToolSpec {
                ToolSpec::new("", "", Schema::Any)
            }

            async fn execute(&self, _args: Value, _ctx: &Context) -> std::result::Result<Value, ToolError> {
                Ok(Value::Null)
            }
        }

        let mut registry = ToolRegistry::new();
        let err = registry.register(Arc::new(Nameless)).unwrap_err();
        assert!(matches!(err, RegistryError::EmptyToolName));
    }

    #[test]
    fn list_preserves_registration_order_and_metadata() {
        let registry = registry();
        let specs = registry.list();

        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].name, "echo");
        assert_eq!(specs[1].name, "boom");
        assert_eq!(
            registry.get("echo").map(|t| t.spec().description),
            Some(specs[0].description.clone())
        );
    }

    #[test]
    fn unregister_is_idempotent() {
        let mut registry = registry();
        assert!(registry.unregister("echo"));
        assert!(!registry.unregister("echo"));
        assert_eq!(registry.list().len(), 1);
    }
}
