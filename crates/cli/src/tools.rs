//! Built-in tools registered by the CLI.

use std::sync::Arc;

use async_trait::async_trait;
use context::{Context, Message};
use flow::{CompletionRequest, Provider};
use registry::{Result, Schema, Tool, ToolError, ToolRegistry, ToolSpec};
use serde_json::{Value, json};

/// Build the default registry: echo, remember, recall, and a completion
/// tool backed by the configured provider.
pub fn default_registry(provider: Arc<dyn Provider>) -> Result<ToolRegistry> {
    ToolRegistry::new()
        .with_tool(Arc::new(EchoTool))?
        .with_tool(Arc::new(RememberTool))?
        .with_tool(Arc::new(RecallTool))?
        .with_tool(Arc::new(CompleteTool { provider }))
}

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

struct RememberTool;

#[async_trait]
impl Tool for RememberTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "remember",
            "Store a value in workflow memory under a key",
            Schema::object(
                [("key", Schema::String), ("value", Schema::Any)],
                ["key", "value"],
            ),
        )
    }

    async fn execute(&self, args: Value, ctx: &Context) -> std::result::Result<Value, ToolError> {
        let key = args["key"].as_str().unwrap_or_default().to_string();
        ctx.remember(key.clone(), args["value"].clone());
        Ok(json!({"remembered": key}))
    }
}

struct RecallTool;

#[async_trait]
impl Tool for RecallTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "recall",
            "Retrieve a value from workflow memory",
            Schema::object([("key", Schema::String)], ["key"]),
        )
    }

    async fn execute(&self, args: Value, ctx: &Context) -> std::result::Result<Value, ToolError> {
        let key = args["key"].as_str().unwrap_or_default();
        match ctx.recall(key) {
            Some(value) => Ok(value),
            None => Err(ToolError::NotFound(format!("no memory under '{key}'"))),
        }
    }
}

/// One-shot completion against the configured provider.
struct CompleteTool {
    provider: Arc<dyn Provider>,
}

#[async_trait]
impl Tool for CompleteTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "complete",
            "Ask the configured model to complete a prompt",
            Schema::object([("prompt", Schema::String)], ["prompt"]),
        )
    }

    async fn execute(&self, args: Value, _ctx: &Context) -> std::result::Result<Value, ToolError> {
        let prompt = args["prompt"].as_str().unwrap_or_default();
        let messages = [Message::user(prompt)];
        let completion = self
            .provider
            .complete(CompletionRequest {
                model: None,
                system: None,
                messages: &messages,
                tools: &[],
            })
            .await
            .map_err(|e| ToolError::Upstream(e.to_string()))?;
        Ok(json!(completion.text))
    }
}
