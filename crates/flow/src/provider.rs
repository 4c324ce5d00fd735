//! Completion provider abstraction.

use async_trait::async_trait;
use context::Message;
use registry::ToolSpec;
use serde_json::Value;

use crate::error::ProviderError;

/// One completion call: the conversation so far plus the tools the
/// provider may request.
#[derive(Debug, Clone)]
pub struct CompletionRequest<'a> {
    /// Model override; `None` uses the provider's default.
    pub model: Option<&'a str>,
    pub system: Option<&'a str>,
    pub messages: &'a [Message],
    pub tools: &'a [ToolSpec],
}

/// A tool invocation requested by the provider.
///
/// `arguments` is passed through as received; some providers hand back a
/// raw JSON string, which the registry parses at dispatch time.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// What a provider returned for one request.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub text: String,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl Completion {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_calls: Vec::new(),
        }
    }
}

/// A model backend that turns a conversation into a completion.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn complete(
        &self,
        request: CompletionRequest<'_>,
    ) -> Result<Completion, ProviderError>;
}
