//! OpenAI-compatible chat completions backend.
//!
//! Works against any endpoint that speaks the `/chat/completions` wire
//! format, so the same provider covers OpenAI itself and relays such as
//! OpenRouter by swapping the base URL.

use async_trait::async_trait;
use context::{Message, Role};
use registry::{RetryPolicy, ToolSpec};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::provider::{Completion, CompletionRequest, Provider, ToolCallRequest};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    default_model: String,
    retry: RetryPolicy,
}

pub struct OpenAiProviderBuilder {
    api_key: String,
    base_url: String,
    default_model: String,
    retry: RetryPolicy,
}

impl OpenAiProviderBuilder {
    /// Override the API base URL, e.g. for an OpenRouter relay.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn build(self) -> OpenAiProvider {
        OpenAiProvider {
            client: reqwest::Client::new(),
            api_key: self.api_key,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            default_model: self.default_model,
            retry: self.retry,
        }
    }
}

impl OpenAiProvider {
    pub fn builder(
        api_key: impl Into<String>,
        default_model: impl Into<String>,
    ) -> OpenAiProviderBuilder {
        OpenAiProviderBuilder {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            default_model: default_model.into(),
            retry: RetryPolicy::default(),
        }
    }

    async fn send(&self, body: &ApiRequest<'_>) -> Result<ApiResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn complete(
        &self,
        request: CompletionRequest<'_>,
    ) -> Result<Completion, ProviderError> {
        let body = build_request(
            request.model.unwrap_or(&self.default_model),
            request.system,
            request.messages,
            request.tools,
        );

        tracing::debug!(model = body.model, messages = body.messages.len(), "completion request");
        // Retry transport flakiness only; a 4xx will not improve on the
        // second attempt.
        let response = self
            .retry
            .run(|| async {
                match self.send(&body).await {
                    Ok(response) => Ok(Ok(response)),
                    Err(e) if is_transient(&e) => Err(e),
                    Err(e) => Ok(Err(e)),
                }
            })
            .await??;
        parse_response(response)
    }
}

fn is_transient(error: &ProviderError) -> bool {
    match error {
        ProviderError::Network(_) => true,
        ProviderError::Api { status, .. } => *status >= 500,
        ProviderError::InvalidResponse(_) => false,
    }
}

fn build_request<'a>(
    model: &'a str,
    system: Option<&str>,
    messages: &[Message],
    tools: &[ToolSpec],
) -> ApiRequest<'a> {
    let mut api_messages = Vec::with_capacity(messages.len() + 1);
    if let Some(system) = system {
        api_messages.push(ApiMessage {
            role: "system",
            content: system.to_string(),
            name: None,
        });
    }
    for message in messages {
        api_messages.push(ApiMessage {
            role: match message.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::Tool => "tool",
            },
            content: message.content.clone(),
            name: message.tool_name.clone(),
        });
    }

    ApiRequest {
        model,
        messages: api_messages,
        tools: tools.iter().map(ApiTool::from_spec).collect(),
    }
}

fn parse_response(response: ApiResponse) -> Result<Completion, ProviderError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::InvalidResponse("response has no choices".to_string()))?;

    let tool_calls = choice
        .message
        .tool_calls
        .into_iter()
        .map(|call| ToolCallRequest {
            id: call.id,
            name: call.function.name,
            // Arguments arrive as a JSON string; the registry parses it.
            arguments: Value::String(call.function.arguments),
        })
        .collect();

    Ok(Completion {
        text: choice.message.content.unwrap_or_default(),
        tool_calls,
    })
}

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool>,
}

#[derive(Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Serialize)]
struct ApiTool {
    r#type: &'static str,
    function: ApiFunctionDef,
}

impl ApiTool {
    fn from_spec(spec: &ToolSpec) -> Self {
        Self {
            r#type: "function",
            function: ApiFunctionDef {
                name: spec.name.clone(),
                description: spec.description.clone(),
                parameters: serde_json::to_value(&spec.input_schema).unwrap_or(Value::Null),
            },
        }
    }
}

#[derive(Serialize)]
struct ApiFunctionDef {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ApiToolCall>,
}

#[derive(Deserialize)]
struct ApiToolCall {
    id: String,
    function: ApiFunction,
}

#[derive(Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}
