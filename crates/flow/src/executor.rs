//! Step-by-step flow execution with tool round-trips.

use std::collections::HashMap;
use std::sync::Arc;

use context::{Context, Message};
use registry::{ToolRegistry, ToolSpec};
use serde_json::json;

use crate::error::{FlowError, Result};
use crate::flow::{Flow, FlowSet, Step};
use crate::provider::{CompletionRequest, Provider};

/// Hard ceiling on steps per flow run unless overridden. Transition
/// tables may contain cycles, so every run must be bounded.
pub const DEFAULT_STEP_LIMIT: u32 = 16;

/// What a flow run produced.
#[derive(Debug, Clone, Default)]
pub struct FlowOutcome {
    /// Output of the last step that ran.
    pub output: String,
    /// Output of every step, keyed by step name.
    pub steps: HashMap<String, String>,
}

/// Runs flows against a set of named providers and a shared tool
/// registry. Construct one at startup and share it behind an `Arc`.
pub struct FlowExecutor {
    flows: FlowSet,
    providers: HashMap<String, Arc<dyn Provider>>,
    registry: Arc<ToolRegistry>,
    step_limit: u32,
}

impl FlowExecutor {
    pub fn new(flows: FlowSet, registry: Arc<ToolRegistry>) -> Self {
        Self {
            flows,
            providers: HashMap::new(),
            registry,
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }

    /// Make a provider available to steps under `name`.
    pub fn with_provider(mut self, name: impl Into<String>, provider: Arc<dyn Provider>) -> Self {
        self.providers.insert(name.into(), provider);
        self
    }

    /// Override the per-run step ceiling.
    pub fn with_step_limit(mut self, limit: u32) -> Self {
        self.step_limit = limit.max(1);
        self
    }

    pub fn flows(&self) -> &FlowSet {
        &self.flows
    }

    /// Run a flow to completion.
    ///
    /// Starts at the flow's `start` step and follows the transition table
    /// until a terminal step or the step ceiling. Each step's output is
    /// appended to the context conversation and recorded in the outcome
    /// under the step's name; the final step's output becomes
    /// [`FlowOutcome::output`].
    pub async fn execute(&self, flow_name: &str, input: &str, ctx: &Context) -> Result<FlowOutcome> {
        let flow = self
            .flows
            .get(flow_name)
            .ok_or_else(|| FlowError::FlowNotFound(flow_name.to_string()))?;

        ctx.initialize_workflow();
        ctx.track_action(format!("execute_flow:{flow_name}"));
        ctx.add_message(Message::user(input));

        let mut outcome = FlowOutcome::default();
        let mut current = flow.start.clone();
        let mut steps_taken = 0u32;

        loop {
            steps_taken += 1;
            if steps_taken > self.step_limit {
                return Err(FlowError::StepLimitExceeded {
                    flow: flow.name.clone(),
                    limit: self.step_limit,
                });
            }

            let step = flow.step(&current).ok_or_else(|| FlowError::StepNotFound {
                flow: flow.name.clone(),
                step: current.clone(),
            })?;

            tracing::debug!(flow = flow.name, step = step.name, "running step");
            let text = self.run_step(flow, step, ctx).await?;

            ctx.add_message(Message::assistant(&text));
            ctx.track_action(format!("flow_step:{current}"));
            ctx.set_state(format!("{current}_output"), json!(text.clone()));
            outcome.output = text.clone();
            outcome.steps.insert(current.clone(), text);

            match flow.transitions.get(&current) {
                Some(next) => current = next.clone(),
                None => return Ok(outcome),
            }
        }
    }

    async fn run_step(&self, flow: &Flow, step: &Step, ctx: &Context) -> Result<String> {
        let provider =
            self.providers
                .get(&step.provider)
                .ok_or_else(|| FlowError::ProviderNotFound {
                    step: step.name.clone(),
                    provider: step.provider.clone(),
                })?;

        let specs = self.step_tools(step);
        let mut messages = ctx.conversation();
        let completion = provider
            .complete(CompletionRequest {
                model: step.model.as_deref(),
                system: step.system.as_deref(),
                messages: &messages,
                tools: &specs,
            })
            .await?;

        if completion.tool_calls.is_empty() {
            return Ok(completion.text);
        }

        // The provider asked for tools. Run each call in order, feed the
        // results back as tool messages, then ask once more for the
        // step's final text. Tool failures are reported to the model
        // rather than aborting the flow; provider failures still abort.
        if !completion.text.is_empty() {
            let message = Message::assistant(&completion.text);
            ctx.add_message(message.clone());
            messages.push(message);
        }
        for call in completion.tool_calls {
            let content = match self
                .registry
                .execute_with_validation(&call.name, call.arguments, ctx)
                .await
            {
                Ok(value) => value.to_string(),
                Err(e) => {
                    tracing::warn!(flow = flow.name, step = step.name, tool = call.name, error = %e, "tool call failed");
                    format!("error: {e}")
                }
            };
            let message = Message::tool(&call.name, content);
            ctx.add_message(message.clone());
            messages.push(message);
        }

        let completion = provider
            .complete(CompletionRequest {
                model: step.model.as_deref(),
                system: step.system.as_deref(),
                messages: &messages,
                tools: &specs,
            })
            .await?;
        Ok(completion.text)
    }

    /// The tool metadata offered to a step's provider. An empty `tools`
    /// list on a tool-enabled step means every registered tool.
    fn step_tools(&self, step: &Step) -> Vec<ToolSpec> {
        if !step.use_tools {
            return Vec::new();
        }
        let specs = self.registry.list();
        if step.tools.is_empty() {
            specs
        } else {
            specs
                .into_iter()
                .filter(|spec| step.tools.contains(&spec.name))
                .collect()
        }
    }
}
