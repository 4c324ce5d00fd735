//! Flow definitions and the TOML file format they load from.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FlowError, Result};

/// One provider call in a flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    /// Name of the configured provider this step runs on.
    pub provider: String,
    /// Model override; the provider's default is used when absent.
    #[serde(default)]
    pub model: Option<String>,
    /// System prompt for this step.
    #[serde(default)]
    pub system: Option<String>,
    /// Whether the provider is offered tools on this step.
    #[serde(default)]
    pub use_tools: bool,
    /// Tool names offered when `use_tools` is set. Empty means every
    /// registered tool.
    #[serde(default)]
    pub tools: Vec<String>,
}

/// A named sequence of steps with an explicit entry point and a
/// step-name → step-name transition table. A step with no transition
/// entry is terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flow {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Name of the first step to run.
    pub start: String,
    #[serde(rename = "step", default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub transitions: HashMap<String, String>,
}

impl Flow {
    /// Look up a step by name.
    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Check internal references: unique step names, a resolvable start
    /// step, and transition endpoints that all name defined steps.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| FlowError::InvalidFlow {
            flow: self.name.clone(),
            message,
        };

        if self.name.is_empty() {
            return Err(invalid("flow name must not be empty".to_string()));
        }
        if self.steps.is_empty() {
            return Err(invalid("flow has no steps".to_string()));
        }

        let mut seen = std::collections::HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.name.as_str()) {
                return Err(invalid(format!("duplicate step '{}'", step.name)));
            }
        }

        if self.step(&self.start).is_none() {
            return Err(invalid(format!("start step '{}' is not defined", self.start)));
        }
        for (from, to) in &self.transitions {
            if self.step(from).is_none() {
                return Err(invalid(format!("transition from unknown step '{from}'")));
            }
            if self.step(to).is_none() {
                return Err(invalid(format!("transition to unknown step '{to}'")));
            }
        }
        Ok(())
    }
}

/// All flows loaded from a definition file, keyed by name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowSet {
    #[serde(rename = "flow", default)]
    flows: Vec<Flow>,
}

impl FlowSet {
    /// Load and validate flow definitions from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| FlowError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&raw)
    }

    /// Parse and validate flow definitions from TOML text.
    pub fn parse(raw: &str) -> Result<Self> {
        let set: Self = toml::from_str(raw)?;
        set.validate()?;
        Ok(set)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for flow in &self.flows {
            if !seen.insert(flow.name.as_str()) {
                return Err(FlowError::InvalidFlow {
                    flow: flow.name.clone(),
                    message: "duplicate flow name".to_string(),
                });
            }
            flow.validate()?;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Flow> {
        self.flows.iter().find(|f| f.name == name)
    }

    /// Flows in file order.
    pub fn flows(&self) -> &[Flow] {
        &self.flows
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }
}
