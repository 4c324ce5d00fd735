mod config;
mod error;
mod tools;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use audit::{Event, EventKind, EventStore};
use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand};
use context::Context;
use flow::providers::OpenAiProvider;
use flow::{FlowExecutor, FlowSet, Provider};
use mcp::StdioServer;
use tracing_subscriber::EnvFilter;

use config::Config;
use error::{Error, Result};

const CONFIG_FILE: &str = "coxswain.toml";
const DEFAULT_AUDIT_PATH: &str = "coxswain.db";

#[derive(Parser)]
#[command(name = "coxswain")]
#[command(about = "MCP tool registry and flow execution server", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the tool registry as an MCP server on stdio
    Serve {
        /// Per-call timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Run a flow locally
    Run {
        /// Flow name
        #[arg(short, long)]
        flow: String,
        /// Input text handed to the flow
        #[arg(short, long)]
        input: String,
    },
    /// List configured flows
    Flows,
    /// List registered tools
    Tools,
    /// Show audit log events for a workflow
    Logs {
        /// Workflow ID (prefix match supported)
        #[arg(short, long)]
        workflow: String,
        /// Filter by event kind (tool_call, tool_outcome, flow_step, ...)
        #[arg(short, long)]
        kind: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    // stdout belongs to the MCP transport; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Serve { timeout } => cmd_serve(config, timeout).await,
        Commands::Run { flow, input } => cmd_run(config, &flow, &input).await,
        Commands::Flows => cmd_flows(&config),
        Commands::Tools => cmd_tools(&config),
        Commands::Logs { workflow, kind } => cmd_logs(&config, &workflow, kind.as_deref()),
    }
}

fn build_provider(config: &Config, api_key: String) -> Arc<dyn Provider> {
    Arc::new(
        OpenAiProvider::builder(api_key, &config.provider.model)
            .base_url(&config.provider.base_url)
            .build(),
    )
}

async fn cmd_serve(config: Config, timeout: Option<u64>) -> Result<()> {
    let api_key = config.api_key()?;
    let provider = build_provider(&config, api_key);
    let registry = Arc::new(tools::default_registry(provider)?);

    let mut server = StdioServer::new(registry);
    if let Some(path) = &config.audit.path {
        server = server.with_audit(EventStore::open(path)?);
        tracing::info!(path = %path.display(), "audit log enabled");
    }
    if let Some(secs) = timeout {
        server = server.with_call_timeout(Duration::from_secs(secs));
    }

    tracing::info!("serving MCP on stdio");
    server.serve().await?;
    Ok(())
}

async fn cmd_run(config: Config, flow_name: &str, input: &str) -> Result<()> {
    let api_key = config.api_key()?;
    let provider = build_provider(&config, api_key);
    let registry = Arc::new(tools::default_registry(provider.clone())?);
    let flows = FlowSet::load(&config.flows.path)?;

    let executor = FlowExecutor::new(flows, registry)
        .with_provider(config.provider.name.clone(), provider);

    let ctx = Context::new();
    let outcome = executor.execute(flow_name, input, &ctx).await?;

    if let Some(path) = &config.audit.path {
        record_run(&EventStore::open(path)?, flow_name, &ctx)?;
    }

    println!("{}", outcome.output);
    Ok(())
}

/// Persist a local flow run's trail from the context's action log.
fn record_run(store: &EventStore, flow_name: &str, ctx: &Context) -> Result<()> {
    let Some(workflow_id) = ctx.workflow_id() else {
        return Ok(());
    };
    store.append(&Event::new(workflow_id, EventKind::WorkflowStart))?;
    for action in ctx.actions() {
        if let Some(step) = action.strip_prefix("flow_step:") {
            store.append(&Event::new(
                workflow_id,
                EventKind::FlowStep {
                    flow: flow_name.to_string(),
                    step: step.to_string(),
                },
            ))?;
        }
    }
    store.append(&Event::new(workflow_id, EventKind::WorkflowEnd))?;
    Ok(())
}

fn cmd_flows(config: &Config) -> Result<()> {
    let flows = FlowSet::load(&config.flows.path)?;

    if flows.is_empty() {
        println!("No flows configured in {}", config.flows.path.display());
        return Ok(());
    }

    for flow in flows.flows() {
        if flow.description.is_empty() {
            println!("{}", flow.name);
        } else {
            println!("{}  - {}", flow.name, flow.description);
        }
        println!("  start: {}", flow.start);
        for step in &flow.steps {
            let tools = if !step.use_tools {
                String::new()
            } else if step.tools.is_empty() {
                "  [all tools]".to_string()
            } else {
                format!("  [{}]", step.tools.join(", "))
            };
            let next = flow
                .transitions
                .get(&step.name)
                .map(|n| format!(" -> {n}"))
                .unwrap_or_default();
            println!("  step {} ({}){tools}{next}", step.name, step.provider);
        }
    }
    Ok(())
}

fn cmd_tools(config: &Config) -> Result<()> {
    // Listing needs no credentials; an unauthenticated provider is fine.
    let provider = build_provider(config, config.api_key().unwrap_or_default());
    let registry = tools::default_registry(provider)?;

    for spec in registry.list() {
        println!("{:<12} {}", spec.name, spec.description);
    }
    Ok(())
}

fn cmd_logs(config: &Config, workflow_prefix: &str, kind: Option<&str>) -> Result<()> {
    let path = config
        .audit
        .path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_AUDIT_PATH));
    if !path.exists() {
        return Err(Error::DatabaseNotFound { path });
    }

    let store = EventStore::open(&path)?;
    let workflow_id = store.resolve_prefix(workflow_prefix)?;
    let events = store.load_workflow(workflow_id, kind)?;

    if events.is_empty() {
        println!("No events found for workflow {workflow_id}");
        return Ok(());
    }

    println!("Workflow: {workflow_id}\n");
    for event in events {
        print_event(&event);
    }
    Ok(())
}

fn print_event(event: &Event) {
    let time = Local
        .from_utc_datetime(&event.timestamp.naive_utc())
        .format("%H:%M:%S");

    match &event.kind {
        EventKind::WorkflowStart => {
            println!("[{time}] === Workflow started ===");
        }
        EventKind::WorkflowEnd => {
            println!("[{time}] === Workflow ended ===");
        }
        EventKind::ToolCall { name, arguments } => {
            println!("[{time}] TOOL CALL: {name} {arguments}");
        }
        EventKind::ToolOutcome { name, ok, detail } => {
            let status = if *ok { "RESULT" } else { "FAILED" };
            let display = truncate(detail, 200);
            println!("[{time}] TOOL {status}: {name} {display}");
        }
        EventKind::FlowStep { flow, step } => {
            println!("[{time}] STEP: {flow}/{step}");
        }
    }
}

/// Truncate long output for display, respecting char boundaries.
fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let cut = text
        .char_indices()
        .take_while(|(i, _)| *i <= max)
        .last()
        .map(|(i, _)| i)
        .unwrap_or(0);
    format!("{}...", &text[..cut])
}
