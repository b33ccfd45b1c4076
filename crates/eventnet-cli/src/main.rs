//! eventnet CLI
//!
//! The `eventnet` command drives a network of agents described in a TOML file.
//!
//! ## Commands
//!
//! - `validate`: Check a network file and report every problem
//! - `sort`: Apply an `events_order` to a JSON array of payloads
//! - `run`: Schedule every checkable agent once and propagate until idle
//! - `types`: List the built-in agent types and their capabilities

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};

use eventnet_core::metrics::METRICS;
use eventnet_core::{
    prepare_batch, AgentCapability, AgentTypeRegistry, Network, NetworkConfig, NewEvent, Payload,
    SortingOptions, TeraRenderer,
};

#[derive(Parser)]
#[command(name = "eventnet")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run networks of cooperating agents", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a network file without running it
    Validate {
        /// Path to the network TOML file
        path: PathBuf,
    },

    /// Sort a JSON array of event payloads the way an agent would commit them
    Sort {
        /// `events_order` as JSON, e.g. '[["{{date}}", "time", true]]'
        #[arg(short, long)]
        order: Option<String>,

        /// Merge `sort_info` into every payload
        #[arg(long)]
        include_sort_info: bool,

        /// JSON file holding an array of objects ("-" for stdin)
        #[arg(default_value = "-")]
        events: PathBuf,
    },

    /// Run every schedulable agent once, then propagate until idle
    Run {
        /// Path to the network TOML file
        path: PathBuf,

        /// Maximum number of propagation rounds
        #[arg(short, long, default_value_t = 16)]
        rounds: usize,
    },

    /// List agent types and their capabilities
    Types,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    eventnet_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Validate { path } => cmd_validate(&path),
        Commands::Sort {
            order,
            include_sort_info,
            events,
        } => cmd_sort(order.as_deref(), include_sort_info, &events),
        Commands::Run { path, rounds } => cmd_run(&path, rounds).await.map(|_| ()),
        Commands::Types => cmd_types(cli.json),
    }
}

fn cmd_validate(path: &Path) -> Result<()> {
    let config = NetworkConfig::from_path(path)?;
    let (network, problems) = Network::load(&config, AgentTypeRegistry::with_builtins())?;

    if problems.is_empty() {
        println!(
            "{}: {} agents, {} links",
            path.display(),
            network.agents().count(),
            network.links().len()
        );
        return Ok(());
    }

    for problem in &problems {
        eprintln!("  - {}", problem);
    }
    anyhow::bail!("{} problem(s) in {}", problems.len(), path.display())
}

fn cmd_sort(order: Option<&str>, include_sort_info: bool, events: &Path) -> Result<()> {
    let input = if events == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read events from stdin")?;
        buf
    } else {
        std::fs::read_to_string(events)
            .with_context(|| format!("Failed to read events file: {:?}", events))?
    };

    let sorted = sort_payloads(order, include_sort_info, &input)?;
    println!("{}", serde_json::to_string_pretty(&sorted)?);
    Ok(())
}

/// Validate the sorting options and apply them to `input`, a JSON array of
/// objects.
fn sort_payloads(order: Option<&str>, include_sort_info: bool, input: &str) -> Result<Vec<Payload>> {
    let mut options = Payload::new();
    if let Some(order) = order {
        let spec: Value = serde_json::from_str(order).context("--order is not valid JSON")?;
        options.insert("events_order".into(), spec);
    }
    options.insert("include_sort_info".into(), Value::Bool(include_sort_info));

    let sorting = SortingOptions::from_options(&options, &TeraRenderer).map_err(|errors| {
        let lines: Vec<String> = errors.iter().map(|e| format!("  - {}", e)).collect();
        anyhow::anyhow!("invalid sorting options:\n{}", lines.join("\n"))
    })?;

    let values: Vec<Value> =
        serde_json::from_str(input).context("Events must be a JSON array")?;
    let mut batch = Vec::with_capacity(values.len());
    for (i, value) in values.into_iter().enumerate() {
        match value {
            Value::Object(payload) => batch.push(NewEvent::new(payload)),
            other => anyhow::bail!("event {} is not an object: {}", i, other),
        }
    }

    Ok(prepare_batch(&sorting, &TeraRenderer, batch)
        .into_iter()
        .map(|e| e.payload)
        .collect())
}

/// Returns the number of events committed during the run.
async fn cmd_run(path: &Path, rounds: usize) -> Result<usize> {
    let config = NetworkConfig::from_path(path)?;
    let mut network = Network::from_config(&config, AgentTypeRegistry::with_builtins())
        .with_context(|| format!("Failed to build network from {:?}", path))?;

    let scheduled: Vec<_> = network
        .agents()
        .filter(|slot| slot.has(AgentCapability::CanBeScheduled))
        .map(|slot| slot.id)
        .collect();
    for id in scheduled {
        match network.run_check(id).await {
            Ok(events) => info!(agent_id = %id, created = events.len(), "check finished"),
            Err(e) => warn!(agent_id = %id, error = %e, "check failed"),
        }
    }

    let delivered = network.run_until_idle(rounds).await?;
    let events = network.committed_events()?;
    for event in &events {
        println!("{}", serde_json::to_string(event)?);
    }
    info!(delivered, committed = events.len(), "network idle");
    METRICS.flush();
    Ok(events.len())
}

#[derive(Serialize)]
struct TypeListing {
    #[serde(rename = "type")]
    type_name: &'static str,
    description: &'static str,
    capabilities: Vec<AgentCapability>,
}

fn type_listings(registry: &AgentTypeRegistry) -> Vec<TypeListing> {
    registry
        .descriptors()
        .map(|d| TypeListing {
            type_name: d.type_name,
            description: d.description,
            capabilities: d.capabilities.to_vec(),
        })
        .collect()
}

fn cmd_types(json: bool) -> Result<()> {
    let registry = AgentTypeRegistry::with_builtins();
    let listings = type_listings(&registry);

    if json {
        println!("{}", serde_json::to_string_pretty(&listings)?);
        return Ok(());
    }

    for listing in &listings {
        println!("{:<16} {}", listing.type_name, listing.description);
        let caps: Vec<String> = listing.capabilities.iter().map(|c| c.to_string()).collect();
        println!("{:<16} [{}]", "", caps.join(", "));
    }
    println!();
    println!(
        "Agents that order created events: {}",
        registry.summary(AgentCapability::OrdersCreatedEvents)
    );
    Ok(())
}
