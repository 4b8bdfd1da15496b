use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use weavecore::{NodeSpec, StatusKind, Workflow};
use weaveruntime::{NodeRegistry, WorkflowExecutor};

#[derive(Parser)]
#[command(name = "weave")]
#[command(about = "Node workflow engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow file and wait for it to settle
    Run {
        /// Path to workflow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Write the workflow (with refreshed output caches) back after
        /// the run
        #[arg(short, long)]
        save: Option<PathBuf>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a workflow file: connections, node types, cycles
    Validate {
        /// Path to workflow JSON file
        file: PathBuf,
    },

    /// List available node types
    Nodes,

    /// Create a new example workflow
    Init {
        /// Output file path
        #[arg(short, long, default_value = "workflow.json")]
        output: PathBuf,
    },
}

fn standard_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    weavenodes::register_all(&mut registry);
    registry
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { file, save, verbose } => {
            let level = if verbose {
                tracing::Level::DEBUG
            } else {
                tracing::Level::INFO
            };
            tracing_subscriber::fmt().with_max_level(level).init();

            run_workflow(file, save).await?;
        }

        Commands::Validate { file } => {
            validate_workflow(file)?;
        }

        Commands::Nodes => {
            list_nodes();
        }

        Commands::Init { output } => {
            create_example_workflow(output)?;
        }
    }

    Ok(())
}

async fn run_workflow(file: PathBuf, save: Option<PathBuf>) -> Result<()> {
    println!("🚀 Loading workflow from: {}", file.display());

    let workflow = Workflow::from_json(&std::fs::read_to_string(&file)?)?;

    println!("📋 Workflow: {}", workflow.name);
    println!("   Nodes: {}", workflow.nodes.len());
    println!("   Connections: {}", workflow.connections.len());
    println!();

    let registry = standard_registry();
    let mut executor = WorkflowExecutor::new(workflow, &registry)?;

    // Stream status events while the run progresses
    let mut events = executor.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event.kind {
                StatusKind::StatusChanged { status } => {
                    println!("  ⚡ [{}] {}", event.node_id, status);
                }
                StatusKind::OutputsReady { outputs } => {
                    println!("  ✅ [{}] outputs ready ({} slots)", event.node_id, outputs.len());
                }
                StatusKind::PropertyUpdated { name, .. } => {
                    println!("  📝 [{}] {} updated", event.node_id, name);
                }
            }
        }
    });

    let report = executor.run().await?;
    if !report.in_flight.is_empty() {
        println!("⏳ Waiting for {} async node(s)...", report.in_flight.len());
    }
    let report = executor.settle().await;

    // Let the printer drain before the summary
    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
    printer.abort();

    println!();
    println!("📊 Run summary (generation {}):", report.generation);
    println!("   Executed: {}", report.executed.len());
    println!("   Skipped:  {}", report.skipped.len());
    println!("   Failed:   {}", report.failed.len());
    println!("   Blocked:  {}", report.blocked.len());

    println!();
    println!("📤 Node results:");
    let ids: Vec<String> = executor.workflow().nodes.keys().cloned().collect();
    for id in ids {
        let status = executor.status(&id).unwrap_or("?");
        println!("   {}: {}", id, status);
        if let Some(outputs) = executor.outputs(&id) {
            for (slot, value) in outputs {
                let text = value.to_text();
                let preview: String = text.chars().take(120).collect();
                let ellipsis = if text.chars().count() > 120 { "..." } else { "" };
                println!("     {}: {}{}", slot, preview, ellipsis);
            }
        }
    }

    if let Some(path) = save {
        std::fs::write(&path, executor.snapshot().to_json()?)?;
        println!();
        println!("💾 Saved workflow to: {}", path.display());
    }

    Ok(())
}

fn validate_workflow(file: PathBuf) -> Result<()> {
    println!("🔍 Validating workflow: {}", file.display());

    let workflow = Workflow::from_json(&std::fs::read_to_string(&file)?)?;
    let registry = standard_registry();

    // Building the session checks node types, ports, and the
    // one-connection-per-input rule; resolving checks for cycles.
    let executor = WorkflowExecutor::new(workflow, &registry)?;
    let order = weaveruntime::resolve_order(executor.workflow())?;

    println!("✅ Workflow is valid");
    println!("   Execution order: {}", order.join(" → "));

    Ok(())
}

fn list_nodes() {
    println!("📦 Available node types:");
    println!();

    let registry = standard_registry();
    for node_type in registry.list_node_types() {
        if let Some(info) = registry.get_metadata(&node_type) {
            println!("  • {} ({})", node_type, info.category);
            println!("    {}", info.description);
        } else {
            println!("  • {}", node_type);
        }
    }
}

fn create_example_workflow(output: PathBuf) -> Result<()> {
    let mut workflow = Workflow::new("Example Prompt Workflow");

    workflow.add_node(
        "static_1",
        NodeSpec::new("text.static")
            .with_name("Prompt Text")
            .with_property("text", "Tell me a joke about programming."),
    );
    workflow.add_node(
        "prompt_1",
        NodeSpec::new("llm.prompt").with_name("LLM Prompt"),
    );
    workflow.connect("static_1", "text", "prompt_1", "user_prompt")?;

    std::fs::write(&output, workflow.to_json()?)?;

    println!("✨ Created example workflow: {}", output.display());
    println!();
    println!("Run it with:");
    println!("  weave run --file {}", output.display());

    Ok(())
}
