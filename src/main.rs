use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use restore_replay::domain::graph::builder::build_graph;
use restore_replay::loader::config::{machine_name, replay_options};
use restore_replay::loader::parser::{load_trace, save_graph};
use restore_replay::{CsvResultSink, HttpExecutor, ReplayEngine, RunOrchestrator, generate_benchmark_plan, logger};

#[derive(Parser, Debug)]
#[command(author, version, about = "Replays recorded package-restore traffic against a feed and measures it", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the benchmark described by a configuration file
    Replay {
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Build the dependency graph of a trace and save it as JSON
    BuildGraph {
        #[arg(short, long)]
        trace: PathBuf,

        #[arg(short, long)]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Replay { config } => replay(config).await,
        Command::BuildGraph { trace, out } => build(trace, out),
    }
}

async fn replay(config_path: PathBuf) -> anyhow::Result<()> {
    let (config, plan) =
        generate_benchmark_plan(&config_path).with_context(|| format!("failed to prepare benchmark from '{}'", config_path.display()))?;

    let options = replay_options(&config)?;
    let idle_connections = config.max_concurrency.unwrap_or(64);
    let executor = HttpExecutor::new(idle_connections).context("failed to build HTTP client")?;
    let engine = ReplayEngine::new(Arc::new(executor), options);

    let sink = CsvResultSink::new(&config.output_directory);
    let mut orchestrator = RunOrchestrator::new(engine, machine_name(&config)).with_sink(Box::new(sink.clone()));

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Ctrl-C received, finishing in-flight calls before stopping.");
            ctrl_c_cancel.cancel();
        }
    });

    let report = orchestrator.run(&plan, &cancel).await?;

    for statistics in report.statistics() {
        println!("{}", statistics);
    }
    println!("Summary written to {}", sink.summary_path().display());

    if report.cancelled {
        log::warn!("Run {} was cancelled; results are partial.", orchestrator.run_id());
    }

    Ok(())
}

fn build(trace_path: PathBuf, out: PathBuf) -> anyhow::Result<()> {
    let trace = load_trace(&trace_path).with_context(|| format!("failed to load trace '{}'", trace_path.display()))?;
    let built = build_graph(&trace)?;

    for warning in &built.warnings {
        log::warn!("{}", warning);
    }

    save_graph(&built.graph, &out)?;
    println!(
        "Graph with {} nodes, {} edges and {} warnings written to {}",
        built.graph.len(),
        built.graph.edge_count(),
        built.warnings.len(),
        out.display()
    );

    Ok(())
}
