use std::path::Path;

use crate::api::config_dto::BenchmarkConfigDto;
use crate::domain::orchestrator::run_orchestrator::BenchmarkPlan;
use crate::error::Result;
use crate::loader::config::benchmark_plan;
use crate::loader::parser::load_config;

pub mod api;
pub mod domain;
pub mod error;
pub mod loader;
pub mod logger;

pub use crate::domain::graph::builder::{BuiltGraph, GraphBuilder, build_graph};
pub use crate::domain::graph::graph::Graph;
pub use crate::domain::graph::node::{GraphNode, NodeKey};
pub use crate::domain::operation::{Operation, OperationCategory};
pub use crate::domain::orchestrator::run_orchestrator::{RunOrchestrator, RunReport, VariantPlan};
pub use crate::domain::orchestrator::test_type::TestType;
pub use crate::domain::replay::engine::{IterationOutcome, ReplayEngine};
pub use crate::domain::replay::executor::{CallOutcome, HttpExecutor, RequestExecutor};
pub use crate::domain::replay::options::{ConcurrencyPolicy, ReplayOptions};
pub use crate::domain::results::collector::{IterationResults, ResultCollector};
pub use crate::domain::results::records::{RequestRecord, RunSummary};
pub use crate::domain::results::writer::{CsvResultSink, ResultSink};
pub use crate::domain::trace::TraceEntry;
pub use crate::error::Error;

/// Loads a benchmark configuration and builds the graph of every variant it names.
///
/// Trace paths in the configuration are resolved relative to the configuration file.
pub fn generate_benchmark_plan(config_path: impl AsRef<Path>) -> Result<(BenchmarkConfigDto, BenchmarkPlan)> {
    let config_path = config_path.as_ref();
    let config = load_config(config_path)?;
    log::info!("Configuration '{}' parsed successfully.", config_path.display());

    let base_directory = config_path.parent().unwrap_or_else(|| Path::new("."));
    let plan = benchmark_plan(&config, base_directory)?;
    log::info!("Benchmark plan with {} variants constructed successfully.", plan.variants.len());

    Ok((config, plan))
}
