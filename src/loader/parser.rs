use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

use crate::api::config_dto::BenchmarkConfigDto;
use crate::api::graph_dto::GraphDto;
use crate::api::trace_dto::TraceEntryDto;
use crate::domain::graph::graph::Graph;
use crate::domain::trace::TraceEntry;
use crate::error::{Error, Result};

/// Parses a JSON file into a given type `T`.
///
/// Errors are converted into `crate::error::Error` variants:
/// - `Error::IoError` if the file cannot be read.
/// - `Error::DeserializationError` if the JSON is malformed.
pub fn parse_json_file<T: DeserializeOwned>(file_path: impl AsRef<Path>) -> Result<T> {
    let data = fs::read_to_string(file_path.as_ref())?;
    let parsed_data: T = serde_json::from_str(&data)?;

    Ok(parsed_data)
}

/// Reads a recorded trace in file order.
pub fn load_trace(file_path: impl AsRef<Path>) -> Result<Vec<TraceEntry>> {
    let entries: Vec<TraceEntryDto> = parse_json_file(&file_path)?;
    log::debug!("Loaded {} trace entries from '{}'.", entries.len(), file_path.as_ref().display());

    Ok(entries.into_iter().map(TraceEntry::from).collect())
}

/// Reads a persisted graph. Every graph invariant is checked again on load.
pub fn load_graph(file_path: impl AsRef<Path>) -> Result<Graph> {
    let dto: GraphDto = parse_json_file(&file_path)?;
    Graph::try_from(dto)
}

pub fn save_graph(graph: &Graph, file_path: impl AsRef<Path>) -> Result<()> {
    let path = file_path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(&GraphDto::from(graph))?;
    fs::write(path, json)?;
    log::info!("Saved graph with {} nodes and {} edges to '{}'.", graph.len(), graph.edge_count(), path.display());

    Ok(())
}

/// Reads and validates a benchmark configuration.
pub fn load_config(file_path: impl AsRef<Path>) -> Result<BenchmarkConfigDto> {
    let config: BenchmarkConfigDto = parse_json_file(&file_path)?;
    validate_config(&config)?;

    Ok(config)
}

pub fn validate_config(config: &BenchmarkConfigDto) -> Result<()> {
    let invalid = |message: String| Err(Error::ConfigurationError(message));

    if config.target_base_url.trim().is_empty() {
        return invalid("targetBaseUrl must not be empty".to_string());
    }
    if config.variants.is_empty() {
        return invalid("at least one variant is required".to_string());
    }
    if config.iterations == 0 {
        return invalid("iterations must be at least 1".to_string());
    }
    if config.warm_up_iterations >= config.iterations {
        return invalid(format!("warmUpIterations ({}) must be fewer than iterations ({})", config.warm_up_iterations, config.iterations));
    }
    if config.max_concurrency == Some(0) {
        return invalid("maxConcurrency must be at least 1".to_string());
    }
    if config.timeout_ms == 0 {
        return invalid("timeoutMs must be at least 1".to_string());
    }
    if let Some(variant) = config.variants.iter().find(|v| v.name.trim().is_empty() || v.trace_path.trim().is_empty()) {
        return invalid(format!("variant '{}' needs a name and a tracePath", variant.name));
    }

    Ok(())
}
