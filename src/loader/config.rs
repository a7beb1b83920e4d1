use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;

use crate::api::config_dto::BenchmarkConfigDto;
use crate::domain::graph::builder::build_graph;
use crate::domain::orchestrator::run_orchestrator::{BenchmarkPlan, VariantPlan, machine_name_from_env};
use crate::domain::orchestrator::test_type::TestType;
use crate::domain::replay::options::{ConcurrencyPolicy, ReplayOptions};
use crate::error::{Error, Result};
use crate::loader::parser::load_trace;

/// Engine settings taken from the configuration.
pub fn replay_options(config: &BenchmarkConfigDto) -> Result<ReplayOptions> {
    let method = Method::from_bytes(config.method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|e| Error::ConfigurationError(format!("invalid method '{}': {}", config.method, e)))?;

    let concurrency = match config.max_concurrency {
        Some(limit) => ConcurrencyPolicy::Fixed(limit),
        None => ConcurrencyPolicy::Observed,
    };

    Ok(ReplayOptions::new(config.target_base_url.clone())
        .with_method(method)
        .with_concurrency(concurrency)
        .with_timeout(Duration::from_millis(config.timeout_ms))
        .with_dependencies(config.dependencies)
        .with_fail_fast(config.fail_fast)
        .with_max_consecutive_failures(config.max_consecutive_failures))
}

pub fn machine_name(config: &BenchmarkConfigDto) -> String {
    config.machine_name.clone().filter(|name| !name.trim().is_empty()).unwrap_or_else(machine_name_from_env)
}

/// Loads every variant's trace and builds its graph.
///
/// Relative trace paths are resolved against `base_directory` (usually the
/// directory holding the configuration file). Build warnings are logged.
pub fn benchmark_plan(config: &BenchmarkConfigDto, base_directory: &Path) -> Result<BenchmarkPlan> {
    let test_type: TestType = config.test_type.parse()?;
    let mut variants = Vec::with_capacity(config.variants.len());

    for variant in &config.variants {
        let trace_path = resolve_path(base_directory, &variant.trace_path);
        let trace = load_trace(&trace_path)?;
        let built = build_graph(&trace)?;

        for warning in &built.warnings {
            log::warn!("{}: {}", variant.name, warning);
        }
        log::info!(
            "Variant '{}' ({}): {} nodes, {} edges from '{}'.",
            variant.name,
            variant.solution,
            built.graph.len(),
            built.graph.edge_count(),
            trace_path.display()
        );

        variants.push(VariantPlan::new(variant.name.clone(), variant.solution.clone(), Arc::new(built.graph)));
    }

    let plan = BenchmarkPlan::new(variants, config.iterations)
        .with_warm_up(config.warm_up_iterations)
        .with_test_type(test_type)
        .interleaved(config.interleave_variants);
    plan.validate()?;

    Ok(plan)
}

fn resolve_path(base_directory: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() { path.to_path_buf() } else { base_directory.join(path) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::config_dto::VariantDto;
    use std::fs;

    fn config(trace_path: &str) -> BenchmarkConfigDto {
        serde_json::from_value(serde_json::json!({
            "targetBaseUrl": "http://localhost:5000/",
            "method": "head",
            "maxConcurrency": 4,
            "timeoutMs": 250,
            "iterations": 3,
            "warmUpIterations": 1,
            "testType": "cold",
            "failFast": true,
            "maxConsecutiveFailures": 5,
            "machineName": "bench-01",
            "variants": [{ "name": "baseline", "solution": "Orchard", "tracePath": trace_path }]
        }))
        .unwrap()
    }

    #[test]
    fn options_follow_configuration() {
        let options = replay_options(&config("t.json")).unwrap();
        assert_eq!(options.method, Method::HEAD);
        assert_eq!(options.concurrency, ConcurrencyPolicy::Fixed(4));
        assert_eq!(options.timeout, Duration::from_millis(250));
        assert!(options.fail_fast);
        assert_eq!(options.max_consecutive_failures, Some(5));
        assert_eq!(options.resolve_url("/v3/index.json"), "http://localhost:5000/v3/index.json");
    }

    #[test]
    fn invalid_method_is_a_configuration_error() {
        let mut config = config("t.json");
        config.method = "NOT A METHOD".to_string();
        assert!(matches!(replay_options(&config), Err(Error::ConfigurationError(_))));
    }

    #[test]
    fn explicit_machine_name_wins() {
        assert_eq!(machine_name(&config("t.json")), "bench-01");
    }

    #[test]
    fn plan_loads_traces_relative_to_base_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("trace.json"),
            r#"[{ "order": 0, "kind": "service-index", "address": "/v3/index.json" },
                { "order": 1, "kind": "registration", "address": "/reg/a/index.json" }]"#,
        )
        .unwrap();

        let plan = benchmark_plan(&config("trace.json"), dir.path()).unwrap();
        assert_eq!(plan.test_type, TestType::Cold);
        assert_eq!(plan.warm_up_iterations, 1);
        assert_eq!(plan.variants.len(), 1);
        assert_eq!(plan.variants[0].graph.edge_count(), 1);
    }

    #[test]
    fn unknown_test_type_is_rejected() {
        let mut config = config("trace.json");
        config.test_type = "lukewarm".to_string();
        config.variants = vec![VariantDto { name: "x".into(), solution: "y".into(), trace_path: "missing.json".into() }];
        assert!(matches!(benchmark_plan(&config, Path::new(".")), Err(Error::ConfigurationError(_))));
    }
}
