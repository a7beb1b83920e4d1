use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::domain::graph::graph::Graph;
use crate::domain::orchestrator::test_type::TestType;
use crate::domain::replay::engine::{IterationOutcome, ReplayEngine};
use crate::domain::results::collector::{IterationResults, ResultCollector};
use crate::domain::results::records::RunSummary;
use crate::domain::results::statistics::RunStatistics;
use crate::domain::results::writer::ResultSink;
use crate::domain::utils::clock::{Clock, SystemClock};
use crate::domain::utils::id::{SolutionName, VariantName};
use crate::error::{Error, Result};

/// One configuration under comparison and the graph it replays.
#[derive(Debug, Clone)]
pub struct VariantPlan {
    pub variant_name: VariantName,
    pub solution_name: SolutionName,
    pub graph: Arc<Graph>,
}

impl VariantPlan {
    pub fn new(variant_name: impl Into<String>, solution_name: impl Into<String>, graph: Arc<Graph>) -> Self {
        VariantPlan { variant_name: VariantName::new(variant_name), solution_name: SolutionName::new(solution_name), graph }
    }
}

#[derive(Debug, Clone)]
pub struct BenchmarkPlan {
    pub variants: Vec<VariantPlan>,
    pub iterations: usize,

    /// The first `warm_up_iterations` iterations of every variant are flagged as warm-up.
    pub warm_up_iterations: usize,
    pub test_type: TestType,

    /// Round-robin over variants per iteration instead of finishing one variant before the next.
    pub interleave_variants: bool,
}

impl BenchmarkPlan {
    pub fn new(variants: Vec<VariantPlan>, iterations: usize) -> Self {
        BenchmarkPlan { variants, iterations, warm_up_iterations: 0, test_type: TestType::Warm, interleave_variants: false }
    }

    pub fn with_warm_up(mut self, warm_up_iterations: usize) -> Self {
        self.warm_up_iterations = warm_up_iterations;
        self
    }

    pub fn with_test_type(mut self, test_type: TestType) -> Self {
        self.test_type = test_type;
        self
    }

    pub fn interleaved(mut self, interleave_variants: bool) -> Self {
        self.interleave_variants = interleave_variants;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.variants.is_empty() {
            return Err(Error::ConfigurationError("at least one variant is required".to_string()));
        }
        if self.iterations == 0 {
            return Err(Error::ConfigurationError("iterations must be at least 1".to_string()));
        }
        if self.warm_up_iterations >= self.iterations {
            return Err(Error::ConfigurationError(format!(
                "warm-up iterations ({}) must be fewer than iterations ({})",
                self.warm_up_iterations, self.iterations
            )));
        }
        Ok(())
    }

    /// Execution order as (variant position, 1-based iteration) pairs.
    pub fn schedule(&self) -> Vec<(usize, usize)> {
        let variants = 0..self.variants.len();
        let iterations = 1..=self.iterations;

        if self.interleave_variants {
            iterations.flat_map(|iteration| variants.clone().map(move |variant| (variant, iteration))).collect()
        } else {
            variants.flat_map(|variant| iterations.clone().map(move |iteration| (variant, iteration))).collect()
        }
    }
}

/// Request records of one successful iteration.
#[derive(Debug, Clone)]
pub struct IterationReport {
    pub variant_name: VariantName,
    pub solution_name: SolutionName,
    pub iteration: usize,
    pub outcome: IterationOutcome,
    pub results: IterationResults,
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub summaries: Vec<RunSummary>,
    pub iterations: Vec<IterationReport>,

    /// The run stopped early because cancellation was requested.
    pub cancelled: bool,
}

impl RunReport {
    pub fn statistics(&self) -> Vec<RunStatistics> {
        RunStatistics::from_summaries(&self.summaries)
    }

    pub fn failed_summaries(&self) -> impl Iterator<Item = &RunSummary> {
        self.summaries.iter().filter(|s| s.is_failed())
    }
}

/// Repeats full graph replays per [`BenchmarkPlan`] and produces one [`RunSummary`] per iteration.
///
/// Iterations never overlap. An iteration that errors is reported with a
/// failure marker and the run moves on; only cancellation ends the run early,
/// and the cancelled iteration is discarded.
pub struct RunOrchestrator {
    engine: ReplayEngine,
    clock: Arc<dyn Clock>,
    machine_name: String,
    collector: ResultCollector,
    sink: Option<Box<dyn ResultSink>>,
    run_id: String,
}

impl RunOrchestrator {
    pub fn new(engine: ReplayEngine, machine_name: impl Into<String>) -> Self {
        let run_id = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();

        RunOrchestrator {
            engine,
            clock: Arc::new(SystemClock),
            machine_name: machine_name.into(),
            collector: ResultCollector::new(),
            sink: None,
            run_id,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_sink(mut self, sink: Box<dyn ResultSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn collector(&self) -> &ResultCollector {
        &self.collector
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub async fn run(&mut self, plan: &BenchmarkPlan, cancel: &CancellationToken) -> Result<RunReport> {
        plan.validate()?;

        let mut report = RunReport::default();
        let dependencies = self.engine.options().respect_dependencies;

        log::info!(
            "Starting benchmark run {} with {} variants x {} iterations ({} warm-up).",
            self.run_id,
            plan.variants.len(),
            plan.iterations,
            plan.warm_up_iterations
        );

        for (variant_position, iteration) in plan.schedule() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let variant = &plan.variants[variant_position];
            let is_warm_up = iteration <= plan.warm_up_iterations;
            let timestamp_utc = self.clock.now_utc();
            let started = Instant::now();

            log::info!(
                "{} / {}: iteration {}/{}{}",
                variant.variant_name,
                variant.solution_name,
                iteration,
                plan.iterations,
                if is_warm_up { " (warm-up)" } else { "" }
            );

            self.collector.discard_iteration();
            let replayed = self.engine.replay(&variant.graph, &self.collector, cancel).await;

            let (duration, log_file_name, error) = match replayed {
                Ok(outcome) => {
                    let results = self.collector.take_iteration();
                    let log_file_name = self.log_file_name(variant, plan.test_type, iteration);

                    if let Some(sink) = self.sink.as_mut() {
                        if let Err(e) = sink.write_requests(&log_file_name, results.as_slice()) {
                            log::error!("Failed to write request log '{}': {}", log_file_name, e);
                        }
                    }

                    let duration = outcome.elapsed;
                    report.iterations.push(IterationReport {
                        variant_name: variant.variant_name.clone(),
                        solution_name: variant.solution_name.clone(),
                        iteration,
                        outcome,
                        results,
                    });
                    (duration, Some(log_file_name), None)
                }
                Err(Error::IterationCancelled) => {
                    self.collector.discard_iteration();
                    log::warn!("Iteration {} of {} / {} was cancelled and is discarded.", iteration, variant.variant_name, variant.solution_name);
                    report.cancelled = true;
                    break;
                }
                Err(e) => {
                    self.collector.discard_iteration();
                    log::error!("Iteration {} of {} / {} failed: {}", iteration, variant.variant_name, variant.solution_name, e);
                    (started.elapsed(), None, Some(e.to_string()))
                }
            };

            let summary = RunSummary {
                timestamp_utc,
                variant_name: variant.variant_name.clone(),
                solution_name: variant.solution_name.clone(),
                test_type: plan.test_type,
                machine_name: self.machine_name.clone(),
                test_result_index: report.summaries.len(),
                is_warm_up,
                iteration,
                iterations: plan.iterations,
                duration,
                log_file_name,
                dependencies,
                error,
            };

            if let Some(sink) = self.sink.as_mut() {
                if let Err(e) = sink.write_summary(&summary) {
                    log::error!("Failed to write run summary #{}: {}", summary.test_result_index, e);
                }
            }

            self.collector.push_summary(summary.clone());
            report.summaries.push(summary);
        }

        log::info!(
            "Benchmark run {} finished: {} iterations recorded, {} failed{}.",
            self.run_id,
            report.summaries.len(),
            report.failed_summaries().count(),
            if report.cancelled { ", cancelled" } else { "" }
        );

        Ok(report)
    }

    fn log_file_name(&self, variant: &VariantPlan, test_type: TestType, iteration: usize) -> String {
        format!(
            "{}_{}_{}_{}_{}.csv",
            sanitize(variant.variant_name.as_str()),
            sanitize(variant.solution_name.as_str()),
            test_type,
            iteration,
            self.run_id
        )
    }
}

/// Best-effort machine identity for run summaries.
pub fn machine_name_from_env() -> String {
    ["COMPUTERNAME", "HOSTNAME"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .chain(std::fs::read_to_string("/etc/hostname").ok())
        .map(|name| name.trim().to_string())
        .find(|name| !name.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

fn sanitize(name: &str) -> String {
    name.chars().map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '.') { c } else { '-' }).collect()
}
