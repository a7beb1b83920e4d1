use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::domain::graph::graph::Graph;
use crate::domain::replay::executor::{CallOutcome, RequestExecutor};
use crate::domain::replay::options::ReplayOptions;
use crate::domain::results::collector::ResultCollector;
use crate::domain::results::records::{RequestRecord, TRANSPORT_FAILURE_STATUS};
use crate::error::{Error, Result};

/// Target for the structured per-call events.
pub const CALLS_TARGET: &str = "replay::calls";

/// Summary of one fully replayed iteration. The records themselves go to the [`ResultCollector`].
#[derive(Debug, Clone, PartialEq)]
pub struct IterationOutcome {
    pub completed: usize,
    pub failed: usize,
    pub elapsed: Duration,
    pub concurrency_limit: usize,
    pub peak_in_flight: usize,
}

/// What a worker reports back to the coordinator.
#[derive(Debug)]
struct Completion {
    position: usize,
    failed: bool,
    transport_failure: bool,
}

/// Replays a [`Graph`] against the target, one iteration per call to [`ReplayEngine::replay`].
///
/// The coordinator (the task running `replay`) owns the ready set, the
/// outstanding-dependency counters and the in-flight set; workers only issue
/// their call, push the record and report completion. Ready nodes are
/// admitted smallest `HitIndex` first.
#[derive(Debug, Clone)]
pub struct ReplayEngine {
    executor: Arc<dyn RequestExecutor>,
    options: ReplayOptions,
}

impl ReplayEngine {
    pub fn new(executor: Arc<dyn RequestExecutor>, options: ReplayOptions) -> Self {
        ReplayEngine { executor, options }
    }

    pub fn options(&self) -> &ReplayOptions {
        &self.options
    }

    /// Executes every node of `graph` exactly once.
    ///
    /// Returns [`Error::IterationCancelled`] if `cancel` fires before all nodes
    /// completed (in-flight calls are allowed to finish or time out first), and
    /// [`Error::IterationAbortedError`] when the fail-fast or consecutive-failure
    /// limits trip, or when no call reached the target at all. Failed calls are
    /// otherwise just records: they still unblock their dependents.
    pub async fn replay(&self, graph: &Graph, collector: &ResultCollector, cancel: &CancellationToken) -> Result<IterationOutcome> {
        let node_count = graph.len();
        let respect_dependencies = self.options.respect_dependencies;
        let limit = self.options.concurrency.resolve(graph, respect_dependencies);
        let iteration_start = Instant::now();

        let mut pending: Vec<usize> =
            (0..node_count).map(|p| if respect_dependencies { graph.dependency_positions(p).len() } else { 0 }).collect();
        let mut ready: BinaryHeap<Reverse<usize>> = (0..node_count).filter(|&p| pending[p] == 0).map(Reverse).collect();
        let mut in_flight: JoinSet<Completion> = JoinSet::new();

        let mut completed = 0;
        let mut failed = 0;
        let mut transport_failures = 0;
        let mut consecutive_transport_failures = 0;
        let mut peak_in_flight = 0;
        let mut cancellation_logged = false;

        log::info!(
            "Replaying {} nodes against '{}' (concurrency limit {}, dependencies {}).",
            node_count,
            self.options.base_url,
            limit,
            if respect_dependencies { "respected" } else { "ignored" }
        );

        while completed < node_count {
            if cancel.is_cancelled() {
                if !cancellation_logged {
                    log::warn!("Cancellation requested; no further nodes are admitted ({} in flight).", in_flight.len());
                    cancellation_logged = true;
                }
            } else {
                while in_flight.len() < limit {
                    let Some(Reverse(position)) = ready.pop() else { break };
                    self.spawn_node(&mut in_flight, graph, position, iteration_start, collector);
                }
                peak_in_flight = peak_in_flight.max(in_flight.len());
            }

            if in_flight.is_empty() {
                break;
            }

            let joined = if cancel.is_cancelled() {
                in_flight.join_next().await
            } else {
                tokio::select! {
                    joined = in_flight.join_next() => joined,
                    _ = cancel.cancelled() => continue,
                }
            };

            let completion = match joined {
                Some(Ok(completion)) => completion,
                Some(Err(e)) => {
                    in_flight.shutdown().await;
                    return Err(Error::IterationAbortedError(format!("replay worker failed: {}", e)));
                }
                None => break,
            };

            completed += 1;
            if completion.failed {
                failed += 1;
            }
            if completion.transport_failure {
                transport_failures += 1;
            }
            consecutive_transport_failures = if completion.transport_failure { consecutive_transport_failures + 1 } else { 0 };

            if let Some(reason) = self.abort_reason(&completion, consecutive_transport_failures) {
                log::error!("Aborting iteration after {} of {} nodes: {}", completed, node_count, reason);
                in_flight.shutdown().await;
                return Err(Error::IterationAbortedError(reason));
            }

            if respect_dependencies {
                for &dependent in graph.dependents(completion.position) {
                    pending[dependent] -= 1;
                    if pending[dependent] == 0 {
                        ready.push(Reverse(dependent));
                    }
                }
            }
        }

        if completed < node_count {
            if cancel.is_cancelled() {
                return Err(Error::IterationCancelled);
            }
            return Err(Error::IterationAbortedError(format!("replay stalled with {} of {} nodes completed", completed, node_count)));
        }

        if node_count > 0 && transport_failures == node_count {
            log::error!("None of the {} calls reached '{}'.", node_count, self.options.base_url);
            return Err(Error::IterationAbortedError(format!("target unreachable: all {} calls failed before a response", node_count)));
        }

        let elapsed = iteration_start.elapsed();
        log::info!("Replayed {} nodes in {:.1}ms ({} failed, peak {} in flight).", completed, elapsed.as_secs_f64() * 1000.0, failed, peak_in_flight);

        Ok(IterationOutcome { completed, failed, elapsed, concurrency_limit: limit, peak_in_flight })
    }

    fn abort_reason(&self, completion: &Completion, consecutive_transport_failures: usize) -> Option<String> {
        if self.options.fail_fast && completion.failed {
            return Some(format!("node at position {} failed and fail-fast is enabled", completion.position));
        }
        match self.options.max_consecutive_failures {
            Some(max) if max > 0 && consecutive_transport_failures >= max => {
                Some(format!("{} consecutive calls failed to reach the target", consecutive_transport_failures))
            }
            _ => None,
        }
    }

    fn spawn_node(&self, in_flight: &mut JoinSet<Completion>, graph: &Graph, position: usize, iteration_start: Instant, collector: &ResultCollector) {
        let node = &graph.nodes()[position];
        let hit_index = node.hit_index;
        let url = self.options.resolve_url(node.operation.address());
        let method = self.options.method.clone();
        let timeout = self.options.timeout;
        let executor = Arc::clone(&self.executor);
        let collector = collector.clone();

        in_flight.spawn(async move {
            let start_sequence = collector.next_sequence();
            let started_at = iteration_start.elapsed();

            let outcome = match tokio::time::timeout(timeout, executor.execute(&method, &url)).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    let error = Error::CallTransportError { url: url.clone(), reason: format!("timed out after {}ms", timeout.as_millis()) };
                    CallOutcome::transport_failure(&error, timeout, timeout)
                }
            };
            let completed_at = iteration_start.elapsed();

            let record = RequestRecord {
                hit_index,
                url,
                status_code: outcome.status.unwrap_or(TRANSPORT_FAILURE_STATUS),
                header_duration: outcome.header_duration,
                body_duration: outcome.body_duration,
                started_at,
                completed_at,
                start_sequence,
                completion_sequence: 0,
                error: outcome.error,
            };

            tracing::debug!(
                target: CALLS_TARGET,
                HitIndex = hit_index,
                Url = %record.url,
                StatusCode = record.status_code,
                HeaderDurationMs = record.header_duration.as_secs_f64() * 1000.0,
                BodyDurationMs = record.body_duration.as_secs_f64() * 1000.0,
                Error = record.error.as_deref().unwrap_or(""),
            );

            let completion = Completion { position, failed: !record.is_success(), transport_failure: record.is_transport_failure() };
            collector.record(record);
            completion
        });
    }
}
