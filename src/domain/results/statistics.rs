use std::collections::BTreeMap;
use std::fmt;

use crate::domain::results::records::RunSummary;
use crate::domain::utils::id::{SolutionName, VariantName};

/// Headline timing for one (variant, solution) pair.
///
/// Only measured iterations count: warm-ups and failed iterations are
/// excluded from the duration figures but reported in the counters.
#[derive(Debug, Clone, PartialEq)]
pub struct RunStatistics {
    pub variant_name: VariantName,
    pub solution_name: SolutionName,
    pub measured_iterations: usize,
    pub warm_up_iterations: usize,
    pub failed_iterations: usize,
    pub mean_ms: Option<f64>,
    pub median_ms: Option<f64>,
    pub min_ms: Option<f64>,
    pub max_ms: Option<f64>,
}

impl RunStatistics {
    /// One entry per (variant, solution), ordered by variant then solution name.
    pub fn from_summaries(summaries: &[RunSummary]) -> Vec<RunStatistics> {
        let mut groups: BTreeMap<(VariantName, SolutionName), Vec<&RunSummary>> = BTreeMap::new();
        for summary in summaries {
            groups.entry((summary.variant_name.clone(), summary.solution_name.clone())).or_default().push(summary);
        }

        groups
            .into_iter()
            .map(|((variant_name, solution_name), group)| {
                let warm_up_iterations = group.iter().filter(|s| s.is_warm_up).count();
                let failed_iterations = group.iter().filter(|s| s.is_failed()).count();

                let mut durations: Vec<f64> =
                    group.iter().filter(|s| !s.is_warm_up && !s.is_failed()).map(|s| s.duration.as_secs_f64() * 1000.0).collect();
                durations.sort_by(|a, b| a.total_cmp(b));

                RunStatistics {
                    variant_name,
                    solution_name,
                    measured_iterations: durations.len(),
                    warm_up_iterations,
                    failed_iterations,
                    mean_ms: mean(&durations),
                    median_ms: median(&durations),
                    min_ms: durations.first().copied(),
                    max_ms: durations.last().copied(),
                }
            })
            .collect()
    }
}

impl fmt::Display for RunStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: Option<f64>| v.map(|ms| format!("{:.1}ms", ms)).unwrap_or_else(|| "n/a".to_string());
        write!(
            f,
            "{} / {}: {} measured ({} warm-up, {} failed), mean {}, median {}, min {}, max {}",
            self.variant_name,
            self.solution_name,
            self.measured_iterations,
            self.warm_up_iterations,
            self.failed_iterations,
            show(self.mean_ms),
            show(self.median_ms),
            show(self.min_ms),
            show(self.max_ms)
        )
    }
}

fn mean(sorted: &[f64]) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    Some(sorted.iter().sum::<f64>() / sorted.len() as f64)
}

fn median(sorted: &[f64]) -> Option<f64> {
    let len = sorted.len();
    match len {
        0 => None,
        _ if len % 2 == 1 => Some(sorted[len / 2]),
        _ => Some((sorted[len / 2 - 1] + sorted[len / 2]) / 2.0),
    }
}
