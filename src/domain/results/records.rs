use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::domain::orchestrator::test_type::TestType;
use crate::domain::utils::id::{SolutionName, VariantName};

/// Status code written for calls that never produced an HTTP response.
pub const TRANSPORT_FAILURE_STATUS: u16 = 0;

/// A record type that can be written as one CSV row.
///
/// `headers()` defines the column order; `to_row()` must return the values in that order.
pub trait CsvRecord {
    fn headers() -> &'static [&'static str];
    fn to_row(&self) -> Vec<String>;
}

/// Outcome of one replayed node in one iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestRecord {
    pub hit_index: usize,
    pub url: String,

    /// HTTP status, or [`TRANSPORT_FAILURE_STATUS`] on connect/timeout/read failures.
    pub status_code: u16,

    /// From sending the request until the response headers arrived.
    pub header_duration: Duration,

    /// From sending the request until the body was fully drained.
    pub body_duration: Duration,

    /// Offsets from the start of the iteration.
    pub started_at: Duration,
    pub completed_at: Duration,

    /// Positions on the iteration's single start/completion event counter.
    pub start_sequence: u64,
    pub completion_sequence: u64,

    pub error: Option<String>,
}

impl RequestRecord {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    pub fn is_transport_failure(&self) -> bool {
        self.status_code == TRANSPORT_FAILURE_STATUS
    }
}

impl CsvRecord for RequestRecord {
    fn headers() -> &'static [&'static str] {
        &["Url", "StatusCode", "HeaderDurationMs", "BodyDurationMs"]
    }

    fn to_row(&self) -> Vec<String> {
        vec![self.url.clone(), self.status_code.to_string(), format_ms(self.header_duration), format_ms(self.body_duration)]
    }
}

/// One completed (or failed) iteration of a full graph replay.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub timestamp_utc: DateTime<Utc>,
    pub variant_name: VariantName,
    pub solution_name: SolutionName,
    pub test_type: TestType,
    pub machine_name: String,
    pub test_result_index: usize,
    pub is_warm_up: bool,

    /// 1-based.
    pub iteration: usize,
    pub iterations: usize,
    pub duration: Duration,

    /// Request log for this iteration; `None` when the iteration failed.
    pub log_file_name: Option<String>,

    /// Whether dependency-aware scheduling (rather than naive full-concurrency replay) was used.
    pub dependencies: bool,

    /// Failure marker. `None` for successful iterations.
    pub error: Option<String>,
}

impl RunSummary {
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

impl CsvRecord for RunSummary {
    fn headers() -> &'static [&'static str] {
        &[
            "TimestampUtc",
            "VariantName",
            "SolutionName",
            "TestType",
            "MachineName",
            "TestResultIndex",
            "IsWarmUp",
            "Iteration",
            "Iterations",
            "DurationMs",
            "LogFileName",
            "Dependencies",
            "Error",
        ]
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.timestamp_utc.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.variant_name.to_string(),
            self.solution_name.to_string(),
            self.test_type.to_string(),
            self.machine_name.clone(),
            self.test_result_index.to_string(),
            self.is_warm_up.to_string(),
            self.iteration.to_string(),
            self.iterations.to_string(),
            format_ms(self.duration),
            self.log_file_name.clone().unwrap_or_default(),
            self.dependencies.to_string(),
            self.error.clone().unwrap_or_default(),
        ]
    }
}

fn format_ms(duration: Duration) -> String {
    format!("{:.3}", duration.as_secs_f64() * 1000.0)
}
