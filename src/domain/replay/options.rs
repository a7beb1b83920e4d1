use std::time::Duration;

use reqwest::Method;

use crate::domain::graph::graph::Graph;

/// How many nodes may be in flight at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcurrencyPolicy {
    /// The graph's observed peak natural concurrency.
    Observed,
    Fixed(usize),
}

impl ConcurrencyPolicy {
    /// The bound to enforce for `graph`. Never less than 1.
    pub fn resolve(&self, graph: &Graph, respect_dependencies: bool) -> usize {
        match self {
            ConcurrencyPolicy::Observed => graph.observed_peak_concurrency(respect_dependencies),
            ConcurrencyPolicy::Fixed(limit) => (*limit).max(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReplayOptions {
    pub base_url: String,
    pub method: Method,
    pub concurrency: ConcurrencyPolicy,

    /// Upper bound for a single call, headers and body included.
    pub timeout: Duration,

    /// `false` replays every node immediately (naive full-concurrency replay).
    pub respect_dependencies: bool,

    /// Abort the iteration on the first failed call.
    pub fail_fast: bool,

    /// Abort the iteration after this many transport failures in a row.
    pub max_consecutive_failures: Option<usize>,
}

impl ReplayOptions {
    pub fn new(base_url: impl Into<String>) -> Self {
        ReplayOptions {
            base_url: base_url.into(),
            method: Method::GET,
            concurrency: ConcurrencyPolicy::Observed,
            timeout: Duration::from_secs(30),
            respect_dependencies: true,
            fail_fast: false,
            max_consecutive_failures: None,
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_concurrency(mut self, concurrency: ConcurrencyPolicy) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_dependencies(mut self, respect_dependencies: bool) -> Self {
        self.respect_dependencies = respect_dependencies;
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn with_max_consecutive_failures(mut self, max_consecutive_failures: Option<usize>) -> Self {
        self.max_consecutive_failures = max_consecutive_failures;
        self
    }

    pub fn resolve_url(&self, address: &str) -> String {
        resolve_url(&self.base_url, address)
    }
}

/// `base + address`, with exactly one `/` between them. Absolute addresses are returned unchanged.
pub fn resolve_url(base_url: &str, address: &str) -> String {
    if address.starts_with("http://") || address.starts_with("https://") {
        return address.to_string();
    }

    let base = base_url.trim_end_matches('/');
    if address.is_empty() {
        base.to_string()
    } else if address.starts_with('/') {
        format!("{}{}", base, address)
    } else {
        format!("{}/{}", base, address)
    }
}
