#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use restore_replay::domain::graph::graph::Graph;
use restore_replay::domain::trace::TraceEntry;
use restore_replay::{CallOutcome, Error, RequestExecutor, build_graph};

/// Behaviour of the mock target for one address.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Response {
    Status(u16),
    Unreachable,

    /// Answers 200, but only after ten seconds.
    Hang,
}

/// In-memory target. Matches addresses by URL suffix and tracks how many calls overlap.
#[derive(Debug)]
pub struct MockExecutor {
    delay: Duration,
    responses: HashMap<String, Response>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

impl MockExecutor {
    pub fn new(delay: Duration) -> Self {
        MockExecutor {
            delay,
            responses: HashMap::new(),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn respond(mut self, address: &str, response: Response) -> Self {
        self.responses.insert(address.to_string(), response);
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn response_for(&self, url: &str) -> Response {
        self.responses.iter().find(|(address, _)| url.ends_with(address.as_str())).map(|(_, r)| *r).unwrap_or(Response::Status(200))
    }
}

#[async_trait]
impl RequestExecutor for MockExecutor {
    async fn execute(&self, _method: &Method, url: &str) -> CallOutcome {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().unwrap().push(url.to_string());

        let response = self.response_for(url);
        let delay = if response == Response::Hang { Duration::from_secs(10) } else { self.delay };
        tokio::time::sleep(delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match response {
            Response::Status(status) => CallOutcome::response(status, self.delay / 2, self.delay),
            Response::Hang => CallOutcome::response(200, delay, delay),
            Response::Unreachable => {
                let error = Error::CallTransportError { url: url.to_string(), reason: "connection refused".to_string() };
                CallOutcome::transport_failure(&error, self.delay, self.delay)
            }
        }
    }
}

pub const BASE_URL: &str = "http://feed.test";

/// registration(a) -> download(a), plus an unrelated registration(b).
pub fn scenario_graph() -> Graph {
    let trace = vec![
        TraceEntry::new(0, "registration", "/a/index.json"),
        TraceEntry::new(1, "download", "/a/1.0.0.nupkg").with_dependencies(vec![0]),
        TraceEntry::new(2, "registration", "/b/index.json"),
    ];
    build_graph(&trace).unwrap().graph
}

/// `count` independent roots.
pub fn flat_graph(count: usize) -> Graph {
    let trace: Vec<TraceEntry> =
        (0..count).map(|i| TraceEntry::new(i as u64, "registration", format!("/p{}/index.json", i)).with_dependencies(Vec::new())).collect();
    build_graph(&trace).unwrap().graph
}

/// 0 -> 1 -> 2 -> ... -> count-1.
pub fn chain_graph(count: usize) -> Graph {
    let trace: Vec<TraceEntry> = (0..count)
        .map(|i| {
            let depends_on = if i == 0 { Vec::new() } else { vec![i - 1] };
            TraceEntry::new(i as u64, "registration-page", format!("/reg/p/page{}.json", i)).with_dependencies(depends_on)
        })
        .collect();
    build_graph(&trace).unwrap().graph
}
