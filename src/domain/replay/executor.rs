use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use tokio::time::Instant;

use crate::error::{Error, Result};

/// What a single replayed call produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CallOutcome {
    /// `None` when no response was received.
    pub status: Option<u16>,
    pub header_duration: Duration,
    pub body_duration: Duration,
    pub error: Option<String>,
}

impl CallOutcome {
    pub fn response(status: u16, header_duration: Duration, body_duration: Duration) -> Self {
        CallOutcome { status: Some(status), header_duration, body_duration, error: None }
    }

    /// A call that failed below HTTP (connect, timeout, broken body).
    pub fn transport_failure(error: &Error, header_duration: Duration, body_duration: Duration) -> Self {
        CallOutcome { status: None, header_duration, body_duration, error: Some(error.to_string()) }
    }
}

/// Issues one replayed call. The scheduler only talks to the target through this trait.
#[async_trait]
pub trait RequestExecutor: std::fmt::Debug + Send + Sync {
    async fn execute(&self, method: &Method, url: &str) -> CallOutcome;
}

/// [`RequestExecutor`] backed by one pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    client: reqwest::Client,
}

impl HttpExecutor {
    /// Builds a client that keeps connections alive across nodes.
    /// Per-call timeouts are enforced by the replay engine, not here.
    pub fn new(max_idle_per_host: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .build()?;

        Ok(HttpExecutor { client })
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        HttpExecutor { client }
    }
}

#[async_trait]
impl RequestExecutor for HttpExecutor {
    async fn execute(&self, method: &Method, url: &str) -> CallOutcome {
        let start = Instant::now();

        let mut response = match self.client.request(method.clone(), url).send().await {
            Ok(response) => response,
            Err(e) => {
                let elapsed = start.elapsed();
                let error = Error::CallTransportError { url: url.to_string(), reason: e.to_string() };
                return CallOutcome::transport_failure(&error, elapsed, elapsed);
            }
        };
        let header_duration = start.elapsed();
        let status = response.status().as_u16();

        loop {
            match response.chunk().await {
                Ok(Some(_)) => continue,
                Ok(None) => break,
                Err(e) => {
                    let error = Error::CallTransportError { url: url.to_string(), reason: format!("failed while reading body: {}", e) };
                    return CallOutcome::transport_failure(&error, header_duration, start.elapsed());
                }
            }
        }

        CallOutcome::response(status, header_duration, start.elapsed())
    }
}
