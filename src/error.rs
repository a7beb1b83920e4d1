use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("File not found or could not be read: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    DeserializationError(#[from] serde_json::Error),

    #[error("Failed to read or write CSV: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Failed to build HTTP client: {0}")]
    HttpClientError(#[from] reqwest::Error),

    #[error("Invalid configuration: {0}")]
    ConfigurationError(String),

    /// The trace (or a persisted graph) violates ordering or dependency rules.
    #[error("Malformed trace entry #{index} (kind '{kind}', address '{address}'): {reason}")]
    MalformedTraceError { index: usize, kind: String, address: String, reason: String },

    /// Dependency inference could not classify an entry. Reported as a warning, the node becomes a root.
    #[error("Unknown operation kind '{kind}' at trace entry #{index} (address '{address}'); treating it as a root")]
    UnknownOperationKindError { index: usize, kind: String, address: String },

    #[error("Call to '{url}' failed: {reason}")]
    CallTransportError { url: String, reason: String },

    #[error("Iteration aborted: {0}")]
    IterationAbortedError(String),

    #[error("Iteration cancelled before all nodes completed")]
    IterationCancelled,
}

impl Error {
    pub fn malformed(index: usize, kind: impl Into<String>, address: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::MalformedTraceError { index, kind: kind.into(), address: address.into(), reason: reason.into() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
