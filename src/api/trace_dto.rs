use serde::{Deserialize, Serialize};

/// One recorded client call, as written by the capture tooling.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TraceEntryDto {
    /// Timestamp or sequence number of the observation. Must be non-decreasing across the trace.
    pub order: u64,
    pub kind: String,
    pub address: String,

    /// Positions (0-based) of earlier entries this call followed from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<Vec<usize>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}
