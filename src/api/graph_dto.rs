use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GraphDto {
    pub nodes: Vec<GraphNodeDto>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GraphNodeDto {
    pub hit_index: usize,
    pub kind: String,
    pub address: String,

    /// HitIndex values of the prerequisite nodes.
    #[serde(default)]
    pub dependencies: Vec<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}
