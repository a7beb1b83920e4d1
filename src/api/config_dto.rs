use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkConfigDto {
    pub target_base_url: String,

    #[serde(default = "default_method")]
    pub method: String,

    /// Absent means "derive from the observed peak concurrency of each graph".
    #[serde(default)]
    pub max_concurrency: Option<usize>,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_iterations")]
    pub iterations: usize,

    #[serde(default)]
    pub warm_up_iterations: usize,

    #[serde(default = "default_test_type")]
    pub test_type: String,

    /// `false` replays every call at once, ignoring dependency edges.
    #[serde(default = "default_true")]
    pub dependencies: bool,

    #[serde(default)]
    pub interleave_variants: bool,

    #[serde(default)]
    pub fail_fast: bool,

    #[serde(default)]
    pub max_consecutive_failures: Option<usize>,

    #[serde(default)]
    pub machine_name: Option<String>,

    #[serde(default = "default_output_directory")]
    pub output_directory: String,

    pub variants: Vec<VariantDto>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct VariantDto {
    pub name: String,
    pub solution: String,
    pub trace_path: String,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_iterations() -> usize {
    1
}

fn default_test_type() -> String {
    "warm".to_string()
}

fn default_true() -> bool {
    true
}

fn default_output_directory() -> String {
    "results".to_string()
}
