pub mod graph;
pub mod operation;
pub mod orchestrator;
pub mod replay;
pub mod results;
pub mod trace;
pub mod utils;
