pub mod builder;
pub mod graph;
pub mod node;
