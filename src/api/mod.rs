pub mod config_dto;
pub mod graph_dto;
pub mod trace_dto;
