pub mod run_orchestrator;
pub mod test_type;
