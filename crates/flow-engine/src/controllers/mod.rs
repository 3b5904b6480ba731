pub mod agent_controller;
pub mod system_controller;
pub mod task_run_controller;
pub mod workflow_run_controller;
