pub mod loader;
pub mod schema;

pub use loader::{
    apply_plan_command_override, find_config, load_for_root, load_from_path, load_from_str,
    user_config_path, ConfigError, PLAN_COMMAND_ENV, PROJECT_CONFIG_FILE,
};
pub use schema::{
    AgentConfig, BackupSection, ContextSection, PlanSection, ScanSection, ValidationError,
    ValidationIssue,
};
