//! Plans: what the plan producer is asked for and what it hands back.
//!
//! A plan is untrusted text. [`parse_plan`] extracts the JSON object and
//! coerces every field to its expected shape; [`PlanSource`] abstracts where
//! the text comes from.

pub mod parser;
pub mod prompt;
pub mod schema;
pub mod source;

pub use parser::{extract_json, parse_plan, PlanError};
pub use prompt::{build_system_prompt, build_user_prompt, PlanRequest, DEFAULT_LIST_LIMIT};
pub use schema::{AgentPlan, FileToEdit, PLAN_JSON_SCHEMA};
pub use source::{
    CommandPlanSource, FilePlanSource, PlanSource, PlanSourceError, StaticPlanSource,
};
