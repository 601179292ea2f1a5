//! Agent module - roles, communities and the task loop
//!
//! Contains the logic that feeds observations to model roles, turns their
//! replies into actions and drives a task step by step.

pub mod community;
pub mod conversation;
pub mod log;
pub mod prompt;
pub mod role;
pub mod runner;
pub mod task;

pub use community::{create_community, AllInOne, Community, SeeAct, StepOutcome};
pub use conversation::Conversation;
pub use log::{LogContext, LogRecord};
pub use prompt::PromptKind;
pub use role::Agent;
pub use runner::{run_actions, Environment, StepRun};
pub use task::{StepErrorPolicy, TaskReport, TaskRunner, TaskState};
