//! Screenwright - action decoding and role orchestration for desktop agents
//!
//! Turns free-text replies of vision-language models into canonical GUI
//! actions, and sequences one or two cooperating model roles per task step.
//!
//! # Architecture
//!
//! - **Core**: Shared types, configuration, and error handling
//! - **LLM**: Message model and model transports
//! - **Decode**: One decoder per output dialect
//! - **Primitive**: Control keywords and their signals
//! - **Agent**: Roles, communities, step runner and task loop
//! - **CLI**: Offline decode/dispatch helpers
//!
//! # Usage
//!
//! ```rust,no_run
//! use screenwright::agent::{create_community, LogContext, TaskRunner};
//! use screenwright::Config;
//!
//! # fn main() -> screenwright::Result<()> {
//! let config = Config::load();
//! let log = LogContext::new();
//! let community = create_community(&config, log.clone())?;
//! let runner = TaskRunner::new(community, log).with_config(&config);
//! # let _ = runner;
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod cli;
pub mod core;
pub mod decode;
pub mod llm;
pub mod primitive;

// Re-export commonly used items
pub use agent::{Community, StepOutcome, TaskRunner};
pub use core::{Config, Result, ScreenwrightError};
pub use decode::{Action, DecodeContext, Dialect};
pub use primitive::ControlSignal;
