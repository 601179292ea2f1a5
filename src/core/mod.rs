//! Core module - shared infrastructure for Screenwright
//!
//! This module contains foundational types, configuration, and error handling
//! used throughout the crate.

pub mod config;
pub mod error;
pub mod types;

pub use config::{
    ActorMode, AgentConfig, CommunityConfig, Config, GrounderDialect, ModelConfig, RetryConfig,
    Topology, WireStyle,
};
pub use error::{Result, ScreenwrightError};
pub use types::*;
