//! CLI module - command-line interface
//!
//! Offline helpers for inspecting how model replies are decoded.

pub mod commands;

pub use commands::{config_command, decode_command, dispatch_command, ConfigAction};
