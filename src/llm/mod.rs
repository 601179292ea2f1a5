//! LLM module - model transports and the message model
//!
//! Provides the transport abstraction, its HTTP implementation, and the
//! per-dialect wire form of messages.

pub mod http;
pub mod message;
pub mod traits;

pub use http::{HttpTransport, RetryPolicy};
pub use message::{fill_template, ContentItem, Message, Redaction, Role, PLACEHOLDER};
pub use traits::{access_message, ModelTransport, RawResponse};
