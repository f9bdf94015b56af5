//! `coach-agent`: async HTTP clients for the coaching chat workflow and the
//! serverless function boundary.
//!
//! ```text
//! WebhookClient::send(ChatRequest)          → POST webhook_url   → ChatResponse
//! FunctionsClient::invoke(action, data)     → POST functions_url → data | AgentError::Function
//! ```
//!
//! Both clients share one timeout and never retry on their own; callers can
//! ask [`AgentError::is_transient`] whether a retry makes sense.

pub mod client;
pub mod error;
pub mod types;


pub use client::{FunctionsClient, WebhookClient};
pub use error::AgentError;
pub use types::{ChatRequest, ChatResponse, FunctionRequest, FunctionResponse};

pub type Result<T> = std::result::Result<T, AgentError>;
