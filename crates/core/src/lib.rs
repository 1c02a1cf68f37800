//! Core logic including the agent loop, tool execution, message
//! normalization and configuration.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod agent;
pub mod conversation;
pub mod format;
mod model_client;
pub mod tool;

pub use agent::{
    Agent, AgentBuilder, AgentStage, RunError, RunErrorKind, RunOptions,
    RunOutput,
};
pub use model_client::RetryPolicy;
