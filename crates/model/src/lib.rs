//! An abstraction layer for different LLMs.
//!
//! This crate establishes an unified protocol for the agent to interact
//! with various supported chat models, so that the agent can seamlessly
//! switch between them without modifying the core codebase.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to. The one exception
//! is [`Turn`], which is the canonical message shape shared by every
//! provider and also acts as an already-normalized [`ModelResponse`].

#![deny(missing_docs)]

mod error;
mod provider;
mod request;
mod response;
mod turn;

pub use error::*;
pub use provider::*;
pub use request::*;
pub use response::*;
pub use turn::*;
