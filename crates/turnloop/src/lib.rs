//! An out-of-the-box agent that assembles the built-in tools and a model
//! provider.
//!
//! The crate includes a CLI tool for using in the terminal. And you can also
//! use it as a library to bring agent functionality into your own host apps.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod config;
mod session;
pub mod tools;

pub use config::ToolsConfig;
pub use session::{Session, SessionBuilder};

/// Re-exports of [`turnloop_core`] crate.
pub mod core {
    pub use turnloop_core::*;
}
