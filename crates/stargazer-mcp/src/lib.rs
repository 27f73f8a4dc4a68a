//! MCP (Model Context Protocol) server for stargazing site search
//!
//! Exposes the site search to AI assistants over JSON-RPC 2.0.
//!
//! # Architecture
//!
//! - `server`: server state and method dispatch
//! - `tools`: the `analysis_area` tool
//! - `resources`: cache status and dataset info
//! - `prompts`: prompt templates
//! - `error`: error object carried in JSON-RPC errors
//!
//! # Transport
//!
//! The crate is transport-agnostic: feed it one line at a time with
//! [`McpServerState::handle_line`]. The CLI's `mcp` command runs it over
//! stdio and keeps all logging on stderr so stdout carries only protocol
//! frames.

#![deny(warnings)]

pub mod error;
pub mod prompts;
pub mod resources;
pub mod server;
pub mod tools;
pub mod types;

#[cfg(test)]
mod test_support;

pub use error::{Error, Result};
pub use server::{McpServerState, PROTOCOL_VERSION};
