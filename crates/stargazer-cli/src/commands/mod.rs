// Each module handles one CLI subcommand; main.rs parses and dispatches.

pub mod cache_key;
pub mod mcp;
pub mod search;
