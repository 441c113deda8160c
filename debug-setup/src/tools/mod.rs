//! debug-setup MCP tools module

pub mod setup_tools;
pub mod types;

pub use setup_tools::*;
pub use types::*;
