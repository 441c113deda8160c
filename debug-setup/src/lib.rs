//! Debug Setup MCP Server
//!
//! Finds OpenOCD and the ARM GCC cross-compiler, checks the installations,
//! and generates cortex-debug launch configurations for embedded projects.

pub mod cache;
pub mod clock;
pub mod config;
pub mod detect;
pub mod env;
pub mod error;
pub mod generator;
pub mod launch_file;
pub mod paths;
pub mod process;
pub mod project;
pub mod scan;
pub mod scripts;
pub mod service;
pub mod settings;
pub mod templates;
pub mod tools;
pub mod validate;

pub use config::{Args, Config};
pub use error::{Result, SetupError};
pub use service::DebugSetupService;
pub use tools::DebugSetupToolHandler;
