//! Configuration for the debug-setup MCP server

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, SetupError};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "debug-setup")]
#[command(about = "MCP server that finds OpenOCD and ARM GCC and generates debug launch configurations")]
#[command(version)]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Use this OpenOCD executable instead of searching
    #[arg(long, env = "DEBUG_SETUP_OPENOCD")]
    pub openocd_path: Option<PathBuf>,

    /// Use this arm-none-eabi-gcc (or its install directory) instead of searching
    #[arg(long, env = "DEBUG_SETUP_TOOLCHAIN")]
    pub toolchain_path: Option<PathBuf>,

    /// TOML file holding saved tool paths
    #[arg(long)]
    pub settings_file: Option<PathBuf>,

    /// Default workspace to analyze
    #[arg(long)]
    pub workspace: Option<PathBuf>,

    /// Detection cache lifetime in seconds
    #[arg(long)]
    pub cache_ttl: Option<u64>,

    /// `--version` query timeout in milliseconds
    #[arg(long)]
    pub version_timeout: Option<u64>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Log file path (defaults to stderr)
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Generate default configuration file
    #[arg(long)]
    pub generate_config: bool,

    /// Show current configuration and exit
    #[arg(long)]
    pub show_config: bool,
}

/// Main configuration structure
#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub detection: DetectionConfig,
    pub generator: GeneratorConfig,
    pub workspace: WorkspaceConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct DetectionConfig {
    pub cache_ttl_seconds: u64,
    pub version_timeout_ms: u64,
    pub openocd_path: Option<PathBuf>,
    pub toolchain_path: Option<PathBuf>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: 300,
            version_timeout_ms: 3000,
            openocd_path: None,
            toolchain_path: None,
        }
    }
}

impl DetectionConfig {
    pub fn cache_ttl(&self) -> chrono::Duration {
        i64::try_from(self.cache_ttl_seconds)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }

    pub fn version_timeout(&self) -> Duration {
        Duration::from_millis(self.version_timeout_ms)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Device used when a request names none
    pub default_device: String,
    pub live_watch_samples_per_second: u32,
    pub swo_frequency_hz: u32,
    /// Executable path used when the project gives no prediction
    pub executable_fallback: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            default_device: "STM32F407VG".to_string(),
            live_watch_samples_per_second: 4,
            swo_frequency_hz: 2_000_000,
            executable_fallback: "${workspaceFolder}/build/firmware.elf".to_string(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct WorkspaceConfig {
    pub default_path: Option<PathBuf>,
    /// Where saved tool paths live; in memory only when unset
    pub settings_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from file or create default
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            let content = std::fs::read_to_string(path)
                .map_err(|e| SetupError::InvalidConfig(format!("Failed to read config file: {}", e)))?;
            let config: Config = toml::from_str(&content)
                .map_err(|e| SetupError::InvalidConfig(format!("Invalid TOML syntax: {}", e)))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Defaults overlaid with command line arguments
    pub fn from_args(args: &Args) -> Self {
        let mut config = Config::default();
        config.merge_args(args);
        config
    }

    /// Merge command line arguments into configuration
    pub fn merge_args(&mut self, args: &Args) {
        if let Some(path) = &args.openocd_path {
            self.detection.openocd_path = Some(path.clone());
        }
        if let Some(path) = &args.toolchain_path {
            self.detection.toolchain_path = Some(path.clone());
        }
        if let Some(ttl) = args.cache_ttl {
            self.detection.cache_ttl_seconds = ttl;
        }
        if let Some(timeout) = args.version_timeout {
            self.detection.version_timeout_ms = timeout;
        }
        if let Some(path) = &args.settings_file {
            self.workspace.settings_file = Some(path.clone());
        }
        if let Some(path) = &args.workspace {
            self.workspace.default_path = Some(path.clone());
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.detection.cache_ttl_seconds == 0 {
            return Err(SetupError::InvalidConfig("detection.cache_ttl_seconds must be > 0".to_string()));
        }
        if self.detection.version_timeout_ms == 0 {
            return Err(SetupError::InvalidConfig("detection.version_timeout_ms must be > 0".to_string()));
        }
        if self.generator.live_watch_samples_per_second == 0 {
            return Err(SetupError::InvalidConfig(
                "generator.live_watch_samples_per_second must be > 0".to_string(),
            ));
        }
        if self.generator.swo_frequency_hz == 0 {
            return Err(SetupError::InvalidConfig("generator.swo_frequency_hz must be > 0".to_string()));
        }
        if self.generator.default_device.trim().is_empty() {
            return Err(SetupError::InvalidConfig("generator.default_device must not be empty".to_string()));
        }
        Ok(())
    }

    /// Generate TOML configuration string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| SetupError::InvalidConfig(format!("Failed to serialize config: {}", e)))
    }
}
