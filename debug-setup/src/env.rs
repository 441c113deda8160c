//! Host environment access
//!
//! Detection never reads `std::env` directly. Everything goes through an
//! [`EnvSource`] so tests can run against a synthetic environment, and
//! through a [`Platform`] value so Windows naming rules can be exercised on
//! any host.

use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// Read-only view of environment variables and the user's home directory
pub trait EnvSource: Send + Sync {
    /// Value of an environment variable, `None` when unset or not UTF-8
    fn var(&self, key: &str) -> Option<String>;

    /// Home directory of the current user
    fn home_dir(&self) -> Option<PathBuf>;
}

/// The real process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    fn home_dir(&self) -> Option<PathBuf> {
        self.var("HOME")
            .or_else(|| self.var("USERPROFILE"))
            .filter(|h| !h.is_empty())
            .map(PathBuf::from)
    }
}

/// A synthetic environment backed by a map
#[derive(Debug, Clone, Default)]
pub struct MapEnv {
    vars: HashMap<String, String>,
    home: Option<PathBuf>,
}

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }
}

impl EnvSource for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }

    fn home_dir(&self) -> Option<PathBuf> {
        self.home.clone()
    }
}

/// Host operating system family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
}

impl Platform {
    /// Platform this binary was compiled for
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Linux
        }
    }

    pub fn exe_suffix(self) -> &'static str {
        match self {
            Platform::Windows => ".exe",
            _ => "",
        }
    }

    /// Separator used inside the PATH variable
    pub fn path_list_separator(self) -> char {
        match self {
            Platform::Windows => ';',
            _ => ':',
        }
    }

    /// Command that resolves an executable name through PATH
    pub fn lookup_command(self) -> &'static str {
        match self {
            Platform::Windows => "where",
            _ => "which",
        }
    }

    /// Platform-correct executable file name for a tool
    pub fn executable_name(self, tool: &str) -> String {
        let suffix = self.exe_suffix();
        if suffix.is_empty() || tool.to_ascii_lowercase().ends_with(suffix) {
            tool.to_string()
        } else {
            format!("{}{}", tool, suffix)
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Windows => write!(f, "Windows"),
            Platform::MacOs => write!(f, "macOS"),
            Platform::Linux => write!(f, "Linux"),
        }
    }
}
