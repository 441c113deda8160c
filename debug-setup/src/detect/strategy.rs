//! Detection strategies and per-tool search tables

use serde::Serialize;

use super::ToolKind;

/// Where a tool was found. Declaration order is the order strategies run in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Path configured explicitly by the user
    UserOverride,
    /// Tool-specific environment variable
    EnvironmentVariable,
    /// Direct scan of the PATH directories
    PathScan,
    /// `which` / `where` subprocess
    LookupCommand,
    /// Well-known installation directory
    CommonLocation,
}

impl Strategy {
    pub const ORDER: [Strategy; 5] = [
        Strategy::UserOverride,
        Strategy::EnvironmentVariable,
        Strategy::PathScan,
        Strategy::LookupCommand,
        Strategy::CommonLocation,
    ];
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Strategy::UserOverride => "user override",
            Strategy::EnvironmentVariable => "environment variable",
            Strategy::PathScan => "PATH scan",
            Strategy::LookupCommand => "lookup command",
            Strategy::CommonLocation => "common location",
        };
        f.write_str(s)
    }
}

/// What to search for and where
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub kind: ToolKind,
    /// Executable base name without platform suffix
    pub executable: String,
    /// Environment variables in priority order; each names a file, a root
    /// or a root with a `bin/` directory
    pub env_vars: Vec<String>,
    /// Path templates (`~`, `${VAR}`, `%VAR%` and `*` allowed)
    pub common_locations: Vec<String>,
}

impl ToolSpec {
    pub fn new(kind: ToolKind, executable: impl Into<String>) -> Self {
        Self {
            kind,
            executable: executable.into(),
            env_vars: Vec::new(),
            common_locations: Vec::new(),
        }
    }

    pub fn with_env_vars<I, S>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.env_vars = vars.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_common_locations<I, S>(mut self, locations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.common_locations = locations.into_iter().map(Into::into).collect();
        self
    }
}
