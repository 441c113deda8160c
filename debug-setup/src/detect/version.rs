//! `--version` query and ToolInfo construction

use chrono::{DateTime, Utc};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::SetupError;
use crate::paths::install_root_of;
use crate::process::CommandRunner;

use super::{arm_gcc, openocd, ToolInfo, ToolKind};

fn semver_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b(\d+)\.(\d+)\.(\d+)").expect("static regex"))
}

/// First `MAJOR.MINOR.PATCH` in `text`
pub fn extract_semver(text: &str) -> Option<String> {
    semver_pattern().find(text).map(|m| m.as_str().to_string())
}

fn host_triple() -> String {
    format!("{}-{}", std::env::consts::ARCH, std::env::consts::OS)
}

/// ToolInfo with every field that can't be derived set to its default
pub fn default_tool_info(kind: ToolKind, executable: &Path, as_of: DateTime<Utc>) -> ToolInfo {
    let target_triple = match kind {
        ToolKind::OpenOcd => host_triple(),
        ToolKind::CrossCompiler => executable
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(arm_gcc::triple_from_executable_name)
            .unwrap_or_else(|| arm_gcc::DEFAULT_TRIPLE.to_string()),
    };
    ToolInfo {
        version: ToolInfo::UNKNOWN_VERSION.to_string(),
        primary_executable_path: executable.to_path_buf(),
        install_root: install_root_of(executable),
        target_triple,
        vendor: None,
        as_of,
    }
}

/// Build ToolInfo from the first line of `--version` output
pub fn parse_tool_info(kind: ToolKind, line: &str, executable: &Path, as_of: DateTime<Utc>) -> ToolInfo {
    let mut info = default_tool_info(kind, executable, as_of);
    match kind {
        ToolKind::OpenOcd => {
            let (version, vendor) = openocd::parse_version_line(line);
            if let Some(version) = version {
                info.version = version;
            }
            info.vendor = vendor;
        }
        ToolKind::CrossCompiler => {
            let parsed = arm_gcc::parse_version_line(line);
            if let Some(version) = parsed.version {
                info.version = version;
            }
            if let Some(triple) = parsed.target_triple {
                info.target_triple = triple;
            }
            info.vendor = parsed.vendor;
        }
    }
    info
}

/// Run `<exe> --version` under a hard timeout.
///
/// Any failure (spawn error, timeout, empty output) yields default info with
/// version `"Unknown"`; it never turns a found tool into a failed detection.
pub async fn query_tool_info(
    runner: &dyn CommandRunner,
    kind: ToolKind,
    executable: &Path,
    timeout: Duration,
    as_of: DateTime<Utc>,
) -> ToolInfo {
    match runner.run(executable, &["--version"], None, timeout).await {
        Ok(output) => match output.first_line() {
            Some(line) => {
                debug!("{} --version: {}", executable.display(), line);
                let info = parse_tool_info(kind, line, executable, as_of);
                if !info.has_version() {
                    warn!("Could not parse version from '{}'", line);
                }
                info
            }
            None => {
                warn!("{} --version produced no output", executable.display());
                default_tool_info(kind, executable, as_of)
            }
        },
        Err(SetupError::CommandTimeout(after)) => {
            warn!("{} --version timed out after {:?}", executable.display(), after);
            default_tool_info(kind, executable, as_of)
        }
        Err(e) => {
            warn!("Version query failed for {}: {}", executable.display(), e);
            default_tool_info(kind, executable, as_of)
        }
    }
}
