//! Toolchain detection
//!
//! One detector per tool kind, each running the same ordered strategy chain
//! (see [`strategy`]). Detectors never fail: every outcome, including "not
//! installed" and unexpected I/O errors, is folded into a [`DetectionResult`].

pub mod arm_gcc;
pub mod detector;
pub mod openocd;
pub mod strategy;
pub mod version;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use detector::{ChainDetector, DetectorContext};
pub use strategy::{Strategy, ToolSpec};

/// Kind of tool a detector looks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub enum ToolKind {
    /// On-chip debugger bridge (OpenOCD)
    #[serde(rename = "openocd")]
    OpenOcd,
    /// ARM GCC cross-compiler suite
    #[serde(rename = "cross_compiler")]
    CrossCompiler,
}

impl ToolKind {
    pub const ALL: [ToolKind; 2] = [ToolKind::OpenOcd, ToolKind::CrossCompiler];

    /// Stable identifier used in results and cache keys
    pub fn id(self) -> &'static str {
        match self {
            ToolKind::OpenOcd => "openocd",
            ToolKind::CrossCompiler => "cross_compiler",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ToolKind::OpenOcd => "OpenOCD",
            ToolKind::CrossCompiler => "ARM GCC toolchain",
        }
    }

    pub fn install_hint(self) -> &'static str {
        match self {
            ToolKind::OpenOcd => {
                "Install OpenOCD (xPack OpenOCD, `brew install open-ocd`, or `apt install openocd`) or set OPENOCD_PATH"
            }
            ToolKind::CrossCompiler => {
                "Install the Arm GNU Toolchain (arm-none-eabi) or set ARM_TOOLCHAIN_PATH"
            }
        }
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

impl std::str::FromStr for ToolKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openocd" | "adapter" | "driver" => Ok(ToolKind::OpenOcd),
            "cross_compiler" | "cross-compiler" | "crosscompiler" | "compiler" | "toolchain"
            | "arm-none-eabi-gcc" | "gcc" => Ok(ToolKind::CrossCompiler),
            other => Err(format!("Unknown tool kind: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DetectionStatus {
    NotStarted,
    InProgress,
    Success,
    Failed,
}

/// Facts reported by the tool's `--version` output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolInfo {
    /// `MAJOR.MINOR.PATCH`, or `"Unknown"` when the output could not be parsed
    pub version: String,
    pub primary_executable_path: PathBuf,
    pub install_root: PathBuf,
    pub target_triple: String,
    pub vendor: Option<String>,
    pub as_of: DateTime<Utc>,
}

impl ToolInfo {
    pub const UNKNOWN_VERSION: &'static str = "Unknown";

    pub fn has_version(&self) -> bool {
        self.version != Self::UNKNOWN_VERSION
    }
}

/// Outcome of one detector run.
///
/// `resolved_path` is present exactly when the status is `Success`; the
/// constructors are the only way to build one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionResult {
    tool_name: String,
    status: DetectionStatus,
    resolved_path: Option<PathBuf>,
    strategy: Option<Strategy>,
    tool_info: Option<ToolInfo>,
    error_message: Option<String>,
    as_of: DateTime<Utc>,
}

impl DetectionResult {
    pub fn not_started(kind: ToolKind, as_of: DateTime<Utc>) -> Self {
        Self {
            tool_name: kind.id().to_string(),
            status: DetectionStatus::NotStarted,
            resolved_path: None,
            strategy: None,
            tool_info: None,
            error_message: None,
            as_of,
        }
    }

    pub fn success(
        kind: ToolKind,
        path: PathBuf,
        strategy: Strategy,
        tool_info: Option<ToolInfo>,
        as_of: DateTime<Utc>,
    ) -> Self {
        Self {
            tool_name: kind.id().to_string(),
            status: DetectionStatus::Success,
            resolved_path: Some(path),
            strategy: Some(strategy),
            tool_info,
            error_message: None,
            as_of,
        }
    }

    pub fn failed(kind: ToolKind, message: impl Into<String>, as_of: DateTime<Utc>) -> Self {
        Self {
            tool_name: kind.id().to_string(),
            status: DetectionStatus::Failed,
            resolved_path: None,
            strategy: None,
            tool_info: None,
            error_message: Some(message.into()),
            as_of,
        }
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    pub fn status(&self) -> DetectionStatus {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status == DetectionStatus::Success
    }

    pub fn resolved_path(&self) -> Option<&Path> {
        self.resolved_path.as_deref()
    }

    /// Strategy that produced the path
    pub fn strategy(&self) -> Option<Strategy> {
        self.strategy
    }

    pub fn tool_info(&self) -> Option<&ToolInfo> {
        self.tool_info.as_ref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn as_of(&self) -> DateTime<Utc> {
        self.as_of
    }
}

/// Results for both tool kinds, stamped with the time detection finished
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionSnapshot {
    pub openocd: DetectionResult,
    pub cross_compiler: DetectionResult,
    pub completed_at: DateTime<Utc>,
}

impl DetectionSnapshot {
    /// A snapshot in which nothing has been detected yet
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            openocd: DetectionResult::not_started(ToolKind::OpenOcd, now),
            cross_compiler: DetectionResult::not_started(ToolKind::CrossCompiler, now),
            completed_at: now,
        }
    }

    pub fn get(&self, kind: ToolKind) -> &DetectionResult {
        match kind {
            ToolKind::OpenOcd => &self.openocd,
            ToolKind::CrossCompiler => &self.cross_compiler,
        }
    }

    pub fn set(&mut self, kind: ToolKind, result: DetectionResult) {
        match kind {
            ToolKind::OpenOcd => self.openocd = result,
            ToolKind::CrossCompiler => self.cross_compiler = result,
        }
    }

    pub fn successful_count(&self) -> usize {
        ToolKind::ALL.iter().filter(|k| self.get(**k).is_success()).count()
    }
}

/// Uniform detector contract
#[async_trait]
pub trait ToolDetector: Send + Sync {
    fn kind(&self) -> ToolKind;

    /// Run the detection chain. Never fails; failures are in the result.
    async fn detect(&self, as_of: DateTime<Utc>) -> DetectionResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_kind_parse() {
        assert_eq!("openocd".parse::<ToolKind>().unwrap(), ToolKind::OpenOcd);
        assert_eq!("arm-none-eabi-gcc".parse::<ToolKind>().unwrap(), ToolKind::CrossCompiler);
        assert_eq!("Toolchain".parse::<ToolKind>().unwrap(), ToolKind::CrossCompiler);
        assert!("jlink".parse::<ToolKind>().is_err());
    }

    #[test]
    fn test_result_path_only_on_success() {
        let now = Utc::now();
        let ok = DetectionResult::success(
            ToolKind::OpenOcd,
            PathBuf::from("/usr/bin/openocd"),
            Strategy::PathScan,
            None,
            now,
        );
        assert!(ok.is_success());
        assert!(ok.resolved_path().is_some());
        assert!(ok.error_message().is_none());

        let failed = DetectionResult::failed(ToolKind::OpenOcd, "not found", now);
        assert_eq!(failed.status(), DetectionStatus::Failed);
        assert!(failed.resolved_path().is_none());
        assert_eq!(failed.error_message(), Some("not found"));

        let pending = DetectionResult::not_started(ToolKind::CrossCompiler, now);
        assert!(pending.resolved_path().is_none());
        assert_eq!(pending.tool_name(), "cross_compiler");
    }

    #[test]
    fn test_snapshot_get_set() {
        let now = Utc::now();
        let mut snapshot = DetectionSnapshot::empty(now);
        assert_eq!(snapshot.successful_count(), 0);

        snapshot.set(
            ToolKind::CrossCompiler,
            DetectionResult::success(
                ToolKind::CrossCompiler,
                PathBuf::from("/opt/gcc/bin/arm-none-eabi-gcc"),
                Strategy::EnvironmentVariable,
                None,
                now,
            ),
        );
        assert_eq!(snapshot.successful_count(), 1);
        assert!(snapshot.get(ToolKind::CrossCompiler).is_success());
        assert_eq!(snapshot.get(ToolKind::OpenOcd).status(), DetectionStatus::NotStarted);
    }

    #[test]
    fn test_status_serializes_screaming_case() {
        let json = serde_json::to_string(&DetectionStatus::NotStarted).unwrap();
        assert_eq!(json, "\"NOT_STARTED\"");
    }
}
