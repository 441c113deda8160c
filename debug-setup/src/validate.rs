//! Toolchain integrity validation
//!
//! A detected tool can still be unusable: a cross-compiler missing its
//! linker, or an OpenOCD without its scripts. The validator scores how much
//! of the expected file set is present.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::detect::ToolKind;
use crate::env::Platform;
use crate::paths::is_executable;
use crate::scripts::{find_scripts_dir, list_cfg_files};

/// Tools every arm-none-eabi install must provide
pub const REQUIRED_GCC_TOOLS: &[&str] = &["gcc", "ld", "as", "ar", "objcopy", "objdump"];
/// Tools that are useful but not needed to build
pub const OPTIONAL_GCC_TOOLS: &[&str] = &["gdb", "size", "nm"];

const GCC_MISSING_PENALTY: u8 = 20;
const OPENOCD_MISSING_EXECUTABLE_PENALTY: u8 = 50;
const OPENOCD_MISSING_SCRIPTS_PENALTY: u8 = 30;
const OPENOCD_MISSING_SUBDIR_PENALTY: u8 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub tool: ToolKind,
    pub is_valid: bool,
    /// 0 to 100
    pub completeness_percent: u8,
    pub missing_components: Vec<String>,
    pub functional_issues: Vec<String>,
    /// Optional companions that are absent; informational only
    pub missing_optional: Vec<String>,
}

/// Accumulates penalties and findings while checking one tool
struct ReportBuilder {
    tool: ToolKind,
    completeness: u8,
    missing: Vec<String>,
    issues: Vec<String>,
    optional: Vec<String>,
}

impl ReportBuilder {
    fn new(tool: ToolKind) -> Self {
        Self {
            tool,
            completeness: 100,
            missing: Vec::new(),
            issues: Vec::new(),
            optional: Vec::new(),
        }
    }

    fn missing(&mut self, component: impl Into<String>, penalty: u8) {
        self.missing.push(component.into());
        self.completeness = self.completeness.saturating_sub(penalty);
    }

    fn issue(&mut self, issue: impl Into<String>) {
        self.issues.push(issue.into());
    }

    fn finish(self) -> ValidationReport {
        ValidationReport {
            tool: self.tool,
            is_valid: self.missing.is_empty() && self.issues.is_empty(),
            completeness_percent: self.completeness,
            missing_components: self.missing,
            functional_issues: self.issues,
            missing_optional: self.optional,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IntegrityValidator {
    platform: Platform,
}

impl Default for IntegrityValidator {
    fn default() -> Self {
        Self::new(Platform::current())
    }
}

impl IntegrityValidator {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }

    /// Validate the tool at `path` (an executable, its `bin/` directory, or its install root)
    pub fn validate(&self, path: &Path, kind: ToolKind) -> ValidationReport {
        debug!("Validating {} at {}", kind.display_name(), path.display());
        match kind {
            ToolKind::OpenOcd => self.validate_openocd(path),
            ToolKind::CrossCompiler => self.validate_cross_compiler(path),
        }
    }

    fn validate_cross_compiler(&self, path: &Path) -> ValidationReport {
        let mut report = ReportBuilder::new(ToolKind::CrossCompiler);
        let (bin_dir, prefix) = self.gcc_layout(path);

        if !bin_dir.is_dir() {
            report.issue(format!("Toolchain directory does not exist: {}", bin_dir.display()));
        }

        for tool in REQUIRED_GCC_TOOLS {
            let name = self.platform.executable_name(&format!("{}{}", prefix, tool));
            let candidate = bin_dir.join(&name);
            if !candidate.is_file() {
                report.missing(name, GCC_MISSING_PENALTY);
            } else if !is_executable(&candidate) {
                report.issue(format!("{} is not executable", candidate.display()));
            }
        }

        for tool in OPTIONAL_GCC_TOOLS {
            let name = self.platform.executable_name(&format!("{}{}", prefix, tool));
            if !bin_dir.join(&name).is_file() {
                report.optional.push(name);
            }
        }

        report.finish()
    }

    /// Directory holding the toolchain binaries and their common prefix
    fn gcc_layout(&self, path: &Path) -> (PathBuf, String) {
        const DEFAULT_PREFIX: &str = "arm-none-eabi-";

        if path.is_file() {
            let dir = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            let stem = name.strip_suffix(self.platform.exe_suffix()).unwrap_or(name);
            let prefix = stem
                .strip_suffix("gcc")
                .filter(|p| p.ends_with('-'))
                .unwrap_or(DEFAULT_PREFIX);
            return (dir, prefix.to_string());
        }

        let bin = path.join("bin");
        if bin.is_dir() {
            (bin, DEFAULT_PREFIX.to_string())
        } else {
            (path.to_path_buf(), DEFAULT_PREFIX.to_string())
        }
    }

    fn validate_openocd(&self, path: &Path) -> ValidationReport {
        let mut report = ReportBuilder::new(ToolKind::OpenOcd);
        let exe_name = self.platform.executable_name("openocd");

        let executable = if path.is_file() {
            Some(path.to_path_buf())
        } else {
            [path.join(&exe_name), path.join("bin").join(&exe_name)]
                .into_iter()
                .find(|p| p.is_file())
        };

        let Some(executable) = executable else {
            report.missing(format!("{} executable", exe_name), OPENOCD_MISSING_EXECUTABLE_PENALTY);
            return report.finish();
        };

        if !is_executable(&executable) {
            report.issue(format!("{} is not executable", executable.display()));
        }

        let Some(scripts) = find_scripts_dir(&executable) else {
            report.missing("scripts directory", OPENOCD_MISSING_SCRIPTS_PENALTY);
            return report.finish();
        };

        for sub in ["interface", "target"] {
            let dir = scripts.join(sub);
            if !dir.is_dir() {
                report.missing(format!("scripts/{}", sub), OPENOCD_MISSING_SUBDIR_PENALTY);
            } else if list_cfg_files(&dir).is_empty() {
                report.issue(format!("{} contains no .cfg files", dir.display()));
            }
        }

        report.finish()
    }
}
