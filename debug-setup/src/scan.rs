//! Scan results and remediation advice

use serde::Serialize;

use crate::detect::{DetectionSnapshot, ToolKind};
use crate::project::ProjectState;
use crate::validate::ValidationReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    /// Both tools found
    Success,
    /// Exactly one tool found
    Partial,
    Failed,
}

impl ScanStatus {
    pub fn from_snapshot(snapshot: &DetectionSnapshot) -> Self {
        match snapshot.successful_count() {
            n if n == ToolKind::ALL.len() => ScanStatus::Success,
            0 => ScanStatus::Failed,
            _ => ScanStatus::Partial,
        }
    }
}

/// Declaration order is sort order: high first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    pub priority: Priority,
    pub title: String,
    pub description: String,
    pub action: Option<String>,
}

impl Recommendation {
    fn new(priority: Priority, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            priority,
            title: title.into(),
            description: description.into(),
            action: None,
        }
    }

    fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub status: ScanStatus,
    pub snapshot: DetectionSnapshot,
    pub project_state: ProjectState,
    /// One report per successfully detected tool
    pub integrity: Vec<ValidationReport>,
    pub recommendations: Vec<Recommendation>,
    pub errors: Vec<String>,
}

impl ScanResult {
    pub fn compose(
        snapshot: DetectionSnapshot,
        project_state: ProjectState,
        integrity: Vec<ValidationReport>,
        mut errors: Vec<String>,
    ) -> Self {
        errors.extend(detection_errors(&snapshot));
        let recommendations = recommend(&snapshot, &project_state, &integrity);
        Self {
            status: ScanStatus::from_snapshot(&snapshot),
            snapshot,
            project_state,
            integrity,
            recommendations,
            errors,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == ScanStatus::Success && self.integrity.iter().all(|r| r.is_valid)
    }
}

/// One line per tool that was not found
pub fn detection_errors(snapshot: &DetectionSnapshot) -> Vec<String> {
    ToolKind::ALL
        .iter()
        .map(|kind| snapshot.get(*kind))
        .filter(|result| !result.is_success())
        .map(|result| {
            format!(
                "{}: {}",
                result.tool_name(),
                result.error_message().unwrap_or("detection did not run")
            )
        })
        .collect()
}

fn missing_tool(snapshot: &DetectionSnapshot, kind: ToolKind, title: &str) -> Option<Recommendation> {
    let result = snapshot.get(kind);
    if result.is_success() {
        return None;
    }
    let description = result
        .error_message()
        .map(str::to_string)
        .unwrap_or_else(|| format!("{} has not been detected", kind.display_name()));
    Some(Recommendation::new(Priority::High, title, description).with_action(kind.install_hint()))
}

fn workspace_rule(project: &ProjectState) -> Option<Recommendation> {
    (!project.has_workspace).then(|| {
        Recommendation::new(
            Priority::High,
            "Open a project workspace",
            "No workspace folder is open, so the build output and existing debug configurations cannot be found",
        )
        .with_action("Open the firmware project folder and scan again")
    })
}

fn host_extension_rule(project: &ProjectState) -> Option<Recommendation> {
    (!project.host_extension_installed).then(|| {
        Recommendation::new(
            Priority::Medium,
            "Install the Cortex-Debug extension",
            "Generated launch configurations use the cortex-debug type",
        )
        .with_action(format!("code --install-extension {}", crate::project::HOST_EXTENSION_ID))
    })
}

fn debug_config_rule(project: &ProjectState) -> Option<Recommendation> {
    if !project.has_workspace {
        return None;
    }
    if !project.has_cortex_debug_config() {
        return Some(
            Recommendation::new(
                Priority::Medium,
                "Create a debug configuration",
                "The workspace has no cortex-debug entry in .vscode/launch.json",
            )
            .with_action("Run generate_config and write it with write_launch_config"),
        );
    }
    if !project.has_matching_debug_config() {
        let expected = project.predicted_executable.as_deref().unwrap_or("the build output");
        return Some(Recommendation::new(
            Priority::Low,
            "Update the debug configuration",
            format!("No cortex-debug entry points at {}", expected),
        ));
    }
    None
}

fn integrity_rules(integrity: &[ValidationReport]) -> impl Iterator<Item = Recommendation> + '_ {
    integrity.iter().filter(|r| !r.is_valid).map(|report| {
        let mut problems: Vec<String> = report
            .missing_components
            .iter()
            .map(|m| format!("missing {}", m))
            .collect();
        problems.extend(report.functional_issues.iter().cloned());
        Recommendation::new(
            Priority::Medium,
            format!("Repair the {} installation", report.tool.display_name()),
            format!("{}% complete: {}", report.completeness_percent, problems.join(", ")),
        )
        .with_action(report.tool.install_hint())
    })
}

/// Independent rules, each contributing at most one entry (integrity adds one
/// per tool), sorted once by priority
pub fn recommend(
    snapshot: &DetectionSnapshot,
    project: &ProjectState,
    integrity: &[ValidationReport],
) -> Vec<Recommendation> {
    let mut recommendations: Vec<Recommendation> = [
        workspace_rule(project),
        missing_tool(snapshot, ToolKind::OpenOcd, "Install OpenOCD"),
        missing_tool(snapshot, ToolKind::CrossCompiler, "Install the ARM cross-compiler"),
        host_extension_rule(project),
        debug_config_rule(project),
    ]
    .into_iter()
    .flatten()
    .chain(integrity_rules(integrity))
    .collect();

    recommendations.sort_by_key(|r| r.priority);
    recommendations
}
