//! Type definitions for debug-setup MCP tools

use serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use std::path::PathBuf;

use crate::generator::GenerateOptions;
use crate::templates::{DeviceFeature, DeviceTemplate, MemoryMap};

// ============================================================================
// scan
// ============================================================================

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct ScanArgs {
    /// Workspace folder to analyze (defaults to the server's --workspace)
    #[serde(default)]
    pub workspace: Option<String>,
    /// Ignore cached detection results
    #[serde(default)]
    pub force_redetection: bool,
}

// ============================================================================
// detect_tools
// ============================================================================

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct DetectToolsArgs {
    /// Ignore cached detection results
    #[serde(default)]
    pub force_redetection: bool,
    /// Restrict detection to these tools: "openocd", "cross_compiler" (default: both)
    #[serde(default)]
    pub tools: Option<Vec<String>>,
}

// ============================================================================
// validate_tool
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ValidateToolArgs {
    /// Tool kind: "openocd" or "cross_compiler"
    pub tool: String,
    /// Executable or install directory to check (defaults to the detected path)
    #[serde(default)]
    pub path: Option<String>,
}

// ============================================================================
// generate_config / generate_variants / write_launch_config
// ============================================================================

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct GenerateConfigArgs {
    /// Target device, e.g. "STM32F407VG" (defaults to the configured device)
    #[serde(default)]
    pub device: Option<String>,
    /// Workspace whose build output and device hints should be used
    #[serde(default)]
    pub workspace: Option<String>,
    #[serde(flatten)]
    pub options: GenerateOptions,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct SetupDebuggingArgs {
    /// Workspace to analyze and write .vscode/launch.json into
    #[serde(default)]
    pub workspace: Option<String>,
    /// Target device (defaults to the project's or the configured device)
    #[serde(default)]
    pub device: Option<String>,
    /// Merge the generated entry into .vscode/launch.json
    #[serde(default)]
    pub write: bool,
    #[serde(default)]
    pub force_redetection: bool,
    #[serde(flatten)]
    pub options: GenerateOptions,
}

#[derive(Debug, Serialize)]
pub struct WriteLaunchConfigResult {
    pub path: PathBuf,
    pub name: String,
}

// ============================================================================
// lookup_device / list_devices
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct LookupDeviceArgs {
    /// Device identifier in any case, e.g. "stm32f407vg" or "nRF52840"
    pub device: String,
}

#[derive(Debug, Serialize)]
pub struct LookupDeviceResult {
    pub device: String,
    /// False when the default family was substituted
    pub matched: bool,
    pub template: &'static DeviceTemplate,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListDevicesArgs {}

#[derive(Debug, Serialize)]
pub struct DeviceSummary {
    pub key: &'static str,
    pub family: &'static str,
    pub core: &'static str,
    pub target_script: &'static str,
    pub memory_map: MemoryMap,
    pub features: &'static [DeviceFeature],
}

#[derive(Debug, Serialize)]
pub struct ListDevicesResult {
    pub devices: Vec<DeviceSummary>,
}

// ============================================================================
// list_scripts
// ============================================================================

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct ListScriptsArgs {
    /// OpenOCD executable to inspect (defaults to the detected one)
    #[serde(default)]
    pub openocd_path: Option<String>,
}

// ============================================================================
// save_tool_paths / clear_cache
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SaveToolPathsArgs {}

#[derive(Debug, Serialize)]
pub struct SaveToolPathsResult {
    pub keys_written: usize,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ClearCacheArgs {}
