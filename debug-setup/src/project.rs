//! Workspace analysis
//!
//! Figures out what kind of firmware project lives in the workspace, where
//! its ELF will land, which device it targets, and which debug
//! configurations already exist.

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

use crate::env::EnvSource;
use crate::error::Result;
use crate::launch_file::{configurations, read_launch_file};

/// Editor extension that consumes the generated configuration
pub const HOST_EXTENSION_ID: &str = "marus25.cortex-debug";
pub const DEBUG_CONFIG_TYPE: &str = "cortex-debug";

const DEFAULT_RUST_TARGET: &str = "thumbv7em-none-eabihf";

/// Confidence for a device read from a CubeMX `.ioc` project
pub const IOC_CONFIDENCE: u8 = 90;
/// Confidence for a device read from `platformio.ini`
pub const PLATFORMIO_CONFIDENCE: u8 = 80;
/// Confidence for a device guessed from a compile definition
pub const DEFINE_CONFIDENCE: u8 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum BuildSystem {
    PlatformIo,
    CMake,
    Cargo,
    Make,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DeviceInference {
    pub device_id: String,
    pub confidence_percent: u8,
    /// File the device was read from, relative to the workspace
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ExistingDebugConfig {
    pub name: String,
    pub config_type: String,
    pub executable: Option<String>,
    /// A cortex-debug entry pointing at the predicted build output
    pub matches_project: bool,
}

/// What the workspace looks like right now
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ProjectState {
    pub workspace: Option<PathBuf>,
    pub has_workspace: bool,
    pub build_system: Option<BuildSystem>,
    pub project_name: Option<String>,
    /// Predicted ELF path, relative to the workspace
    pub predicted_executable: Option<String>,
    pub device: Option<DeviceInference>,
    pub debug_configs: Vec<ExistingDebugConfig>,
    pub host_extension_installed: bool,
}

impl ProjectState {
    pub fn no_workspace() -> Self {
        Self::default()
    }

    pub fn has_matching_debug_config(&self) -> bool {
        self.debug_configs.iter().any(|c| c.matches_project)
    }

    pub fn has_cortex_debug_config(&self) -> bool {
        self.debug_configs.iter().any(|c| c.config_type == DEBUG_CONFIG_TYPE)
    }
}

pub trait ProjectInspector: Send + Sync {
    fn analyze(&self, workspace: Option<&Path>) -> Result<ProjectState>;
}

/// Inspector reading the real file system
pub struct FsProjectInspector {
    env: Arc<dyn EnvSource>,
}

impl FsProjectInspector {
    pub fn new(env: Arc<dyn EnvSource>) -> Self {
        Self { env }
    }

    fn extension_installed(&self) -> bool {
        let Some(home) = self.env.home_dir() else {
            return false;
        };
        let pattern_root = glob::Pattern::escape(&home.to_string_lossy());
        [".vscode", ".vscode-server", ".vscode-insiders", ".cursor"]
            .iter()
            .map(|dir| format!("{}/{}/extensions/{}-*", pattern_root, dir, HOST_EXTENSION_ID))
            .filter_map(|pattern| glob::glob(&pattern).ok())
            .any(|mut paths| paths.any(|p| p.map(|p| p.is_dir()).unwrap_or(false)))
    }
}

impl ProjectInspector for FsProjectInspector {
    fn analyze(&self, workspace: Option<&Path>) -> Result<ProjectState> {
        let host_extension_installed = self.extension_installed();

        let Some(workspace) = workspace.filter(|w| w.is_dir()) else {
            debug!("No workspace to analyze");
            return Ok(ProjectState {
                host_extension_installed,
                ..ProjectState::no_workspace()
            });
        };

        let build_system = detect_build_system(workspace);
        let project_name = build_system.and_then(|b| project_name(workspace, b));
        let predicted_executable = build_system.and_then(|b| predict_executable(workspace, b, project_name.as_deref()));
        let device = infer_device(workspace);

        let debug_configs = match read_launch_file(workspace) {
            Ok(Some(launch)) => existing_debug_configs(&launch, predicted_executable.as_deref()),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("Ignoring unreadable launch.json in {}: {}", workspace.display(), e);
                Vec::new()
            }
        };

        Ok(ProjectState {
            workspace: Some(workspace.to_path_buf()),
            has_workspace: true,
            build_system,
            project_name,
            predicted_executable,
            device,
            debug_configs,
            host_extension_installed,
        })
    }
}

pub fn detect_build_system(workspace: &Path) -> Option<BuildSystem> {
    if workspace.join("platformio.ini").is_file() {
        Some(BuildSystem::PlatformIo)
    } else if workspace.join("CMakeLists.txt").is_file() {
        Some(BuildSystem::CMake)
    } else if workspace.join("Cargo.toml").is_file() {
        Some(BuildSystem::Cargo)
    } else if workspace.join("Makefile").is_file() || workspace.join("makefile").is_file() {
        Some(BuildSystem::Make)
    } else {
        None
    }
}

fn read(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok()
}

fn cached_regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static regex"))
}

fn cmake_project_name(text: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached_regex(&RE, r"(?i)\bproject\s*\(\s*([A-Za-z0-9_.\-]+)")
        .captures(text)
        .map(|c| c[1].to_string())
}

fn make_target_name(text: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached_regex(&RE, r"(?m)^\s*TARGET\s*[:?]?=\s*([A-Za-z0-9_.\-]+)")
        .captures(text)
        .map(|c| c[1].to_string())
}

/// First `[env:<name>]` section of a platformio.ini
fn platformio_env(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find_map(|l| l.strip_prefix("[env:")?.strip_suffix(']').map(str::to_string))
}

fn cargo_package_name(workspace: &Path) -> Option<String> {
    let manifest: toml::Value = read(&workspace.join("Cargo.toml"))?.parse().ok()?;
    manifest.get("package")?.get("name")?.as_str().map(str::to_string)
}

fn cargo_build_target(workspace: &Path) -> String {
    [".cargo/config.toml", ".cargo/config"]
        .iter()
        .filter_map(|f| read(&workspace.join(f)))
        .filter_map(|text| text.parse::<toml::Value>().ok())
        .find_map(|v| v.get("build")?.get("target")?.as_str().map(str::to_string))
        .unwrap_or_else(|| DEFAULT_RUST_TARGET.to_string())
}

fn dir_name(workspace: &Path) -> Option<String> {
    workspace.file_name().map(|n| n.to_string_lossy().into_owned())
}

pub fn project_name(workspace: &Path, build_system: BuildSystem) -> Option<String> {
    let name = match build_system {
        BuildSystem::CMake => read(&workspace.join("CMakeLists.txt")).and_then(|t| cmake_project_name(&t)),
        BuildSystem::Make => ["Makefile", "makefile"]
            .iter()
            .filter_map(|f| read(&workspace.join(f)))
            .find_map(|t| make_target_name(&t)),
        BuildSystem::Cargo => cargo_package_name(workspace),
        BuildSystem::PlatformIo => None,
    };
    name.or_else(|| dir_name(workspace))
}

/// Where the build system will put the ELF, relative to the workspace
pub fn predict_executable(workspace: &Path, build_system: BuildSystem, name: Option<&str>) -> Option<String> {
    match build_system {
        BuildSystem::CMake | BuildSystem::Make => name.map(|n| format!("build/{}.elf", n)),
        BuildSystem::PlatformIo => {
            let env = read(&workspace.join("platformio.ini")).and_then(|t| platformio_env(&t))?;
            Some(format!(".pio/build/{}/firmware.elf", env))
        }
        BuildSystem::Cargo => {
            let target = cargo_build_target(workspace);
            name.map(|n| format!("target/{}/debug/{}", target, n))
        }
    }
}

fn ioc_device(text: &str) -> Option<String> {
    text.lines()
        .find_map(|l| l.trim().strip_prefix("Mcu.UserName="))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn platformio_mcu(text: &str) -> Option<String> {
    text.lines().find_map(|l| {
        let (key, value) = l.split_once('=')?;
        (key.trim() == "board_build.mcu")
            .then(|| value.trim().to_string())
            .filter(|v| !v.is_empty())
    })
}

/// `STM32F407xx` or `NRF52840_XXAA` style compile definitions
fn define_device(text: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached_regex(&RE, r"(?:-D|\b)(STM32[0-9A-Z]+?)xx\b|(?:-D|\b)(NRF52[0-9]*)_XXAA\b")
        .captures(text)
        .and_then(|c| c.get(1).or_else(|| c.get(2)))
        .map(|m| m.as_str().to_string())
}

/// Best device guess from project files, highest confidence source first
pub fn infer_device(workspace: &Path) -> Option<DeviceInference> {
    let inference = |device_id: String, confidence_percent: u8, source: String| DeviceInference {
        device_id,
        confidence_percent,
        source,
    };

    let pattern = format!("{}/*.ioc", glob::Pattern::escape(&workspace.to_string_lossy()));
    if let Ok(paths) = glob::glob(&pattern) {
        for ioc in paths.flatten() {
            if let Some(device) = read(&ioc).and_then(|t| ioc_device(&t)) {
                let source = ioc.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
                return Some(inference(device, IOC_CONFIDENCE, source));
            }
        }
    }

    if let Some(device) = read(&workspace.join("platformio.ini")).and_then(|t| platformio_mcu(&t)) {
        return Some(inference(device, PLATFORMIO_CONFIDENCE, "platformio.ini".to_string()));
    }

    ["CMakeLists.txt", "Makefile", "makefile"].iter().find_map(|file| {
        let device = read(&workspace.join(file)).and_then(|t| define_device(&t))?;
        Some(inference(device, DEFINE_CONFIDENCE, file.to_string()))
    })
}

fn strip_workspace_prefix(path: &str) -> &str {
    path.strip_prefix("${workspaceFolder}/")
        .or_else(|| path.strip_prefix("${workspaceRoot}/"))
        .or_else(|| path.strip_prefix("./"))
        .unwrap_or(path)
}

/// Entries of a parsed launch file, matched against the predicted output
pub fn existing_debug_configs(launch: &Value, predicted: Option<&str>) -> Vec<ExistingDebugConfig> {
    configurations(launch)
        .iter()
        .filter_map(|entry| {
            let name = entry.get("name")?.as_str()?.to_string();
            let config_type = entry.get("type").and_then(Value::as_str).unwrap_or_default().to_string();
            let executable = entry.get("executable").and_then(Value::as_str).map(str::to_string);
            let matches_project = config_type == DEBUG_CONFIG_TYPE
                && match (predicted, executable.as_deref()) {
                    (Some(predicted), Some(exe)) => strip_workspace_prefix(exe) == predicted,
                    (None, _) => true,
                    (Some(_), None) => false,
                };
            Some(ExistingDebugConfig {
                name,
                config_type,
                executable,
                matches_project,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::MapEnv;
    use serde_json::json;
    use tempfile::TempDir;

    fn inspector() -> FsProjectInspector {
        FsProjectInspector::new(Arc::new(MapEnv::new()))
    }

    fn write(root: &Path, file: &str, contents: &str) {
        let path = root.join(file);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_no_workspace() {
        let state = inspector().analyze(None).unwrap();
        assert!(!state.has_workspace);
        assert!(state.build_system.is_none());

        let tmp = TempDir::new().unwrap();
        let state = inspector().analyze(Some(&tmp.path().join("missing"))).unwrap();
        assert!(!state.has_workspace);
    }

    #[test]
    fn test_cmake_project() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "CMakeLists.txt",
            "cmake_minimum_required(VERSION 3.22)\nproject(blinky C ASM)\nadd_compile_definitions(USE_HAL_DRIVER STM32F407xx)\n",
        );

        let state = inspector().analyze(Some(tmp.path())).unwrap();
        assert_eq!(state.build_system, Some(BuildSystem::CMake));
        assert_eq!(state.project_name.as_deref(), Some("blinky"));
        assert_eq!(state.predicted_executable.as_deref(), Some("build/blinky.elf"));
        let device = state.device.unwrap();
        assert_eq!(device.device_id, "STM32F407");
        assert_eq!(device.confidence_percent, DEFINE_CONFIDENCE);
    }

    #[test]
    fn test_ioc_beats_define() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "Makefile", "TARGET = demo\nC_DEFS = -DSTM32F411xE -DSTM32F103xx\n");
        write(tmp.path(), "demo.ioc", "Mcu.Family=STM32L4\nMcu.UserName=STM32L476RGTx\n");

        let state = inspector().analyze(Some(tmp.path())).unwrap();
        assert_eq!(state.build_system, Some(BuildSystem::Make));
        assert_eq!(state.predicted_executable.as_deref(), Some("build/demo.elf"));
        let device = state.device.unwrap();
        assert_eq!(device.device_id, "STM32L476RGTx");
        assert_eq!(device.confidence_percent, IOC_CONFIDENCE);
        assert_eq!(device.source, "demo.ioc");
    }

    #[test]
    fn test_platformio_project() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "platformio.ini",
            "[platformio]\n\n[env:nucleo_f401re]\nplatform = ststm32\nboard_build.mcu = stm32f401ret6\n",
        );

        let state = inspector().analyze(Some(tmp.path())).unwrap();
        assert_eq!(state.build_system, Some(BuildSystem::PlatformIo));
        assert_eq!(state.predicted_executable.as_deref(), Some(".pio/build/nucleo_f401re/firmware.elf"));
        assert_eq!(state.device.unwrap().confidence_percent, PLATFORMIO_CONFIDENCE);
    }

    #[test]
    fn test_cargo_project_uses_build_target() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "Cargo.toml", "[package]\nname = \"fw\"\nversion = \"0.1.0\"\n");
        write(tmp.path(), ".cargo/config.toml", "[build]\ntarget = \"thumbv6m-none-eabi\"\n");

        let state = inspector().analyze(Some(tmp.path())).unwrap();
        assert_eq!(state.build_system, Some(BuildSystem::Cargo));
        assert_eq!(state.predicted_executable.as_deref(), Some("target/thumbv6m-none-eabi/debug/fw"));
        assert!(state.device.is_none());
    }

    #[test]
    fn test_existing_configs_matched_against_prediction() {
        let launch = json!({
            "configurations": [
                { "name": "Old", "type": "cortex-debug", "executable": "${workspaceFolder}/build/old.elf" },
                { "name": "Cur", "type": "cortex-debug", "executable": "./build/app.elf" },
                { "name": "Py", "type": "python" },
                { "type": "cortex-debug" }
            ]
        });
        let configs = existing_debug_configs(&launch, Some("build/app.elf"));
        assert_eq!(configs.len(), 3);
        assert!(!configs[0].matches_project);
        assert!(configs[1].matches_project);
        assert!(!configs[2].matches_project);
    }

    #[test]
    fn test_launch_json_with_comments_is_read() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "CMakeLists.txt", "project(app)\n");
        write(
            tmp.path(),
            ".vscode/launch.json",
            "{\n // generated\n \"configurations\": [\n  {\"name\": \"Debug\", \"type\": \"cortex-debug\", \"executable\": \"build/app.elf\"},\n ]\n}\n",
        );

        let state = inspector().analyze(Some(tmp.path())).unwrap();
        assert!(state.has_matching_debug_config());
    }

    #[test]
    fn test_host_extension_detection() {
        let home = TempDir::new().unwrap();
        fs::create_dir_all(home.path().join(".vscode/extensions/marus25.cortex-debug-1.12.1")).unwrap();

        let found = FsProjectInspector::new(Arc::new(MapEnv::new().with_home(home.path())));
        assert!(found.analyze(None).unwrap().host_extension_installed);
        assert!(!inspector().analyze(None).unwrap().host_extension_installed);
    }
}
