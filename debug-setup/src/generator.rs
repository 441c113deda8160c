//! Debug launch configuration generator
//!
//! Builds a cortex-debug launch entry by layering, in order:
//!
//! 1. base fields (name, request, executable, device)
//! 2. OpenOCD scripts and commands, when OpenOCD was detected
//! 3. GDB path from the cross-compiler install, plus cache maintenance
//!    commands for cores with caches
//! 4. project overrides (predicted ELF path)
//! 5. optional features: live watch, SWO trace, RTT, SVD file
//!
//! Output depends only on the inputs, apart from `metadata.timestamp` and
//! the script-availability recommendations, which read the detected
//! OpenOCD's scripts directory when one exists.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::config::GeneratorConfig;
use crate::detect::{arm_gcc, DetectionSnapshot, ToolKind};
use crate::env::Platform;
use crate::error::{Result, SetupError};
use crate::paths::install_root_of;
use crate::project::{ProjectState, DEBUG_CONFIG_TYPE};
use crate::scripts::ScriptCatalog;
use crate::templates::{self, DeviceFeature, DeviceTemplate};

pub const GENERATOR_NAME: &str = "debug-setup";
pub const SERVER_TYPE: &str = "openocd";
pub const ENTRY_POINT: &str = "main";
const WORKSPACE_FOLDER: &str = "${workspaceFolder}";

/// Project device guesses above this confidence replace the requested device
pub const DEVICE_OVERRIDE_THRESHOLD: u8 = 50;

const MISSING_OPENOCD_PENALTY: u8 = 30;
const MISSING_COMPILER_PENALTY: u8 = 20;
const NO_PROJECT_DEVICE_PENALTY: u8 = 10;

/// SCB->CCR with only STKALIGN set: instruction and data caches off
const CACHE_COHERENCY_COMMANDS: &[&str] = &["monitor mww 0xE000ED14 0x00000200"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveWatch {
    pub enabled: bool,
    pub samples_per_second: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decoder {
    pub port: u8,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub label: Option<String>,
}

impl Decoder {
    fn console(label: &str) -> Self {
        Self {
            port: 0,
            kind: "console".to_string(),
            label: Some(label.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwoConfig {
    pub enabled: bool,
    pub cpu_frequency: u32,
    pub swo_frequency: u32,
    pub source: String,
    pub decoders: Vec<Decoder>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RttConfig {
    pub enabled: bool,
    pub address: String,
    pub decoders: Vec<Decoder>,
}

/// One launch entry, serialized with the key names cortex-debug expects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub config_type: String,
    pub request: String,
    #[serde(rename = "servertype")]
    pub server_type: String,
    pub cwd: String,
    pub executable: String,
    pub device: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub run_to_entry_point: Option<String>,
    #[serde(rename = "serverpath", skip_serializing_if = "Option::is_none", default)]
    pub server_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub config_files: Option<Vec<String>>,
    #[serde(rename = "openOCDLaunchCommands", skip_serializing_if = "Vec::is_empty", default)]
    pub openocd_launch_commands: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub gdb_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub arm_toolchain_path: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub post_launch_commands: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub svd_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub live_watch: Option<LiveWatch>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub swo_config: Option<SwoConfig>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub rtt_config: Option<RttConfig>,
}

impl DebugConfig {
    /// Launch entry with only the always-present keys filled in
    pub fn base(name: &str, executable: &str, device: &str) -> Self {
        Self {
            name: name.to_string(),
            config_type: DEBUG_CONFIG_TYPE.to_string(),
            request: "launch".to_string(),
            server_type: SERVER_TYPE.to_string(),
            cwd: WORKSPACE_FOLDER.to_string(),
            executable: executable.to_string(),
            device: device.to_string(),
            run_to_entry_point: Some(ENTRY_POINT.to_string()),
            server_path: None,
            config_files: None,
            openocd_launch_commands: Vec::new(),
            gdb_path: None,
            arm_toolchain_path: None,
            post_launch_commands: Vec::new(),
            svd_file: None,
            live_watch: None,
            swo_config: None,
            rtt_config: None,
        }
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationMetadata {
    pub generator_name: String,
    pub generator_version: String,
    pub timestamp: DateTime<Utc>,
    pub device_family: String,
    pub confidence_percent: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedConfiguration {
    pub debug_config: DebugConfig,
    pub metadata: GenerationMetadata,
    pub description: String,
    pub recommendations: Vec<String>,
}

impl GeneratedConfiguration {
    /// Check required keys and the coherence of the conditional blocks
    pub fn validate(&self) -> Result<()> {
        let c = &self.debug_config;
        let required = [
            ("name", &c.name),
            ("type", &c.config_type),
            ("request", &c.request),
            ("servertype", &c.server_type),
            ("cwd", &c.cwd),
            ("executable", &c.executable),
            ("device", &c.device),
        ];
        if let Some((key, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(SetupError::Generation(format!("Missing required key '{}'", key)));
        }
        if !matches!(c.request.as_str(), "launch" | "attach") {
            return Err(SetupError::Generation(format!("Unsupported request '{}'", c.request)));
        }
        if let Some(files) = &c.config_files {
            if files.len() != 2 {
                return Err(SetupError::Generation(format!(
                    "configFiles must list an interface and a target script, got {} entries",
                    files.len()
                )));
            }
        }
        if let Some(live) = &c.live_watch {
            if live.enabled && live.samples_per_second == 0 {
                return Err(SetupError::Generation("liveWatch.samplesPerSecond must be > 0".to_string()));
            }
        }
        if let Some(swo) = &c.swo_config {
            if swo.enabled && (swo.cpu_frequency == 0 || swo.swo_frequency == 0 || swo.swo_frequency > swo.cpu_frequency) {
                return Err(SetupError::Generation(format!(
                    "Invalid SWO clocks: cpu {} Hz, swo {} Hz",
                    swo.cpu_frequency, swo.swo_frequency
                )));
            }
        }
        if self.metadata.confidence_percent > 100 {
            return Err(SetupError::Generation("confidence above 100%".to_string()));
        }
        Ok(())
    }

    /// Serialized form with `metadata.timestamp` removed, for comparisons
    pub fn without_timestamp(&self) -> Result<serde_json::Value> {
        let mut value = serde_json::to_value(self)?;
        if let Some(metadata) = value.get_mut("metadata").and_then(|m| m.as_object_mut()) {
            metadata.remove("timestamp");
        }
        Ok(value)
    }
}

/// Caller-selected generation options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GenerateOptions {
    /// Launch entry name (default: "Debug <device>")
    pub name: Option<String>,
    /// Add a live watch block
    #[serde(default)]
    pub live_watch: bool,
    /// Live watch sampling rate (default from server config)
    pub samples_per_second: Option<u32>,
    /// Add SWO trace when the core supports it
    #[serde(default)]
    pub swo: bool,
    /// Add an RTT console when the core supports it
    #[serde(default)]
    pub rtt: bool,
    /// SVD file to use instead of the template's
    pub svd_file: Option<String>,
    /// ELF path to use instead of the predicted one
    pub executable: Option<String>,
    /// Interface script (e.g. "jlink.cfg") to use instead of the template's
    pub interface_script: Option<String>,
    /// Attach to the running target instead of resetting it
    #[serde(default)]
    pub attach: bool,
}

/// Named variant produced by [`ConfigGenerator::generate_variants`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    Basic,
    LiveWatch,
    NoReset,
    Trace,
    Rtt,
}

impl Variant {
    fn label(self) -> Option<&'static str> {
        match self {
            Variant::Basic => None,
            Variant::LiveWatch => Some("Live Watch"),
            Variant::NoReset => Some("Attach"),
            Variant::Trace => Some("SWO Trace"),
            Variant::Rtt => Some("RTT"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedVariant {
    pub variant: Variant,
    pub configuration: GeneratedConfiguration,
}

/// Scripts named in `configFiles` that the detected OpenOCD does not ship.
/// Nothing is reported when the scripts directory cannot be found.
fn missing_scripts(snapshot: &DetectionSnapshot, config_files: &[String]) -> Vec<String> {
    let Some(catalog) = snapshot.openocd.resolved_path().and_then(ScriptCatalog::discover) else {
        return Vec::new();
    };
    config_files
        .iter()
        .filter(|file| match file.split_once('/') {
            Some(("interface", name)) => !catalog.has_interface(name),
            Some(("target", name)) => !catalog.has_target(name),
            _ => false,
        })
        .map(|file| format!("{} was not found in {}", file, catalog.scripts_dir.display()))
        .collect()
}

/// Configuration builder; the clock only feeds `metadata.timestamp`
pub struct ConfigGenerator {
    settings: GeneratorConfig,
    platform: Platform,
    clock: Arc<dyn Clock>,
}

impl Default for ConfigGenerator {
    fn default() -> Self {
        Self::new(GeneratorConfig::default(), Platform::current(), Arc::new(SystemClock))
    }
}

/// Device chosen for a generation and where it came from
struct DeviceChoice<'a> {
    id: String,
    template: &'static DeviceTemplate,
    recognized: bool,
    from_project: Option<&'a str>,
}

impl ConfigGenerator {
    pub fn new(settings: GeneratorConfig, platform: Platform, clock: Arc<dyn Clock>) -> Self {
        Self { settings, platform, clock }
    }

    /// Requested device unless the project names one with enough confidence
    fn choose_device<'a>(&self, device_id: &str, project: Option<&'a ProjectState>) -> DeviceChoice<'a> {
        let requested = if device_id.trim().is_empty() {
            self.settings.default_device.as_str()
        } else {
            device_id.trim()
        };

        let project_device = project
            .and_then(|p| p.device.as_ref())
            .filter(|d| d.confidence_percent > DEVICE_OVERRIDE_THRESHOLD)
            .map(|d| d.device_id.as_str());

        let id = project_device.unwrap_or(requested).to_string();
        let found = templates::find_template(&id);
        DeviceChoice {
            id,
            template: found.template,
            recognized: found.matched,
            from_project: project_device,
        }
    }

    fn confidence(snapshot: &DetectionSnapshot, project: Option<&ProjectState>) -> u8 {
        let mut confidence: u8 = 100;
        if !snapshot.openocd.is_success() {
            confidence = confidence.saturating_sub(MISSING_OPENOCD_PENALTY);
        }
        if !snapshot.cross_compiler.is_success() {
            confidence = confidence.saturating_sub(MISSING_COMPILER_PENALTY);
        }
        if project.and_then(|p| p.device.as_ref()).is_none() {
            confidence = confidence.saturating_sub(NO_PROJECT_DEVICE_PENALTY);
        }
        confidence
    }

    fn apply_openocd_layer(
        &self,
        config: &mut DebugConfig,
        template: &DeviceTemplate,
        snapshot: &DetectionSnapshot,
        options: &GenerateOptions,
    ) {
        let Some(openocd) = snapshot.openocd.resolved_path() else {
            return;
        };

        let interface = options
            .interface_script
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(template.default_interface_script);
        config.server_path = Some(path_string(openocd));
        config.config_files = Some(vec![
            format!("interface/{}", interface),
            format!("target/{}", template.default_target_script),
        ]);
        config
            .openocd_launch_commands
            .push(format!("adapter speed {}", template.default_adapter_speed_khz));

        if template.has_feature(DeviceFeature::LowPower) {
            if let Some(dbgmcu) = template.dbgmcu_cr {
                // DBG_SLEEP | DBG_STOP | DBG_STANDBY
                config
                    .openocd_launch_commands
                    .push(format!("mww 0x{:08X} 0x00000007", dbgmcu));
            }
        }
    }

    fn apply_compiler_layer(&self, config: &mut DebugConfig, template: &DeviceTemplate, snapshot: &DetectionSnapshot) {
        if let Some(gcc) = snapshot.cross_compiler.resolved_path() {
            let install_root = snapshot
                .cross_compiler
                .tool_info()
                .map(|info| info.install_root.clone())
                .unwrap_or_else(|| install_root_of(gcc));
            let triple = gcc
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(arm_gcc::triple_from_executable_name)
                .unwrap_or_else(|| arm_gcc::DEFAULT_TRIPLE.to_string());
            let bin = install_root.join("bin");
            let gdb = bin.join(self.platform.executable_name(&format!("{}-gdb", triple)));

            config.gdb_path = Some(path_string(&gdb));
            config.arm_toolchain_path = Some(path_string(&bin));
        }

        if template.has_feature(DeviceFeature::Caches) {
            config
                .post_launch_commands
                .extend(CACHE_COHERENCY_COMMANDS.iter().map(|c| c.to_string()));
        }
    }

    fn apply_project_layer(&self, config: &mut DebugConfig, project: Option<&ProjectState>) {
        if let Some(predicted) = project.and_then(|p| p.predicted_executable.as_deref()) {
            config.executable = format!("{}/{}", WORKSPACE_FOLDER, predicted);
        }
    }

    fn apply_feature_layer(
        &self,
        config: &mut DebugConfig,
        template: &DeviceTemplate,
        options: &GenerateOptions,
        recommendations: &mut Vec<String>,
    ) {
        if options.live_watch {
            config.live_watch = Some(LiveWatch {
                enabled: true,
                samples_per_second: options
                    .samples_per_second
                    .unwrap_or(self.settings.live_watch_samples_per_second),
            });
        }

        if options.swo {
            if template.has_feature(DeviceFeature::Swo) {
                config.swo_config = Some(SwoConfig {
                    enabled: true,
                    cpu_frequency: template.cpu_frequency_hz,
                    swo_frequency: self.settings.swo_frequency_hz,
                    source: "probe".to_string(),
                    decoders: vec![Decoder::console("ITM")],
                });
            } else {
                recommendations.push(format!(
                    "SWO trace is not available on {} ({}); use RTT instead",
                    template.family_id, template.core_name
                ));
            }
        }

        if options.rtt {
            if template.supports_rtt() {
                config.rtt_config = Some(RttConfig {
                    enabled: true,
                    address: "auto".to_string(),
                    decoders: vec![Decoder::console("RTT")],
                });
            } else {
                recommendations.push(format!("RTT is not supported on {} cores", template.core_name));
            }
        }

        config.svd_file = Some(
            options
                .svd_file
                .clone()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| template.svd_file_name.to_string()),
        );
    }

    /// Build one launch configuration
    pub fn generate(
        &self,
        device_id: &str,
        snapshot: &DetectionSnapshot,
        project: Option<&ProjectState>,
        options: &GenerateOptions,
    ) -> Result<GeneratedConfiguration> {
        let device = self.choose_device(device_id, project);
        let template = device.template;
        debug!("Generating configuration for {} using template {}", device.id, template.key);

        let mut recommendations = Vec::new();
        let name = options
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("Debug {}", device.id));

        let mut config = DebugConfig::base(&name, &self.settings.executable_fallback, &device.id);
        if options.attach {
            config.request = "attach".to_string();
            config.run_to_entry_point = None;
        }

        self.apply_openocd_layer(&mut config, template, snapshot, options);
        if let Some(files) = &config.config_files {
            recommendations.extend(missing_scripts(snapshot, files));
        }
        self.apply_compiler_layer(&mut config, template, snapshot);
        self.apply_project_layer(&mut config, project);
        if let Some(executable) = options.executable.as_deref().filter(|e| !e.trim().is_empty()) {
            config.executable = executable.to_string();
        }
        self.apply_feature_layer(&mut config, template, options, &mut recommendations);

        for kind in ToolKind::ALL {
            if !snapshot.get(kind).is_success() {
                recommendations.push(format!("{} was not found: {}", kind.display_name(), kind.install_hint()));
            }
        }
        if !device.recognized {
            recommendations.push(format!(
                "Device '{}' is not in the template registry; using {} defaults",
                device.id,
                template.family_id
            ));
        }
        if let Some(project_device) = device.from_project {
            if !device_id.trim().is_empty() && !project_device.eq_ignore_ascii_case(device_id.trim()) {
                recommendations.push(format!(
                    "Using project device {} instead of requested {}",
                    project_device,
                    device_id.trim()
                ));
            }
        }
        if project.map(|p| p.predicted_executable.is_none()).unwrap_or(true) && options.executable.is_none() {
            recommendations.push(format!(
                "Executable path '{}' is a guess; point it at your build output",
                config.executable
            ));
        }

        let description = format!(
            "{} debug configuration for {} ({}, {} kHz) via {}",
            if config.request == "attach" { "Attach" } else { "Launch" },
            device.id,
            template.core_name,
            template.default_adapter_speed_khz,
            SERVER_TYPE
        );

        let generated = GeneratedConfiguration {
            debug_config: config,
            metadata: GenerationMetadata {
                generator_name: GENERATOR_NAME.to_string(),
                generator_version: env!("CARGO_PKG_VERSION").to_string(),
                timestamp: self.clock.now(),
                device_family: template.family_id.to_string(),
                confidence_percent: Self::confidence(snapshot, project),
            },
            description,
            recommendations,
        };
        generated.validate()?;
        Ok(generated)
    }

    /// Fixed menu of variants: basic, live watch, attach, then SWO trace and
    /// RTT when the device supports them
    pub fn generate_variants(
        &self,
        device_id: &str,
        snapshot: &DetectionSnapshot,
        project: Option<&ProjectState>,
        options: &GenerateOptions,
    ) -> Result<Vec<GeneratedVariant>> {
        let template = self.choose_device(device_id, project).template;
        let base_name = options.name.clone().filter(|n| !n.trim().is_empty());

        let mut variants = vec![Variant::Basic, Variant::LiveWatch, Variant::NoReset];
        if template.has_feature(DeviceFeature::Swo) {
            variants.push(Variant::Trace);
        }
        if template.supports_rtt() {
            variants.push(Variant::Rtt);
        }

        variants
            .into_iter()
            .map(|variant| {
                let mut opts = GenerateOptions {
                    live_watch: variant == Variant::LiveWatch,
                    swo: variant == Variant::Trace,
                    rtt: variant == Variant::Rtt,
                    attach: variant == Variant::NoReset,
                    ..options.clone()
                };
                let device_name = self.choose_device(device_id, project).id;
                let stem = base_name.clone().unwrap_or_else(|| format!("Debug {}", device_name));
                opts.name = Some(match variant.label() {
                    Some(label) => format!("{} ({})", stem, label),
                    None => stem,
                });
                Ok(GeneratedVariant {
                    variant,
                    configuration: self.generate(device_id, snapshot, project, &opts)?,
                })
            })
            .collect()
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::detect::{DetectionResult, Strategy};
    use crate::project::DeviceInference;
    use std::path::PathBuf;

    fn generator() -> ConfigGenerator {
        ConfigGenerator::new(GeneratorConfig::default(), Platform::Linux, Arc::new(ManualClock::default()))
    }

    fn snapshot(openocd: bool, gcc: bool) -> DetectionSnapshot {
        let now = Utc::now();
        let mut snap = DetectionSnapshot::empty(now);
        snap.openocd = if openocd {
            DetectionResult::success(ToolKind::OpenOcd, PathBuf::from("/usr/bin/openocd"), Strategy::PathScan, None, now)
        } else {
            DetectionResult::failed(ToolKind::OpenOcd, "not found", now)
        };
        snap.cross_compiler = if gcc {
            DetectionResult::success(
                ToolKind::CrossCompiler,
                PathBuf::from("/opt/gcc-arm/bin/arm-none-eabi-gcc"),
                Strategy::EnvironmentVariable,
                None,
                now,
            )
        } else {
            DetectionResult::failed(ToolKind::CrossCompiler, "not found", now)
        };
        snap
    }

    fn project_with_device(device: &str, confidence: u8) -> ProjectState {
        ProjectState {
            has_workspace: true,
            predicted_executable: Some("build/app.elf".to_string()),
            device: Some(DeviceInference {
                device_id: device.to_string(),
                confidence_percent: confidence,
                source: "app.ioc".to_string(),
            }),
            ..ProjectState::default()
        }
    }

    #[test]
    fn test_stm32f407_with_both_tools() {
        let generated = generator()
            .generate("STM32F407VG", &snapshot(true, true), None, &GenerateOptions::default())
            .unwrap();
        let c = &generated.debug_config;

        assert_eq!(
            c.config_files.as_deref(),
            Some(&["interface/stlink-v2-1.cfg".to_string(), "target/stm32f4x.cfg".to_string()][..])
        );
        assert!(c.openocd_launch_commands.contains(&"adapter speed 2000".to_string()));
        assert_eq!(c.gdb_path.as_deref(), Some("/opt/gcc-arm/bin/arm-none-eabi-gdb"));
        assert_eq!(c.svd_file.as_deref(), Some("STM32F407.svd"));
        assert_eq!(c.run_to_entry_point.as_deref(), Some("main"));
        assert_eq!(generated.metadata.device_family, "STM32F4");
        assert_eq!(generated.metadata.confidence_percent, 90);
    }

    #[test]
    fn test_emitted_json_keys() {
        let generated = generator()
            .generate("STM32F407VG", &snapshot(true, true), None, &GenerateOptions { live_watch: true, swo: true, rtt: true, ..Default::default() })
            .unwrap();
        let json = generated.debug_config.to_json().unwrap();

        for key in ["name", "type", "request", "servertype", "cwd", "executable", "device", "runToEntryPoint", "configFiles", "openOCDLaunchCommands", "svdFile"] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(json["liveWatch"]["samplesPerSecond"], 4);
        assert_eq!(json["swoConfig"]["cpuFrequency"], 168_000_000);
        assert_eq!(json["swoConfig"]["swoFrequency"], 2_000_000);
        assert_eq!(json["rttConfig"]["address"], "auto");
    }

    #[test]
    fn test_openocd_layer_skipped_without_driver() {
        let generated = generator()
            .generate("STM32F407VG", &snapshot(false, true), None, &GenerateOptions::default())
            .unwrap();
        assert!(generated.debug_config.config_files.is_none());
        assert!(generated.debug_config.openocd_launch_commands.is_empty());
        assert_eq!(generated.metadata.confidence_percent, 60);
    }

    #[test]
    fn test_confidence_floor_and_steps() {
        let g = generator();
        let none = g.generate("STM32F4", &snapshot(false, false), None, &GenerateOptions::default()).unwrap();
        assert_eq!(none.metadata.confidence_percent, 40);

        let project = project_with_device("STM32F407VG", 90);
        let all = g.generate("STM32F4", &snapshot(true, true), Some(&project), &GenerateOptions::default()).unwrap();
        assert_eq!(all.metadata.confidence_percent, 100);
    }

    #[test]
    fn test_project_overrides_executable_and_confident_device() {
        let g = generator();
        let project = project_with_device("STM32H743ZI", 90);
        let generated = g.generate("STM32F407VG", &snapshot(true, true), Some(&project), &GenerateOptions::default()).unwrap();
        let c = &generated.debug_config;
        assert_eq!(c.executable, "${workspaceFolder}/build/app.elf");
        assert_eq!(c.device, "STM32H743ZI");
        assert_eq!(c.post_launch_commands, vec![CACHE_COHERENCY_COMMANDS[0].to_string()]);

        let weak = project_with_device("STM32H743ZI", 50);
        let generated = g.generate("STM32F407VG", &snapshot(true, true), Some(&weak), &GenerateOptions::default()).unwrap();
        assert_eq!(generated.debug_config.device, "STM32F407VG");
    }

    #[test]
    fn test_low_power_device_gets_dbgmcu_command() {
        let generated = generator()
            .generate("STM32L476RG", &snapshot(true, true), None, &GenerateOptions::default())
            .unwrap();
        assert!(generated
            .debug_config
            .openocd_launch_commands
            .contains(&"mww 0xE0042004 0x00000007".to_string()));
    }

    #[test]
    fn test_swo_not_added_for_m0() {
        let generated = generator()
            .generate("STM32F030R8", &snapshot(true, true), None, &GenerateOptions { swo: true, ..Default::default() })
            .unwrap();
        assert!(generated.debug_config.swo_config.is_none());
        assert!(generated.recommendations.iter().any(|r| r.contains("SWO")));
    }

    #[test]
    fn test_deterministic_modulo_timestamp() {
        let clock = Arc::new(ManualClock::default());
        let g = ConfigGenerator::new(GeneratorConfig::default(), Platform::Linux, clock.clone());
        let snap = snapshot(true, false);
        let options = GenerateOptions { live_watch: true, ..Default::default() };

        let first = g.generate("nrf52840", &snap, None, &options).unwrap();
        clock.advance(chrono::Duration::seconds(42));
        let second = g.generate("nrf52840", &snap, None, &options).unwrap();

        assert_ne!(first.metadata.timestamp, second.metadata.timestamp);
        assert_eq!(first.without_timestamp().unwrap(), second.without_timestamp().unwrap());
    }

    #[test]
    fn test_variants_menu() {
        let g = generator();
        let variants = g
            .generate_variants("STM32F407VG", &snapshot(true, true), None, &GenerateOptions::default())
            .unwrap();
        let kinds: Vec<_> = variants.iter().map(|v| v.variant).collect();
        assert_eq!(kinds, vec![Variant::Basic, Variant::LiveWatch, Variant::NoReset, Variant::Trace, Variant::Rtt]);

        let attach = &variants[2].configuration.debug_config;
        assert_eq!(attach.request, "attach");
        assert!(attach.run_to_entry_point.is_none());
        assert_eq!(attach.name, "Debug STM32F407VG (Attach)");

        let m0 = g.generate_variants("RP2040", &snapshot(true, true), None, &GenerateOptions::default()).unwrap();
        assert_eq!(m0.len(), 4);

        let riscv = g.generate_variants("GD32VF103", &snapshot(true, true), None, &GenerateOptions::default()).unwrap();
        assert_eq!(riscv.len(), 3);
    }

    #[test]
    fn test_validate_rejects_bad_config_files() {
        let mut generated = generator()
            .generate("STM32F407VG", &snapshot(true, true), None, &GenerateOptions::default())
            .unwrap();
        generated.debug_config.config_files = Some(vec!["interface/stlink.cfg".to_string()]);
        assert!(matches!(generated.validate(), Err(SetupError::Generation(_))));

        generated.debug_config.config_files = None;
        generated.debug_config.executable.clear();
        assert!(generated.validate().is_err());
    }

    #[test]
    fn test_unknown_device_falls_back() {
        let generated = generator()
            .generate("ATSAMD21G18", &snapshot(true, true), None, &GenerateOptions::default())
            .unwrap();
        assert_eq!(generated.metadata.device_family, "STM32F4");
        assert_eq!(generated.debug_config.device, "ATSAMD21G18");
        assert!(generated.recommendations.iter().any(|r| r.contains("template registry")));
    }

    #[test]
    fn test_missing_interface_script_is_recommended() {
        let tmp = tempfile::TempDir::new().unwrap();
        let scripts = tmp.path().join("share/openocd/scripts");
        std::fs::create_dir_all(scripts.join("interface")).unwrap();
        std::fs::create_dir_all(scripts.join("target")).unwrap();
        std::fs::write(scripts.join("interface/jlink.cfg"), "").unwrap();
        std::fs::write(scripts.join("target/stm32f4x.cfg"), "").unwrap();

        let mut snap = snapshot(false, true);
        snap.openocd = DetectionResult::success(
            ToolKind::OpenOcd,
            tmp.path().join("bin/openocd"),
            Strategy::UserOverride,
            None,
            Utc::now(),
        );
        let generated = generator()
            .generate("STM32F407VG", &snap, None, &GenerateOptions::default())
            .unwrap();
        let missing: Vec<&String> = generated
            .recommendations
            .iter()
            .filter(|r| r.contains("was not found in"))
            .collect();
        assert_eq!(missing.len(), 1);
        assert!(missing[0].starts_with("interface/stlink-v2-1.cfg"));

        let jlink = GenerateOptions {
            interface_script: Some("jlink.cfg".to_string()),
            ..Default::default()
        };
        let generated = generator().generate("STM32F407VG", &snap, None, &jlink).unwrap();
        assert!(generated.recommendations.iter().all(|r| !r.contains("was not found in")));
    }

    #[test]
    fn test_unchanged_inputs_give_unchanged_output_without_scripts_dir() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut snap = snapshot(false, true);
        snap.openocd = DetectionResult::success(
            ToolKind::OpenOcd,
            tmp.path().join("bin/openocd"),
            Strategy::UserOverride,
            None,
            Utc::now(),
        );

        let first = generator().generate("STM32F407VG", &snap, None, &GenerateOptions::default()).unwrap();
        let second = generator().generate("STM32F407VG", &snap, None, &GenerateOptions::default()).unwrap();
        assert_eq!(first.debug_config, second.debug_config);
        assert_eq!(first.recommendations, second.recommendations);
        assert!(first.recommendations.iter().all(|r| !r.contains("was not found in")));
    }
}
