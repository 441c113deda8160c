//! Detection and setup services
//!
//! [`DetectionService`] owns the detectors and the cache and decides when
//! detection actually has to run. [`DebugSetupService`] is the one handle the
//! MCP layer talks to: scan, detect, validate, generate, persist.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::ResultCache;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::detect::{ChainDetector, DetectionResult, DetectionSnapshot, DetectionStatus, DetectorContext, ToolDetector, ToolKind};
use crate::env::{EnvSource, ProcessEnv};
use crate::error::{Result, SetupError};
use crate::generator::{ConfigGenerator, DebugConfig, GenerateOptions, GeneratedConfiguration, GeneratedVariant};
use crate::launch_file;
use crate::process::{CommandRunner, TokioCommandRunner};
use crate::project::{FsProjectInspector, ProjectInspector, ProjectState};
use crate::scan::ScanResult;
use crate::scripts::ScriptCatalog;
use crate::settings::{self, MemorySettings, SettingsStore, TomlSettings};
use crate::validate::{IntegrityValidator, ValidationReport};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DetectOptions {
    /// Ignore a still-valid cache and run detection again
    #[serde(default)]
    pub force_redetection: bool,
    /// Only these tools (default: all)
    pub specific_tools: Option<Vec<ToolKind>>,
}

impl DetectOptions {
    pub fn forced() -> Self {
        Self {
            force_redetection: true,
            specific_tools: None,
        }
    }

    fn requested(&self) -> Vec<ToolKind> {
        match &self.specific_tools {
            Some(tools) if !tools.is_empty() => ToolKind::ALL.into_iter().filter(|k| tools.contains(k)).collect(),
            _ => ToolKind::ALL.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ScanOptions {
    /// Workspace to analyze (default from server config)
    pub workspace: Option<PathBuf>,
    #[serde(default)]
    pub force_redetection: bool,
}

/// Inputs for [`DebugSetupService::scan_and_generate`]
#[derive(Debug, Clone, Default)]
pub struct SetupRequest {
    pub scan: ScanOptions,
    /// Device id; the configured default when empty
    pub device: String,
    pub options: GenerateOptions,
    /// Merge the result into the workspace launch.json
    pub write_launch_file: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SetupOutcome {
    pub scan: ScanResult,
    pub configuration: GeneratedConfiguration,
    pub launch_file: Option<PathBuf>,
}

/// Runs detectors under the cache policy
pub struct DetectionService {
    openocd: Arc<dyn ToolDetector>,
    cross_compiler: Arc<dyn ToolDetector>,
    cache: ResultCache,
    clock: Arc<dyn Clock>,
    ttl: chrono::Duration,
}

impl DetectionService {
    pub fn new(
        openocd: Arc<dyn ToolDetector>,
        cross_compiler: Arc<dyn ToolDetector>,
        clock: Arc<dyn Clock>,
        ttl: chrono::Duration,
    ) -> Self {
        Self {
            openocd,
            cross_compiler,
            cache: ResultCache::new(clock.clone()),
            clock,
            ttl,
        }
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    fn detector(&self, kind: ToolKind) -> Arc<dyn ToolDetector> {
        match kind {
            ToolKind::OpenOcd => self.openocd.clone(),
            ToolKind::CrossCompiler => self.cross_compiler.clone(),
        }
    }

    /// Run one detector on its own task; a panic becomes a FAILED result
    async fn run_detector(&self, kind: ToolKind, wanted: bool, as_of: chrono::DateTime<chrono::Utc>) -> Option<DetectionResult> {
        if !wanted {
            return None;
        }
        let detector = self.detector(kind);
        let handle = tokio::spawn(async move { detector.detect(as_of).await });
        Some(match handle.await {
            Ok(result) => result,
            Err(e) => {
                warn!("{} detector task failed: {}", kind.display_name(), e);
                DetectionResult::failed(kind, format!("{} detector crashed: {}", kind.display_name(), e), as_of)
            }
        })
    }

    /// Detection under the cache policy.
    ///
    /// Without `force_redetection`, a valid cache whose requested entries have
    /// been detected is returned as is. Otherwise the requested detectors run
    /// concurrently; a full run replaces the cache, a partial run updates only
    /// the requested entries.
    pub async fn detect(&self, options: &DetectOptions) -> DetectionSnapshot {
        let requested = options.requested();

        if !options.force_redetection {
            if let Some(cached) = self.cache.valid_snapshot(self.ttl).await {
                let covered = requested
                    .iter()
                    .all(|k| cached.get(*k).status() != DetectionStatus::NotStarted);
                if covered {
                    debug!("Using cached detection from {}", cached.completed_at);
                    return cached;
                }
            }
        }

        let as_of = self.clock.now();
        let (openocd, cross_compiler) = tokio::join!(
            self.run_detector(ToolKind::OpenOcd, requested.contains(&ToolKind::OpenOcd), as_of),
            self.run_detector(ToolKind::CrossCompiler, requested.contains(&ToolKind::CrossCompiler), as_of),
        );

        let mut snapshot = DetectionSnapshot::empty(self.clock.now());
        for (kind, result) in [(ToolKind::OpenOcd, openocd), (ToolKind::CrossCompiler, cross_compiler)] {
            if let Some(result) = result {
                snapshot.set(kind, result);
            }
        }
        info!(
            "Detection finished: {}/{} requested tools found",
            requested.iter().filter(|k| snapshot.get(**k).is_success()).count(),
            requested.len()
        );

        if requested.len() == ToolKind::ALL.len() {
            self.cache.set_cached(snapshot.clone()).await;
            snapshot
        } else {
            self.cache.update_specific(&snapshot, &requested).await
        }
    }
}

/// Everything the MCP tools need, constructed once at startup
pub struct DebugSetupService {
    detection: DetectionService,
    inspector: Arc<dyn ProjectInspector>,
    validator: IntegrityValidator,
    generator: ConfigGenerator,
    settings: Arc<dyn SettingsStore>,
    default_workspace: Option<PathBuf>,
}

impl DebugSetupService {
    /// Assemble from explicit collaborators
    pub fn new(
        config: &Config,
        env: Arc<dyn EnvSource>,
        settings: Arc<dyn SettingsStore>,
        runner: Arc<dyn CommandRunner>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut ctx = DetectorContext::new(env.clone(), settings.clone(), runner)
            .with_version_timeout(config.detection.version_timeout());
        if let Some(path) = &config.detection.openocd_path {
            ctx = ctx.with_override(ToolKind::OpenOcd, path);
        }
        if let Some(path) = &config.detection.toolchain_path {
            ctx = ctx.with_override(ToolKind::CrossCompiler, path);
        }
        let platform = ctx.platform;

        let detection = DetectionService::new(
            Arc::new(ChainDetector::openocd(ctx.clone())),
            Arc::new(ChainDetector::cross_compiler(ctx)),
            clock.clone(),
            config.detection.cache_ttl(),
        );

        Self {
            detection,
            inspector: Arc::new(FsProjectInspector::new(env)),
            validator: IntegrityValidator::new(platform),
            generator: ConfigGenerator::new(config.generator.clone(), platform, clock),
            settings,
            default_workspace: config.workspace.default_path.clone(),
        }
    }

    /// Real environment, real processes, settings from the configured file
    pub fn from_config(config: &Config) -> Result<Self> {
        let settings: Arc<dyn SettingsStore> = match &config.workspace.settings_file {
            Some(path) => Arc::new(TomlSettings::open(path)?),
            None => Arc::new(MemorySettings::new()),
        };
        Ok(Self::new(
            config,
            Arc::new(ProcessEnv),
            settings,
            Arc::new(TokioCommandRunner),
            Arc::new(SystemClock),
        ))
    }

    pub fn with_detection(mut self, detection: DetectionService) -> Self {
        self.detection = detection;
        self
    }

    pub fn with_inspector(mut self, inspector: Arc<dyn ProjectInspector>) -> Self {
        self.inspector = inspector;
        self
    }

    pub fn with_generator(mut self, generator: ConfigGenerator) -> Self {
        self.generator = generator;
        self
    }

    pub fn cache(&self) -> &ResultCache {
        self.detection.cache()
    }

    pub fn default_workspace(&self) -> Option<&Path> {
        self.default_workspace.as_deref()
    }

    pub async fn detect(&self, options: &DetectOptions) -> DetectionSnapshot {
        self.detection.detect(options).await
    }

    pub fn validate(&self, path: &Path, kind: ToolKind) -> ValidationReport {
        self.validator.validate(path, kind)
    }

    pub fn analyze_project(&self, workspace: Option<&Path>) -> Result<ProjectState> {
        self.inspector
            .analyze(workspace.or(self.default_workspace.as_deref()))
    }

    fn integrity(&self, snapshot: &DetectionSnapshot) -> Vec<ValidationReport> {
        ToolKind::ALL
            .iter()
            .filter_map(|kind| {
                let path = snapshot.get(*kind).resolved_path()?;
                Some(self.validator.validate(path, *kind))
            })
            .collect()
    }

    fn compose_scan(&self, snapshot: DetectionSnapshot, workspace: Option<&Path>) -> ScanResult {
        let mut errors = Vec::new();
        let project = match self.analyze_project(workspace) {
            Ok(project) => project,
            Err(e) => {
                warn!("Project analysis failed: {}", e);
                errors.push(format!("Project analysis failed: {}", e));
                ProjectState::no_workspace()
            }
        };
        let integrity = self.integrity(&snapshot);
        ScanResult::compose(snapshot, project, integrity, errors)
    }

    /// Detect both tools, analyze the workspace, and advise
    pub async fn scan(&self, options: &ScanOptions) -> ScanResult {
        let snapshot = self
            .detect(&DetectOptions {
                force_redetection: options.force_redetection,
                specific_tools: None,
            })
            .await;
        let result = self.compose_scan(snapshot, options.workspace.as_deref());
        info!(
            "Scan complete: {:?}, {} recommendations",
            result.status,
            result.recommendations.len()
        );
        result
    }

    pub fn generate(
        &self,
        device_id: &str,
        snapshot: &DetectionSnapshot,
        project: Option<&ProjectState>,
        options: &GenerateOptions,
    ) -> Result<GeneratedConfiguration> {
        self.generator.generate(device_id, snapshot, project, options)
    }

    pub fn generate_variants(
        &self,
        device_id: &str,
        snapshot: &DetectionSnapshot,
        project: Option<&ProjectState>,
        options: &GenerateOptions,
    ) -> Result<Vec<GeneratedVariant>> {
        self.generator.generate_variants(device_id, snapshot, project, options)
    }

    /// Scan, generate, and optionally persist, checking `cancel` between
    /// stages. Nothing is written unless every stage completes.
    pub async fn scan_and_generate(&self, request: &SetupRequest, cancel: CancellationToken) -> Result<SetupOutcome> {
        let snapshot = self
            .detect(&DetectOptions {
                force_redetection: request.scan.force_redetection,
                specific_tools: None,
            })
            .await;
        if cancel.is_cancelled() {
            info!("Setup cancelled after detection");
            return Err(SetupError::Cancelled);
        }

        let scan = self.compose_scan(snapshot, request.scan.workspace.as_deref());
        if cancel.is_cancelled() {
            info!("Setup cancelled after project analysis");
            return Err(SetupError::Cancelled);
        }

        let project = scan.project_state.has_workspace.then_some(&scan.project_state);
        let configuration = self.generate(&request.device, &scan.snapshot, project, &request.options)?;
        if cancel.is_cancelled() {
            info!("Setup cancelled after generation");
            return Err(SetupError::Cancelled);
        }

        let launch_file = match (request.write_launch_file, scan.project_state.workspace.as_deref()) {
            (true, Some(workspace)) => Some(self.write_launch_config(workspace, &configuration.debug_config)?),
            (true, None) => {
                return Err(SetupError::Persistence(
                    "Cannot write launch.json without a workspace".to_string(),
                ))
            }
            (false, _) => None,
        };

        Ok(SetupOutcome {
            scan,
            configuration,
            launch_file,
        })
    }

    /// Script catalog of the detected OpenOCD, if it has one
    pub async fn scripts(&self) -> Option<ScriptCatalog> {
        let snapshot = self.detect(&DetectOptions {
            force_redetection: false,
            specific_tools: Some(vec![ToolKind::OpenOcd]),
        })
        .await;
        ScriptCatalog::discover(snapshot.openocd.resolved_path()?)
    }

    /// Persist detected paths as explicit overrides. The compiler is saved as
    /// its `bin` directory. Returns how many keys were written.
    pub async fn save_tool_paths(&self) -> Result<usize> {
        let snapshot = self.detect(&DetectOptions::default()).await;
        let openocd = snapshot.openocd.resolved_path();
        let toolchain_bin = snapshot
            .cross_compiler
            .resolved_path()
            .and_then(|gcc| gcc.parent())
            .map(Path::to_path_buf);
        settings::save_tool_paths(self.settings.as_ref(), openocd, toolchain_bin.as_deref())
    }

    pub fn write_launch_config(&self, workspace: &Path, config: &DebugConfig) -> Result<PathBuf> {
        launch_file::write_launch_config(workspace, config)
    }

    pub async fn clear_cache(&self) {
        self.detection.cache().clear().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::detect::Strategy;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Detector with a fixed answer that counts its runs
    struct StubDetector {
        kind: ToolKind,
        path: Option<PathBuf>,
        runs: AtomicUsize,
    }

    impl StubDetector {
        fn new(kind: ToolKind, path: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                kind,
                path: path.map(PathBuf::from),
                runs: AtomicUsize::new(0),
            })
        }

        fn runs(&self) -> usize {
            self.runs.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ToolDetector for StubDetector {
        fn kind(&self) -> ToolKind {
            self.kind
        }

        async fn detect(&self, as_of: DateTime<Utc>) -> DetectionResult {
            self.runs.fetch_add(1, Ordering::SeqCst);
            match &self.path {
                Some(path) => DetectionResult::success(self.kind, path.clone(), Strategy::PathScan, None, as_of),
                None => DetectionResult::failed(self.kind, "not found", as_of),
            }
        }
    }

    struct PanickingDetector;

    #[async_trait]
    impl ToolDetector for PanickingDetector {
        fn kind(&self) -> ToolKind {
            ToolKind::CrossCompiler
        }

        async fn detect(&self, _as_of: DateTime<Utc>) -> DetectionResult {
            panic!("detector bug");
        }
    }

    fn service(
        openocd: Arc<StubDetector>,
        gcc: Arc<StubDetector>,
        clock: Arc<ManualClock>,
    ) -> DetectionService {
        DetectionService::new(openocd, gcc, clock, chrono::Duration::seconds(300))
    }

    #[tokio::test]
    async fn test_valid_cache_skips_detectors() {
        let clock = Arc::new(ManualClock::default());
        let openocd = StubDetector::new(ToolKind::OpenOcd, Some("/usr/bin/openocd"));
        let gcc = StubDetector::new(ToolKind::CrossCompiler, Some("/usr/bin/arm-none-eabi-gcc"));
        let svc = service(openocd.clone(), gcc.clone(), clock.clone());

        let first = svc.detect(&DetectOptions::default()).await;
        let second = svc.detect(&DetectOptions::default()).await;
        assert_eq!(first, second);
        assert_eq!(openocd.runs(), 1);
        assert_eq!(gcc.runs(), 1);

        clock.advance(chrono::Duration::seconds(301));
        svc.detect(&DetectOptions::default()).await;
        assert_eq!(openocd.runs(), 2);

        svc.detect(&DetectOptions::forced()).await;
        assert_eq!(openocd.runs(), 3);
    }

    #[tokio::test]
    async fn test_specific_tools_leave_others_cached() {
        let clock = Arc::new(ManualClock::default());
        let openocd = StubDetector::new(ToolKind::OpenOcd, Some("/usr/bin/openocd"));
        let gcc = StubDetector::new(ToolKind::CrossCompiler, None);
        let svc = service(openocd.clone(), gcc.clone(), clock.clone());

        let full = svc.detect(&DetectOptions::default()).await;
        clock.advance(chrono::Duration::seconds(5));

        let partial = svc
            .detect(&DetectOptions {
                force_redetection: true,
                specific_tools: Some(vec![ToolKind::OpenOcd]),
            })
            .await;
        assert_eq!(openocd.runs(), 2);
        assert_eq!(gcc.runs(), 1);
        assert_eq!(partial.cross_compiler, full.cross_compiler);
        assert_eq!(partial.completed_at, clock.now());
    }

    #[tokio::test]
    async fn test_specific_tool_detected_when_missing_from_cache() {
        let clock = Arc::new(ManualClock::default());
        let openocd = StubDetector::new(ToolKind::OpenOcd, Some("/usr/bin/openocd"));
        let gcc = StubDetector::new(ToolKind::CrossCompiler, Some("/usr/bin/arm-none-eabi-gcc"));
        let svc = service(openocd.clone(), gcc.clone(), clock);

        svc.detect(&DetectOptions {
            force_redetection: false,
            specific_tools: Some(vec![ToolKind::OpenOcd]),
        })
        .await;
        assert_eq!(gcc.runs(), 0);

        let snapshot = svc.detect(&DetectOptions::default()).await;
        assert_eq!(gcc.runs(), 1);
        assert_eq!(openocd.runs(), 2);
        assert!(snapshot.cross_compiler.is_success());
    }

    #[tokio::test]
    async fn test_panicking_detector_becomes_failed_result() {
        let clock = Arc::new(ManualClock::default());
        let openocd = StubDetector::new(ToolKind::OpenOcd, Some("/usr/bin/openocd"));
        let svc = DetectionService::new(openocd, Arc::new(PanickingDetector), clock, chrono::Duration::seconds(60));

        let snapshot = svc.detect(&DetectOptions::default()).await;
        assert!(snapshot.openocd.is_success());
        assert_eq!(snapshot.cross_compiler.status(), DetectionStatus::Failed);
        assert!(snapshot.cross_compiler.error_message().unwrap().contains("crashed"));
    }

    fn setup_service(openocd: Option<&str>, gcc: Option<&str>) -> DebugSetupService {
        let clock = Arc::new(ManualClock::default());
        let detection = DetectionService::new(
            StubDetector::new(ToolKind::OpenOcd, openocd),
            StubDetector::new(ToolKind::CrossCompiler, gcc),
            clock.clone(),
            chrono::Duration::seconds(300),
        );
        DebugSetupService::new(
            &Config::default(),
            Arc::new(crate::env::MapEnv::new()),
            Arc::new(MemorySettings::new()),
            Arc::new(TokioCommandRunner),
            clock,
        )
        .with_detection(detection)
    }

    #[tokio::test]
    async fn test_scan_and_generate_cancelled_writes_nothing() {
        let tmp = tempfile::TempDir::new().unwrap();
        let svc = setup_service(Some("/usr/bin/openocd"), Some("/usr/bin/arm-none-eabi-gcc"));
        let token = CancellationToken::new();
        token.cancel();

        let request = SetupRequest {
            scan: ScanOptions {
                workspace: Some(tmp.path().to_path_buf()),
                force_redetection: false,
            },
            device: "STM32F407VG".to_string(),
            write_launch_file: true,
            ..Default::default()
        };
        let err = svc.scan_and_generate(&request, token).await.unwrap_err();
        assert!(matches!(err, SetupError::Cancelled));
        assert!(!tmp.path().join(".vscode/launch.json").exists());
    }

    #[tokio::test]
    async fn test_scan_and_generate_writes_launch_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("CMakeLists.txt"), "project(blinky)\n").unwrap();
        let svc = setup_service(Some("/usr/bin/openocd"), None);

        let request = SetupRequest {
            scan: ScanOptions {
                workspace: Some(tmp.path().to_path_buf()),
                force_redetection: false,
            },
            device: "STM32F407VG".to_string(),
            write_launch_file: true,
            ..Default::default()
        };
        let outcome = svc.scan_and_generate(&request, CancellationToken::new()).await.unwrap();
        assert_eq!(outcome.launch_file, Some(tmp.path().join(".vscode/launch.json")));
        assert_eq!(outcome.configuration.debug_config.executable, "${workspaceFolder}/build/blinky.elf");
        assert_eq!(outcome.configuration.metadata.confidence_percent, 70);
    }

    #[tokio::test]
    async fn test_save_tool_paths_uses_bin_dir() {
        let settings = Arc::new(MemorySettings::new());
        let clock = Arc::new(ManualClock::default());
        let detection = DetectionService::new(
            StubDetector::new(ToolKind::OpenOcd, None),
            StubDetector::new(ToolKind::CrossCompiler, Some("/opt/arm/bin/arm-none-eabi-gcc")),
            clock.clone(),
            chrono::Duration::seconds(300),
        );
        let svc = DebugSetupService::new(
            &Config::default(),
            Arc::new(crate::env::MapEnv::new()),
            settings.clone(),
            Arc::new(TokioCommandRunner),
            clock,
        )
        .with_detection(detection);

        assert_eq!(svc.save_tool_paths().await.unwrap(), 1);
        assert_eq!(
            settings.get(settings::TOOLCHAIN_SECTION, settings::TOOLCHAIN_PATH_KEY).as_deref(),
            Some("/opt/arm/bin")
        );
        assert!(settings.get(settings::OPENOCD_SECTION, settings::OPENOCD_PATH_KEY).is_none());
    }
}
