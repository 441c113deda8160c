//! The strategy-chain detector used for every tool kind

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::env::{EnvSource, Platform, ProcessEnv};
use crate::error::{Result, SetupError};
use crate::paths::{expand_template, normalize_path, probe_file, resolve_wildcard, split_path_list};
use crate::process::{CommandRunner, TokioCommandRunner};
use crate::settings::{tool_path_override, MemorySettings, SettingsStore};

use super::strategy::{Strategy, ToolSpec};
use super::version::query_tool_info;
use super::{arm_gcc, openocd, DetectionResult, ToolDetector, ToolKind};

pub const DEFAULT_VERSION_TIMEOUT: Duration = Duration::from_secs(3);

/// Collaborators shared by all detectors
#[derive(Clone)]
pub struct DetectorContext {
    pub env: Arc<dyn EnvSource>,
    pub settings: Arc<dyn SettingsStore>,
    pub runner: Arc<dyn CommandRunner>,
    pub platform: Platform,
    /// Overrides from the command line or config file; checked before `settings`
    pub overrides: HashMap<ToolKind, PathBuf>,
    pub version_timeout: Duration,
}

impl DetectorContext {
    pub fn new(
        env: Arc<dyn EnvSource>,
        settings: Arc<dyn SettingsStore>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            env,
            settings,
            runner,
            platform: Platform::current(),
            overrides: HashMap::new(),
            version_timeout: DEFAULT_VERSION_TIMEOUT,
        }
    }

    /// Real environment, real processes, no stored settings
    pub fn system() -> Self {
        Self::new(
            Arc::new(ProcessEnv),
            Arc::new(MemorySettings::new()),
            Arc::new(TokioCommandRunner),
        )
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_override(mut self, kind: ToolKind, path: impl Into<PathBuf>) -> Self {
        self.overrides.insert(kind, path.into());
        self
    }

    pub fn with_version_timeout(mut self, timeout: Duration) -> Self {
        self.version_timeout = timeout;
        self
    }
}

/// Detector that walks [`Strategy::ORDER`] and stops at the first regular file
#[derive(Clone)]
pub struct ChainDetector {
    spec: ToolSpec,
    ctx: DetectorContext,
}

impl ChainDetector {
    pub fn new(spec: ToolSpec, ctx: DetectorContext) -> Self {
        Self { spec, ctx }
    }

    pub fn openocd(ctx: DetectorContext) -> Self {
        Self::new(openocd::spec(ctx.platform), ctx)
    }

    pub fn cross_compiler(ctx: DetectorContext) -> Self {
        Self::new(arm_gcc::spec(ctx.platform), ctx)
    }

    /// Replace the common-location table
    pub fn with_common_locations(mut self, locations: Vec<String>) -> Self {
        self.spec.common_locations = locations;
        self
    }

    pub fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    fn executable_name(&self) -> String {
        self.ctx.platform.executable_name(&self.spec.executable)
    }

    /// `base`, `base/<exe>`, `base/bin/<exe>`: first that is a regular file
    fn probe_shapes(base: &Path, exe: &str) -> Result<Option<PathBuf>> {
        for candidate in [base.to_path_buf(), base.join(exe), base.join("bin").join(exe)] {
            if probe_file(&candidate)? {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    fn from_override(&self, exe: &str) -> Result<Option<PathBuf>> {
        let configured = self
            .ctx
            .overrides
            .get(&self.spec.kind)
            .cloned()
            .into_iter()
            .chain(tool_path_override(self.ctx.settings.as_ref(), self.spec.kind));

        for path in configured {
            if let Some(found) = Self::probe_shapes(&path, exe)? {
                return Ok(Some(found));
            }
            warn!(
                "Configured {} path does not exist: {}",
                self.spec.kind.display_name(),
                path.display()
            );
        }
        Ok(None)
    }

    fn from_env_vars(&self, exe: &str) -> Result<Option<PathBuf>> {
        for var in &self.spec.env_vars {
            let Some(value) = self.ctx.env.var(var).filter(|v| !v.trim().is_empty()) else {
                continue;
            };
            debug!("Checking ${} = {}", var, value);
            if let Some(found) = Self::probe_shapes(Path::new(value.trim()), exe)? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    fn path_value(&self) -> String {
        self.ctx
            .env
            .var("PATH")
            .or_else(|| self.ctx.env.var("Path"))
            .unwrap_or_default()
    }

    fn from_path_scan(&self, exe: &str, path_value: &str) -> Result<Option<PathBuf>> {
        for dir in split_path_list(path_value, self.ctx.platform) {
            let candidate = dir.join(exe);
            if probe_file(&candidate)? {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    async fn from_lookup_command(&self, exe: &str, path_value: &str) -> Result<Option<PathBuf>> {
        // With no PATH there is nothing for which/where to search.
        if path_value.trim().is_empty() {
            return Ok(None);
        }

        let lookup = self.ctx.platform.lookup_command();
        let output = match self
            .ctx
            .runner
            .run(Path::new(lookup), &[exe], Some(path_value), self.ctx.version_timeout)
            .await
        {
            Ok(output) if output.success => output,
            Ok(_) => return Ok(None),
            Err(e) => {
                debug!("{} {} failed: {}", lookup, exe, e);
                return Ok(None);
            }
        };

        for line in output.stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let candidate = PathBuf::from(line);
            if probe_file(&candidate)? {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    fn from_common_locations(&self) -> Result<Option<PathBuf>> {
        for template in &self.spec.common_locations {
            let Some(expanded) = expand_template(template, self.ctx.env.as_ref()) else {
                continue;
            };
            if let Some(found) = resolve_wildcard(&expanded)? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    /// Run a filesystem-walking strategy on the blocking pool
    async fn blocking<F>(&self, step: F) -> Result<Option<PathBuf>>
    where
        F: FnOnce(&ChainDetector) -> Result<Option<PathBuf>> + Send + 'static,
    {
        let detector = self.clone();
        tokio::task::spawn_blocking(move || step(&detector))
            .await
            .map_err(|e| SetupError::Internal(format!("{} detection task failed: {}", self.spec.kind, e)))?
    }

    /// Run the strategy chain without the version query
    pub async fn locate(&self) -> Result<Option<(PathBuf, Strategy)>> {
        let exe = self.executable_name();
        let path_value = self.path_value();

        for strategy in Strategy::ORDER {
            let found = match strategy {
                Strategy::UserOverride => {
                    let exe = exe.clone();
                    self.blocking(move |d| d.from_override(&exe)).await?
                }
                Strategy::EnvironmentVariable => {
                    let exe = exe.clone();
                    self.blocking(move |d| d.from_env_vars(&exe)).await?
                }
                Strategy::PathScan => {
                    let (exe, path_value) = (exe.clone(), path_value.clone());
                    self.blocking(move |d| d.from_path_scan(&exe, &path_value)).await?
                }
                Strategy::LookupCommand => self.from_lookup_command(&exe, &path_value).await?,
                Strategy::CommonLocation => self.blocking(|d| d.from_common_locations()).await?,
            };
            if let Some(path) = found {
                return Ok(Some((normalize_path(&path), strategy)));
            }
            debug!("{}: {} found nothing", self.spec.kind, strategy);
        }
        Ok(None)
    }
}

#[async_trait]
impl ToolDetector for ChainDetector {
    fn kind(&self) -> ToolKind {
        self.spec.kind
    }

    async fn detect(&self, as_of: DateTime<Utc>) -> DetectionResult {
        let kind = self.spec.kind;
        debug!("Detecting {}", kind.display_name());

        match self.locate().await {
            Ok(Some((path, strategy))) => {
                info!("Found {} at {} ({})", kind.display_name(), path.display(), strategy);
                let tool_info = query_tool_info(
                    self.ctx.runner.as_ref(),
                    kind,
                    &path,
                    self.ctx.version_timeout,
                    as_of,
                )
                .await;
                DetectionResult::success(kind, path, strategy, Some(tool_info), as_of)
            }
            Ok(None) => {
                info!("{} not found", kind.display_name());
                DetectionResult::failed(
                    kind,
                    format!(
                        "{} ({}) was not found by any detection strategy. {}",
                        kind.display_name(),
                        self.executable_name(),
                        kind.install_hint()
                    ),
                    as_of,
                )
            }
            Err(e) => {
                warn!("{} detection failed: {}", kind.display_name(), e);
                DetectionResult::failed(kind, format!("{} detection failed: {}", kind.display_name(), e), as_of)
            }
        }
    }
}
