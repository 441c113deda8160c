//! RMCP 0.3.2 implementation of the debug-setup MCP tools
//!
//! Every tool is a thin wrapper over [`DebugSetupService`]; results are
//! returned as pretty-printed JSON text.

use rmcp::{
    tool, tool_router, tool_handler, ServerHandler,
    handler::server::{router::tool::ToolRouter, tool::Parameters},
    model::*,
    ErrorData as McpError,
    service::RequestContext,
    RoleServer,
};
use serde::Serialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::types::*;
use crate::clock::SystemClock;
use crate::config::Config;
use crate::detect::{DetectionSnapshot, ToolKind};
use crate::env::ProcessEnv;
use crate::error::SetupError;
use crate::process::TokioCommandRunner;
use crate::project::ProjectState;
use crate::scripts::ScriptCatalog;
use crate::service::{DebugSetupService, DetectOptions, ScanOptions, SetupRequest};
use crate::settings::MemorySettings;
use crate::templates;

/// debug-setup tool handler
#[derive(Clone)]
pub struct DebugSetupToolHandler {
    #[allow(dead_code)]
    tool_router: ToolRouter<DebugSetupToolHandler>,
    service: Arc<DebugSetupService>,
    /// Parent of every setup_debugging run; cancelled on shutdown
    shutdown: CancellationToken,
}

impl DebugSetupToolHandler {
    /// Handler over the real environment. Fails when the configured
    /// settings file cannot be opened, so saved paths are never silently lost.
    pub fn new(config: Config) -> crate::error::Result<Self> {
        Ok(Self::with_service(DebugSetupService::from_config(&config)?))
    }

    pub fn with_service(service: DebugSetupService) -> Self {
        Self {
            tool_router: Self::tool_router(),
            service: Arc::new(service),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn service(&self) -> &DebugSetupService {
        &self.service
    }

    /// Token that aborts in-flight setup runs when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    fn workspace_path(&self, workspace: Option<&str>) -> Option<PathBuf> {
        workspace
            .filter(|w| !w.trim().is_empty())
            .map(PathBuf::from)
            .or_else(|| self.service.default_workspace().map(Path::to_path_buf))
    }

    /// Snapshot plus project state for generation; the project is `None`
    /// when no workspace is open
    async fn generation_inputs(
        &self,
        workspace: Option<&str>,
    ) -> Result<(DetectionSnapshot, Option<ProjectState>), McpError> {
        let snapshot = self.service.detect(&DetectOptions::default()).await;
        let workspace = self.workspace_path(workspace);
        let project = self
            .service
            .analyze_project(workspace.as_deref())
            .map_err(to_mcp_error)?;
        Ok((snapshot, project.has_workspace.then_some(project)))
    }
}

impl Default for DebugSetupToolHandler {
    fn default() -> Self {
        Self::with_service(DebugSetupService::new(
            &Config::default(),
            Arc::new(ProcessEnv),
            Arc::new(MemorySettings::new()),
            Arc::new(TokioCommandRunner),
            Arc::new(SystemClock),
        ))
    }
}

fn to_mcp_error(error: SetupError) -> McpError {
    match error {
        SetupError::InvalidConfig(_) | SetupError::Persistence(_) | SetupError::Generation(_) => {
            McpError::invalid_params(error.to_string(), None)
        }
        _ => McpError::internal_error(error.to_string(), None),
    }
}

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| {
        McpError::internal_error(format!("Serialization error: {}", e), None)
    })?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

fn parse_tool_kind(name: &str) -> Result<ToolKind, McpError> {
    name.parse::<ToolKind>()
        .map_err(|e| McpError::invalid_params(format!("{}. Expected 'openocd' or 'cross_compiler'", e), None))
}

#[tool_router]
impl DebugSetupToolHandler {
    #[tool(description = "Detect OpenOCD and the ARM cross-compiler, analyze the workspace, check both installations for missing pieces, and return prioritized recommendations.")]
    async fn scan(
        &self,
        Parameters(args): Parameters<ScanArgs>,
    ) -> Result<CallToolResult, McpError> {
        debug!("Scanning (force_redetection={})", args.force_redetection);
        let result = self
            .service
            .scan(&ScanOptions {
                workspace: self.workspace_path(args.workspace.as_deref()),
                force_redetection: args.force_redetection,
            })
            .await;
        json_result(&result)
    }

    #[tool(description = "Detect debugger tools. Uses cached results for 5 minutes unless force_redetection is set. Restrict with tools: [\"openocd\", \"cross_compiler\"].")]
    async fn detect_tools(
        &self,
        Parameters(args): Parameters<DetectToolsArgs>,
    ) -> Result<CallToolResult, McpError> {
        let specific_tools = match args.tools {
            Some(names) => Some(
                names
                    .iter()
                    .map(|n| parse_tool_kind(n))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            None => None,
        };
        let snapshot = self
            .service
            .detect(&DetectOptions {
                force_redetection: args.force_redetection,
                specific_tools,
            })
            .await;
        json_result(&snapshot)
    }

    #[tool(description = "Check an OpenOCD or ARM GCC installation for missing executables and script directories. Without a path, the detected installation is checked.")]
    async fn validate_tool(
        &self,
        Parameters(args): Parameters<ValidateToolArgs>,
    ) -> Result<CallToolResult, McpError> {
        let kind = parse_tool_kind(&args.tool)?;
        let path = match args.path.filter(|p| !p.trim().is_empty()) {
            Some(path) => PathBuf::from(path),
            None => {
                let snapshot = self
                    .service
                    .detect(&DetectOptions {
                        force_redetection: false,
                        specific_tools: Some(vec![kind]),
                    })
                    .await;
                snapshot.get(kind).resolved_path().map(Path::to_path_buf).ok_or_else(|| {
                    McpError::invalid_params(
                        format!("{} was not detected; pass an explicit path", kind.display_name()),
                        None,
                    )
                })?
            }
        };
        json_result(&self.service.validate(&path, kind))
    }

    #[tool(description = "Generate a cortex-debug launch configuration for a device from the detected tools and the workspace's build output.")]
    async fn generate_config(
        &self,
        Parameters(args): Parameters<GenerateConfigArgs>,
    ) -> Result<CallToolResult, McpError> {
        let (snapshot, project) = self.generation_inputs(args.workspace.as_deref()).await?;
        let device = args.device.unwrap_or_default();
        let generated = self
            .service
            .generate(&device, &snapshot, project.as_ref(), &args.options)
            .map_err(to_mcp_error)?;
        json_result(&generated)
    }

    #[tool(description = "Generate the standard launch configuration variants for a device: basic, live watch, attach, SWO trace and RTT where supported.")]
    async fn generate_variants(
        &self,
        Parameters(args): Parameters<GenerateConfigArgs>,
    ) -> Result<CallToolResult, McpError> {
        let (snapshot, project) = self.generation_inputs(args.workspace.as_deref()).await?;
        let device = args.device.unwrap_or_default();
        let variants = self
            .service
            .generate_variants(&device, &snapshot, project.as_ref(), &args.options)
            .map_err(to_mcp_error)?;
        json_result(&serde_json::json!({ "variants": variants }))
    }

    #[tool(description = "Generate a launch configuration and merge it into the workspace's .vscode/launch.json, replacing an entry with the same name.")]
    async fn write_launch_config(
        &self,
        Parameters(args): Parameters<GenerateConfigArgs>,
    ) -> Result<CallToolResult, McpError> {
        let workspace = self
            .workspace_path(args.workspace.as_deref())
            .ok_or_else(|| McpError::invalid_params("No workspace given and no default workspace configured", None))?;
        let (snapshot, project) = self.generation_inputs(workspace.to_str()).await?;
        let device = args.device.unwrap_or_default();
        let generated = self
            .service
            .generate(&device, &snapshot, project.as_ref(), &args.options)
            .map_err(to_mcp_error)?;
        let path = self
            .service
            .write_launch_config(&workspace, &generated.debug_config)
            .map_err(to_mcp_error)?;
        info!("Wrote '{}' to {}", generated.debug_config.name, path.display());

        json_result(&WriteLaunchConfigResult {
            path,
            name: generated.debug_config.name,
        })
    }

    #[tool(description = "Scan, generate a configuration, and optionally write it to .vscode/launch.json in one step.")]
    async fn setup_debugging(
        &self,
        Parameters(args): Parameters<SetupDebuggingArgs>,
    ) -> Result<CallToolResult, McpError> {
        let request = SetupRequest {
            scan: ScanOptions {
                workspace: self.workspace_path(args.workspace.as_deref()),
                force_redetection: args.force_redetection,
            },
            device: args.device.unwrap_or_default(),
            options: args.options,
            write_launch_file: args.write,
        };
        let outcome = self
            .service
            .scan_and_generate(&request, self.shutdown.child_token())
            .await
            .map_err(to_mcp_error)?;
        json_result(&outcome)
    }

    #[tool(description = "Resolve a device identifier to its template: core, OpenOCD scripts, adapter speed, SVD file, memory map and debug features.")]
    async fn lookup_device(
        &self,
        Parameters(args): Parameters<LookupDeviceArgs>,
    ) -> Result<CallToolResult, McpError> {
        let found = templates::find_template(&args.device);
        json_result(&LookupDeviceResult {
            device: templates::normalize_device_id(&args.device),
            matched: found.matched,
            template: found.template,
        })
    }

    #[tool(description = "List the device families with built-in templates.")]
    async fn list_devices(
        &self,
        Parameters(_args): Parameters<ListDevicesArgs>,
    ) -> Result<CallToolResult, McpError> {
        let devices = templates::all_templates()
            .iter()
            .map(|t| DeviceSummary {
                key: t.key,
                family: t.family_id,
                core: t.core_name,
                target_script: t.default_target_script,
                memory_map: t.memory_map,
                features: t.features,
            })
            .collect();
        json_result(&ListDevicesResult { devices })
    }

    #[tool(description = "List the interface and target scripts shipped with an OpenOCD installation.")]
    async fn list_scripts(
        &self,
        Parameters(args): Parameters<ListScriptsArgs>,
    ) -> Result<CallToolResult, McpError> {
        let catalog = match args.openocd_path.filter(|p| !p.trim().is_empty()) {
            Some(path) => ScriptCatalog::discover(Path::new(&path)).ok_or_else(|| {
                McpError::invalid_params(format!("No OpenOCD scripts directory found for {}", path), None)
            })?,
            None => self.service.scripts().await.ok_or_else(|| {
                McpError::internal_error("OpenOCD was not detected or has no scripts directory", None)
            })?,
        };
        json_result(&catalog)
    }

    #[tool(description = "Save the detected OpenOCD and toolchain paths to the settings file so later detection uses them directly.")]
    async fn save_tool_paths(
        &self,
        Parameters(_args): Parameters<SaveToolPathsArgs>,
    ) -> Result<CallToolResult, McpError> {
        let keys_written = self.service.save_tool_paths().await.map_err(to_mcp_error)?;
        json_result(&SaveToolPathsResult { keys_written })
    }

    #[tool(description = "Forget cached detection results.")]
    async fn clear_cache(
        &self,
        Parameters(_args): Parameters<ClearCacheArgs>,
    ) -> Result<CallToolResult, McpError> {
        self.service.clear_cache().await;
        Ok(CallToolResult::success(vec![Content::text("Detection cache cleared")]))
    }
}

#[tool_handler]
impl ServerHandler for DebugSetupToolHandler {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Debug Setup MCP Server - Find OpenOCD and the ARM GCC toolchain and generate cortex-debug launch configurations. \
                 12 tools available: scan, detect_tools, validate_tool, generate_config, generate_variants, write_launch_config, \
                 setup_debugging, lookup_device, list_devices, list_scripts, save_tool_paths, clear_cache."
                    .to_string(),
            ),
        }
    }

    async fn initialize(
        &self,
        _request: InitializeRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<InitializeResult, McpError> {
        info!("Debug Setup MCP server initialized with 12 tools");
        Ok(self.get_info())
    }
}
