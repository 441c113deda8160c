//! Debug Setup MCP Server - Main Entry Point

use clap::Parser;
use tracing::{info, error, debug};
use tracing_subscriber::{EnvFilter, fmt};
use rmcp::{ServiceExt, transport::stdio};

use debug_setup::{
    Config,
    config::Args,
    tools::DebugSetupToolHandler,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if args.generate_config {
        let config = Config::default();
        println!("{}", config.to_toml()?);
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting Debug Setup MCP Server v{}", env!("CARGO_PKG_VERSION"));
    debug!("Command line args: {:?}", args);

    let mut config = Config::load(args.config.as_ref())
        .map_err(|e| {
            error!("Failed to load configuration: {}", e);
            e
        })?;
    config.merge_args(&args);

    if args.show_config {
        println!("{}", config.to_toml()?);
        return Ok(());
    }

    config.validate()
        .map_err(|e| {
            error!("Configuration validation failed: {}", e);
            e
        })?;

    let handler = DebugSetupToolHandler::new(config)
        .map_err(|e| {
            error!("Failed to open settings: {}", e);
            e
        })?;
    let shutdown = handler.shutdown_token();

    let service = handler
        .serve(stdio()).await.inspect_err(|e| {
            error!("Serving error: {:?}", e);
        })?;

    info!("Debug Setup MCP Server started successfully");

    tokio::select! {
        result = service.waiting() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, cancelling in-flight setup");
            shutdown.cancel();
        }
    }

    info!("Debug Setup MCP Server stopped");
    Ok(())
}

/// Initialize logging system
fn init_logging(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(false)
        .with_line_number(false);

    // stdout carries the MCP protocol, so logs never go there
    if let Some(log_file) = &args.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)?;
        subscriber.with_writer(file).init();
    } else {
        subscriber.with_writer(std::io::stderr).init();
    }

    debug!("Logging initialized with level: {}", args.log_level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::parse_from([
            "debug-setup",
            "--log-level", "debug",
            "--cache-ttl", "60",
            "--workspace", "/work/blinky",
        ]);

        assert_eq!(args.log_level, "debug");
        assert_eq!(args.cache_ttl, Some(60));
        assert_eq!(args.workspace.as_deref(), Some(std::path::Path::new("/work/blinky")));
        assert!(!args.generate_config);
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.detection.cache_ttl_seconds, 300);
        assert_eq!(config.generator.default_device, "STM32F407VG");
    }
}
