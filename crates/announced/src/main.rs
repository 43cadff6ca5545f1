// # announced - Master-server Announce Daemon
//
// A standalone host for the announce service, for game servers that run
// the announcer as a sidecar process instead of an in-process plug-in.
//
// The daemon is responsible for:
// 1. Reading configuration from environment variables (and an optional JSON file)
// 2. Loading the announce service and handing it the server settings
// 3. Driving the per-frame tick that prints diagnostics
// 4. Shutting the service down on SIGINT/SIGTERM
//
// ## Configuration
//
// ### Announce
// - `ANNOUNCE_CONFIG`: Path to a JSON configuration file (optional)
// - `ANNOUNCE_SERVERS`: Space or comma separated master-server addresses
// - `ANNOUNCE_VERBOSE`: Print every announce attempt (true/false)
// - `ANNOUNCE_UPDATE_INTERVAL`: Seconds between rounds (default 60, minimum 1)
// - `ANNOUNCE_REQUEST_TIMEOUT`: Per-request timeout in seconds (default 10)
// - `ANNOUNCE_USER_AGENT`: User agent sent to master-servers
//
// ### Game server
// - `ANNOUNCE_SERVER_PORT`: Port players connect to (default 8192)
// - `ANNOUNCE_SERVER_VERSION`: Protocol version reported to master-servers (required)
//
// ### Logging
// - `ANNOUNCE_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// Environment values override the JSON file.
//
// ## Example
//
// ```bash
// export ANNOUNCE_SERVERS="master.example.org/announce.php backup.example.org:8080"
// export ANNOUNCE_SERVER_PORT=8192
// export ANNOUNCE_SERVER_VERSION=67000
//
// announced
// ```

use announce_core::{AnnounceConfig, AnnounceService, HostBridge, ServerSettings};
use announce_http::HttpTransport;
use anyhow::{Context, Result};
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// How often the daemon runs the host tick
const FRAME_INTERVAL: Duration = Duration::from_millis(100);

/// Port reported when `ANNOUNCE_SERVER_PORT` is not set
const DEFAULT_SERVER_PORT: u16 = 8192;

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DaemonExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DaemonExitCode> for ExitCode {
    fn from(code: DaemonExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Daemon configuration
#[derive(Debug)]
struct Config {
    config_file: Option<String>,
    servers: Option<Vec<String>>,
    verbose: Option<bool>,
    update_interval_secs: Option<i64>,
    request_timeout_secs: Option<u64>,
    user_agent: Option<String>,
    server_port: u16,
    server_version: u32,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let server_version = lookup("ANNOUNCE_SERVER_VERSION").context(
            "ANNOUNCE_SERVER_VERSION is required. \
            Set it via: export ANNOUNCE_SERVER_VERSION=67000",
        )?;

        Ok(Self {
            config_file: lookup("ANNOUNCE_CONFIG").filter(|s| !s.is_empty()),
            servers: lookup("ANNOUNCE_SERVERS").map(|s| split_servers(&s)),
            verbose: lookup("ANNOUNCE_VERBOSE")
                .map(|s| parse_bool("ANNOUNCE_VERBOSE", &s))
                .transpose()?,
            update_interval_secs: lookup("ANNOUNCE_UPDATE_INTERVAL")
                .map(|s| parse_number("ANNOUNCE_UPDATE_INTERVAL", &s))
                .transpose()?,
            request_timeout_secs: lookup("ANNOUNCE_REQUEST_TIMEOUT")
                .map(|s| parse_number("ANNOUNCE_REQUEST_TIMEOUT", &s))
                .transpose()?,
            user_agent: lookup("ANNOUNCE_USER_AGENT"),
            server_port: lookup("ANNOUNCE_SERVER_PORT")
                .map(|s| parse_number("ANNOUNCE_SERVER_PORT", &s))
                .transpose()?
                .unwrap_or(DEFAULT_SERVER_PORT),
            server_version: parse_number("ANNOUNCE_SERVER_VERSION", &server_version)?,
            log_level: lookup("ANNOUNCE_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.server_port == 0 {
            anyhow::bail!("ANNOUNCE_SERVER_PORT must be between 1 and 65535");
        }

        if self.servers.is_none() && self.config_file.is_none() {
            anyhow::bail!(
                "No master-servers configured. \
                Set ANNOUNCE_SERVERS or point ANNOUNCE_CONFIG at a JSON file"
            );
        }

        if let Some(ref path) = self.config_file
            && !std::path::Path::new(path).is_file()
        {
            anyhow::bail!("ANNOUNCE_CONFIG does not point at a file: {}", path);
        }

        if self.request_timeout_secs == Some(0) {
            anyhow::bail!("ANNOUNCE_REQUEST_TIMEOUT must be at least 1 second");
        }

        self.log_level()?;
        Ok(())
    }

    fn log_level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => anyhow::bail!(
                "ANNOUNCE_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }

    /// Build the announce configuration: JSON file first, environment on top
    fn announce_config(&self) -> Result<AnnounceConfig> {
        let mut config = match self.config_file {
            Some(ref path) => AnnounceConfig::from_json_file(path)
                .with_context(|| format!("Failed to load {}", path))?,
            None => AnnounceConfig::default(),
        };

        if let Some(ref servers) = self.servers {
            config.servers = servers.clone();
        }
        if let Some(verbose) = self.verbose {
            config.verbose = verbose;
        }
        if let Some(secs) = self.update_interval_secs {
            config.update_interval_secs = secs;
        }
        if let Some(secs) = self.request_timeout_secs {
            config.request_timeout_secs = secs;
        }
        if let Some(ref user_agent) = self.user_agent {
            config.user_agent = user_agent.clone();
        }

        Ok(config)
    }
}

fn split_servers(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("{} must be true or false. Got: {}", key, value),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("{} must be a number. Got: {}", key, value))
}

/// Host settings taken from the environment
struct EnvHost {
    port: u16,
    version: u32,
}

impl HostBridge for EnvHost {
    fn server_settings(&self) -> ServerSettings {
        ServerSettings { port: self.port }
    }

    fn server_version(&self) -> u32 {
        self.version
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DaemonExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return DaemonExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = config.log_level().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DaemonExitCode::ConfigError.into();
    }

    info!("Starting announced daemon");

    let mut service = match start_service(&config) {
        Ok(service) => service,
        Err(e) => {
            error!("Startup failed: {:#}", e);
            return startup_exit_code(&e).into();
        }
    };

    // The announce engine owns its own thread; this runtime only drives the
    // frame tick and signal handling.
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            service.on_shutdown();
            return DaemonExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        match run_frames(&service).await {
            Ok(signal) => {
                info!("Received shutdown signal: {}", signal);
                DaemonExitCode::CleanShutdown
            }
            Err(e) => {
                error!("Daemon error: {:#}", e);
                DaemonExitCode::RuntimeError
            }
        }
    });

    info!("Shutting down daemon");
    for status in service.on_shutdown() {
        if status.valid {
            info!(
                "Master-server {} {}: {} consecutive failure(s)",
                status.id, status.url, status.failures
            );
        } else {
            warn!(
                "Master-server {} {}: invalid after {} failure(s)",
                status.id, status.url, status.failures
            );
        }
    }

    result.into()
}

/// Exit code for a failed startup
///
/// Anything the operator can fix in the configuration exits with 1; the
/// rest (TLS backend, thread spawning) counts as a runtime failure.
fn startup_exit_code(error: &anyhow::Error) -> DaemonExitCode {
    match error.downcast_ref::<announce_core::Error>() {
        Some(e) if !e.is_fatal_to_startup() => DaemonExitCode::RuntimeError,
        _ => DaemonExitCode::ConfigError,
    }
}

/// Load the service and start announcing
fn start_service(config: &Config) -> Result<AnnounceService> {
    let announce_config = config.announce_config()?;
    info!(
        "Configuration loaded: {} master-server(s)",
        announce_config.servers.len()
    );

    let transport = HttpTransport::new(announce_config.request_timeout())?;
    let mut service = AnnounceService::load(announce_config, Arc::new(transport))?;

    let host = EnvHost {
        port: config.server_port,
        version: config.server_version,
    };
    if !service.on_initialize(&host) {
        anyhow::bail!("No master-server left to announce to");
    }

    Ok(service)
}

/// Run the host tick until a shutdown signal arrives
async fn run_frames(service: &AnnounceService) -> Result<&'static str> {
    let mut frames = tokio::time::interval(FRAME_INTERVAL);
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = wait_for_shutdown();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            signal = &mut shutdown => return signal,
            _ = frames.tick() => {
                service.on_tick();
            }
        }
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    tokio::select! {
        _ = sigterm.recv() => Ok("SIGTERM"),
        _ = sigint.recv() => Ok("SIGINT"),
    }
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
