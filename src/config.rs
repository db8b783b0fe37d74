use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::error::SetupError;

/// Measure HTTP latency.
#[derive(Debug, Default, Parser)]
#[command(name = "http_ping")]
#[command(version)]
pub struct Args {
    /// URL to probe (http:// or https://)
    pub url: Option<String>,

    /// JSON configuration file; command-line flags take precedence
    #[arg(long, env = "HTTP_PING_CONFIG")]
    pub config: Option<PathBuf>,

    /// Number of probes to send (default: until interrupted)
    #[arg(short, long)]
    pub count: Option<u64>,

    /// Seconds to wait between probes, 0 for back-to-back
    #[arg(short, long)]
    pub interval: Option<u64>,

    /// Seconds before a probe counts as timed out (minimum 1)
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Leave Nagle's algorithm enabled
    #[arg(long)]
    pub nagle: bool,

    /// Only print the final statistics
    #[arg(short, long)]
    pub quiet: bool,

    /// Send requests through an HTTP proxy (host[:port])
    #[arg(long)]
    pub proxy: Option<String>,

    /// HTTP method to use instead of GET
    #[arg(long)]
    pub method: Option<String>,

    /// Host header to send instead of the URL's host
    #[arg(long)]
    pub vhost: Option<String>,

    /// Log level: trace, debug, info, warn or error
    #[arg(long)]
    pub log_level: Option<String>,

    /// DNS server to query instead of the system resolver (repeatable)
    #[arg(long = "dns-server")]
    pub dns_servers: Vec<String>,

    /// Serve Prometheus metrics on this address
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ProbeConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub nagle: bool,
    #[serde(default)]
    pub quiet: bool,
    #[serde(default)]
    pub proxy: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub vhost: Option<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub dns_servers: Vec<String>,
    #[serde(default)]
    pub metrics_addr: Option<SocketAddr>,
}

fn default_interval_secs() -> u64 {
    5
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            url: None,
            count: None,
            interval_secs: default_interval_secs(),
            timeout_secs: default_timeout_secs(),
            nagle: false,
            quiet: false,
            proxy: None,
            method: None,
            vhost: None,
            log_level: default_log_level(),
            dns_servers: Vec::new(),
            metrics_addr: None,
        }
    }
}

impl ProbeConfig {
    /// Build the effective configuration: defaults, then the optional JSON
    /// file, then command-line flags.
    pub fn load(args: Args) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::load_file_config(path)?,
            None => Self::default(),
        };
        config.apply_args(args);
        Ok(config)
    }

    fn load_file_config(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(anyhow::anyhow!("Config file not found: {}", path.display()));
        }
        let content = std::fs::read_to_string(path)?;
        let config: ProbeConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    fn apply_args(&mut self, args: Args) {
        if args.url.is_some() {
            self.url = args.url;
        }
        if args.count.is_some() {
            self.count = args.count;
        }
        if let Some(interval) = args.interval {
            self.interval_secs = interval;
        }
        if let Some(timeout) = args.timeout {
            self.timeout_secs = timeout;
        }
        self.nagle |= args.nagle;
        self.quiet |= args.quiet;
        if args.proxy.is_some() {
            self.proxy = args.proxy;
        }
        if args.method.is_some() {
            self.method = args.method;
        }
        if args.vhost.is_some() {
            self.vhost = args.vhost;
        }
        if let Some(level) = args.log_level {
            self.log_level = level;
        }
        if !args.dns_servers.is_empty() {
            self.dns_servers = args.dns_servers;
        }
        if args.metrics_addr.is_some() {
            self.metrics_addr = args.metrics_addr;
        }
    }

    /// Reject unusable settings and clamp the ones that have a sane floor.
    /// Returns a note for every value that was adjusted.
    pub fn normalize(&mut self) -> Result<Vec<String>, SetupError> {
        let mut notes = Vec::new();
        if self.url.is_none() {
            return Err(SetupError::Config("no URL given".to_string()));
        }
        if self.count == Some(0) {
            return Err(SetupError::Config("count must be positive".to_string()));
        }
        if self.timeout_secs < 1 {
            notes.push("timeout will be one second when set to less than one".to_string());
            self.timeout_secs = 1;
        }
        if let Some(method) = &self.method {
            if method.is_empty() || !method.bytes().all(|b| b.is_ascii_alphabetic()) {
                return Err(SetupError::Config(format!("invalid HTTP method {method:?}")));
            }
        }
        self.validate_log_level()
            .map_err(|e| SetupError::Config(e.to_string()))?;
        Ok(notes)
    }

    pub fn method(&self) -> &str {
        self.method.as_deref().unwrap_or("GET")
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Get the log level as a tracing::Level
    pub fn get_tracing_level(&self) -> Result<tracing::Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(tracing::Level::TRACE),
            "debug" => Ok(tracing::Level::DEBUG),
            "info" => Ok(tracing::Level::INFO),
            "warn" | "warning" => Ok(tracing::Level::WARN),
            "error" => Ok(tracing::Level::ERROR),
            _ => Err(anyhow::anyhow!(
                "Invalid log level: {}. Valid levels are: trace, debug, info, warn, error",
                self.log_level
            )),
        }
    }

    /// Validate the log level is one of the supported values
    pub fn validate_log_level(&self) -> Result<()> {
        self.get_tracing_level().map(|_| ())
    }
}
