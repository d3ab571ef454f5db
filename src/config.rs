use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use tracing::trace;

use crate::labels::ProgramType;

/// Upper bound for the per-check timeout, in seconds
const MAX_TIMEOUT_SECS: u64 = 600;

/// Upper bound for checks a single worker keeps in flight
const MAX_CONCURRENCY: usize = 1000;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct PollerConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Per-check timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Local address outgoing checks are bound to
    pub source_ip: Option<IpAddr>,

    pub tls: Option<TlsConfig>,

    /// Checks a single worker keeps in flight at once
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Requeued items a worker takes per wakeup
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Seconds to wait for all workers to report as started
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout: u64,

    #[serde(default)]
    pub program_type: ProgramType,

    /// Statically configured items (used by the driver binary)
    #[serde(default)]
    pub items: Vec<ItemConfig>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            timeout: default_timeout(),
            source_ip: None,
            tls: None,
            max_concurrency: default_max_concurrency(),
            batch_size: default_batch_size(),
            startup_timeout: default_startup_timeout(),
            program_type: ProgramType::default(),
            items: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
pub struct TlsConfig {
    pub ca_file: Option<PathBuf>,
    pub cert_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ItemConfig {
    pub itemid: u64,

    /// Target in "host:port" form
    pub address: String,

    /// Seconds between two checks of this item
    #[serde(default = "default_delay")]
    pub delay: u64,

    pub interfaceid: Option<u64>,
    pub key: Option<String>,
}

/// Validated settings every worker needs to perform checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckConfig {
    pub timeout: Duration,
    pub source_ip: Option<IpAddr>,
    pub tls: Option<TlsConfig>,
    pub max_concurrency: usize,
    pub batch_size: usize,
}

impl CheckConfig {
    /// Validates the worker-visible part of the configuration
    ///
    /// Returns a human-readable message describing the first problem found.
    pub fn from_config(config: &PollerConfig) -> Result<Self, String> {
        if config.timeout == 0 || config.timeout > MAX_TIMEOUT_SECS {
            return Err(format!(
                "timeout {} is out of range (1-{MAX_TIMEOUT_SECS})",
                config.timeout
            ));
        }

        if config.max_concurrency == 0 || config.max_concurrency > MAX_CONCURRENCY {
            return Err(format!(
                "max_concurrency {} is out of range (1-{MAX_CONCURRENCY})",
                config.max_concurrency
            ));
        }

        if config.batch_size == 0 {
            return Err("batch_size must be at least 1".to_string());
        }

        if let Some(tls) = &config.tls {
            validate_tls(tls)?;
        }

        Ok(Self {
            timeout: Duration::from_secs(config.timeout),
            source_ip: config.source_ip,
            tls: config.tls.clone(),
            max_concurrency: config.max_concurrency,
            batch_size: config.batch_size,
        })
    }
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(default_timeout()),
            source_ip: None,
            tls: None,
            max_concurrency: default_max_concurrency(),
            batch_size: default_batch_size(),
        }
    }
}

fn validate_tls(tls: &TlsConfig) -> Result<(), String> {
    if tls.cert_file.is_some() != tls.key_file.is_some() {
        return Err("tls cert_file and key_file must be configured together".to_string());
    }

    for path in [&tls.ca_file, &tls.cert_file, &tls.key_file]
        .into_iter()
        .flatten()
    {
        if !path.is_file() {
            return Err(format!("tls file \"{}\" does not exist", path.display()));
        }
    }

    Ok(())
}

fn default_workers() -> usize {
    1
}

fn default_timeout() -> u64 {
    3
}

fn default_max_concurrency() -> usize {
    MAX_CONCURRENCY
}

fn default_batch_size() -> usize {
    1000
}

fn default_startup_timeout() -> u64 {
    10
}

fn default_delay() -> u64 {
    60
}

pub fn read_config_file(path: &str) -> anyhow::Result<PollerConfig> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}
