// src/config.rs

//! Manages server configuration: loading, defaults, and validation.

use crate::core::profile::ConnectionProfile;
use crate::core::registry::RetryPolicy;
use crate::core::scanner::{DEFAULT_HARD_CAP, DEFAULT_PAGE_SIZE, ScanOptions};
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::time::Duration;
use tracing::warn;

/// Connection establishment settings for the session registry.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RegistryConfig {
    /// Retries after the first failed connect attempt.
    #[serde(default = "default_connect_retries")]
    pub connect_retries: u32,
    /// Fixed delay between connect attempts.
    #[serde(with = "humantime_serde", default = "default_retry_backoff")]
    pub retry_backoff: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            connect_retries: default_connect_retries(),
            retry_backoff: default_retry_backoff(),
        }
    }
}

impl RegistryConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.connect_retries,
            backoff: self.retry_backoff,
        }
    }
}

fn default_connect_retries() -> u32 {
    2
}
fn default_retry_backoff() -> Duration {
    Duration::from_millis(200)
}

/// Defaults for keyspace scans; requests may override them per call.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ScanConfig {
    #[serde(default = "default_hard_cap")]
    pub hard_cap: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            hard_cap: default_hard_cap(),
            page_size: default_page_size(),
        }
    }
}

impl ScanConfig {
    pub fn defaults(&self) -> ScanOptions {
        ScanOptions {
            hard_cap: self.hard_cap,
            page_size: self.page_size,
            ..ScanOptions::default()
        }
    }
}

fn default_hard_cap() -> usize {
    DEFAULT_HARD_CAP
}
fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

/// Configuration for the Prometheus metrics endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct MetricsConfig {
    /// If true, `GET /metrics` is served next to the API.
    #[serde(default)]
    pub enabled: bool,
}

/// A raw representation of the config file before validation.
#[derive(Deserialize)]
struct RawConfig {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default)]
    registry: RegistryConfig,
    #[serde(default)]
    scan: ScanConfig,
    #[serde(default)]
    metrics: MetricsConfig,
    #[serde(default)]
    connections: Vec<ConnectionProfile>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    7979
}
fn default_log_level() -> String {
    "info".to_string()
}

/// Represents the final, validated server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// Saved connection profiles served by the static profile store.
    #[serde(default)]
    pub connections: Vec<ConnectionProfile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            registry: RegistryConfig::default(),
            scan: ScanConfig::default(),
            metrics: MetricsConfig::default(),
            connections: Vec::new(),
        }
    }
}

impl Config {
    /// Creates a new `Config` instance by reading and parsing a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        Self::from_toml_str(&contents).with_context(|| format!("Invalid config in '{path}'"))
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(contents).context("Failed to parse TOML")?;

        let config = Config {
            host: raw.host,
            port: raw.port,
            log_level: raw.log_level,
            registry: raw.registry,
            scan: raw.scan,
            metrics: raw.metrics,
            connections: raw.connections,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration to ensure logical consistency.
    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(anyhow!("port cannot be 0"));
        }
        if self.host.trim().is_empty() {
            return Err(anyhow!("host cannot be empty"));
        }
        if self.scan.hard_cap == 0 {
            return Err(anyhow!("scan.hard_cap cannot be 0"));
        }
        if self.scan.page_size == 0 {
            return Err(anyhow!("scan.page_size cannot be 0"));
        }
        if self.registry.connect_retries > 10 {
            warn!(
                "registry.connect_retries is {}; requests to an unreachable backend will stall for a long time",
                self.registry.connect_retries
            );
        }

        let mut seen = HashSet::new();
        for (i, profile) in self.connections.iter().enumerate() {
            if profile.id.trim().is_empty() {
                return Err(anyhow!("connection #{}: id cannot be empty", i + 1));
            }
            if profile.host.trim().is_empty() {
                return Err(anyhow!("connection '{}': host cannot be empty", profile.id));
            }
            if profile.port == 0 {
                return Err(anyhow!("connection '{}': port cannot be 0", profile.id));
            }
            if let Some(db) = profile.default_db
                && db < 0
            {
                return Err(anyhow!("connection '{}': default_db cannot be negative", profile.id));
            }
            if !seen.insert(profile.id.as_str()) {
                return Err(anyhow!("duplicate connection id '{}'", profile.id));
            }
        }

        Ok(())
    }
}
