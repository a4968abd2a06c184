use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use vulnscan_scanner::dispatch::{MAX_WORKERS, MIN_WORKERS};
use vulnscan_scanner::portscan::DEFAULT_PORT_RANGE;

pub const MIN_PAGES: usize = 1;
pub const MAX_PAGES: usize = 100;
pub const MIN_TIMEOUT_SECS: u64 = 1;
pub const MAX_TIMEOUT_SECS: u64 = 60;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max pages must be between {min} and {max}, got {0}", min = MIN_PAGES, max = MAX_PAGES)]
    MaxPages(usize),

    #[error("timeout must be between {min} and {max} seconds, got {0}", min = MIN_TIMEOUT_SECS, max = MAX_TIMEOUT_SECS)]
    Timeout(u64),

    #[error("thread count must be between {min} and {max}, got {0}", min = MIN_WORKERS, max = MAX_WORKERS)]
    Threads(usize),

    #[error("invalid target URL '{0}': {1}")]
    Target(String, String),

    #[error("port range must not be empty")]
    PortRange,
}

/// Settings for one scan. Built by the CLI from its flags and checked with
/// [`ScanConfig::validate`] before a session is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    pub target: String,
    pub max_pages: usize,
    pub timeout_secs: u64,
    pub threads: usize,
    pub enable_portscan: bool,
    pub port_range: String,
}

impl ScanConfig {
    pub fn new(target: &str) -> Self {
        Self {
            target: target.to_string(),
            max_pages: 10,
            timeout_secs: 5,
            threads: 5,
            enable_portscan: false,
            port_range: DEFAULT_PORT_RANGE.to_string(),
        }
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_portscan(mut self, enabled: bool) -> Self {
        self.enable_portscan = enabled;
        self
    }

    pub fn with_port_range(mut self, port_range: &str) -> Self {
        self.port_range = port_range.to_string();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_PAGES..=MAX_PAGES).contains(&self.max_pages) {
            return Err(ConfigError::MaxPages(self.max_pages));
        }
        if !(MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS).contains(&self.timeout_secs) {
            return Err(ConfigError::Timeout(self.timeout_secs));
        }
        if !(MIN_WORKERS..=MAX_WORKERS).contains(&self.threads) {
            return Err(ConfigError::Threads(self.threads));
        }

        let url = url::Url::parse(&self.target)
            .map_err(|e| ConfigError::Target(self.target.clone(), e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(ConfigError::Target(
                self.target.clone(),
                "expected an http(s) URL with a host".to_string(),
            ));
        }

        if self.enable_portscan && self.port_range.trim().is_empty() {
            return Err(ConfigError::PortRange);
        }

        Ok(())
    }

    /// Host part of the target, used for the port scan.
    pub fn host(&self) -> Option<String> {
        url::Url::parse(&self.target)
            .ok()
            .and_then(|u| u.host_str().map(String::from))
    }
}
