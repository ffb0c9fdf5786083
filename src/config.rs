use crate::aggregator::DEFAULT_SYSTEM_NAME;
use crate::poller::{PollerConfig, SampleData};
use crate::rpc::{DEFAULT_FETCH_ATTEMPTS, DEFAULT_PORT};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub poller: PollerSection,
    #[serde(default)]
    pub timing: TimingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollerSection {
    /// Magnum cluster address.
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Services to monitor; omit to monitor everything the node reports.
    #[serde(default)]
    pub services: Vec<String>,
    /// Services that run only on the active side of a redundant pair.
    #[serde(default)]
    pub redundancy_services: Vec<String>,
    #[serde(default = "default_system_name")]
    pub system_name: String,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub disable_overall: bool,
    /// JSON file with a metrics `result` to use instead of the network.
    #[serde(default)]
    pub sample_data_file: Option<PathBuf>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_system_name() -> String {
    DEFAULT_SYSTEM_NAME.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Per read/write/connect socket timeout.
    #[serde(default = "default_io_timeout_secs")]
    pub io_timeout_secs: u64,
    #[serde(default = "default_fetch_attempts")]
    pub fetch_attempts: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            io_timeout_secs: default_io_timeout_secs(),
            fetch_attempts: default_fetch_attempts(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_io_timeout_secs() -> u64 {
    2
}

fn default_fetch_attempts() -> u32 {
    DEFAULT_FETCH_ATTEMPTS
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.poller.address.trim().is_empty(),
            "poller.address must be non-empty"
        );
        anyhow::ensure!(
            self.poller.port > 0,
            "poller.port must be between 1 and 65535, got {}",
            self.poller.port
        );
        anyhow::ensure!(
            !self.poller.system_name.is_empty(),
            "poller.system_name must be non-empty"
        );
        anyhow::ensure!(
            self.poller.services.iter().all(|s| !s.is_empty()),
            "poller.services must not contain empty names"
        );
        anyhow::ensure!(
            self.poller.redundancy_services.iter().all(|s| !s.is_empty()),
            "poller.redundancy_services must not contain empty names"
        );
        anyhow::ensure!(
            self.timing.poll_interval_secs > 0,
            "timing.poll_interval_secs must be > 0, got {}",
            self.timing.poll_interval_secs
        );
        anyhow::ensure!(
            self.timing.io_timeout_secs > 0,
            "timing.io_timeout_secs must be > 0, got {}",
            self.timing.io_timeout_secs
        );
        anyhow::ensure!(
            self.timing.fetch_attempts > 0,
            "timing.fetch_attempts must be > 0, got {}",
            self.timing.fetch_attempts
        );
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.timing.poll_interval_secs)
    }

    pub fn poller_config(&self) -> PollerConfig {
        let p = &self.poller;
        PollerConfig {
            address: p.address.clone(),
            port: p.port,
            services: p.services.clone(),
            redundancy_services: p.redundancy_services.clone(),
            system_name: p.system_name.clone(),
            verbose: p.verbose,
            disable_overall: p.disable_overall,
            sample_data: p.sample_data_file.clone().map(SampleData::File),
            io_timeout: Duration::from_secs(self.timing.io_timeout_secs),
            fetch_attempts: self.timing.fetch_attempts,
        }
    }
}
