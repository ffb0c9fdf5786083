// Public entry point: one poll cycle from fetch (or sample data) to derived records.

use crate::aggregator::{DEFAULT_SYSTEM_NAME, HealthAggregator};
use crate::classifier::MetricClassifier;
use crate::models::{RawMetrics, RedundancyStateMap, ServiceStateMap};
use crate::rpc::{DEFAULT_FETCH_ATTEMPTS, DEFAULT_PORT, RpcClient};
use crate::transport::{DEFAULT_IO_TIMEOUT, TcpTransport, Transport};
use anyhow::Context;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Metrics supplied by the caller instead of the network.
#[derive(Debug, Clone)]
pub enum SampleData {
    Inline(RawMetrics),
    /// JSON file holding a get.health.metrics `result`; re-read on every poll.
    File(PathBuf),
}

impl SampleData {
    pub fn load(&self) -> anyhow::Result<RawMetrics> {
        match self {
            SampleData::Inline(metrics) => Ok(metrics.clone()),
            SampleData::File(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading sample data {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("parsing sample data {}", path.display()))
            }
        }
    }
}

/// Everything the poller needs to know; each field has exactly one effect.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub address: String,
    pub port: u16,
    /// Services to report. Empty means discover them from the metric labels.
    pub services: Vec<String>,
    /// Services that are expected to be stopped on the standby side of a redundant pair.
    pub redundancy_services: Vec<String>,
    /// Redundancy group label copied into every redundancy record.
    pub system_name: String,
    pub verbose: bool,
    pub disable_overall: bool,
    pub sample_data: Option<SampleData>,
    pub io_timeout: Duration,
    pub fetch_attempts: u32,
}

impl PollerConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            port: DEFAULT_PORT,
            services: Vec::new(),
            redundancy_services: Vec::new(),
            system_name: DEFAULT_SYSTEM_NAME.to_string(),
            verbose: false,
            disable_overall: false,
            sample_data: None,
            io_timeout: DEFAULT_IO_TIMEOUT,
            fetch_attempts: DEFAULT_FETCH_ATTEMPTS,
        }
    }

    /// Services the classifier groups by. An explicit list is extended with the redundancy
    /// services so their state is always derived; auto-discovery stays untouched.
    pub fn service_allowlist(&self) -> Vec<String> {
        if self.services.is_empty() {
            return Vec::new();
        }
        let mut names = self.services.clone();
        for name in &self.redundancy_services {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }
}

pub struct Poller<T: Transport = TcpTransport> {
    client: RpcClient<T>,
    classifier: MetricClassifier,
    aggregator: HealthAggregator,
    sample_data: Option<SampleData>,
    verbose: bool,
}

impl Poller<TcpTransport> {
    /// Build a poller over TCP. No connection is opened until the first poll.
    pub fn new(config: PollerConfig) -> Self {
        let transport = TcpTransport::new(config.io_timeout);
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> Poller<T> {
    pub fn with_transport(config: PollerConfig, transport: T) -> Self {
        let client = RpcClient::new(transport, config.address.clone(), config.port)
            .with_fetch_attempts(config.fetch_attempts)
            .with_verbose(config.verbose);
        let classifier = MetricClassifier::new(config.service_allowlist());
        let aggregator = HealthAggregator::new(config.redundancy_services, config.system_name)
            .with_overall(!config.disable_overall);
        Self {
            client,
            classifier,
            aggregator,
            sample_data: config.sample_data,
            verbose: config.verbose,
        }
    }

    pub fn client(&self) -> &RpcClient<T> {
        &self.client
    }

    pub async fn connect(&mut self) -> bool {
        self.client.connect().await
    }

    /// Run one cycle. Network trouble yields empty maps; only a bad sample-data source
    /// is an error.
    #[instrument(skip(self), fields(address = %self.client.address()))]
    pub async fn poll_once(&mut self) -> anyhow::Result<(ServiceStateMap, RedundancyStateMap)> {
        let metrics = match &self.sample_data {
            Some(sample) => Some(sample.load()?),
            None => {
                if !self.client.transport().is_connected() {
                    self.client.connect().await;
                }
                self.client.fetch_with_retry().await
            }
        };

        let Some(metrics) = metrics else {
            return Ok((ServiceStateMap::new(), RedundancyStateMap::new()));
        };

        let classified = self.classifier.classify_all(&metrics);
        if self.verbose {
            info!(groups = ?classified, "classified metrics");
        } else {
            debug!(hosts = classified.len(), "classified metrics");
        }

        let (services, redundancy) = self.aggregator.aggregate(&classified);
        if self.verbose {
            info!(?services, ?redundancy, "derived states");
        }
        info!(
            hosts = services.len(),
            services = services.values().map(|h| h.services.len()).sum::<usize>(),
            "poll complete"
        );
        Ok((services, redundancy))
    }

    /// Poll every `interval` until `shutdown` completes, handing each cycle's maps to
    /// `on_cycle`. The first cycle runs immediately. A shutdown that fires while a cycle is
    /// in flight is honoured as soon as that cycle returns. Returns the number of cycles run.
    pub async fn run_until<S, F>(
        &mut self,
        interval: Duration,
        shutdown: S,
        mut on_cycle: F,
    ) -> anyhow::Result<u64>
    where
        S: Future<Output = ()>,
        F: FnMut(ServiceStateMap, RedundancyStateMap) -> anyhow::Result<()>,
    {
        let mut tick = tokio::time::interval(interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        let mut cycles = 0;
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!(cycles, "shutdown requested");
                    return Ok(cycles);
                }
                _ = tick.tick() => {
                    let (services, redundancy) = self.poll_once().await?;
                    cycles += 1;
                    on_cycle(services, redundancy)?;
                }
            }
        }
    }

    /// Release the connection. Returns false if there was nothing to close.
    pub async fn shutdown(&mut self) -> bool {
        self.client.close().await
    }
}
