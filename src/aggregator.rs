// Turn classified metrics into service states, the overall rollup and redundancy status.
//
// Redundancy is derived first: the Standby rewrite of a service state depends on it.

use crate::classifier::{ClassifiedMetrics, HostGroups};
use crate::models::{
    HostServiceStates, OverallHealth, RawMetric, RedundancyState, RedundancyStateMap,
    RedundancyStatus, ServiceState, ServiceStateMap, state,
};
use tracing::debug;

pub const LABEL_STATE: &str = "State";
pub const LABEL_CPU: &str = "CPU Usage (%)";
pub const LABEL_MEMORY: &str = "Memory Usage (%)";
pub const LABEL_RESIDENT: &str = "Total Resident Memory";
pub const LABEL_CLUSTER_RESOURCE: &str = "Cluster: Resource";
pub const LABEL_PID: &str = "Main PID";
pub const LABEL_MAINTENANCE: &str = "Cluster: Maintenance mode";

/// Cluster resources that carry the failover IPs; their Started/Stopped values decide
/// whether a host is the active or the standby side.
pub const CLUSTER_TOKENS: [&str; 4] = ["cl-token", "cl-ip1", "db-ip1", "db-token"];

/// Resource values that count as running.
pub const RUNNING_RESOURCE_VALUES: [&str; 3] = ["Started", "Slave", "Master"];

const STATUS_OK: &str = "Ok";
const ONLINE_YES: &str = "Yes";
const TOKEN_STARTED: &str = "Started";
const TOKEN_STOPPED: &str = "Stopped";

pub const DEFAULT_SYSTEM_NAME: &str = "Magnum";

#[derive(Debug, Clone)]
pub struct HealthAggregator {
    redundancy_services: Vec<String>,
    system_name: String,
    overall_enabled: bool,
}

impl Default for HealthAggregator {
    fn default() -> Self {
        Self {
            redundancy_services: Vec::new(),
            system_name: DEFAULT_SYSTEM_NAME.to_string(),
            overall_enabled: true,
        }
    }
}

impl HealthAggregator {
    pub fn new(redundancy_services: Vec<String>, system_name: impl Into<String>) -> Self {
        Self {
            redundancy_services,
            system_name: system_name.into(),
            overall_enabled: true,
        }
    }

    pub fn with_overall(mut self, enabled: bool) -> Self {
        self.overall_enabled = enabled;
        self
    }

    /// Derive both maps. Redundancy is computed for every host before any service state.
    pub fn aggregate(&self, classified: &ClassifiedMetrics) -> (ServiceStateMap, RedundancyStateMap) {
        let redundancy: RedundancyStateMap = classified
            .iter()
            .map(|(host, groups)| {
                (
                    host.clone(),
                    derive_redundancy(host, &groups.cluster, &self.system_name),
                )
            })
            .collect();

        let services = classified
            .iter()
            .map(|(host, groups)| {
                let states = self.host_states(host, groups, redundancy.get(host));
                (host.clone(), states)
            })
            .collect();

        (services, redundancy)
    }

    fn host_states(
        &self,
        host: &str,
        groups: &HostGroups,
        redundancy: Option<&RedundancyState>,
    ) -> HostServiceStates {
        let redundancy_status = redundancy.map(|r| r.status);
        if redundancy_status.is_none() {
            debug!(host, "redundancy status unknown; standby rewrite skipped");
        }

        let services = groups
            .services
            .iter()
            .map(|(name, metrics)| {
                let tracked = self.redundancy_services.iter().any(|s| s == name);
                let state = derive_service_state(name, metrics, redundancy_status, tracked);
                (name.clone(), state)
            })
            .collect();

        let mut host_states = HostServiceStates {
            services,
            overall: None,
        };
        if self.overall_enabled {
            host_states.overall = Some(rollup_overall(&host_states, &groups.overall_health));
        }
        host_states
    }
}

/// Build one service record from its metrics in arrival order.
///
/// `redundancy_tracked` marks services that are expected to be stopped on the standby
/// side; their "Not Running" is rewritten to "Standby" while the host is
/// Server Standby/Online.
pub fn derive_service_state(
    service: &str,
    metrics: &[RawMetric],
    redundancy: Option<RedundancyStatus>,
    redundancy_tracked: bool,
) -> ServiceState {
    let mut out = ServiceState::not_available(service);

    for metric in metrics {
        let label = metric.label.as_str();
        if label.contains(LABEL_STATE) {
            out.state = metric.value.clone();
            if metric.value == state::NOT_RUNNING
                && redundancy == Some(RedundancyStatus::StandbyOnline)
                && redundancy_tracked
            {
                out.state = state::STANDBY.to_string();
            }
        } else if label.contains(LABEL_CPU) {
            out.cpu = parse_percent_fraction(&metric.value);
        } else if label.contains(LABEL_MEMORY) {
            out.memory = parse_percent_fraction(&metric.value);
        } else if label.contains(LABEL_RESIDENT) {
            out.memory_bytes = parse_byte_size(&metric.value);
        } else if label.contains(LABEL_CLUSTER_RESOURCE) {
            out.cluster = Some(metric.value.clone());
        } else if label.contains(LABEL_PID) {
            out.pid = Some(metric.value.clone());
        }

        // First status sticks only while everything is Ok; a later non-Ok always replaces it.
        // An empty status counts as unset.
        if metric.status != STATUS_OK || out.status.as_deref().is_none_or(str::is_empty) {
            out.status = Some(metric.status.clone());
        }
    }

    out
}

/// Sum every service of the host. Any service that is neither Running nor Standby is
/// counted as failed and flips the overall state to Not Running.
pub fn rollup_overall(host: &HostServiceStates, node_status: &str) -> OverallHealth {
    let mut overall = OverallHealth::new(node_status);
    for svc in host.services.values() {
        overall.cpu += svc.cpu;
        overall.memory += svc.memory;
        overall.memory_bytes = overall.memory_bytes.saturating_add(svc.memory_bytes);
        overall.num_services += 1;
        if !svc.is_healthy() {
            overall.state = state::NOT_RUNNING.to_string();
            overall.num_failed += 1;
        }
    }
    overall
}

/// Scan the host's cluster metrics for maintenance, online and failover-token entries and
/// count cluster resources.
pub fn derive_redundancy(host: &str, cluster: &[RawMetric], system_name: &str) -> RedundancyState {
    let online_label = format!("Cluster: Online ({})", host);
    let mut maintenance = None;
    let mut online = None;
    let mut tokens: Vec<&str> = Vec::new();
    let mut running = 0;
    let mut stopped = 0;

    for metric in cluster {
        let label = metric.label.as_str();
        if label.contains(LABEL_MAINTENANCE) {
            maintenance = Some(metric.value.clone());
        } else if label.contains(&online_label) {
            online = Some(metric.value.clone());
        } else if CLUSTER_TOKENS.iter().any(|t| label.contains(t)) {
            tokens.push(&metric.value);
        }

        if label.contains(LABEL_CLUSTER_RESOURCE) {
            if RUNNING_RESOURCE_VALUES.iter().any(|v| metric.value.contains(v)) {
                running += 1;
            } else {
                stopped += 1;
            }
        }
    }

    RedundancyState {
        host: host.to_string(),
        status: redundancy_status(online.as_deref(), &tokens),
        maintenance,
        online,
        resources_running: running,
        resources_stopped: stopped,
        system: system_name.to_string(),
        kind: "redundancy".to_string(),
    }
}

/// Online + all tokens Started is the active side, online + all Stopped the standby side;
/// anything mixed is an error. An empty token list counts as all Started.
pub fn redundancy_status(online: Option<&str>, tokens: &[&str]) -> RedundancyStatus {
    if online != Some(ONLINE_YES) {
        return RedundancyStatus::ErrorOffline;
    }
    if tokens.iter().all(|t| *t == TOKEN_STARTED) {
        RedundancyStatus::ActiveOnline
    } else if tokens.iter().all(|t| *t == TOKEN_STOPPED) {
        RedundancyStatus::StandbyOnline
    } else {
        RedundancyStatus::ErrorOnline
    }
}

/// "12.5%" -> 0.125, rounded to 3 decimals. Anything unparseable, negative or non-finite
/// yields 0.
pub fn parse_percent_fraction(raw: &str) -> f64 {
    let trimmed = raw.trim().trim_matches('%').trim();
    match trimmed.parse::<f64>() {
        Ok(pct) if pct.is_finite() && pct >= 0.0 => round3(pct / 100.0),
        _ => 0.0,
    }
}

/// Round on the exact decimal value of `v`, so 0.1235 (stored as 0.12349..) gives 0.123.
fn round3(v: f64) -> f64 {
    format!("{:.3}", v).parse().unwrap_or(0.0)
}

/// "1.5M" -> 1_500_000. Units are decimal: B, K, M, G, T. The unit is the last
/// character; a missing or unknown unit, or an unparseable number, yields 0.
pub fn parse_byte_size(raw: &str) -> u64 {
    let raw = raw.trim();
    let Some(unit) = raw.chars().last() else {
        return 0;
    };
    let multiplier: f64 = match unit {
        'B' => 1.0,
        'K' => 1e3,
        'M' => 1e6,
        'G' => 1e9,
        'T' => 1e12,
        _ => return 0,
    };
    let number = raw.split(unit).next().unwrap_or_default().trim();
    match number.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => (v * multiplier) as u64,
        _ => 0,
    }
}
