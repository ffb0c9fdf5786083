// Split a host's flat metric list into per-service groups and the cluster group.
//
// Matching is plain substring containment on the metric label. A metric lands in every
// service group whose name occurs in its label, and independently in the cluster group
// when the label mentions "Cluster".

use crate::models::{HostCollection, RawMetric, RawMetrics};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Marker that routes a metric into the cluster group.
pub const CLUSTER_MARKER: &str = "Cluster";

/// "Services: magstoresrv Total Resident Memory" -> "magstoresrv"
static SERVICE_LABEL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"Services:\s([a-zA-Z\-]*)\s.*").ok());

/// Service name -> that service's metrics in arrival order.
pub type ServiceMetricGroup = BTreeMap<String, Vec<RawMetric>>;

/// Metrics whose label contains [`CLUSTER_MARKER`], in arrival order.
pub type ClusterMetricGroup = Vec<RawMetric>;

/// Classified metrics for one host.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostGroups {
    pub hostname: String,
    /// Overall health text reported by the node, carried through to the rollup.
    pub overall_health: String,
    pub services: ServiceMetricGroup,
    pub cluster: ClusterMetricGroup,
}

/// Hostname -> classified metrics.
pub type ClassifiedMetrics = BTreeMap<String, HostGroups>;

#[derive(Debug, Clone, Default)]
pub struct MetricClassifier {
    allowlist: Vec<String>,
}

impl MetricClassifier {
    /// An empty allowlist switches to auto-discovery.
    pub fn new(allowlist: Vec<String>) -> Self {
        Self { allowlist }
    }

    pub fn auto_discover() -> Self {
        Self::default()
    }

    pub fn allowlist(&self) -> &[String] {
        &self.allowlist
    }

    pub fn classify_all(&self, metrics: &RawMetrics) -> ClassifiedMetrics {
        metrics
            .values()
            .map(|host| (host.hostname.clone(), self.classify(host)))
            .collect()
    }

    pub fn classify(&self, host: &HostCollection) -> HostGroups {
        let mut services = if self.allowlist.is_empty() {
            discover_services(&host.health_metrics)
        } else {
            // Configured names stay present even when no metric mentions them.
            self.allowlist
                .iter()
                .map(|name| (name.clone(), Vec::new()))
                .collect()
        };
        let mut cluster = Vec::new();

        for metric in &host.health_metrics {
            for (name, group) in services.iter_mut() {
                if metric.label.contains(name.as_str()) {
                    group.push(metric.clone());
                }
            }
            if metric.label.contains(CLUSTER_MARKER) {
                cluster.push(metric.clone());
            }
        }

        HostGroups {
            hostname: host.hostname.clone(),
            overall_health: host.overall_health.clone(),
            services,
            cluster,
        }
    }
}

/// Discover service names from "Services: <name> ..." labels, first match wins.
///
/// A label that already contains a known name is skipped before the regex runs, so a
/// service whose name contains an already discovered one (e.g. "magsys" after "mag") is
/// never discovered on its own.
pub fn discover_services(metrics: &[RawMetric]) -> ServiceMetricGroup {
    let mut found = ServiceMetricGroup::new();
    let Some(pattern) = SERVICE_LABEL.as_ref() else {
        return found;
    };
    for metric in metrics {
        if found.keys().any(|name| metric.label.contains(name.as_str())) {
            continue;
        }
        for caps in pattern.captures_iter(&metric.label) {
            if let Some(name) = caps.get(1).map(|m| m.as_str()).filter(|n| !n.is_empty()) {
                found.entry(name.to_string()).or_default();
            }
        }
    }
    found
}
