// Raw metrics as returned by get.health.metrics.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One `[label, value, status]` triple reported for a host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, String, String)", into = "(String, String, String)")]
pub struct RawMetric {
    pub label: String,
    pub value: String,
    pub status: String,
}

impl RawMetric {
    pub fn new(
        label: impl Into<String>,
        value: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            status: status.into(),
        }
    }
}

impl From<(String, String, String)> for RawMetric {
    fn from((label, value, status): (String, String, String)) -> Self {
        Self {
            label,
            value,
            status,
        }
    }
}

impl From<RawMetric> for (String, String, String) {
    fn from(m: RawMetric) -> Self {
        (m.label, m.value, m.status)
    }
}

/// Everything the node knows about one host for this cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostCollection {
    pub hostname: String,
    pub overall_health: String,
    #[serde(default)]
    pub health_metrics: Vec<RawMetric>,
}

/// The `result` payload of get.health.metrics. Keys are node-assigned and not meaningful;
/// the hostname inside each collection is what scopes the derived records.
pub type RawMetrics = BTreeMap<String, HostCollection>;
