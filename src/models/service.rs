// Per-service state records and the per-host overall rollup.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key under which the overall rollup is reported alongside the services.
pub const OVERALL_HEALTH: &str = "overall_health";

/// State strings the poller produces or reasons about. Any other value reported by the
/// node is passed through verbatim.
pub mod state {
    pub const RUNNING: &str = "Running";
    pub const STANDBY: &str = "Standby";
    pub const NOT_RUNNING: &str = "Not Running";
    pub const NOT_AVAILABLE: &str = "Not Available";
    pub const MISSING: &str = "Missing";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceState {
    #[serde(rename = "s_service")]
    pub service: String,
    #[serde(rename = "s_state")]
    pub state: String,
    /// CPU usage as a fraction, 3 decimals.
    #[serde(rename = "d_cpu_p")]
    pub cpu: f64,
    /// Memory usage as a fraction, 3 decimals.
    #[serde(rename = "d_memory_p")]
    pub memory: f64,
    /// Total resident memory in bytes (decimal units).
    #[serde(rename = "l_memory_b")]
    pub memory_bytes: u64,
    #[serde(rename = "i_pid", skip_serializing_if = "Option::is_none")]
    pub pid: Option<String>,
    #[serde(rename = "s_cluster", skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    #[serde(rename = "s_status", skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "s_type")]
    pub kind: String,
}

impl ServiceState {
    /// Fallback record for a service with no metrics yet.
    pub fn not_available(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            state: state::NOT_AVAILABLE.to_string(),
            cpu: 0.0,
            memory: 0.0,
            memory_bytes: 0,
            pid: None,
            cluster: None,
            status: None,
            kind: "service".to_string(),
        }
    }

    /// Running and Standby are the healthy states; everything else counts as failed.
    pub fn is_healthy(&self) -> bool {
        self.state == state::RUNNING || self.state == state::STANDBY
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallHealth {
    #[serde(rename = "s_service")]
    pub service: String,
    #[serde(rename = "s_state")]
    pub state: String,
    #[serde(rename = "d_cpu_p")]
    pub cpu: f64,
    #[serde(rename = "d_memory_p")]
    pub memory: f64,
    #[serde(rename = "l_memory_b")]
    pub memory_bytes: u64,
    #[serde(rename = "i_num_services")]
    pub num_services: u32,
    #[serde(rename = "i_num_failed")]
    pub num_failed: u32,
    /// Overall health text as reported by the node for the host.
    #[serde(rename = "s_status")]
    pub status: String,
    #[serde(rename = "s_type")]
    pub kind: String,
}

impl OverallHealth {
    pub fn new(node_status: impl Into<String>) -> Self {
        Self {
            service: OVERALL_HEALTH.to_string(),
            state: state::RUNNING.to_string(),
            cpu: 0.0,
            memory: 0.0,
            memory_bytes: 0,
            num_services: 0,
            num_failed: 0,
            status: node_status.into(),
            kind: "overall".to_string(),
        }
    }
}

/// Everything derived for one host: its services and, when enabled, the overall rollup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostServiceStates {
    pub services: BTreeMap<String, ServiceState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall: Option<OverallHealth>,
}

/// Hostname -> derived service states.
pub type ServiceStateMap = BTreeMap<String, HostServiceStates>;
