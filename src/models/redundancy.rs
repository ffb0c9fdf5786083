// Per-host redundancy / failover records.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Failover status derived from the cluster resource tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RedundancyStatus {
    #[serde(rename = "Server Active/Online")]
    ActiveOnline,
    #[serde(rename = "Server Standby/Online")]
    StandbyOnline,
    #[serde(rename = "Server Error Online")]
    ErrorOnline,
    #[serde(rename = "Server Error Offline")]
    ErrorOffline,
}

impl RedundancyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedundancyStatus::ActiveOnline => "Server Active/Online",
            RedundancyStatus::StandbyOnline => "Server Standby/Online",
            RedundancyStatus::ErrorOnline => "Server Error Online",
            RedundancyStatus::ErrorOffline => "Server Error Offline",
        }
    }
}

impl std::fmt::Display for RedundancyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedundancyState {
    #[serde(rename = "s_host")]
    pub host: String,
    #[serde(rename = "s_status")]
    pub status: RedundancyStatus,
    #[serde(rename = "s_maintenance", skip_serializing_if = "Option::is_none")]
    pub maintenance: Option<String>,
    #[serde(rename = "s_online", skip_serializing_if = "Option::is_none")]
    pub online: Option<String>,
    #[serde(rename = "i_resources_running")]
    pub resources_running: u32,
    #[serde(rename = "i_resources_stopped")]
    pub resources_stopped: u32,
    #[serde(rename = "s_system")]
    pub system: String,
    #[serde(rename = "s_type")]
    pub kind: String,
}

/// Hostname -> redundancy state.
pub type RedundancyStateMap = BTreeMap<String, RedundancyState>;
