// Domain models: raw metrics from the remote node and the records derived from them.

mod metric;
mod redundancy;
mod service;

pub use metric::{HostCollection, RawMetric, RawMetrics};
pub use redundancy::{RedundancyState, RedundancyStateMap, RedundancyStatus};
pub use service::{
    HostServiceStates, OverallHealth, ServiceState, ServiceStateMap, state, OVERALL_HEALTH,
};
