// Host models

use serde::{Deserialize, Serialize};

/// Raw host reading. Percentages are already normalized by the provider;
/// network counters are cumulative since boot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostReading {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
    pub net_bytes_sent: u64,
    pub net_bytes_recv: u64,
}
