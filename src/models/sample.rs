// Samples and series keys

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One timestamped reading. `timestamp` is seconds since epoch, taken at tick start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: i64,
    pub fields: Vec<f64>,
}

impl Sample {
    pub fn new(timestamp: i64, fields: Vec<f64>) -> Self {
        Self { timestamp, fields }
    }

    pub fn single(timestamp: i64, value: f64) -> Self {
        Self {
            timestamp,
            fields: vec![value],
        }
    }

    pub fn field(&self, idx: usize) -> Option<f64> {
        self.fields.get(idx).copied()
    }
}

/// Host-level series; serializes lowercase ("cpu", "network").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostMetric {
    Cpu,
    Memory,
    Disk,
    Network,
}

impl HostMetric {
    pub const ALL: [HostMetric; 4] = [
        HostMetric::Cpu,
        HostMetric::Memory,
        HostMetric::Disk,
        HostMetric::Network,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HostMetric::Cpu => "cpu",
            HostMetric::Memory => "memory",
            HostMetric::Disk => "disk",
            HostMetric::Network => "network",
        }
    }

    /// Number of fields per sample. Network carries (bytes sent, bytes received).
    pub fn arity(&self) -> usize {
        match self {
            HostMetric::Network => 2,
            _ => 1,
        }
    }
}

impl FromStr for HostMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cpu" => Ok(HostMetric::Cpu),
            "memory" => Ok(HostMetric::Memory),
            "disk" => Ok(HostMetric::Disk),
            "network" => Ok(HostMetric::Network),
            other => Err(format!("unknown host metric: {}", other)),
        }
    }
}

/// Per-workload series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkloadMetric {
    Cpu,
    Memory,
}

impl WorkloadMetric {
    pub const ALL: [WorkloadMetric; 2] = [WorkloadMetric::Cpu, WorkloadMetric::Memory];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadMetric::Cpu => "cpu",
            WorkloadMetric::Memory => "memory",
        }
    }
}

impl FromStr for WorkloadMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cpu" => Ok(WorkloadMetric::Cpu),
            "memory" => Ok(WorkloadMetric::Memory),
            other => Err(format!("unknown workload metric: {}", other)),
        }
    }
}

/// Identifies one bounded buffer in the store.
///
/// Textual form (used as the persisted key): `host:<metric>` or `workload:<id>:<metric>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SeriesKey {
    Host(HostMetric),
    Workload { id: String, metric: WorkloadMetric },
}

impl SeriesKey {
    pub fn workload(id: impl Into<String>, metric: WorkloadMetric) -> Self {
        SeriesKey::Workload {
            id: id.into(),
            metric,
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            SeriesKey::Host(m) => m.arity(),
            SeriesKey::Workload { .. } => 1,
        }
    }

    pub fn is_host(&self) -> bool {
        matches!(self, SeriesKey::Host(_))
    }

    pub fn workload_id(&self) -> Option<&str> {
        match self {
            SeriesKey::Workload { id, .. } => Some(id),
            SeriesKey::Host(_) => None,
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeriesKey::Host(m) => write!(f, "host:{}", m.as_str()),
            SeriesKey::Workload { id, metric } => {
                write!(f, "workload:{}:{}", id, metric.as_str())
            }
        }
    }
}

impl FromStr for SeriesKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(metric) = s.strip_prefix("host:") {
            return Ok(SeriesKey::Host(metric.parse()?));
        }
        if let Some(rest) = s.strip_prefix("workload:") {
            // Container ids never contain ':', metric names never do either.
            let (id, metric) = rest
                .rsplit_once(':')
                .ok_or_else(|| format!("malformed series key: {}", s))?;
            if id.is_empty() {
                return Err(format!("empty workload id in series key: {}", s));
            }
            return Ok(SeriesKey::workload(id, metric.parse()?));
        }
        Err(format!("malformed series key: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_key_text_form() {
        let k = SeriesKey::Host(HostMetric::Network);
        assert_eq!(k.to_string(), "host:network");
        assert_eq!("host:network".parse::<SeriesKey>().unwrap(), k);
        assert_eq!(k.arity(), 2);
    }

    #[test]
    fn workload_key_text_form() {
        let k = SeriesKey::workload("3f2a9c", WorkloadMetric::Memory);
        assert_eq!(k.to_string(), "workload:3f2a9c:memory");
        assert_eq!("workload:3f2a9c:memory".parse::<SeriesKey>().unwrap(), k);
        assert_eq!(k.workload_id(), Some("3f2a9c"));
    }

    #[test]
    fn malformed_keys_rejected() {
        assert!("host:gpu".parse::<SeriesKey>().is_err());
        assert!("workload::cpu".parse::<SeriesKey>().is_err());
        assert!("workload:abc".parse::<SeriesKey>().is_err());
        assert!("cpu".parse::<SeriesKey>().is_err());
    }
}
