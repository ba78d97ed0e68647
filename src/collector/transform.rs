// Raw readings -> persisted records.

use crate::models::{
    CpuCounters, HostMetric, HostReading, Sample, SeriesKey, WorkloadMetric, WorkloadStatSnapshot,
};

/// Clamp to [0, 100]; NaN becomes 0.
pub fn clamp_percent(v: f64) -> f64 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 100.0) }
}

/// CPU percent from counter deltas, scaled by the number of schedulable CPUs.
///
/// `online_cpus` must be the runtime's CPU count, never a cumulative time counter.
/// Returns 0 when `system_delta <= 0` or the container delta is negative (counter reset).
pub fn cpu_percent(cpu_delta: i64, system_delta: i64, online_cpus: u32) -> f64 {
    if system_delta <= 0 || cpu_delta < 0 || online_cpus == 0 {
        return 0.0;
    }
    clamp_percent((cpu_delta as f64 / system_delta as f64) * online_cpus as f64 * 100.0)
}

/// `usage / limit * 100`, or 0 when the limit is unknown.
pub fn memory_percent(usage: u64, limit: u64) -> f64 {
    if limit == 0 {
        return 0.0;
    }
    clamp_percent(usage as f64 / limit as f64 * 100.0)
}

/// CPU percent between two counter snapshots; 0 without a baseline.
pub fn cpu_percent_between(now: CpuCounters, prev: Option<CpuCounters>, online_cpus: u32) -> f64 {
    let Some(prev) = prev else {
        return 0.0;
    };
    let cpu_delta = now.total_usage as i64 - prev.total_usage as i64;
    let system_delta = now.system_usage as i64 - prev.system_usage as i64;
    cpu_percent(cpu_delta, system_delta, online_cpus)
}

/// Four host records stamped with the tick start.
pub fn host_records(reading: &HostReading, timestamp: i64) -> Vec<(SeriesKey, Sample)> {
    vec![
        (
            SeriesKey::Host(HostMetric::Cpu),
            Sample::single(timestamp, clamp_percent(reading.cpu_percent)),
        ),
        (
            SeriesKey::Host(HostMetric::Memory),
            Sample::single(timestamp, clamp_percent(reading.memory_percent)),
        ),
        (
            SeriesKey::Host(HostMetric::Disk),
            Sample::single(timestamp, clamp_percent(reading.disk_percent)),
        ),
        (
            SeriesKey::Host(HostMetric::Network),
            Sample::new(
                timestamp,
                vec![reading.net_bytes_sent as f64, reading.net_bytes_recv as f64],
            ),
        ),
    ]
}

/// CPU and memory records for one workload.
///
/// Baseline preference: the runtime's own previous counters, then `fallback_prev`
/// (the collector's last reading).
pub fn workload_records(
    id: &str,
    snapshot: &WorkloadStatSnapshot,
    fallback_prev: Option<CpuCounters>,
    timestamp: i64,
) -> Vec<(SeriesKey, Sample)> {
    let baseline = snapshot.precpu.or(fallback_prev);
    let cpu = cpu_percent_between(snapshot.cpu, baseline, snapshot.online_cpus);
    let mem = memory_percent(snapshot.memory_usage_bytes, snapshot.memory_limit_bytes);
    vec![
        (
            SeriesKey::workload(id, WorkloadMetric::Cpu),
            Sample::single(timestamp, cpu),
        ),
        (
            SeriesKey::workload(id, WorkloadMetric::Memory),
            Sample::single(timestamp, mem),
        ),
    ]
}
