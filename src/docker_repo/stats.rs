// Convert raw Docker stats API responses into WorkloadStatSnapshot.

use crate::error::CollectError;
use crate::models::{CpuCounters, WorkloadStatSnapshot};
use bollard::models::{ContainerCpuStats, ContainerMemoryStats, ContainerStatsResponse};

/// Page-cache keys subtracted from memory usage, same as `docker stats`
/// (cgroup v1 reports `total_inactive_file`, v2 `inactive_file`).
const CACHE_KEYS: [&str; 2] = ["total_inactive_file", "inactive_file"];

pub(crate) fn stat_snapshot(
    s: &ContainerStatsResponse,
    id: &str,
) -> Result<WorkloadStatSnapshot, CollectError> {
    let cpu_stats = s
        .cpu_stats
        .as_ref()
        .ok_or_else(|| CollectError::MalformedSample(format!("{}: missing cpu_stats", id)))?;
    let cpu = counters(cpu_stats)
        .ok_or_else(|| CollectError::MalformedSample(format!("{}: missing cpu_usage", id)))?;

    // Docker sends an all-zero precpu block on the first read of a container.
    let precpu = s
        .precpu_stats
        .as_ref()
        .and_then(counters)
        .filter(|c| c.system_usage > 0);

    let online_cpus = cpu_stats
        .online_cpus
        .filter(|n| *n > 0)
        .or_else(|| {
            cpu_stats
                .cpu_usage
                .as_ref()
                .and_then(|u| u.percpu_usage.as_ref())
                .map(|v| v.len() as u32)
                .filter(|n| *n > 0)
        })
        .unwrap_or(1);

    let (memory_usage_bytes, memory_limit_bytes) = s
        .memory_stats
        .as_ref()
        .map_or((0, 0), |m| (usage_without_cache(m), m.limit.unwrap_or(0)));

    Ok(WorkloadStatSnapshot {
        cpu,
        precpu,
        online_cpus,
        memory_usage_bytes,
        memory_limit_bytes,
    })
}

fn counters(c: &ContainerCpuStats) -> Option<CpuCounters> {
    let usage = c.cpu_usage.as_ref()?;
    Some(CpuCounters {
        total_usage: usage.total_usage.unwrap_or(0),
        system_usage: c.system_cpu_usage.unwrap_or(0),
    })
}

fn usage_without_cache(m: &ContainerMemoryStats) -> u64 {
    let usage = m.usage.unwrap_or(0);
    let cache = m
        .stats
        .as_ref()
        .and_then(|stats| CACHE_KEYS.iter().find_map(|k| stats.get(*k).copied()))
        .unwrap_or(0);
    usage.saturating_sub(cache)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::models::{ContainerCpuUsage, ContainerMemoryStats};
    use std::collections::HashMap;

    fn minimal_cpu_stats(total_usage: u64, system_cpu_usage: u64) -> ContainerCpuStats {
        ContainerCpuStats {
            cpu_usage: Some(ContainerCpuUsage {
                total_usage: Some(total_usage),
                ..Default::default()
            }),
            system_cpu_usage: Some(system_cpu_usage),
            online_cpus: Some(2),
            throttling_data: None,
        }
    }

    #[test]
    fn missing_cpu_stats_is_malformed() {
        let s = ContainerStatsResponse {
            cpu_stats: None,
            precpu_stats: Some(minimal_cpu_stats(0, 0)),
            ..Default::default()
        };
        let err = stat_snapshot(&s, "id").unwrap_err();
        assert_eq!(err.kind(), "malformed_sample");
    }

    #[test]
    fn zeroed_precpu_means_no_baseline() {
        let s = ContainerStatsResponse {
            cpu_stats: Some(minimal_cpu_stats(100, 1000)),
            precpu_stats: Some(minimal_cpu_stats(0, 0)),
            ..Default::default()
        };
        let out = stat_snapshot(&s, "id").unwrap();
        assert!(out.precpu.is_none());
        assert_eq!(out.online_cpus, 2);
    }

    #[test]
    fn extracts_counters_and_memory() {
        let s = ContainerStatsResponse {
            cpu_stats: Some(minimal_cpu_stats(100_000_000, 1_000_000_000)),
            precpu_stats: Some(minimal_cpu_stats(50_000_000, 500_000_000)),
            memory_stats: Some(ContainerMemoryStats {
                usage: Some(256 * 1024 * 1024),
                limit: Some(512 * 1024 * 1024),
                ..Default::default()
            }),
            ..Default::default()
        };
        let out = stat_snapshot(&s, "abc123").unwrap();
        assert_eq!(out.cpu.total_usage, 100_000_000);
        assert_eq!(out.cpu.system_usage, 1_000_000_000);
        assert_eq!(out.precpu.map(|p| p.total_usage), Some(50_000_000));
        assert_eq!(out.memory_usage_bytes, 256 * 1024 * 1024);
        assert_eq!(out.memory_limit_bytes, 512 * 1024 * 1024);
    }

    #[test]
    fn page_cache_is_excluded_from_usage() {
        let mut stats = HashMap::new();
        stats.insert("inactive_file".to_string(), 100u64);
        let s = ContainerStatsResponse {
            cpu_stats: Some(minimal_cpu_stats(1, 1)),
            memory_stats: Some(ContainerMemoryStats {
                usage: Some(1000),
                limit: Some(4000),
                stats: Some(stats),
                ..Default::default()
            }),
            ..Default::default()
        };
        let out = stat_snapshot(&s, "id").unwrap();
        assert_eq!(out.memory_usage_bytes, 900);
    }

    #[test]
    fn online_cpus_falls_back_to_percpu_len() {
        let s = ContainerStatsResponse {
            cpu_stats: Some(ContainerCpuStats {
                cpu_usage: Some(ContainerCpuUsage {
                    total_usage: Some(10),
                    percpu_usage: Some(vec![1, 2, 3, 4]),
                    ..Default::default()
                }),
                system_cpu_usage: Some(100),
                online_cpus: None,
                throttling_data: None,
            }),
            ..Default::default()
        };
        assert_eq!(stat_snapshot(&s, "id").unwrap().online_cpus, 4);
    }
}
