// Repeating sample -> transform -> append task, one per source.
// Ticks are scheduled from tick start (tokio interval); a tick that overruns the
// cadence causes the missed ticks to be skipped, never queued.

mod sources;
pub mod transform;

pub use sources::{HostSource, WorkloadSource};

use crate::error::CollectError;
use crate::models::{Sample, SeriesKey};
use crate::series_store::MetricSeriesStore;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::time::{Duration, Instant, MissedTickBehavior, interval, timeout};
use tracing::Instrument;

/// One provider of raw readings plus the transform that turns them into records.
#[async_trait]
pub trait SampleSource: Send + Sync + 'static {
    type Reading: Send;

    /// Name used in logs (e.g. "host", "workload:<id>").
    fn label(&self) -> String;

    async fn sample(&self) -> Result<Self::Reading, CollectError>;

    /// Records for one successful reading, all stamped with `timestamp`.
    fn transform(&mut self, reading: Self::Reading, timestamp: i64) -> Vec<(SeriesKey, Sample)>;
}

#[derive(Debug, Clone, Copy)]
pub struct CollectorConfig {
    pub cadence: Duration,
    /// Must be shorter than `cadence`.
    pub sample_timeout: Duration,
}

/// Tick outcome counters, shared between the task and its handle.
#[derive(Debug, Default)]
pub struct CollectorStats {
    ticks_ok: AtomicU64,
    ticks_failed: AtomicU64,
}

impl CollectorStats {
    pub fn ticks_ok(&self) -> u64 {
        self.ticks_ok.load(Ordering::Relaxed)
    }

    pub fn ticks_failed(&self) -> u64 {
        self.ticks_failed.load(Ordering::Relaxed)
    }
}

pub struct Collector<S: SampleSource> {
    source: S,
    store: Arc<MetricSeriesStore>,
    config: CollectorConfig,
    stats: Arc<CollectorStats>,
}

impl<S: SampleSource> Collector<S> {
    pub fn new(source: S, store: Arc<MetricSeriesStore>, config: CollectorConfig) -> Self {
        Self {
            source,
            store,
            config,
            stats: Arc::new(CollectorStats::default()),
        }
    }

    /// One tick stamped with `timestamp`. Returns the number of records appended.
    pub async fn tick(&mut self, timestamp: i64) -> Result<usize, CollectError> {
        let reading = timeout(self.config.sample_timeout, self.source.sample())
            .await
            .map_err(|_| {
                CollectError::Transport(format!(
                    "sample timed out after {:?}",
                    self.config.sample_timeout
                ))
            })??;
        let records = self.source.transform(reading, timestamp);
        let mut written = 0;
        for (key, sample) in records {
            self.store.append(&key, sample)?;
            written += 1;
        }
        Ok(written)
    }

    async fn run(mut self) {
        let label = self.source.label();
        let cadence = self.config.cadence;
        let mut tick = interval(cadence);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::debug!(cadence_ms = cadence.as_millis() as u64, "collector started");

        loop {
            tick.tick().await;
            let started = Instant::now();
            let timestamp = now_secs();

            match self.tick(timestamp).await {
                Ok(written) => {
                    self.stats.ticks_ok.fetch_add(1, Ordering::Relaxed);
                    tracing::trace!(records = written, timestamp, "tick complete");
                }
                Err(e) => {
                    self.stats.ticks_failed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        error = %e,
                        kind = e.kind(),
                        source = %label,
                        operation = "collect_tick",
                        "collection tick failed"
                    );
                }
            }

            let elapsed = started.elapsed();
            if elapsed > cadence {
                tracing::debug!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    source = %label,
                    "tick overran cadence; skipping missed ticks"
                );
            }
        }
    }

    pub fn spawn(self) -> CollectorHandle {
        let label = self.source.label();
        let stats = self.stats.clone();
        let span = tracing::debug_span!("collector", source = %label);
        let handle = tokio::spawn(self.run().instrument(span));
        CollectorHandle {
            label,
            stats,
            handle,
        }
    }
}

/// Owner's side of a running collector task.
pub struct CollectorHandle {
    label: String,
    stats: Arc<CollectorStats>,
    handle: tokio::task::JoinHandle<()>,
}

impl CollectorHandle {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn stats(&self) -> &Arc<CollectorStats> {
        &self.stats
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Abort the task and wait until it is gone; no writes happen after this returns.
    pub async fn stop(self) {
        self.handle.abort();
        let _ = self.handle.await;
        tracing::debug!(source = %self.label, "collector stopped");
    }
}

/// Seconds since epoch; 0 (with a warning) if the clock is before 1970.
pub fn now_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, operation = "get_timestamp", "system time error");
            0
        })
}
