// Dedicated persistence task: collectors append in memory, the store forwards each
// record over a channel, and this task batches them into SQLite. Memory stays the
// source of truth; while SQLite is failing the pending batch is capped and the
// oldest records are dropped.

use crate::history_repo::HistoryRepo;
use crate::models::SeriesKey;
use crate::series_store::PersistRecord;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::time::{Duration, MissedTickBehavior, interval};

/// Channel capacity for the writer (records are dropped, not awaited, when full).
/// Also the most records the writer holds while flushes are failing.
pub fn writer_channel_capacity(flush_rate: u64) -> usize {
    (flush_rate as usize * 4).max(256)
}

pub struct HistoryWriterConfig {
    /// Pending records that trigger a flush.
    pub flush_rate: u64,
    pub flush_interval_secs: u64,
}

/// Records waiting for the next flush, bounded by `max_pending`.
struct PendingBatch {
    records: Vec<PersistRecord>,
    max_pending: usize,
    dropped: u64,
}

impl PendingBatch {
    fn new(max_pending: usize) -> Self {
        Self {
            records: Vec::new(),
            max_pending,
            dropped: 0,
        }
    }

    /// Add `record`, evicting the oldest pending records beyond `max_pending`.
    /// Returns how many were evicted.
    fn push(&mut self, record: PersistRecord) -> usize {
        self.records.push(record);
        let excess = self.records.len().saturating_sub(self.max_pending);
        if excess > 0 {
            self.records.drain(..excess);
            self.dropped += excess as u64;
        }
        excess
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

/// Flushes when `flush_rate` records are pending, every `flush_interval_secs`, and once
/// more after every sender is dropped. A failed flush keeps the batch for the next attempt.
pub fn spawn_history_writer(
    mut write_rx: mpsc::Receiver<PersistRecord>,
    history_repo: Arc<HistoryRepo>,
    config: HistoryWriterConfig,
    records_saved_total: Arc<AtomicU64>,
) -> tokio::task::JoinHandle<()> {
    let flush_rate = config.flush_rate as usize;
    let mut pending = PendingBatch::new(writer_channel_capacity(config.flush_rate));

    tokio::spawn(async move {
        let mut flush_tick = interval(Duration::from_secs(config.flush_interval_secs));
        flush_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut series_seen: HashSet<SeriesKey> = HashSet::new();
        loop {
            let flush_now = tokio::select! {
                received = write_rx.recv() => match received {
                    Some(record) => {
                        series_seen.insert(record.key.clone());
                        if pending.push(record) > 0 && pending.dropped % 100 == 1 {
                            tracing::warn!(
                                operation = "persist_sample",
                                pending = pending.len(),
                                dropped_total = pending.dropped,
                                "history backlog at capacity; dropping oldest unsaved samples"
                            );
                        }
                        pending.len() >= flush_rate
                    }
                    None => break,
                },
                _ = flush_tick.tick() => true,
            };
            if flush_now {
                flush(&history_repo, &mut pending, &records_saved_total).await;
            }
        }

        flush(&history_repo, &mut pending, &records_saved_total).await;
        tracing::info!(
            series_count = series_seen.len(),
            records_saved_total = records_saved_total.load(Ordering::Relaxed),
            records_unsaved = pending.len(),
            records_dropped = pending.dropped,
            "history writer stopped"
        );
    })
}

async fn flush(history_repo: &HistoryRepo, pending: &mut PendingBatch, saved_total: &AtomicU64) {
    if pending.records.is_empty() {
        return;
    }
    if let Err(e) = history_repo.save_samples(&pending.records).await {
        tracing::warn!(
            error = %e,
            operation = "save_samples",
            pending = pending.len(),
            "history flush failed; retrying on next flush"
        );
        return;
    }
    saved_total.fetch_add(pending.records.len() as u64, Ordering::Relaxed);

    let touched: HashMap<SeriesKey, usize> = pending
        .records
        .drain(..)
        .map(|r| (r.key, r.capacity))
        .collect();
    let mut trimmed = 0u64;
    for (key, capacity) in &touched {
        match history_repo.trim_series(key, *capacity).await {
            Ok(n) => trimmed += n,
            // Rows stay until the key's next flush trims them.
            Err(e) => tracing::warn!(error = %e, series = %key, operation = "trim_series", "trim failed"),
        }
    }
    tracing::debug!(
        series_count = touched.len(),
        rows_trimmed = trimmed,
        "samples persisted"
    );
}
