//! Periodic emission of completed traffic buckets to Graphite.
//!
//! Every cycle detaches the completed buckets from the store first and only
//! then opens the connection, so a slow or dead collector never holds a lock
//! that ingestion needs. Delivery is at most once: whatever a failed cycle
//! drained is dropped, never put back into the store.
//!
//! Cycles are serialized: the final flush at end of input and the periodic
//! flush share one guard, so two cycles never drain or write concurrently.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pingora::services::background::BackgroundService;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use traffic_stats::{BucketStore, DrainedBucket, FlushStats, MetricNames, encode};

use crate::error::FlushError;
use crate::sink::{MetricSink, SinkStream};

pub struct Flusher {
    store: Arc<BucketStore>,
    sink: Arc<dyn MetricSink>,
    names: MetricNames,
    interval: Duration,
    cycle: Mutex<()>,
}

impl Flusher {
    pub fn new(
        store: Arc<BucketStore>,
        sink: Arc<dyn MetricSink>,
        names: MetricNames,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            sink,
            names,
            interval,
            cycle: Mutex::new(()),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Emit every bucket older than the current one.
    pub async fn flush_completed(&self) -> Result<FlushStats, FlushError> {
        let _cycle = self.cycle.lock().await;
        let (cutoff, buckets) = self.store.drain_completed_now();
        log::debug!(
            "Drained {} traffic buckets before {}",
            buckets.len(),
            format_bucket(cutoff)
        );
        self.emit(buckets).await
    }

    /// Emit every bucket, including the one still filling. Used on shutdown.
    pub async fn flush_all(&self) -> Result<FlushStats, FlushError> {
        let _cycle = self.cycle.lock().await;
        let buckets = self.store.drain_all();
        self.emit(buckets).await
    }

    /// Write detached buckets to a fresh sink connection.
    ///
    /// The buckets are consumed whether or not the write succeeds. Callers
    /// hold the cycle guard.
    async fn emit(&self, buckets: Vec<DrainedBucket>) -> Result<FlushStats, FlushError> {
        if buckets.is_empty() {
            log::debug!("No completed traffic buckets to send");
            return Ok(FlushStats::default());
        }

        let mut stream = match self.sink.connect().await {
            Ok(stream) => stream,
            Err(e) => {
                log::error!(
                    "Failed to connect to Graphite, dropping {} buckets: {}",
                    buckets.len(),
                    e
                );
                return Err(e);
            }
        };
        log::info!(
            "Connected to: {} Sending traffic information...",
            self.sink.address()
        );

        let mut stats = FlushStats::default();
        let written = self.write_buckets(&mut stream, &buckets, &mut stats).await;
        // Close regardless of how the write went.
        if let Err(e) = stream.shutdown().await {
            log::debug!("Error closing Graphite connection: {}", e);
        }

        if let Err(source) = written {
            log::error!(
                "Failed writing to Graphite after {} of {} buckets, dropping the rest: {}",
                stats.buckets,
                buckets.len(),
                source
            );
            return Err(FlushError::Write {
                addr: self.sink.address().to_string(),
                source,
            });
        }

        log::info!(
            "Sent data for {} timestamps to graphite. Stats: active vhosts {} handlers {} requests {} RX {} TX {} bytes ({} lines)",
            stats.buckets,
            stats.vhosts,
            stats.handlers,
            stats.requests,
            stats.bytes_in,
            stats.bytes_out,
            stats.lines
        );
        Ok(stats)
    }

    async fn write_buckets(
        &self,
        stream: &mut SinkStream,
        buckets: &[DrainedBucket],
        stats: &mut FlushStats,
    ) -> std::io::Result<()> {
        for bucket in buckets {
            let lines = self.names.render_bucket(bucket);
            stream.write_all(encode(&lines).as_bytes()).await?;
            log::debug!(
                "Sent {} lines for bucket {}",
                lines.len(),
                format_bucket(bucket.timestamp)
            );
            stats.add_bucket(bucket);
            stats.lines += lines.len();
        }
        stream.flush().await
    }
}

fn format_bucket(timestamp: i64) -> String {
    chrono::DateTime::from_timestamp(timestamp, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

#[async_trait]
impl BackgroundService for Flusher {
    async fn start(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = shutdown.changed() => {
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {
                    // Errors are logged by emit; the cycle's data is gone either way.
                    let _ = self.flush_completed().await;
                }
            }
        }

        log::info!("Flushing remaining traffic data on shutdown");
        let _ = self.flush_all().await;
    }
}
