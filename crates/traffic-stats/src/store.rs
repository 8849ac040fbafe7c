//! Time-bucketed traffic store shared by ingestion and the flusher.
//!
//! Locking has two tiers. The outer `RwLock` guards the bucket map: recording
//! into an existing bucket holds the read side for the whole update, while
//! creating or draining buckets takes the write side. Each bucket then has
//! its own `Mutex` around its [`VHostTable`]. Because a record keeps the read
//! guard until its counters are updated, a drain can only remove a bucket once
//! every in-flight record against it has finished, and nothing can reach a
//! bucket after it has been removed.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::Duration;

use crate::request::Request;
use crate::table::VHostTable;

/// Default bucket width: one minute.
pub const DEFAULT_GRANULARITY: Duration = Duration::from_secs(60);

/// Current wall-clock time in unix seconds.
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// A bucket detached from the store, owned exclusively by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainedBucket {
    /// Bucket start, unix seconds.
    pub timestamp: i64,
    pub table: VHostTable,
}

#[derive(Debug)]
pub struct BucketStore {
    buckets: RwLock<HashMap<i64, Mutex<VHostTable>>>,
    granularity_secs: i64,
}

impl Default for BucketStore {
    fn default() -> Self {
        Self::new(DEFAULT_GRANULARITY)
    }
}

impl BucketStore {
    /// Create an empty store. Sub-second granularities are rounded up to one second.
    pub fn new(granularity: Duration) -> Self {
        let granularity_secs = i64::try_from(granularity.as_secs())
            .unwrap_or(i64::MAX)
            .max(1);
        Self {
            buckets: RwLock::new(HashMap::new()),
            granularity_secs,
        }
    }

    pub fn granularity(&self) -> Duration {
        Duration::from_secs(self.granularity_secs as u64)
    }

    /// Truncate a unix timestamp down to the start of its bucket.
    pub fn bucket_start(&self, timestamp: i64) -> i64 {
        timestamp - timestamp.rem_euclid(self.granularity_secs)
    }

    /// Start of the bucket that is currently receiving traffic.
    pub fn current_bucket(&self) -> i64 {
        self.bucket_start(unix_now())
    }

    /// Record a request into the bucket for "now".
    ///
    /// The clock is read while the bucket map is locked, so a drain that has
    /// already chosen its cutoff can never be followed by a new bucket older
    /// than that cutoff.
    pub fn record(&self, request: &Request) {
        self.apply(unix_now, |table| table.record(request));
    }

    /// Record a request into the bucket containing `timestamp`.
    ///
    /// If that bucket was already drained a fresh one is created; it will be
    /// picked up by the next drain.
    pub fn record_at(&self, request: &Request, timestamp: i64) {
        self.apply(|| timestamp, |table| table.record(request));
    }

    /// Run `f` against the bucket containing `timestamp`, creating it if absent.
    ///
    /// Access is scoped to the closure; the bucket stays locked while `f` runs.
    pub fn with_bucket<R>(&self, timestamp: i64, f: impl FnOnce(&mut VHostTable) -> R) -> R {
        self.apply(|| timestamp, f)
    }

    fn apply<R>(&self, clock: impl Fn() -> i64, f: impl FnOnce(&mut VHostTable) -> R) -> R {
        {
            let buckets = self.buckets.read().unwrap_or_else(PoisonError::into_inner);
            let ts = self.bucket_start(clock());
            if let Some(bucket) = buckets.get(&ts) {
                let mut table = bucket.lock().unwrap_or_else(PoisonError::into_inner);
                return f(&mut *table);
            }
        }

        let mut buckets = self.buckets.write().unwrap_or_else(PoisonError::into_inner);
        let ts = self.bucket_start(clock());
        let bucket = buckets.entry(ts).or_insert_with(|| {
            log::debug!("Opened traffic bucket {}", ts);
            Mutex::new(VHostTable::new())
        });
        f(bucket.get_mut().unwrap_or_else(PoisonError::into_inner))
    }

    /// Detach every bucket strictly older than `before`, oldest first.
    pub fn drain_completed(&self, before: i64) -> Vec<DrainedBucket> {
        let mut buckets = self.buckets.write().unwrap_or_else(PoisonError::into_inner);
        Self::detach(&mut buckets, |ts| ts < before)
    }

    /// Detach every bucket older than the current one.
    ///
    /// The cutoff is computed under the same write lock that performs the
    /// removal.
    pub fn drain_completed_now(&self) -> (i64, Vec<DrainedBucket>) {
        let mut buckets = self.buckets.write().unwrap_or_else(PoisonError::into_inner);
        let cutoff = self.current_bucket();
        (cutoff, Self::detach(&mut buckets, |ts| ts < cutoff))
    }

    /// Detach every bucket, including the one still receiving traffic.
    pub fn drain_all(&self) -> Vec<DrainedBucket> {
        let mut buckets = self.buckets.write().unwrap_or_else(PoisonError::into_inner);
        Self::detach(&mut buckets, |_| true)
    }

    fn detach(
        buckets: &mut HashMap<i64, Mutex<VHostTable>>,
        completed: impl Fn(i64) -> bool,
    ) -> Vec<DrainedBucket> {
        let mut keys: Vec<i64> = buckets.keys().copied().filter(|ts| completed(*ts)).collect();
        keys.sort_unstable();

        keys.into_iter()
            .filter_map(|ts| {
                buckets.remove(&ts).map(|bucket| DrainedBucket {
                    timestamp: ts,
                    table: bucket.into_inner().unwrap_or_else(PoisonError::into_inner),
                })
            })
            .collect()
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        self.buckets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&self.bucket_start(timestamp))
    }

    /// Copy of the bucket containing `timestamp`, if one exists.
    pub fn snapshot(&self, timestamp: i64) -> Option<VHostTable> {
        let buckets = self.buckets.read().unwrap_or_else(PoisonError::into_inner);
        buckets.get(&self.bucket_start(timestamp)).map(|bucket| {
            bucket
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        })
    }

    /// Number of live buckets.
    pub fn len(&self) -> usize {
        self.buckets.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
