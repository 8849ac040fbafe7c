//! Graphite plaintext rendering of drained buckets.
//!
//! Each sample becomes one `<path> <value> <timestamp>\n` line. Keys are
//! walked in sorted order, so rendering the same bucket twice yields the same
//! bytes.

use std::collections::BTreeMap;
use std::fmt;

use crate::counter::Counter;
use crate::store::DrainedBucket;

/// Path segment used for requests without a handler.
pub const STATIC_CONTENT: &str = "static_content";

/// Make an identifier safe to use as one metric path segment.
///
/// Dots would add hierarchy levels and whitespace would split the line, so
/// both become underscores.
pub fn sanitize_segment(input: &str) -> String {
    input
        .chars()
        .map(|c| if c == '.' || c.is_ascii_whitespace() { '_' } else { c })
        .collect()
}

/// Path segment for a handler; unclassified requests render as [`STATIC_CONTENT`].
pub fn handler_segment(handler: Option<&str>) -> String {
    match handler {
        Some(h) if !h.is_empty() => sanitize_segment(h),
        _ => STATIC_CONTENT.to_owned(),
    }
}

/// One metric sample on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricLine {
    pub path: String,
    pub value: u64,
    pub timestamp: i64,
}

impl fmt::Display for MetricLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {} {}", self.path, self.value, self.timestamp)
    }
}

/// Concatenate lines into a single wire payload.
pub fn encode(lines: &[MetricLine]) -> String {
    lines.iter().map(ToString::to_string).collect()
}

/// Totals reported at the end of a flush cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub buckets: usize,
    pub vhosts: usize,
    pub handlers: usize,
    pub requests: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub lines: usize,
}

impl FlushStats {
    pub fn add_bucket(&mut self, bucket: &DrainedBucket) {
        let rollup = bucket.table.rollup();
        self.buckets += 1;
        self.vhosts += bucket.table.vhost_count();
        self.handlers += bucket.table.handler_count();
        self.requests += rollup.count;
        self.bytes_in += rollup.bytes_in.sum;
        self.bytes_out += rollup.bytes_out.sum;
    }
}

/// Metric path roots for one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricNames {
    prefix: String,
    server_prefix: String,
    host: String,
}

impl MetricNames {
    pub fn new(prefix: &str, server_prefix: &str, hostname: &str) -> Self {
        Self {
            prefix: prefix.to_owned(),
            server_prefix: server_prefix.to_owned(),
            host: sanitize_segment(hostname),
        }
    }

    /// All samples for one bucket: per handler, per vhost, bucket-wide, then
    /// the server-wide per-handler aggregation.
    ///
    /// Names that sanitize to the same path segment (`php.fpm` and `php_fpm`,
    /// or an explicit `static_content` handler and unclassified requests) are
    /// merged, so every path appears at most once per bucket.
    pub fn render_bucket(&self, bucket: &DrainedBucket) -> Vec<MetricLine> {
        let ts = bucket.timestamp;
        let mut lines = Vec::new();
        let mut by_handler: BTreeMap<String, Counter> = BTreeMap::new();

        for (vhost, folded) in fold_vhosts(bucket) {
            for (handler, counter) in &folded.handlers {
                let base = format!(
                    "{}.{}.virtualhosts_byhandler.{}.{}",
                    self.prefix, self.host, vhost, handler
                );
                push_traffic(&mut lines, &base, counter, ts);
                by_handler.entry(handler.clone()).or_default().merge(counter);
            }

            let base = format!("{}.{}.virtualhosts.{}", self.prefix, self.host, vhost);
            push_traffic(&mut lines, &base, &folded.rollup, ts);
        }

        let base = format!("{}.{}.servertraffic", self.prefix, self.host);
        push_traffic(&mut lines, &base, bucket.table.rollup(), ts);

        for (handler, counter) in &by_handler {
            let base = format!("{}.{}.{}", self.server_prefix, self.host, handler);
            push_handler_detail(&mut lines, &base, counter, ts);
        }

        lines
    }
}

/// A vhost's counters keyed by rendered path segments.
#[derive(Default)]
struct FoldedVHost {
    handlers: BTreeMap<String, Counter>,
    rollup: Counter,
}

fn fold_vhosts(bucket: &DrainedBucket) -> BTreeMap<String, FoldedVHost> {
    let mut folded: BTreeMap<String, FoldedVHost> = BTreeMap::new();
    for (vhost, entry) in bucket.table.vhosts() {
        let target = folded.entry(sanitize_segment(vhost)).or_default();
        target.rollup.merge(&entry.rollup);
        for (handler, counter) in entry.handlers.iter() {
            target
                .handlers
                .entry(handler_segment(handler))
                .or_default()
                .merge(counter);
        }
    }
    folded
}

fn push(lines: &mut Vec<MetricLine>, base: &str, leaf: &str, value: u64, timestamp: i64) {
    lines.push(MetricLine {
        path: format!("{base}.{leaf}"),
        value,
        timestamp,
    });
}

fn push_traffic(lines: &mut Vec<MetricLine>, base: &str, counter: &Counter, ts: i64) {
    push(lines, base, "requestcount", counter.count, ts);
    push(lines, base, "rxbytes", counter.bytes_in.sum, ts);
    push(lines, base, "txbytes", counter.bytes_out.sum, ts);
    if let Some(avg) = counter.average_ttfb() {
        push(lines, base, "avgttfb", avg, ts);
    }
}

fn push_handler_detail(lines: &mut Vec<MetricLine>, base: &str, counter: &Counter, ts: i64) {
    push(lines, base, "requestcount", counter.count, ts);
    push(lines, base, "ttfbsum", counter.ttfb.sum, ts);
    push(lines, base, "ttfbmin", counter.ttfb.min, ts);
    push(lines, base, "ttfbmax", counter.ttfb.max, ts);
    push(lines, base, "rxbytes", counter.bytes_in.sum, ts);
    push(lines, base, "rxbytesmin", counter.bytes_in.min, ts);
    push(lines, base, "rxbytesmax", counter.bytes_in.max, ts);
    push(lines, base, "txbytes", counter.bytes_out.sum, ts);
    push(lines, base, "txbytesmin", counter.bytes_out.min, ts);
    push(lines, base, "txbytesmax", counter.bytes_out.max, ts);
}
