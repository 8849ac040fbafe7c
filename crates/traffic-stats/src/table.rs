//! Per-bucket traffic tables: vhost → handler → [`Counter`].
//!
//! These types carry no locks of their own. A [`VHostTable`] lives behind
//! its bucket's mutex in the store, so every update of one request touches
//! the handler, vhost and bucket counters inside the same lock scope.

use std::collections::HashMap;

use crate::counter::Counter;
use crate::request::Request;

/// Counters keyed by handler; `None` is the unclassified handler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlerTable {
    handlers: HashMap<Option<String>, Counter>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, handler: Option<&str>) -> Option<&Counter> {
        self.handlers.get(&handler.map(str::to_owned))
    }

    /// Place a prebuilt counter under `handler`, replacing any existing one.
    pub fn insert(&mut self, handler: Option<String>, counter: Counter) {
        self.handlers.insert(handler, counter);
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Option<&str>, &Counter)> {
        self.handlers.iter().map(|(k, v)| (k.as_deref(), v))
    }

    fn record(&mut self, request: &Request) {
        self.handlers
            .entry(request.handler.clone())
            .or_default()
            .observe(&request.sample);
    }
}

/// Handlers of one virtual host plus the vhost-wide rollup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VHostEntry {
    pub handlers: HandlerTable,
    pub rollup: Counter,
}

/// All traffic recorded for one bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VHostTable {
    vhosts: HashMap<String, VHostEntry>,
    rollup: Counter,
}

impl VHostTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account one request against its handler, its vhost and the bucket.
    pub fn record(&mut self, request: &Request) {
        let entry = self.vhosts.entry(request.vhost.clone()).or_default();
        entry.rollup.observe(&request.sample);
        entry.handlers.record(request);
        self.rollup.observe(&request.sample);
    }

    pub fn get(&self, vhost: &str) -> Option<&VHostEntry> {
        self.vhosts.get(vhost)
    }

    /// Mutable access to a vhost entry, creating it when absent.
    pub fn entry_mut(&mut self, vhost: &str) -> &mut VHostEntry {
        self.vhosts.entry(vhost.to_owned()).or_default()
    }

    /// Server-wide rollup over every vhost of the bucket.
    pub fn rollup(&self) -> &Counter {
        &self.rollup
    }

    pub fn vhosts(&self) -> impl Iterator<Item = (&str, &VHostEntry)> {
        self.vhosts.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn vhost_count(&self) -> usize {
        self.vhosts.len()
    }

    pub fn handler_count(&self) -> usize {
        self.vhosts.values().map(|e| e.handlers.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.vhosts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::Stat;

    #[test]
    fn record_updates_all_three_levels() {
        let mut table = VHostTable::new();
        table.record(&Request::new("a.example.com", Some("php"), 100, 2000, 50));
        table.record(&Request::new("a.example.com", Some("php"), 200, 4000, 150));

        let entry = table.get("a.example.com").unwrap();
        let php = entry.handlers.get(Some("php")).unwrap();
        assert_eq!(php.count, 2);
        assert_eq!(php.bytes_in, Stat { sum: 300, min: 100, max: 200 });
        assert_eq!(php.bytes_out, Stat { sum: 6000, min: 2000, max: 4000 });
        assert_eq!(php.ttfb, Stat { sum: 200, min: 50, max: 150 });
        assert_eq!(&entry.rollup, php);
        assert_eq!(table.rollup(), php);
    }

    #[test]
    fn rollups_sum_their_children() {
        let mut table = VHostTable::new();
        table.record(&Request::new("a.example.com", Some("php"), 10, 100, 1));
        table.record(&Request::new("a.example.com", None, 20, 200, 2));
        table.record(&Request::new("b.example.com", Some("cgi"), 30, 300, 3));
        table.record(&Request::new("b.example.com", Some("php"), 40, 400, 4));
        table.record(&Request::new("b.example.com", Some("php"), 50, 500, 5));

        let mut bucket_count = 0;
        let mut bucket_in = 0;
        for (_, entry) in table.vhosts() {
            let count: u64 = entry.handlers.iter().map(|(_, c)| c.count).sum();
            let bytes_in: u64 = entry.handlers.iter().map(|(_, c)| c.bytes_in.sum).sum();
            let bytes_out: u64 = entry.handlers.iter().map(|(_, c)| c.bytes_out.sum).sum();
            let ttfb: u64 = entry.handlers.iter().map(|(_, c)| c.ttfb.sum).sum();
            assert_eq!(entry.rollup.count, count);
            assert_eq!(entry.rollup.bytes_in.sum, bytes_in);
            assert_eq!(entry.rollup.bytes_out.sum, bytes_out);
            assert_eq!(entry.rollup.ttfb.sum, ttfb);
            bucket_count += entry.rollup.count;
            bucket_in += entry.rollup.bytes_in.sum;
        }
        assert_eq!(table.rollup().count, bucket_count);
        assert_eq!(table.rollup().bytes_in.sum, bucket_in);
        assert_eq!(table.rollup().count, 5);
        assert_eq!(table.vhost_count(), 2);
        assert_eq!(table.handler_count(), 4);
    }

    #[test]
    fn unclassified_handler_is_its_own_entry() {
        let mut table = VHostTable::new();
        table.record(&Request::new("a.example.com", None, 1, 1, 1));
        table.record(&Request::new("a.example.com", Some(""), 1, 1, 1));

        let entry = table.get("a.example.com").unwrap();
        assert_eq!(entry.handlers.len(), 1);
        assert_eq!(entry.handlers.get(None).unwrap().count, 2);
    }

    #[test]
    fn missing_vhost_is_a_plain_lookup_miss() {
        let table = VHostTable::new();
        assert!(table.get("nowhere.example.com").is_none());
        assert!(table.is_empty());
    }
}
