//! Apache traffic aggregation daemon.
//!
//! Reads per-request access log lines from stdin, aggregates them per minute,
//! virtual host and handler, and periodically ships completed minutes to a
//! Graphite plaintext listener.

pub mod configuration;
pub mod error;
pub mod flusher;
pub mod hostname;
pub mod ingest;
pub mod server;
pub mod sink;
