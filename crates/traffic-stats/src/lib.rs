//! Rolling, time-bucketed web traffic aggregation.
//!
//! Requests are accounted per bucket (wall-clock time truncated to a fixed
//! granularity), per virtual host and per handler. Completed buckets are
//! detached from the [`BucketStore`] as a whole and rendered into Graphite
//! plaintext lines.
//!
//! # Example
//!
//! ```rust
//! use traffic_stats::{BucketStore, MetricNames, Request};
//!
//! let store = BucketStore::default();
//! store.record_at(&Request::new("a.example.com", Some("php"), 100, 2000, 50), 60);
//! store.record_at(&Request::new("a.example.com", Some("php"), 200, 4000, 150), 90);
//!
//! let names = MetricNames::new("apachetraffic", "apachetraffic_handlers", "web1");
//! for bucket in store.drain_completed(120) {
//!     for line in names.render_bucket(&bucket) {
//!         print!("{line}");
//!     }
//! }
//! assert!(store.is_empty());
//! ```

mod counter;
mod render;
mod request;
mod store;
mod table;

pub use counter::{Counter, Sample, Stat};
pub use render::{
    FlushStats, MetricLine, MetricNames, STATIC_CONTENT, encode, handler_segment,
    sanitize_segment,
};
pub use request::Request;
pub use store::{BucketStore, DEFAULT_GRANULARITY, DrainedBucket, unix_now};
pub use table::{HandlerTable, VHostEntry, VHostTable};
