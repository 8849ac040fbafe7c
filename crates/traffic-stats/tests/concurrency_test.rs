use std::sync::{Arc, Barrier};
use std::thread;

use traffic_stats::{BucketStore, Request};

const BUCKET: i64 = 1_700_000_040;

#[test]
fn concurrent_first_records_share_one_bucket() {
    for _ in 0..50 {
        let store = Arc::new(BucketStore::default());
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = [("php", 100u64), ("cgi", 200u64)]
            .into_iter()
            .map(|(handler, bytes)| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    store.record_at(&Request::new("a.example.com", Some(handler), bytes, 0, 0), BUCKET);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 1);
        let table = store.snapshot(BUCKET).unwrap();
        assert_eq!(table.rollup().count, 2);
        assert_eq!(table.rollup().bytes_in.sum, 300);
        let entry = table.get("a.example.com").unwrap();
        assert_eq!(entry.handlers.get(Some("php")).unwrap().count, 1);
        assert_eq!(entry.handlers.get(Some("cgi")).unwrap().count, 1);
    }
}

#[test]
fn drains_racing_records_lose_nothing() {
    const WRITERS: usize = 4;
    const PER_WRITER: u64 = 5_000;

    let store = Arc::new(BucketStore::default());

    let writers: Vec<_> = (0..WRITERS)
        .map(|w| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let vhost = format!("w{w}.example.com");
                for i in 0..PER_WRITER {
                    // Spread records over a handful of buckets so drains keep
                    // detaching buckets that are still being written.
                    let ts = BUCKET + 60 * (i % 3) as i64;
                    store.record_at(&Request::new(vhost.as_str(), Some("php"), 1, 2, 3), ts);
                }
            })
        })
        .collect();

    let drainer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            let mut drained = Vec::new();
            for _ in 0..200 {
                drained.extend(store.drain_all());
                thread::yield_now();
            }
            drained
        })
    };

    for writer in writers {
        writer.join().unwrap();
    }
    let mut drained = drainer.join().unwrap();
    drained.extend(store.drain_all());

    let mut count = 0;
    let mut bytes_out = 0;
    for bucket in &drained {
        let rollup = bucket.table.rollup();
        let vhost_count: u64 = bucket.table.vhosts().map(|(_, e)| e.rollup.count).sum();
        let handler_count: u64 = bucket
            .table
            .vhosts()
            .flat_map(|(_, e)| e.handlers.iter().map(|(_, c)| c.count))
            .sum();
        assert_eq!(rollup.count, vhost_count);
        assert_eq!(rollup.count, handler_count);
        count += rollup.count;
        bytes_out += rollup.bytes_out.sum;
    }

    assert_eq!(count, WRITERS as u64 * PER_WRITER);
    assert_eq!(bytes_out, 2 * WRITERS as u64 * PER_WRITER);
    assert!(store.is_empty());
}
