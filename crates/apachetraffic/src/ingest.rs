//! Access log ingestion.
//!
//! Apache pipes one line per request, whitespace separated:
//!
//! ```text
//! <time> <vhost> <bytes in> <bytes out> <ttfb> [<handler>]
//! ```
//!
//! for example from `LogFormat "%{%s}t %v %I %O %D %R" apachetraffic`. The
//! leading field is ignored; requests are bucketed by arrival time.

use std::io::BufRead;

use traffic_stats::{BucketStore, Request};

use crate::error::ParseError;

const MIN_FIELDS: usize = 5;

/// Totals for one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub lines: u64,
    pub recorded: u64,
    pub skipped: u64,
}

/// Malformed numbers count as zero.
fn parse_number(field: &str) -> u64 {
    field.parse().unwrap_or(0)
}

/// `-` and `[...]` mark a handler Apache could not determine.
fn parse_handler(field: Option<&str>) -> Option<&str> {
    field.filter(|h| !h.starts_with('-') && !h.starts_with('['))
}

/// Turn one access log line into a request.
pub fn parse_line(line: &str) -> Result<Request, ParseError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < MIN_FIELDS {
        return Err(ParseError::MissingFields {
            found: fields.len(),
        });
    }

    Ok(Request::new(
        fields[1],
        parse_handler(fields.get(5).copied()),
        parse_number(fields[2]),
        parse_number(fields[3]),
        parse_number(fields[4]),
    ))
}

/// Feed every line of `reader` into `store` until end of input.
///
/// Unparseable lines are logged and skipped. Invalid UTF-8 is replaced rather
/// than rejected. A read error ends ingestion and is returned to the caller.
pub fn ingest<R: BufRead>(mut reader: R, store: &BucketStore) -> std::io::Result<IngestStats> {
    let mut stats = IngestStats::default();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        stats.lines += 1;

        let line = String::from_utf8_lossy(&buf);
        if line.trim().is_empty() {
            stats.skipped += 1;
            continue;
        }
        match parse_line(&line) {
            Ok(request) => {
                store.record(&request);
                stats.recorded += 1;
            }
            Err(e) => {
                log::warn!("Skipping log line {}: {}", stats.lines, e);
                stats.skipped += 1;
            }
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_full_line() {
        let request = parse_line("1700000000 a.example.com 100 2000 50 php").unwrap();
        assert_eq!(request, Request::new("a.example.com", Some("php"), 100, 2000, 50));
    }

    #[test]
    fn handler_is_optional() {
        let request = parse_line("1700000000 a.example.com 100 2000 50").unwrap();
        assert_eq!(request.handler, None);
    }

    #[test]
    fn placeholder_handlers_are_unclassified() {
        for line in [
            "t a.example.com 1 2 3 -",
            "t a.example.com 1 2 3 [unknown]",
            "t a.example.com 1 2 3 -default",
        ] {
            assert_eq!(parse_line(line).unwrap().handler, None, "{line}");
        }
    }

    #[test]
    fn extra_fields_are_ignored() {
        let request = parse_line("t a.example.com 1 2 3 php trailing junk").unwrap();
        assert_eq!(request.handler.as_deref(), Some("php"));
    }

    #[test]
    fn malformed_numbers_are_zero() {
        let request = parse_line("t a.example.com abc -5 12x php").unwrap();
        assert_eq!(request.sample.bytes_in, 0);
        assert_eq!(request.sample.bytes_out, 0);
        assert_eq!(request.sample.ttfb, 0);
    }

    #[test]
    fn short_lines_are_rejected() {
        assert_eq!(
            parse_line("t a.example.com 1 2"),
            Err(ParseError::MissingFields { found: 4 })
        );
        assert_eq!(parse_line(""), Err(ParseError::MissingFields { found: 0 }));
    }

    #[test]
    fn invalid_utf8_does_not_stop_ingestion() {
        let store = BucketStore::default();
        let input: &[u8] = b"t a.example.com 1 1 1 php\n\
                             t b\xffexample.com 2 2 2 php\n\
                             t c.example.com 3 3 3\n";

        let stats = ingest(Cursor::new(input), &store).unwrap();
        assert_eq!(stats.lines, 3);
        assert_eq!(stats.recorded, 3);

        let buckets = store.drain_all();
        let vhosts: usize = buckets.iter().map(|b| b.table.vhost_count()).sum();
        assert!(vhosts >= 3);
        assert!(
            buckets
                .iter()
                .any(|b| b.table.get("c.example.com").is_some())
        );
    }

    #[test]
    fn last_line_without_newline_is_recorded() {
        let store = BucketStore::default();
        let stats = ingest(Cursor::new("t a.example.com 1 1 1 php"), &store).unwrap();
        assert_eq!(stats.recorded, 1);
    }

    #[test]
    fn ingest_records_and_skips() {
        let store = BucketStore::default();
        let input = "t a.example.com 100 2000 50 php\n\
                     garbage\n\
                     \n\
                     t a.example.com 200 4000 150 php\n\
                     t b.example.com 1 1 1 -\n";

        let stats = ingest(Cursor::new(input), &store).unwrap();
        assert_eq!(
            stats,
            IngestStats {
                lines: 5,
                recorded: 3,
                skipped: 2,
            }
        );

        let total: u64 = store
            .drain_all()
            .iter()
            .map(|bucket| bucket.table.rollup().count)
            .sum();
        assert_eq!(total, 3);
    }
}
