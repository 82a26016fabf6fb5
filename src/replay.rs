//! Collector stand-in that replays recorded gadget events from JSON lines.
//!
//! Each line holds one record in the gadget's JSON shape. Blank lines are
//! ignored; lines that fail to parse are logged and skipped so one corrupt
//! record does not end the session.

use std::fs::File;
use std::hash::Hash;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::sync::mpsc::{channel, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::de::DeserializeOwned;

use crate::stream::Accumulator;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayStats {
    pub records: usize,
    pub skipped: usize,
}

/// Open `path` for reading, or stdin when it is absent or `-`.
pub fn open_input(path: Option<&Path>) -> Result<Box<dyn BufRead + Send>> {
    match path {
        Some(path) if path != Path::new("-") => {
            let file = File::open(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
        _ => Ok(Box::new(BufReader::new(io::stdin()))),
    }
}

/// Parse records from `reader` and hand each one to `sink` until the input
/// ends or `sink` returns false.
pub fn read_records<T, R, F>(reader: R, mut sink: F) -> Result<ReplayStats>
where
    T: DeserializeOwned,
    R: BufRead,
    F: FnMut(T) -> bool,
{
    let mut stats = ReplayStats::default();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line.context("failed to read input")?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(&line) {
            Ok(record) => {
                stats.records += 1;
                if !sink(record) {
                    debug!("Consumer went away, stopping at line {}", lineno + 1);
                    break;
                }
            }
            Err(e) => {
                warn!("Skipping line {}: {e}", lineno + 1);
                stats.skipped += 1;
            }
        }
    }
    debug!(
        "Replayed {} records, skipped {} lines",
        stats.records, stats.skipped
    );
    Ok(stats)
}

/// Feed a trace-style channel from a background thread. The channel closes
/// once the input is exhausted.
pub fn spawn_trace<T, R>(reader: R) -> (Receiver<T>, JoinHandle<Result<ReplayStats>>)
where
    T: DeserializeOwned + Send + 'static,
    R: BufRead + Send + 'static,
{
    let (tx, rx) = channel();
    let handle = thread::spawn(move || read_records(reader, |record| tx.send(record).is_ok()));
    (rx, handle)
}

/// Marks the accumulator finished when the feeder thread ends, even by
/// unwinding.
struct FinishOnDrop<'a, K, T>(&'a Accumulator<K, T>);

impl<K, T> Drop for FinishOnDrop<'_, K, T> {
    fn drop(&mut self) {
        self.0.finish();
    }
}

/// Merge the records `accept` lets through into a top-style accumulator from
/// a background thread and mark it finished once the input is exhausted.
pub fn spawn_top<T, K, R, A>(
    reader: R,
    key: fn(&T) -> K,
    merge: fn(&mut T, T),
    accept: A,
) -> (Arc<Accumulator<K, T>>, JoinHandle<Result<ReplayStats>>)
where
    T: DeserializeOwned + Send + 'static,
    K: Eq + Hash + Send + 'static,
    R: BufRead + Send + 'static,
    A: Fn(&T) -> bool + Send + 'static,
{
    let accumulator = Arc::new(Accumulator::new());
    let acc = accumulator.clone();
    let handle = thread::spawn(move || {
        let _finish = FinishOnDrop(&*acc);
        read_records(reader, |record: T| {
            if accept(&record) {
                acc.add(key(&record), record, merge);
            }
            true
        })
    });
    (accumulator, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gadgets::top_file::Stats;
    use crate::gadgets::trace_signal::Event;
    use crate::stream::BatchSource;
    use std::io::Cursor;

    const SIGNALS: &str = r#"{"pid":1,"comm":"kill","signal":"SIGTERM","tpid":2}

not json
{"pid":3,"comm":"kill","signal":"SIGKILL","tpid":4,"ret":-3}
"#;

    #[test]
    fn test_read_records_skips_bad_lines() {
        let mut events: Vec<Event> = Vec::new();
        let stats = read_records(Cursor::new(SIGNALS), |e| {
            events.push(e);
            true
        })
        .unwrap();
        assert_eq!(stats, ReplayStats { records: 2, skipped: 1 });
        assert_eq!(events[1].signal, "SIGKILL");
        assert_eq!(events[1].ret, -3);
    }

    #[test]
    fn test_read_records_stops_when_consumer_gone() {
        let mut seen = 0;
        let stats = read_records(Cursor::new(SIGNALS), |_: Event| {
            seen += 1;
            false
        })
        .unwrap();
        assert_eq!(seen, 1);
        assert_eq!(stats.records, 1);
    }

    #[test]
    fn test_spawn_trace_closes_channel() {
        let (rx, handle) = spawn_trace::<Event, _>(Cursor::new(SIGNALS));
        let pids: Vec<u32> = rx.iter().map(|e| e.pid).collect();
        assert_eq!(pids, vec![1, 3]);
        assert_eq!(handle.join().unwrap().unwrap().records, 2);
    }

    #[test]
    fn test_spawn_top_merges() {
        let input = r#"{"pid":7,"tid":7,"filename":"/a","reads":1,"rbytes":10}
{"pid":7,"tid":7,"filename":"/b","writes":1,"wbytes":5}
{"pid":7,"tid":7,"filename":"/a","reads":2,"rbytes":30}
"#;
        let (acc, handle) = spawn_top(Cursor::new(input), Stats::key, Stats::merge, |_: &Stats| true);
        handle.join().unwrap().unwrap();
        assert!(acc.is_finished());

        let batch = acc.take_batch();
        assert_eq!(batch.len(), 2);
        assert_eq!((batch[0].filename.as_str(), batch[0].reads, batch[0].rbytes), ("/a", 3, 40));
        assert_eq!(batch[1].wbytes, 5);
    }

    #[test]
    fn test_spawn_top_skips_rejected() {
        let input = r#"{"pid":1,"tid":1,"filename":"/etc/hosts","reads":1,"fileType":82}
{"pid":2,"tid":2,"filename":"socket:[7]","reads":4,"fileType":83}
"#;
        let (acc, handle) =
            spawn_top(Cursor::new(input), Stats::key, Stats::merge, Stats::is_regular_file);
        assert_eq!(handle.join().unwrap().unwrap().records, 2);

        let batch = acc.take_batch();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].filename, "/etc/hosts");
    }

    #[test]
    fn test_spawn_top_saturates_counters() {
        let input = r#"{"pid":7,"tid":7,"filename":"/a","rbytes":18446744073709551615}
{"pid":7,"tid":7,"filename":"/a","rbytes":1}
"#;
        let (acc, handle) = spawn_top(Cursor::new(input), Stats::key, Stats::merge, |_: &Stats| true);
        handle.join().unwrap().unwrap();
        assert!(acc.is_finished());
        assert_eq!(acc.take_batch()[0].rbytes, u64::MAX);
    }

    fn failing_merge(_: &mut Stats, _: Stats) {
        panic!("merge failed");
    }

    #[test]
    fn test_spawn_top_finishes_when_feeder_panics() {
        let input = r#"{"pid":7,"tid":7,"filename":"/a","reads":1}
{"pid":7,"tid":7,"filename":"/a","reads":1}
"#;
        let (acc, handle) = spawn_top(Cursor::new(input), Stats::key, failing_merge, |_: &Stats| true);
        assert!(handle.join().is_err());
        assert!(acc.is_finished());
        assert_eq!(acc.take_batch().len(), 1);
    }

    #[test]
    fn test_open_missing_file() {
        let err = open_input(Some(Path::new("/nonexistent/events.jsonl"))).err().unwrap();
        assert!(err.to_string().contains("failed to open"));
    }
}
