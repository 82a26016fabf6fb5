//! Stream driver: pulls record batches from a collector and runs them through
//! a [`Report`].
//!
//! Two loops share the same sort/filter/render contract:
//!
//! - trace mode drains a channel until every sender is gone (or the run is
//!   cancelled) and renders the collected records once;
//! - top mode wakes up every interval, takes ownership of whatever the
//!   collector accumulated since the last tick and renders it.
//!
//! Cancellation and deadlines are only looked at between intervals. A batch
//! that started rendering is always written out in full with one `write_all`.

use std::collections::HashMap;
use std::hash::Hash;
use std::io::Write;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{debug, info};

use crate::columns::Record;
use crate::config::{ReportConfig, DEFAULT_INTERVAL};
use crate::output::OutputFormat;
use crate::report::Report;

/// How often trace mode wakes up to look at the cancel token and deadline
/// while the channel is quiet.
const TRACE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Cloneable stop flag. Waiters are woken as soon as it is set.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep for up to `timeout`. Returns true if the token was cancelled
    /// before or during the wait.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = cvar
            .wait_timeout_while(guard, timeout, |cancelled| !*cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

/// Producer side of top mode.
pub trait BatchSource<T>: Send + Sync {
    /// Hand over everything accumulated since the previous call and reset
    /// the accumulation state.
    fn take_batch(&self) -> Vec<T>;

    /// True once the collector will not produce anything else.
    fn is_finished(&self) -> bool {
        false
    }
}

struct Entries<K, T> {
    index: HashMap<K, usize>,
    records: Vec<T>,
}

impl<K, T> Default for Entries<K, T> {
    fn default() -> Self {
        Entries {
            index: HashMap::new(),
            records: Vec::new(),
        }
    }
}

/// Keyed accumulation of per-interval statistics, e.g. one entry per
/// (pid, file). Records are kept in first-seen order.
pub struct Accumulator<K, T> {
    entries: Mutex<Entries<K, T>>,
    finished: AtomicBool,
}

impl<K, T> Default for Accumulator<K, T> {
    fn default() -> Self {
        Accumulator {
            entries: Mutex::new(Entries::default()),
            finished: AtomicBool::new(false),
        }
    }
}

impl<K, T> Accumulator<K, T> {
    /// Mark the collector as done. The driver renders one last batch and
    /// stops.
    pub fn finish(&self) {
        self.finished.store(true, Ordering::Release);
    }
}

impl<K: Eq + Hash, T> Accumulator<K, T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `record` under `key`, or fold it into the existing entry.
    pub fn add<F>(&self, key: K, record: T, merge: F)
    where
        F: FnOnce(&mut T, T),
    {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let Entries { index, records } = &mut *entries;
        match index.get(&key) {
            Some(&pos) => merge(&mut records[pos], record),
            None => {
                index.insert(key, records.len());
                records.push(record);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, T> BatchSource<T> for Accumulator<K, T>
where
    K: Eq + Hash + Send,
    T: Send,
{
    fn take_batch(&self) -> Vec<T> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        mem::take(&mut *entries).records
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}

pub struct StreamDriver<T: Record, W: Write> {
    report: Report<T>,
    sink: W,
    interval: Duration,
    count: Option<u64>,
    duration: Option<Duration>,
}

impl<T: Record, W: Write> StreamDriver<T, W> {
    pub fn new(report: Report<T>, sink: W) -> Self {
        StreamDriver {
            report,
            sink,
            interval: DEFAULT_INTERVAL,
            count: None,
            duration: None,
        }
    }

    /// Build the report from `config` and take its timing settings.
    pub fn from_config(config: &ReportConfig, sink: W) -> Result<Self> {
        let report = Report::from_config(config)
            .with_context(|| format!("invalid report settings for {}", type_label::<T>()))?;
        Ok(Self::new(report, sink)
            .with_interval(config.interval)
            .with_count(config.count())
            .with_duration(config.duration()))
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_count(mut self, count: Option<u64>) -> Self {
        self.count = count;
        self
    }

    pub fn with_duration(mut self, duration: Option<Duration>) -> Self {
        self.duration = duration;
        self
    }

    pub fn report(&self) -> &Report<T> {
        &self.report
    }

    pub fn report_mut(&mut self) -> &mut Report<T> {
        &mut self.report
    }

    pub fn into_sink(self) -> W {
        self.sink
    }

    /// Collect until the channel is closed, the run is cancelled or the
    /// deadline passes, then render everything once. Returns the number of
    /// records received.
    pub fn run_trace(&mut self, events: Receiver<T>, cancel: &CancelToken) -> Result<usize> {
        let deadline = self.duration.map(|d| Instant::now() + d);
        let mut batch = Vec::new();
        info!("Collecting {} events", type_label::<T>());

        loop {
            if cancel.is_cancelled() {
                // Events already queued count as collected.
                batch.extend(events.try_iter());
                info!("Cancelled, rendering {} collected events", batch.len());
                break;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                batch.extend(events.try_iter());
                info!("Duration reached, rendering {} collected events", batch.len());
                break;
            }
            match events.recv_timeout(TRACE_POLL_INTERVAL) {
                Ok(event) => {
                    batch.push(event);
                    batch.extend(events.try_iter());
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("Event source closed after {} events", batch.len());
                    break;
                }
            }
        }

        let received = batch.len();
        self.emit(batch)?;
        Ok(received)
    }

    /// Render one batch per interval until cancelled, the tick limit or
    /// deadline is reached, or the source finished. Returns the number of
    /// batches rendered.
    pub fn run_top(&mut self, source: &dyn BatchSource<T>, cancel: &CancelToken) -> Result<u64> {
        let deadline = self.duration.map(|d| Instant::now() + d);
        let mut ticks = 0u64;
        info!(
            "Refreshing {} every {:?}",
            type_label::<T>(),
            self.interval
        );

        loop {
            let wait = match deadline {
                Some(d) => self.interval.min(d.saturating_duration_since(Instant::now())),
                None => self.interval,
            };
            if cancel.wait_timeout(wait) {
                info!("Cancelled after {ticks} intervals");
                break;
            }

            // Read before draining so nothing added after the final batch
            // is lost.
            let finished = source.is_finished();
            let batch = source.take_batch();
            debug!("Interval {}: {} entries", ticks + 1, batch.len());

            if ticks > 0 && self.report.format() == OutputFormat::Columns {
                self.sink.write_all(b"\n").context("failed to write output")?;
            }
            self.emit(batch)?;
            ticks += 1;

            if finished {
                info!("Source finished after {ticks} intervals");
                break;
            }
            if self.count.is_some_and(|count| ticks >= count) {
                break;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                info!("Duration reached after {ticks} intervals");
                break;
            }
        }

        Ok(ticks)
    }

    fn emit(&mut self, batch: Vec<T>) -> Result<()> {
        let out = self
            .report
            .process(batch)
            .context("failed to encode batch")?;
        self.sink
            .write_all(out.as_bytes())
            .context("failed to write output")?;
        self.sink.flush().context("failed to flush output")?;
        Ok(())
    }
}

fn type_label<T>() -> &'static str {
    let name = std::any::type_name::<T>();
    name.rsplit("::").next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::{FieldSet, SchemaBuilder};
    use std::sync::mpsc::channel;
    use std::thread;

    #[derive(Debug, Clone, PartialEq)]
    struct Hit {
        pid: u32,
        hits: u64,
    }

    impl FieldSet for Hit {
        fn describe(fields: &mut SchemaBuilder<Self>) {
            fields.field("pid,align:right", |h: &Hit| &h.pid);
            fields.field("hits,align:right", |h: &Hit| &h.hits);
        }
    }

    impl Record for Hit {
        const DEFAULT_SORT: &'static [&'static str] = &["-hits"];

        crate::record_registration!(Hit);
    }

    fn hit(pid: u32, hits: u64) -> Hit {
        Hit { pid, hits }
    }

    fn driver() -> StreamDriver<Hit, Vec<u8>> {
        StreamDriver::new(Report::new().unwrap(), Vec::new()).with_interval(Duration::from_millis(5))
    }

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert!(!token.wait_timeout(Duration::from_millis(1)));

        let clone = token.clone();
        let waiter = thread::spawn(move || clone.wait_timeout(Duration::from_secs(30)));
        token.cancel();
        assert!(waiter.join().unwrap());
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_accumulator_merges_and_resets() {
        let acc: Accumulator<u32, Hit> = Accumulator::new();
        let merge = |old: &mut Hit, new: Hit| old.hits += new.hits;
        acc.add(1, hit(1, 1), merge);
        acc.add(2, hit(2, 5), merge);
        acc.add(1, hit(1, 2), merge);
        assert_eq!(acc.len(), 2);

        assert_eq!(acc.take_batch(), vec![hit(1, 3), hit(2, 5)]);
        assert!(acc.is_empty());

        acc.add(1, hit(1, 1), merge);
        assert_eq!(acc.take_batch(), vec![hit(1, 1)]);
        assert!(!acc.is_finished());
        acc.finish();
        assert!(acc.is_finished());
    }

    #[test]
    fn test_trace_renders_once_on_close() {
        let (tx, rx) = channel();
        let producer = thread::spawn(move || {
            for (pid, hits) in [(1, 10), (2, 30), (3, 20)] {
                tx.send(hit(pid, hits)).unwrap();
            }
        });

        let mut driver = driver();
        let received = driver.run_trace(rx, &CancelToken::new()).unwrap();
        producer.join().unwrap();
        assert_eq!(received, 3);

        let out = String::from_utf8(driver.into_sink()).unwrap();
        assert_eq!(out, "PID HITS\n  2   30\n  3   20\n  1   10\n");
    }

    #[test]
    fn test_trace_cancelled_renders_collected() {
        let (tx, rx) = channel();
        tx.send(hit(4, 1)).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();

        let mut driver = driver();
        // The sender is still alive; only the token ends the run.
        let received = driver.run_trace(rx, &cancel).unwrap();
        drop(tx);
        assert_eq!(received, 1);
        assert_eq!(
            String::from_utf8(driver.into_sink()).unwrap(),
            "PID HITS\n  4    1\n"
        );
    }

    #[test]
    fn test_trace_deadline_keeps_queued() {
        let (tx, rx) = channel();
        tx.send(hit(1, 2)).unwrap();
        tx.send(hit(3, 5)).unwrap();

        let mut driver = driver().with_duration(Some(Duration::ZERO));
        let received = driver.run_trace(rx, &CancelToken::new()).unwrap();
        drop(tx);
        assert_eq!(received, 2);
        assert_eq!(
            String::from_utf8(driver.into_sink()).unwrap(),
            "PID HITS\n  3    5\n  1    2\n"
        );
    }

    #[test]
    fn test_top_stops_after_count() {
        let acc: Accumulator<u32, Hit> = Accumulator::new();
        let mut driver = driver().with_count(Some(2));
        acc.add(1, hit(1, 1), |_, _| {});

        let ticks = driver.run_top(&acc, &CancelToken::new()).unwrap();
        assert_eq!(ticks, 2);
        let out = String::from_utf8(driver.into_sink()).unwrap();
        assert_eq!(out, "PID HITS\n  1    1\n\nPID HITS\n");
    }

    #[test]
    fn test_top_drains_finished_source() {
        let acc: Accumulator<u32, Hit> = Accumulator::new();
        acc.add(1, hit(1, 7), |_, _| {});
        acc.add(2, hit(2, 9), |_, _| {});
        acc.finish();

        let report = Report::new().unwrap().with_format(OutputFormat::Json);
        let mut driver =
            StreamDriver::new(report, Vec::new()).with_interval(Duration::from_millis(1));
        let ticks = driver.run_top(&acc, &CancelToken::new()).unwrap();
        assert_eq!(ticks, 1);
        assert!(acc.is_empty());

        let out = String::from_utf8(driver.into_sink()).unwrap();
        assert_eq!(out, "{\"pid\":2,\"hits\":9}\n{\"pid\":1,\"hits\":7}\n");
    }

    #[test]
    fn test_top_cancelled_before_tick_emits_nothing() {
        let acc: Accumulator<u32, Hit> = Accumulator::new();
        acc.add(1, hit(1, 1), |_, _| {});
        let cancel = CancelToken::new();
        cancel.cancel();

        let mut driver = driver();
        assert_eq!(driver.run_top(&acc, &cancel).unwrap(), 0);
        assert!(driver.into_sink().is_empty());
        assert_eq!(acc.len(), 1);
    }

    #[test]
    fn test_top_duration() {
        let acc: Accumulator<u32, Hit> = Accumulator::new();
        let mut driver = driver()
            .with_interval(Duration::from_millis(20))
            .with_duration(Some(Duration::from_millis(50)));
        let ticks = driver.run_top(&acc, &CancelToken::new()).unwrap();
        assert!((1..=4).contains(&ticks), "ticks = {ticks}");
    }
}
