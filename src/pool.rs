//! Worker pool and reporter.
//!
//! # Architecture
//!
//! ```text
//!            ordered (default)                      unordered
//!   submit ── work[k mod N] ──> worker k     submit ──┬─> worker 0..N
//!   worker k ── result[k] ────> reporter             shared queues
//!   reporter reads result[gathered mod N]    reporter reads one queue
//! ```
//!
//! # Correctness Invariants
//! - Ordered mode: round-robin submission plus round-robin consumption on
//!   the same modulus reproduces submission order in the output without
//!   sorting.
//! - Queues are bounded; a full work queue blocks the submitter and an
//!   empty result queue blocks the reporter. That is the only blocking.
//! - Drain protocol: dropping the work senders disconnects the workers;
//!   each worker sends one sentinel result and exits; the reporter stops
//!   after collecting every sentinel.

use crate::config::Config;
use crate::matcher::Matcher;
use crate::scan::{self, ScanResult, WorkItem};
use crossbeam_channel as chan;
use std::io::{BufWriter, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info};

/// Bounded capacity of each work and result queue.
const QUEUE_CAP: usize = 512;

/// Aggregated run totals, assembled by the reporter.
#[derive(Clone, Copy, Debug, Default)]
pub struct Summary {
    pub files: u64,
    pub bytes: u64,
    pub tokens: u64,
    pub lines: u64,
    pub matches: u64,
    pub errors: u64,
}

impl Summary {
    fn absorb(&mut self, result: &ScanResult) {
        self.files += result.files;
        self.bytes += result.bytes;
        self.tokens += result.tokens;
        self.lines += result.lines;
        self.matches += result.matches;
        self.errors += result.errors;
    }

    /// Log the run totals; also printed to stdout under `-summary`.
    pub fn print(&self, elapsed_secs: f64, to_stdout: bool) {
        let rate = |n: u64| n as f64 / elapsed_secs.max(1e-9);
        let text = format!(
            "{} file(s), {} line(s), {} token(s), {} byte(s), {} match(es), {} error(s) in {:.6}s ({:.0} lines/s, {:.0} bytes/s)",
            self.files,
            self.lines,
            self.tokens,
            self.bytes,
            self.matches,
            self.errors,
            elapsed_secs,
            rate(self.lines),
            rate(self.bytes),
        );
        info!("{text}");
        if to_stdout {
            println!("{text}");
        }
    }
}

enum WorkLanes {
    /// One queue per worker, fed round-robin.
    Ordered(Vec<chan::Sender<WorkItem>>),
    /// One queue shared by all workers.
    Unordered(chan::Sender<WorkItem>),
}

/// Fixed-size scan pool plus its reporter thread.
pub struct Pool {
    lanes: WorkLanes,
    submitted: usize,
    workers: Vec<JoinHandle<()>>,
    reporter: JoinHandle<Summary>,
}

impl Pool {
    /// Spawn workers and the reporter. `out` becomes reporter-owned; no
    /// other thread writes to it.
    pub fn new(cfg: Arc<Config>, matcher: Arc<Matcher>, out: Box<dyn Write + Send>) -> Self {
        let n = cfg.workers;
        let mut workers = Vec::with_capacity(n);

        if cfg.unordered {
            let (work_tx, work_rx) = chan::bounded::<WorkItem>(QUEUE_CAP);
            let (result_tx, result_rx) = chan::bounded::<ScanResult>(QUEUE_CAP);
            for _ in 0..n {
                let cfg = Arc::clone(&cfg);
                let matcher = Arc::clone(&matcher);
                let work_rx = work_rx.clone();
                let result_tx = result_tx.clone();
                workers.push(thread::spawn(move || {
                    worker_loop(&cfg, &matcher, work_rx, result_tx)
                }));
            }
            drop(result_tx);
            let reporter = thread::spawn(move || report_unordered(n, result_rx, out));
            Pool {
                lanes: WorkLanes::Unordered(work_tx),
                submitted: 0,
                workers,
                reporter,
            }
        } else {
            let mut work_txs = Vec::with_capacity(n);
            let mut result_rxs = Vec::with_capacity(n);
            for _ in 0..n {
                let (work_tx, work_rx) = chan::bounded::<WorkItem>(QUEUE_CAP);
                let (result_tx, result_rx) = chan::bounded::<ScanResult>(QUEUE_CAP);
                let cfg = Arc::clone(&cfg);
                let matcher = Arc::clone(&matcher);
                workers.push(thread::spawn(move || {
                    worker_loop(&cfg, &matcher, work_rx, result_tx)
                }));
                work_txs.push(work_tx);
                result_rxs.push(result_rx);
            }
            let reporter = thread::spawn(move || report_ordered(result_rxs, out));
            Pool {
                lanes: WorkLanes::Ordered(work_txs),
                submitted: 0,
                workers,
                reporter,
            }
        }
    }

    /// Enqueue one work item. Blocks when the target queue is full; that
    /// backpressure is what bounds memory during large walks.
    pub fn submit(&mut self, item: WorkItem) {
        let sent = match &self.lanes {
            WorkLanes::Ordered(txs) => txs[self.submitted % txs.len()].send(item),
            WorkLanes::Unordered(tx) => tx.send(item),
        };
        // A send fails only if every worker died; the reporter's sentinel
        // count will surface that on finish().
        if sent.is_err() {
            debug!("work queue disconnected; submission dropped");
        }
        self.submitted += 1;
    }

    /// Close the queues, drain the workers, and return the run totals.
    pub fn finish(self) -> Summary {
        drop(self.lanes);
        for handle in self.workers {
            let _ = handle.join();
        }
        self.reporter.join().unwrap_or_default()
    }
}

fn worker_loop(
    cfg: &Config,
    matcher: &Matcher,
    work_rx: chan::Receiver<WorkItem>,
    result_tx: chan::Sender<ScanResult>,
) {
    for item in work_rx.iter() {
        let result = scan::scan_work(cfg, matcher, item);
        if result_tx.send(result).is_err() {
            return;
        }
    }
    let _ = result_tx.send(ScanResult::sentinel());
}

/// Ordered reporter: one result queue per worker, consumed round-robin on
/// the submission modulus, so output order equals submission order.
fn report_ordered(result_rxs: Vec<chan::Receiver<ScanResult>>, out: Box<dyn Write + Send>) -> Summary {
    let n = result_rxs.len();
    let mut sink = BufWriter::new(out);
    let mut summary = Summary::default();
    let mut done = vec![false; n];
    let mut gathered = 0usize;
    let mut completed = 0usize;

    while completed < n {
        let lane = gathered % n;
        gathered += 1;
        if done[lane] {
            continue;
        }
        match result_rxs[lane].recv() {
            Ok(result) if result.complete => {
                done[lane] = true;
                completed += 1;
            }
            Ok(result) => write_report(&mut sink, &result, &mut summary),
            // A worker died without its sentinel; retire the lane.
            Err(_) => {
                done[lane] = true;
                completed += 1;
            }
        }
    }

    let _ = sink.flush();
    summary
}

/// Unordered reporter: single shared queue, output order unspecified.
fn report_unordered(
    workers: usize,
    result_rx: chan::Receiver<ScanResult>,
    out: Box<dyn Write + Send>,
) -> Summary {
    let mut sink = BufWriter::new(out);
    let mut summary = Summary::default();
    let mut completed = 0usize;

    while completed < workers {
        let Ok(result) = result_rx.recv() else { break };
        if result.complete {
            completed += 1;
            continue;
        }
        write_report(&mut sink, &result, &mut summary);
    }

    let _ = sink.flush();
    summary
}

fn write_report(sink: &mut impl Write, result: &ScanResult, summary: &mut Summary) {
    summary.absorb(result);
    if result.report.is_empty() {
        return;
    }
    if let Err(err) = sink.write_all(&result.report) {
        debug!("writing report for {}: {}", result.name, err);
        summary.errors += 1;
    }
}
