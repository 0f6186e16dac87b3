//! Scan coordination: offset allocation, lane lifecycle, and outcome
//! assembly.
//!
//! The coordinator is the only task that touches the paging cursor. It seeds
//! every lane with one offset, then sits in a loop over lane reports: a
//! non-empty completion earns the lane the next offset, an empty page or a
//! fetch failure closes the lane. The scan is over when no lane is open.
//! Lane state lives in an explicit map from lane id to its assignment
//! channel, so a lane closing twice or reporting after close is detected
//! instead of silently corrupting a counter.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::error::{LaneError, ScanError};

use super::aggregator::{AggregateSummary, Aggregator, ScanObserver};
use super::fetcher::{PageFetcher, PageRequest};
use super::worker::{LaneOutcome, LaneReport, LaneWorker};

/// Records requested per page when none is configured.
pub const DEFAULT_PAGE_SIZE: u32 = 25;

/// Scan lanes used when none are configured.
pub const DEFAULT_WORKERS: usize = 4;

/// Tuning for a concurrent scan.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Number of scan lanes fetching in parallel.
    pub workers: usize,
    /// Records requested per page.
    pub page_size: u32,
    /// Upper bound on a single page fetch; `None` leaves fetches unbounded.
    pub fetch_timeout: Option<Duration>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            page_size: DEFAULT_PAGE_SIZE,
            fetch_timeout: None,
        }
    }
}

impl ScanOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    fn validate(&self) -> Result<(), ScanError> {
        if self.workers == 0 {
            return Err(ScanError::InvalidConfiguration(
                "worker count must be at least 1".to_string(),
            ));
        }
        if self.page_size == 0 {
            return Err(ScanError::InvalidConfiguration(
                "page size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Counters describing how a scan went.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanStats {
    /// Lanes the scan started with.
    pub workers: usize,
    /// Non-empty pages aggregated.
    pub pages: u64,
    /// Fetches that completed and reported, empty and failed ones included.
    pub fetches: u64,
    /// Keys aggregated.
    pub records: u64,
    /// Wall-clock duration of the scan.
    pub elapsed: Duration,
}

/// Result of a scan: the aggregate plus everything needed to judge it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOutcome {
    /// Aggregated issue keys, in aggregation order.
    pub keys: Vec<String>,
    /// Lanes that closed on a failure instead of end-of-data.
    pub lane_errors: Vec<LaneError>,
    /// True when the scan stopped on a cancellation signal.
    pub cancelled: bool,
    /// Scan counters.
    pub stats: ScanStats,
    /// When the scan finished.
    pub finished_at: DateTime<Utc>,
}

impl ScanOutcome {
    /// True when at least one lane failed and the aggregate may be missing
    /// records.
    pub fn is_partial(&self) -> bool {
        !self.lane_errors.is_empty()
    }

    /// True when every lane failed before seeing end-of-data.
    pub fn all_lanes_failed(&self) -> bool {
        self.stats.workers > 0 && self.lane_errors.len() == self.stats.workers
    }

    /// The keys, if the scan ran to completion on every lane; an error
    /// otherwise.
    pub fn require_complete(self) -> Result<Vec<String>, ScanError> {
        if self.cancelled {
            return Err(ScanError::Cancelled);
        }
        if !self.lane_errors.is_empty() {
            return Err(ScanError::Partial {
                failed: self.lane_errors.len(),
                workers: self.stats.workers,
                errors: self.lane_errors,
            });
        }
        Ok(self.keys)
    }
}

/// Handle for cancelling scans from another task.
///
/// Cancellation is level-triggered: once cancelled, the flag stays set and
/// every current and later [`Scanner::run`] on the owning scanner observes
/// it. Cancelling is idempotent.
#[derive(Clone)]
pub struct ScanCanceller {
    flag: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ScanCanceller {
    /// Signals every role of the scan to stop.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
        // No receivers just means no scan is running right now.
        let _ = self.shutdown_tx.send(());
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Concurrent paginated scan over one JQL query.
///
/// A `Scanner` owns the fetcher, the tuning, and the cancellation channel;
/// each [`run`](Scanner::run) call spins up its own lanes and aggregator and
/// tears them down before returning.
pub struct Scanner {
    fetcher: Arc<dyn PageFetcher>,
    options: ScanOptions,
    observer: Option<Arc<dyn ScanObserver>>,
    shutdown_tx: broadcast::Sender<()>,
    cancel_flag: Arc<AtomicBool>,
}

impl Scanner {
    /// Creates a scanner, validating the options before any lane spawns.
    pub fn new(fetcher: Arc<dyn PageFetcher>, options: ScanOptions) -> Result<Self, ScanError> {
        options.validate()?;
        let (shutdown_tx, _) = broadcast::channel(1);
        Ok(Self {
            fetcher,
            options,
            observer: None,
            shutdown_tx,
            cancel_flag: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Attaches an observer that is called after every aggregated page.
    pub fn with_observer(mut self, observer: Arc<dyn ScanObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Returns a handle that cancels runs of this scanner.
    pub fn canceller(&self) -> ScanCanceller {
        ScanCanceller {
            flag: Arc::clone(&self.cancel_flag),
            shutdown_tx: self.shutdown_tx.clone(),
        }
    }

    /// Runs the scan to completion and returns the aggregate.
    ///
    /// Lane failures do not abort the run: the remaining lanes keep going
    /// and the failures are recorded in the outcome. `Err` is reserved for
    /// a scan that could not start at all.
    pub async fn run(&self, jql: &str) -> Result<ScanOutcome, ScanError> {
        let jql = jql.trim();
        if jql.is_empty() {
            return Err(ScanError::InvalidConfiguration(
                "JQL query must not be empty".to_string(),
            ));
        }

        // Subscribe before the flag check: a cancel after this line lands in
        // the subscription, a cancel before it is caught by the flag.
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        if self.cancel_flag.load(Ordering::Relaxed) {
            return Err(ScanError::Cancelled);
        }

        let started = Instant::now();
        let workers = self.options.workers;
        let page_size = self.options.page_size;
        info!(workers, page_size, jql, "Starting scan");

        let (report_tx, mut report_rx) = mpsc::channel::<LaneReport>(workers);
        let (page_tx, page_rx) = mpsc::channel(workers * 2);

        let aggregator = Aggregator::new(
            page_rx,
            self.observer.clone(),
            self.shutdown_tx.subscribe(),
        );
        let aggregator_handle = tokio::spawn(aggregator.run());

        let shared_jql: Arc<str> = Arc::from(jql);
        let mut lanes: HashMap<usize, mpsc::Sender<PageRequest>> = HashMap::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);
        let mut next_offset: u64 = 0;

        for lane in 0..workers {
            // Capacity 1: a lane never holds more than one outstanding
            // assignment.
            let (assign_tx, assign_rx) = mpsc::channel(1);
            let worker = LaneWorker {
                lane,
                jql: Arc::clone(&shared_jql),
                fetcher: Arc::clone(&self.fetcher),
                fetch_timeout: self.options.fetch_timeout,
                assignments: assign_rx,
                reports: report_tx.clone(),
                pages: page_tx.clone(),
                shutdown: self.shutdown_tx.subscribe(),
            };
            handles.push(tokio::spawn(worker.run()));

            let seed = PageRequest {
                offset: next_offset,
                limit: page_size,
            };
            next_offset += u64::from(page_size);
            if assign_tx.send(seed).await.is_err() {
                // The freshly spawned worker holds the receiver, so this
                // only fires if its task already died.
                error!(lane, "Scan lane rejected its first assignment");
                continue;
            }
            lanes.insert(lane, assign_tx);
        }
        drop(report_tx);
        drop(page_tx);

        let mut lane_errors: Vec<LaneError> = Vec::new();
        let mut fetches: u64 = 0;
        let mut cancelled = false;

        while !lanes.is_empty() {
            let report = tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!(open_lanes = lanes.len(), "Scan cancelled; closing remaining lanes");
                    // Re-broadcast for lanes that subscribed after the
                    // original signal.
                    let _ = self.shutdown_tx.send(());
                    cancelled = true;
                    break;
                }
                report = report_rx.recv() => match report {
                    Some(report) => report,
                    None => {
                        warn!(open_lanes = lanes.len(), "Report channel closed with lanes still open");
                        break;
                    }
                },
            };

            fetches += 1;
            match report.outcome {
                LaneOutcome::Fetched { records } => {
                    let request = PageRequest {
                        offset: next_offset,
                        limit: page_size,
                    };
                    let delivered = match lanes.get(&report.lane) {
                        Some(assignments) => assignments.send(request).await.is_ok(),
                        None => {
                            // Closed lanes never report again; seeing one
                            // here means lane accounting is broken.
                            warn!(lane = report.lane, "Completion report from a closed lane");
                            continue;
                        }
                    };
                    if delivered {
                        next_offset += u64::from(page_size);
                        debug!(lane = report.lane, offset = request.offset, records, "Issued next page");
                    } else {
                        lanes.remove(&report.lane);
                        debug!(
                            lane = report.lane,
                            open_lanes = lanes.len(),
                            "Lane exited before its next assignment"
                        );
                    }
                }
                LaneOutcome::Exhausted => {
                    if lanes.remove(&report.lane).is_some() {
                        debug!(
                            lane = report.lane,
                            open_lanes = lanes.len(),
                            "Lane closed: end of data"
                        );
                    } else {
                        warn!(lane = report.lane, "End-of-data report from a closed lane");
                    }
                }
                LaneOutcome::Failed { offset, error } => {
                    if lanes.remove(&report.lane).is_some() {
                        warn!(
                            lane = report.lane,
                            offset,
                            error = %error,
                            open_lanes = lanes.len(),
                            "Lane closed on fetch failure; continuing on remaining lanes"
                        );
                        lane_errors.push(LaneError {
                            lane: report.lane,
                            offset,
                            message: error.to_string(),
                        });
                    } else {
                        warn!(lane = report.lane, "Failure report from a closed lane");
                    }
                }
            }
        }

        // Dropping the assignment senders stops any lane still waiting for
        // work; lanes inside a fetch stop through the broadcast.
        drop(lanes);
        drop(report_rx);

        for result in futures::future::join_all(handles).await {
            if let Err(join_error) = result {
                error!(error = %join_error, "Scan lane task panicked");
            }
        }

        let summary = match aggregator_handle.await {
            Ok(summary) => summary,
            Err(join_error) => {
                error!(error = %join_error, "Aggregator task panicked");
                AggregateSummary::default()
            }
        };

        let stats = ScanStats {
            workers,
            pages: summary.pages,
            fetches,
            records: summary.keys.len() as u64,
            elapsed: started.elapsed(),
        };
        info!(
            records = stats.records,
            pages = stats.pages,
            fetches = stats.fetches,
            failed_lanes = lane_errors.len(),
            cancelled,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "Scan finished"
        );

        Ok(ScanOutcome {
            keys: summary.keys,
            lane_errors,
            cancelled,
            stats,
            finished_at: Utc::now(),
        })
    }
}
