//! Aggregation side of a scan: a single task that drains fetched pages into
//! one combined key list.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::debug;

use super::fetcher::FetchedPage;

/// Progress snapshot handed to a [`ScanObserver`] after each aggregated page.
#[derive(Debug, Clone)]
pub struct ScanProgress {
    /// Lane the page came from.
    pub lane: usize,
    /// Offset the page was fetched at.
    pub offset: u64,
    /// Number of keys on this page.
    pub page_records: usize,
    /// Keys aggregated so far, this page included.
    pub total_records: usize,
    /// Pages aggregated so far, this one included.
    pub pages: u64,
}

/// Observer invoked on the aggregation path after every page.
///
/// Called inline by the aggregation task: implementations must return
/// promptly and must not block, or aggregation (and through channel
/// backpressure, the scan lanes) stalls behind them.
pub trait ScanObserver: Send + Sync {
    fn on_page(&self, progress: &ScanProgress);
}

/// Everything the aggregator had collected by the time its input closed.
#[derive(Debug, Default)]
pub(crate) struct AggregateSummary {
    pub keys: Vec<String>,
    pub pages: u64,
}

/// The aggregation task. Owns the receiving end of the page channel and runs
/// until every lane sender is gone or the scan is cancelled.
pub(crate) struct Aggregator {
    pages: mpsc::Receiver<FetchedPage>,
    observer: Option<Arc<dyn ScanObserver>>,
    shutdown: broadcast::Receiver<()>,
}

impl Aggregator {
    pub(crate) fn new(
        pages: mpsc::Receiver<FetchedPage>,
        observer: Option<Arc<dyn ScanObserver>>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            pages,
            observer,
            shutdown,
        }
    }

    pub(crate) async fn run(mut self) -> AggregateSummary {
        let mut summary = AggregateSummary::default();

        loop {
            let page = tokio::select! {
                _ = self.shutdown.recv() => {
                    debug!(pages = summary.pages, "Aggregator stopping on cancellation");
                    break;
                }
                page = self.pages.recv() => match page {
                    Some(page) => page,
                    None => break,
                },
            };

            summary.pages += 1;
            let page_records = page.keys.len();
            summary.keys.extend(page.keys);
            debug!(
                lane = page.lane,
                offset = page.offset,
                page_records,
                total_records = summary.keys.len(),
                "Aggregated page"
            );

            if let Some(observer) = &self.observer {
                observer.on_page(&ScanProgress {
                    lane: page.lane,
                    offset: page.offset,
                    page_records,
                    total_records: summary.keys.len(),
                    pages: summary.pages,
                });
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    fn page(lane: usize, offset: u64, keys: &[&str]) -> FetchedPage {
        FetchedPage {
            lane,
            offset,
            keys: keys.iter().map(|k| k.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_aggregates_pages_in_arrival_order() {
        let (page_tx, page_rx) = mpsc::channel(8);
        let (shutdown_tx, _) = broadcast::channel(1);
        let aggregator = Aggregator::new(page_rx, None, shutdown_tx.subscribe());

        page_tx.send(page(1, 25, &["V-26", "V-27"])).await.unwrap();
        page_tx.send(page(0, 0, &["V-1"])).await.unwrap();
        page_tx.send(page(2, 50, &["V-51"])).await.unwrap();
        drop(page_tx);

        let summary = aggregator.run().await;
        assert_eq!(summary.pages, 3);
        assert_eq!(summary.keys, vec!["V-26", "V-27", "V-1", "V-51"]);
    }

    struct Recording {
        seen: Mutex<Vec<(u64, usize, usize)>>,
    }

    impl ScanObserver for Recording {
        fn on_page(&self, progress: &ScanProgress) {
            self.seen.lock().unwrap().push((
                progress.pages,
                progress.page_records,
                progress.total_records,
            ));
        }
    }

    #[tokio::test]
    async fn test_observer_sees_monotonic_totals() {
        let (page_tx, page_rx) = mpsc::channel(8);
        let (shutdown_tx, _) = broadcast::channel(1);
        let recording = Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
        });
        let observer: Arc<dyn ScanObserver> = recording.clone();
        let aggregator = Aggregator::new(page_rx, Some(observer), shutdown_tx.subscribe());

        page_tx.send(page(0, 0, &["V-1", "V-2"])).await.unwrap();
        page_tx.send(page(1, 25, &["V-26"])).await.unwrap();
        drop(page_tx);

        let summary = aggregator.run().await;
        assert_eq!(summary.keys.len(), 3);

        let seen = recording.seen.lock().unwrap();
        assert_eq!(*seen, vec![(1, 2, 2), (2, 1, 3)]);
    }

    #[tokio::test]
    async fn test_cancellation_stops_aggregator() {
        let (page_tx, page_rx) = mpsc::channel::<FetchedPage>(8);
        let (shutdown_tx, _) = broadcast::channel(1);
        let aggregator = Aggregator::new(page_rx, None, shutdown_tx.subscribe());

        let handle = tokio::spawn(aggregator.run());
        shutdown_tx.send(()).unwrap();

        let summary = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("aggregator did not stop on cancellation")
            .unwrap();
        assert_eq!(summary.pages, 0);
        drop(page_tx);
    }
}
