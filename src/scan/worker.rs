//! Scan lanes: the worker tasks that execute page fetches.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use crate::error::ClientError;

use super::fetcher::{FetchedPage, PageFetcher, PageRequest};

/// What a lane tells the coordinator after finishing one fetch.
#[derive(Debug)]
pub(crate) struct LaneReport {
    pub lane: usize,
    pub outcome: LaneOutcome,
}

#[derive(Debug)]
pub(crate) enum LaneOutcome {
    /// The fetch returned a non-empty page; the lane wants another offset.
    Fetched { records: usize },
    /// The fetch returned an empty page; the lane saw end-of-data.
    Exhausted,
    /// The fetch failed; the lane is closing.
    Failed { offset: u64, error: ClientError },
}

/// One scan lane: fetches exactly the offsets the coordinator assigns it,
/// one at a time, and reports after every fetch.
pub(crate) struct LaneWorker {
    pub lane: usize,
    pub jql: Arc<str>,
    pub fetcher: Arc<dyn PageFetcher>,
    pub fetch_timeout: Option<Duration>,
    pub assignments: mpsc::Receiver<PageRequest>,
    pub reports: mpsc::Sender<LaneReport>,
    pub pages: mpsc::Sender<FetchedPage>,
    pub shutdown: broadcast::Receiver<()>,
}

impl LaneWorker {
    pub(crate) async fn run(self) {
        let LaneWorker {
            lane,
            jql,
            fetcher,
            fetch_timeout,
            mut assignments,
            reports,
            pages,
            mut shutdown,
        } = self;
        debug!(lane, "Scan lane started");

        loop {
            let request = tokio::select! {
                _ = shutdown.recv() => {
                    debug!(lane, "Scan lane cancelled");
                    return;
                }
                request = assignments.recv() => match request {
                    Some(request) => request,
                    None => break,
                },
            };

            let result = tokio::select! {
                _ = shutdown.recv() => {
                    debug!(lane, offset = request.offset, "Scan lane cancelled mid-fetch");
                    return;
                }
                result = fetch_with_deadline(fetcher.as_ref(), &jql, request, fetch_timeout) => result,
            };

            match result {
                Ok(keys) if keys.is_empty() => {
                    debug!(lane, offset = request.offset, "Scan lane reached end of data");
                    let _ = reports
                        .send(LaneReport {
                            lane,
                            outcome: LaneOutcome::Exhausted,
                        })
                        .await;
                    return;
                }
                Ok(keys) => {
                    let records = keys.len();
                    let page = FetchedPage {
                        lane,
                        offset: request.offset,
                        keys,
                    };
                    // Page before report: the coordinator must never see a
                    // completion whose page is not yet queued downstream.
                    if pages.send(page).await.is_err() {
                        return;
                    }
                    if reports
                        .send(LaneReport {
                            lane,
                            outcome: LaneOutcome::Fetched { records },
                        })
                        .await
                        .is_err()
                    {
                        return;
                    }
                    debug!(lane, offset = request.offset, records, "Scan lane fetched page");
                }
                Err(error) => {
                    warn!(lane, offset = request.offset, error = %error, "Scan lane fetch failed");
                    let _ = reports
                        .send(LaneReport {
                            lane,
                            outcome: LaneOutcome::Failed {
                                offset: request.offset,
                                error,
                            },
                        })
                        .await;
                    return;
                }
            }
        }

        debug!(lane, "Scan lane stopping: assignment channel closed");
    }
}

async fn fetch_with_deadline(
    fetcher: &dyn PageFetcher,
    jql: &str,
    request: PageRequest,
    deadline: Option<Duration>,
) -> Result<Vec<String>, ClientError> {
    match deadline {
        Some(limit) => {
            match tokio::time::timeout(limit, fetcher.fetch_page(jql, request.offset, request.limit))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(ClientError::Timeout(limit)),
            }
        }
        None => fetcher.fetch_page(jql, request.offset, request.limit).await,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Instant;

    use async_trait::async_trait;

    use super::*;

    /// Pops one scripted response per fetch call.
    struct Scripted {
        responses: Mutex<VecDeque<Result<Vec<String>, ClientError>>>,
    }

    impl Scripted {
        fn new(responses: Vec<Result<Vec<String>, ClientError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
            })
        }
    }

    #[async_trait]
    impl PageFetcher for Scripted {
        async fn fetch_page(
            &self,
            _jql: &str,
            _offset: u64,
            _limit: u32,
        ) -> Result<Vec<String>, ClientError> {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("fetch called more times than scripted")
        }
    }

    /// Never completes a fetch until cancelled or timed out.
    struct Stalled;

    #[async_trait]
    impl PageFetcher for Stalled {
        async fn fetch_page(
            &self,
            _jql: &str,
            _offset: u64,
            _limit: u32,
        ) -> Result<Vec<String>, ClientError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }
    }

    struct Harness {
        assign_tx: mpsc::Sender<PageRequest>,
        report_rx: mpsc::Receiver<LaneReport>,
        page_rx: mpsc::Receiver<FetchedPage>,
        shutdown_tx: broadcast::Sender<()>,
        handle: tokio::task::JoinHandle<()>,
    }

    fn spawn_lane(fetcher: Arc<dyn PageFetcher>, fetch_timeout: Option<Duration>) -> Harness {
        let (assign_tx, assign_rx) = mpsc::channel(1);
        let (report_tx, report_rx) = mpsc::channel(4);
        let (page_tx, page_rx) = mpsc::channel(4);
        let (shutdown_tx, _) = broadcast::channel(1);
        let worker = LaneWorker {
            lane: 7,
            jql: Arc::from("project=VEGA"),
            fetcher,
            fetch_timeout,
            assignments: assign_rx,
            reports: report_tx,
            pages: page_tx,
            shutdown: shutdown_tx.subscribe(),
        };
        Harness {
            assign_tx,
            report_rx,
            page_rx,
            shutdown_tx,
            handle: tokio::spawn(worker.run()),
        }
    }

    #[tokio::test]
    async fn test_delivers_page_then_report() {
        let fetcher = Scripted::new(vec![Ok(vec!["V-1".to_string(), "V-2".to_string()])]);
        let mut harness = spawn_lane(fetcher, None);

        harness
            .assign_tx
            .send(PageRequest { offset: 0, limit: 25 })
            .await
            .unwrap();

        let page = harness.page_rx.recv().await.unwrap();
        assert_eq!(page.lane, 7);
        assert_eq!(page.offset, 0);
        assert_eq!(page.keys, vec!["V-1", "V-2"]);

        let report = harness.report_rx.recv().await.unwrap();
        assert_eq!(report.lane, 7);
        assert!(matches!(report.outcome, LaneOutcome::Fetched { records: 2 }));

        // Lane stays alive waiting for its next assignment until the
        // coordinator closes the channel.
        drop(harness.assign_tx);
        harness.handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_page_closes_lane() {
        let fetcher = Scripted::new(vec![Ok(Vec::new())]);
        let mut harness = spawn_lane(fetcher, None);

        harness
            .assign_tx
            .send(PageRequest {
                offset: 75,
                limit: 25,
            })
            .await
            .unwrap();

        let report = harness.report_rx.recv().await.unwrap();
        assert!(matches!(report.outcome, LaneOutcome::Exhausted));
        harness.handle.await.unwrap();
        assert!(harness.page_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_fetch_error_closes_lane() {
        let fetcher = Scripted::new(vec![Err(ClientError::Http("connection reset".to_string()))]);
        let mut harness = spawn_lane(fetcher, None);

        harness
            .assign_tx
            .send(PageRequest {
                offset: 50,
                limit: 25,
            })
            .await
            .unwrap();

        let report = harness.report_rx.recv().await.unwrap();
        match report.outcome {
            LaneOutcome::Failed { offset, error } => {
                assert_eq!(offset, 50);
                assert!(error.to_string().contains("connection reset"));
            }
            other => panic!("expected failure outcome, got {other:?}"),
        }
        harness.handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_timeout_closes_lane() {
        let fetcher: Arc<dyn PageFetcher> = Arc::new(Stalled);
        let mut harness = spawn_lane(fetcher, Some(Duration::from_millis(50)));

        harness
            .assign_tx
            .send(PageRequest { offset: 0, limit: 25 })
            .await
            .unwrap();

        let report = harness.report_rx.recv().await.unwrap();
        assert!(matches!(
            report.outcome,
            LaneOutcome::Failed {
                error: ClientError::Timeout(_),
                ..
            }
        ));
        harness.handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_fetch() {
        let fetcher: Arc<dyn PageFetcher> = Arc::new(Stalled);
        let mut harness = spawn_lane(fetcher, None);

        harness
            .assign_tx
            .send(PageRequest { offset: 0, limit: 25 })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let started = Instant::now();
        harness.shutdown_tx.send(()).unwrap();
        harness.handle.await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));

        // A cancelled lane reports nothing.
        assert!(harness.report_rx.recv().await.is_none());
    }
}
