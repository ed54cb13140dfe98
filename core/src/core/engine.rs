use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{info, warn};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinSet};

use crate::core::executor::ProbeExecutor;
use crate::core::result_aggregator::ProbeResult;

/// Stops a running dispatcher from submitting new probes. Probes already
/// in flight are allowed to finish and are still reported.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Fans (target, payload) pairs out over a bounded set of concurrent probes.
///
/// Each probe runs as its own task holding one semaphore permit, so at most
/// [`Dispatcher::concurrency`] probes are ever in flight. Results go to
/// `result_tx` in completion order.
pub struct Dispatcher {
    executor: Arc<ProbeExecutor>,
    concurrency: usize,
    cancel: CancelHandle,
}

impl Dispatcher {
    pub fn new(executor: Arc<ProbeExecutor>, concurrency: usize, cancel: CancelHandle) -> Self {
        Self { executor, concurrency, cancel }
    }

    /// Requested concurrency, at least 1 and clamped to the detector's cap.
    pub fn concurrency(&self) -> usize {
        let requested = self.concurrency.max(1);
        match self.executor.detector().concurrency_cap() {
            Some(cap) => requested.min(cap),
            None => requested,
        }
    }

    /// Submits every target x payload pair, target-major, and waits for all
    /// of them. Returns how many probes were submitted; fewer than
    /// `targets.len() * payloads.len()` means the run was cancelled.
    pub async fn run(
        &self,
        targets: &[String],
        payloads: &[String],
        result_tx: mpsc::Sender<ProbeResult>,
    ) -> usize {
        let semaphore = Arc::new(Semaphore::new(self.concurrency()));
        let mut tasks = JoinSet::new();
        let mut submitted = 0;

        'submit: for target in targets {
            for payload in payloads {
                if self.cancel.is_cancelled() {
                    break 'submit;
                }
                let permit = match semaphore.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break 'submit,
                };
                // Cancellation may have landed while waiting for a slot.
                if self.cancel.is_cancelled() {
                    break 'submit;
                }

                // Finished tasks are reaped here so the set stays near the permit count.
                while let Some(finished) = tasks.try_join_next() {
                    log_join_error(finished);
                }

                let executor = Arc::clone(&self.executor);
                let tx = result_tx.clone();
                let target = target.clone();
                let payload = payload.clone();

                tasks.spawn(async move {
                    let _permit = permit;
                    let result = executor.execute(&target, &payload).await;
                    if tx.send(result).await.is_err() {
                        warn!("Result collector is gone; dropping result for {}", target);
                    }
                });
                submitted += 1;
            }
        }

        if self.cancel.is_cancelled() {
            info!(
                "Scan cancelled after {} submitted probe(s); waiting for in-flight probes",
                submitted
            );
        }

        drop(result_tx);

        while let Some(finished) = tasks.join_next().await {
            log_join_error(finished);
        }
        submitted
    }
}

fn log_join_error(finished: Result<(), JoinError>) {
    if let Err(e) = finished {
        warn!("Probe task failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ScanType;
    use crate::detectors::Detector;
    use crate::http::{HttpTransport, ProbeRequest, TransportError, TransportResponse};
    use crate::render::NoRenderer;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct Blank;

    /// Records the highest number of overlapping requests it has seen.
    #[derive(Default)]
    struct Overlap {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl HttpTransport for Overlap {
        async fn get(&self, _request: &ProbeRequest) -> Result<TransportResponse, TransportError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(TransportResponse { status: 200, ..Default::default() })
        }
    }

    #[async_trait]
    impl HttpTransport for Blank {
        async fn get(&self, _request: &ProbeRequest) -> Result<TransportResponse, TransportError> {
            Ok(TransportResponse { status: 200, ..Default::default() })
        }
    }

    fn dispatcher(scan_type: ScanType, concurrency: usize, cancel: CancelHandle) -> Dispatcher {
        let detector = Detector::for_type(scan_type);
        let executor = ProbeExecutor::new(detector, Arc::new(Blank), Arc::new(NoRenderer));
        Dispatcher::new(Arc::new(executor), concurrency, cancel)
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_effective_concurrency() {
        assert_eq!(dispatcher(ScanType::Lfi, 0, CancelHandle::new()).concurrency(), 1);
        assert_eq!(dispatcher(ScanType::Lfi, 20, CancelHandle::new()).concurrency(), 20);
        assert_eq!(dispatcher(ScanType::Xss, 20, CancelHandle::new()).concurrency(), 3);
        assert_eq!(dispatcher(ScanType::Xss, 2, CancelHandle::new()).concurrency(), 2);
    }

    #[tokio::test]
    async fn test_submits_every_pair() {
        let (tx, mut rx) = mpsc::channel(64);
        let d = dispatcher(ScanType::Lfi, 4, CancelHandle::new());
        let targets = strings(&["http://a/", "http://b/"]);
        let submitted = d.run(&targets, &strings(&["x", "y", "z"]), tx).await;
        assert_eq!(submitted, 6);

        let mut urls = Vec::new();
        while let Some(r) = rx.recv().await {
            urls.push(r.target_url);
        }
        urls.sort();
        assert_eq!(
            urls,
            vec!["http://a/x", "http://a/y", "http://a/z", "http://b/x", "http://b/y", "http://b/z"]
        );
    }

    #[tokio::test]
    async fn test_cancelled_before_start_submits_nothing() {
        let cancel = CancelHandle::new();
        cancel.cancel();
        let (tx, mut rx) = mpsc::channel(8);
        let submitted = dispatcher(ScanType::Lfi, 4, cancel)
            .run(&strings(&["http://a/"]), &strings(&["x"]), tx)
            .await;
        assert_eq!(submitted, 0);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_large_run_at_concurrency_one() {
        let transport = Arc::new(Overlap::default());
        let detector = Detector::for_type(ScanType::Lfi);
        let executor = ProbeExecutor::new(detector, transport.clone(), Arc::new(NoRenderer));
        let d = Dispatcher::new(Arc::new(executor), 1, CancelHandle::new());

        let targets: Vec<String> = (0..20).map(|i| format!("http://t{}.test/?f=", i)).collect();
        let payloads: Vec<String> = (0..50).map(|i| format!("p{}", i)).collect();
        let (tx, mut rx) = mpsc::channel(4);

        let collect = async {
            let mut received = 0;
            while rx.recv().await.is_some() {
                received += 1;
            }
            received
        };
        let (submitted, received) = tokio::join!(d.run(&targets, &payloads, tx), collect);

        assert_eq!(submitted, 1000);
        assert_eq!(received, 1000);
        assert_eq!(transport.peak.load(Ordering::SeqCst), 1);
    }
}
