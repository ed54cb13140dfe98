use std::sync::Arc;

use log::{info, warn};
use tokio::sync::mpsc;

use crate::core::engine::{CancelHandle, Dispatcher};
use crate::core::executor::ProbeExecutor;
use crate::core::notifier::{ObserverHandle, ObserverRef, ProgressNotifier};
use crate::core::result_aggregator::{ResultAggregator, ScanReport};
use crate::core::ScanType;
use crate::detectors::{crlf, Detector};
use crate::error::ScanError;
use crate::http::HttpTransport;
use crate::render::{NoRenderer, RendererFactory};
use crate::utils::payload_loader::PayloadSource;

/// Results buffered between probe tasks and the collector.
const RESULT_BUFFER: usize = 100;

pub const DEFAULT_CONCURRENCY: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

/// One scan: one vulnerability class over one set of targets. A session
/// runs at most once.
pub struct ScanSession {
    detector: Detector,
    transport: Arc<dyn HttpTransport>,
    renderer: Arc<dyn RendererFactory>,
    headers: Vec<(String, String)>,
    concurrency: usize,
    notifier: ProgressNotifier,
    cancel: CancelHandle,
    state: SessionState,
}

impl ScanSession {
    pub fn new(detector: Detector, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            detector,
            transport,
            renderer: Arc::new(NoRenderer),
            headers: Vec::new(),
            concurrency: DEFAULT_CONCURRENCY,
            notifier: ProgressNotifier::new(),
            cancel: CancelHandle::new(),
            state: SessionState::Idle,
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn RendererFactory>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    pub fn scan_type(&self) -> ScanType {
        self.detector.scan_type()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn register_observer(&self, observer: ObserverRef) -> ObserverHandle {
        self.notifier.register(observer)
    }

    pub fn remove_observer(&self, handle: ObserverHandle) -> bool {
        self.notifier.unregister(handle)
    }

    /// Observer callbacks that failed during the run.
    pub fn observer_failures(&self) -> usize {
        self.notifier.failures()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Loads this class's payloads from `source`, then runs. CRLF always
    /// uses the built-in set.
    pub async fn run_with_source(
        &mut self,
        targets: &[String],
        source: &dyn PayloadSource,
    ) -> Result<ScanReport, ScanError> {
        if self.state != SessionState::Idle {
            return Err(ScanError::SessionReused);
        }
        let scan_type = self.scan_type();
        let payloads = if scan_type == ScanType::Crlf {
            crlf::payloads()
        } else {
            match source.load_payloads(scan_type) {
                Ok(payloads) => payloads,
                Err(e) => {
                    self.state = SessionState::Failed;
                    return Err(e);
                }
            }
        };
        self.run(targets, &payloads).await
    }

    /// Probes every target with every payload. Only setup problems are
    /// errors; per-probe failures land in the report.
    pub async fn run(
        &mut self,
        targets: &[String],
        payloads: &[String],
    ) -> Result<ScanReport, ScanError> {
        if self.state != SessionState::Idle {
            return Err(ScanError::SessionReused);
        }
        if targets.is_empty() {
            self.state = SessionState::Failed;
            return Err(ScanError::EmptyTargets);
        }
        if payloads.is_empty() {
            warn!("No payloads loaded for {} scan; nothing will be sent", self.scan_type());
        }

        self.state = SessionState::Running;
        let scan_type = self.scan_type();
        let total = targets.len() * payloads.len();

        let executor = ProbeExecutor::new(
            self.detector.clone(),
            Arc::clone(&self.transport),
            Arc::clone(&self.renderer),
        )
        .with_headers(self.headers.clone());
        let dispatcher = Dispatcher::new(Arc::new(executor), self.concurrency, self.cancel.clone());

        info!(
            "Starting {} scan: {} target(s) x {} payload(s), concurrency {}",
            scan_type,
            targets.len(),
            payloads.len(),
            dispatcher.concurrency()
        );
        self.notifier.start(scan_type, total);

        let (result_tx, result_rx) = mpsc::channel(RESULT_BUFFER);
        let aggregator = ResultAggregator::new(scan_type);
        let (submitted, report) = tokio::join!(
            dispatcher.run(targets, payloads, result_tx),
            aggregator.run(result_rx, &self.notifier)
        );

        self.state = if submitted < total {
            SessionState::Cancelled
        } else {
            SessionState::Completed
        };
        Ok(report)
    }
}
