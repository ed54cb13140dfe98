use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use log::warn;

use crate::core::result_aggregator::ProbeResult;
use crate::core::ScanType;
use crate::utils::panic_message;

/// Receives one callback per completed probe.
///
/// Callbacks run on the result collector, in completion order, never
/// concurrently with each other. A returned error or a panic is logged and
/// the scan carries on.
pub trait ProgressObserver: Send + Sync {
    fn on_start(&self, _scan_type: ScanType, _total: usize) {}

    fn on_result(&self, result: &ProbeResult) -> anyhow::Result<()>;
}

pub type ObserverRef = Arc<dyn ProgressObserver>;

/// Returned by [`ProgressNotifier::register`]; pass it back to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverHandle(u64);

#[derive(Default)]
pub struct ProgressNotifier {
    observers: Mutex<Vec<(ObserverHandle, ObserverRef)>>,
    next_id: AtomicU64,
    failures: AtomicUsize,
}

impl ProgressNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, observer: ObserverRef) -> ObserverHandle {
        let handle = ObserverHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((handle, observer));
        handle
    }

    /// Returns false if the handle was never registered or already removed.
    pub fn unregister(&self, handle: ObserverHandle) -> bool {
        let mut observers = self.lock();
        let before = observers.len();
        observers.retain(|(h, _)| *h != handle);
        observers.len() != before
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Observer callbacks that errored or panicked so far.
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn start(&self, scan_type: ScanType, total: usize) {
        for observer in self.snapshot() {
            let started = catch_unwind(AssertUnwindSafe(|| observer.on_start(scan_type, total)));
            if let Err(panic) = started {
                self.record_failure(&format!("panicked: {}", panic_message(panic.as_ref())));
            }
        }
    }

    pub fn notify(&self, result: &ProbeResult) {
        for observer in self.snapshot() {
            match catch_unwind(AssertUnwindSafe(|| observer.on_result(result))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => self.record_failure(&format!("{:#}", e)),
                Err(panic) => {
                    self.record_failure(&format!("panicked: {}", panic_message(panic.as_ref())))
                }
            }
        }
    }

    /// Callbacks run without the lock held, so an observer may register or
    /// unregister from inside its own callback.
    fn snapshot(&self) -> Vec<ObserverRef> {
        self.lock().iter().map(|(_, o)| Arc::clone(o)).collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(ObserverHandle, ObserverRef)>> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_failure(&self, reason: &str) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        warn!("Progress observer failed: {}", reason);
    }
}
