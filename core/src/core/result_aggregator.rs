use std::fs;
use std::path::Path;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::core::notifier::ProgressNotifier;
use crate::core::ScanType;

/// Outcome of one (target, payload) probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub target_url: String,
    pub payload: String,
    pub vulnerable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Seconds, rounded to two decimals.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProbeResult {
    pub fn new(target_url: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            target_url: target_url.into(),
            payload: payload.into(),
            vulnerable: false,
            status_code: None,
            response_time: None,
            evidence: None,
            error: None,
        }
    }

    /// A probe that never got a usable answer.
    pub fn failed(
        target_url: impl Into<String>,
        payload: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self { error: Some(error.into()), ..Self::new(target_url, payload) }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.response_time = Some((elapsed.as_secs_f64() * 100.0).round() / 100.0);
        self
    }

    /// Any evidence at all marks the probe vulnerable.
    pub fn with_evidence(mut self, evidence: Option<String>) -> Self {
        self.vulnerable = evidence.is_some();
        self.evidence = evidence;
        self
    }

    /// Builds a curl command that reproduces this probe.
    pub fn to_curl(&self) -> String {
        format!("curl -X GET '{}' --insecure", self.target_url.replace('\'', r"'\''"))
    }
}

/// Final summary of a session. Built once, after the last probe lands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub scan_type: ScanType,
    /// Unix seconds.
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    pub total_scanned: usize,
    pub total_found: usize,
    pub vulnerable_targets: Vec<String>,
    pub results: Vec<ProbeResult>,
}

impl ScanReport {
    pub fn vulnerable_results(&self) -> impl Iterator<Item = &ProbeResult> {
        self.results.iter().filter(|r| r.vulnerable)
    }

    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| r.error.is_some()).count()
    }

    /// Atomic write: serialize to .tmp, then rename over the real file.
    pub fn save_json(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&tmp, &json)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn load_json(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

/// Single consumer of probe results. Owns every counter, so nothing here
/// needs a lock.
pub struct ResultAggregator {
    scan_type: ScanType,
    start_time: f64,
    started: Instant,
    total_scanned: usize,
    total_found: usize,
    vulnerable_targets: Vec<String>,
    results: Vec<ProbeResult>,
}

impl ResultAggregator {
    pub fn new(scan_type: ScanType) -> Self {
        Self {
            scan_type,
            start_time: unix_now(),
            started: Instant::now(),
            total_scanned: 0,
            total_found: 0,
            vulnerable_targets: Vec::new(),
            results: Vec::new(),
        }
    }

    pub fn ingest(&mut self, result: ProbeResult) {
        self.total_scanned += 1;
        if result.vulnerable {
            self.total_found += 1;
            self.vulnerable_targets.push(result.target_url.clone());
        }
        self.results.push(result);
    }

    pub fn total_scanned(&self) -> usize {
        self.total_scanned
    }

    pub fn total_found(&self) -> usize {
        self.total_found
    }

    /// Drains `receiver` until every sender is gone, notifying observers
    /// after each result is counted.
    pub async fn run(
        mut self,
        mut receiver: mpsc::Receiver<ProbeResult>,
        notifier: &ProgressNotifier,
    ) -> ScanReport {
        while let Some(result) = receiver.recv().await {
            debug!(
                "Probe finished: {} (vulnerable: {}, error: {:?})",
                result.target_url, result.vulnerable, result.error
            );
            self.ingest(result);
            if let Some(latest) = self.results.last() {
                notifier.notify(latest);
            }
        }
        self.finish()
    }

    pub fn finish(self) -> ScanReport {
        let duration = self.started.elapsed().as_secs_f64();
        info!(
            "{} scan finished: {} probe(s), {} finding(s) in {:.2}s",
            self.scan_type, self.total_scanned, self.total_found, duration
        );
        ScanReport {
            scan_type: self.scan_type,
            start_time: self.start_time,
            end_time: self.start_time + duration,
            duration,
            total_scanned: self.total_scanned,
            total_found: self.total_found,
            vulnerable_targets: self.vulnerable_targets,
            results: self.results,
        }
    }
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}
