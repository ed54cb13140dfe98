pub mod core;
pub mod detectors;
pub mod error;
pub mod http;
pub mod render;
pub mod utils;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

pub use crate::core::engine::{CancelHandle, Dispatcher};
pub use crate::core::executor::ProbeExecutor;
pub use crate::core::notifier::{ObserverHandle, ObserverRef, ProgressNotifier, ProgressObserver};
pub use crate::core::result_aggregator::{ProbeResult, ResultAggregator, ScanReport};
pub use crate::core::session::{ScanSession, SessionState};
pub use crate::core::ScanType;
pub use crate::detectors::Detector;
pub use crate::error::ScanError;
pub use crate::http::{HttpClient, HttpTransport};
pub use crate::render::{RendererFactory, WebDriverFactory};
pub use crate::utils::payload_loader::{PayloadLoader, PayloadSource};
pub use crate::utils::read_lines;

use crate::detectors::{CrlfDetector, LfiDetector, RedirectDetector, SqliDetector, XssDetector};

/// Shared scan configuration used by every front end.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScanConfig {
    pub threads: usize,
    /// Seconds, for LFI, open redirect and CRLF requests.
    pub timeout: u64,
    pub sqli_timeout: u64,
    /// Seconds of response time that count as a time-based SQLi hit.
    pub time_threshold: f64,
    pub page_load_timeout: u64,
    pub dialog_wait: u64,
    pub success_markers: Vec<String>,
    pub sql_signatures: Vec<String>,
    pub payload_dir: String,
    /// Overrides the payload directory layout when set.
    pub payload_file: String,
    pub sqli_db: String,
    pub webdriver_url: String,
    pub proxy: String,
    pub headers: String,
    pub output: String,
    pub verbose: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            threads: 5,
            timeout: 10,
            sqli_timeout: 30,
            time_threshold: 10.0,
            page_load_timeout: 10,
            dialog_wait: 3,
            success_markers: vec![detectors::lfi::DEFAULT_SUCCESS_MARKER.to_string()],
            sql_signatures: Vec::new(),
            payload_dir: utils::payload_loader::DEFAULT_PAYLOAD_DIR.to_string(),
            payload_file: String::new(),
            sqli_db: utils::payload_loader::DEFAULT_SQLI_DB.to_string(),
            webdriver_url: render::webdriver::DEFAULT_ENDPOINT.to_string(),
            proxy: String::new(),
            headers: String::new(),
            output: "scan_report.json".to_string(),
            verbose: false,
        }
    }
}

impl ScanConfig {
    /// Reads a JSON config file; missing keys keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn header_list(&self) -> Vec<String> {
        if self.headers.is_empty() {
            Vec::new()
        } else {
            self.headers
                .split(';')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        }
    }

    pub fn parsed_headers(&self) -> Vec<(String, String)> {
        parse_custom_headers(&self.header_list())
    }

    pub fn proxy_ref(&self) -> Option<&str> {
        if self.proxy.is_empty() {
            None
        } else {
            Some(&self.proxy)
        }
    }

    /// The detector for `scan_type`, carrying this config's class options.
    pub fn detector(&self, scan_type: ScanType) -> Detector {
        let timeout = Duration::from_secs(self.timeout);
        match scan_type {
            ScanType::Lfi => {
                Detector::Lfi(LfiDetector::new(self.success_markers.clone()).with_timeout(timeout))
            }
            ScanType::Sqli => Detector::Sqli(SqliDetector::new(
                Duration::try_from_secs_f64(self.time_threshold)
                    .unwrap_or(detectors::sqli::DEFAULT_TIME_THRESHOLD),
                Duration::from_secs(self.sqli_timeout),
                self.sql_signatures.clone(),
            )),
            ScanType::Xss => Detector::Xss(XssDetector::new(
                Duration::from_secs(self.page_load_timeout),
                Duration::from_secs(self.dialog_wait),
            )),
            ScanType::OpenRedirect => Detector::OpenRedirect(RedirectDetector::new(timeout)),
            ScanType::Crlf => Detector::Crlf(CrlfDetector::new(timeout)),
        }
    }

    pub fn payload_loader(&self, scan_type: ScanType) -> PayloadLoader {
        let loader = PayloadLoader::new(&self.payload_dir).with_sqli_db(&self.sqli_db);
        if self.payload_file.is_empty() {
            loader
        } else {
            loader.with_file(scan_type, &self.payload_file)
        }
    }

    /// A ready-to-run session over the real HTTP client, plus a WebDriver
    /// renderer for XSS.
    pub fn session(&self, scan_type: ScanType) -> Result<ScanSession, ScanError> {
        let client = HttpClient::new(self.proxy_ref(), &self.parsed_headers())?;
        let mut session = ScanSession::new(self.detector(scan_type), Arc::new(client))
            .with_concurrency(self.threads);
        if scan_type == ScanType::Xss {
            session = session.with_renderer(Arc::new(WebDriverFactory::new(&self.webdriver_url)?));
        }
        Ok(session)
    }
}

/// Splits `Name: value` strings; entries without a name are dropped.
pub fn parse_custom_headers(raw: &[String]) -> Vec<(String, String)> {
    raw.iter()
        .filter_map(|h| {
            let mut parts = h.splitn(2, ':');
            let key = parts.next()?.trim().to_string();
            let val = parts.next().unwrap_or("").trim().to_string();
            if key.is_empty() {
                return None;
            }
            Some((key, val))
        })
        .collect()
}
