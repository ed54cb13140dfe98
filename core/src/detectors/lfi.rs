use std::time::Duration;

use crate::http::{TransportResponse, DEFAULT_TIMEOUT};

use super::{HttpDetector, Injector};

/// Error and leak strings that give away a file inclusion even when no
/// success marker matched.
pub const LFI_INDICATORS: &[&str] = &[
    "path traversal detected",
    "vulnerable to local file inclusion",
    "warning: include(",
    "failed to open stream",
    "root:x:0:0",
    "[boot loader]",
];

pub const DEFAULT_SUCCESS_MARKER: &str = "root:x:0:";

#[derive(Debug, Clone)]
pub struct LfiDetector {
    success_markers: Vec<String>,
    timeout: Duration,
}

impl LfiDetector {
    pub fn new(success_markers: Vec<String>) -> Self {
        Self { success_markers, timeout: DEFAULT_TIMEOUT }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn success_markers(&self) -> &[String] {
        &self.success_markers
    }
}

impl Default for LfiDetector {
    fn default() -> Self {
        Self::new(vec![DEFAULT_SUCCESS_MARKER.to_string()])
    }
}

impl Injector for LfiDetector {}

impl HttpDetector for LfiDetector {
    fn timeout(&self) -> Duration {
        self.timeout
    }

    // Any status code; error pages leak file contents too.
    fn classify(&self, _payload: &str, response: &TransportResponse) -> Option<String> {
        let body = response.body.to_lowercase();

        self.success_markers
            .iter()
            .find(|m| !m.is_empty() && body.contains(&m.to_lowercase()))
            .cloned()
            .or_else(|| {
                LFI_INDICATORS
                    .iter()
                    .find(|i| body.contains(*i))
                    .map(|i| i.to_string())
            })
    }
}
