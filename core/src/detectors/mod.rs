//! Per-class classification rules.
//!
//! Every detector is pure: it decides what request a probe sends and how
//! to read the response, and nothing else. Sending the request is the
//! executor's job.

pub mod crlf;
pub mod lfi;
pub mod redirect;
pub mod sqli;
pub mod xss;

pub use crlf::CrlfDetector;
pub use lfi::LfiDetector;
pub use redirect::RedirectDetector;
pub use sqli::SqliDetector;
pub use xss::XssDetector;

use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::core::ScanType;
use crate::http::{ProbeRequest, TransportResponse, DEFAULT_TIMEOUT};

/// Characters left untouched when a payload is appended to a target.
/// Everything else becomes `%XX`.
const PAYLOAD_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~')
    .remove(b'/');

pub fn encode_payload(payload: &str) -> String {
    utf8_percent_encode(payload, PAYLOAD_SAFE).to_string()
}

/// How a payload is attached to a target. Shared by every class.
pub trait Injector: Send + Sync {
    /// The payload as injected and recorded.
    fn prepare<'a>(&self, payload: &'a str) -> &'a str {
        payload.trim()
    }

    /// `payload` has already been through [`Injector::prepare`].
    fn target_url(&self, target: &str, payload: &str) -> String {
        format!("{}{}", target, encode_payload(payload))
    }
}

/// Detector for the classes that only need a plain HTTP response.
pub trait HttpDetector: Injector {
    fn timeout(&self) -> Duration {
        DEFAULT_TIMEOUT
    }

    fn follow_redirects(&self) -> bool {
        true
    }

    fn request(&self, target: &str, payload: &str) -> ProbeRequest {
        ProbeRequest::get(self.target_url(target, payload))
            .timeout(self.timeout())
            .follow_redirects(self.follow_redirects())
    }

    /// Returns the evidence when the response looks vulnerable.
    fn classify(&self, payload: &str, response: &TransportResponse) -> Option<String>;
}

/// The detector a session runs, with its class-specific options.
#[derive(Debug, Clone)]
pub enum Detector {
    Lfi(LfiDetector),
    Sqli(SqliDetector),
    Xss(XssDetector),
    OpenRedirect(RedirectDetector),
    Crlf(CrlfDetector),
}

impl Detector {
    /// Detector with default options for `scan_type`.
    pub fn for_type(scan_type: ScanType) -> Self {
        match scan_type {
            ScanType::Lfi => Detector::Lfi(LfiDetector::default()),
            ScanType::Sqli => Detector::Sqli(SqliDetector::default()),
            ScanType::Xss => Detector::Xss(XssDetector::default()),
            ScanType::OpenRedirect => Detector::OpenRedirect(RedirectDetector::default()),
            ScanType::Crlf => Detector::Crlf(CrlfDetector::default()),
        }
    }

    pub fn scan_type(&self) -> ScanType {
        match self {
            Detector::Lfi(_) => ScanType::Lfi,
            Detector::Sqli(_) => ScanType::Sqli,
            Detector::Xss(_) => ScanType::Xss,
            Detector::OpenRedirect(_) => ScanType::OpenRedirect,
            Detector::Crlf(_) => ScanType::Crlf,
        }
    }

    pub fn injector(&self) -> &dyn Injector {
        match self {
            Detector::Lfi(d) => d,
            Detector::Sqli(d) => d,
            Detector::Xss(d) => d,
            Detector::OpenRedirect(d) => d,
            Detector::Crlf(d) => d,
        }
    }

    /// Full probe URL for one (target, payload) pair.
    pub fn target_url(&self, target: &str, payload: &str) -> String {
        let injector = self.injector();
        injector.target_url(target, injector.prepare(payload))
    }

    /// `None` for XSS, which needs a renderer instead.
    pub fn as_http(&self) -> Option<&dyn HttpDetector> {
        match self {
            Detector::Lfi(d) => Some(d),
            Detector::Sqli(d) => Some(d),
            Detector::OpenRedirect(d) => Some(d),
            Detector::Crlf(d) => Some(d),
            Detector::Xss(_) => None,
        }
    }

    /// Hard cap on in-flight probes, regardless of what the caller asks for.
    pub fn concurrency_cap(&self) -> Option<usize> {
        match self {
            Detector::Xss(_) => Some(xss::MAX_RENDERERS),
            _ => None,
        }
    }
}
