use std::time::Duration;

use log::warn;
use regex::Regex;

use crate::http::{TransportResponse, DEFAULT_TIMEOUT};

use super::{HttpDetector, Injector};

#[derive(Debug, Clone)]
pub struct RedirectDetector {
    timeout: Duration,
}

impl RedirectDetector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for RedirectDetector {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl Injector for RedirectDetector {}

impl HttpDetector for RedirectDetector {
    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn follow_redirects(&self) -> bool {
        false
    }

    /// Matches against the raw payload, not the encoded form that was sent.
    fn classify(&self, payload: &str, response: &TransportResponse) -> Option<String> {
        if payload.is_empty() {
            return None;
        }

        if let Some(location) = response.location() {
            if location.contains(payload) {
                return Some(location.to_string());
            }
        }

        if response.status == 200 && response.body.contains(payload) {
            return client_side_redirect(&response.body, payload);
        }
        None
    }
}

/// Looks for a JS location assignment or a meta refresh pointing at `payload`.
fn client_side_redirect(body: &str, payload: &str) -> Option<String> {
    let target = regex::escape(payload);

    let js = format!(
        r#"(?:window\.location(?:\.href)?|location\.href)\s*=\s*(?:"{t}"|'{t}')"#,
        t = target
    );
    let meta = format!(
        r#"(?i)meta\s+http-equiv\s*=\s*["']?refresh["']?\s+content\s*=\s*["']?\s*\d+\s*;\s*url\s*=\s*["']?{t}"#,
        t = target
    );

    match (Regex::new(&js), Regex::new(&meta)) {
        (Ok(js), Ok(meta)) => js
            .find(body)
            .or_else(|| meta.find(body))
            .map(|m| m.as_str().to_string()),
        (Err(e), _) | (_, Err(e)) => {
            warn!(
                "Redirect pattern for a {}-byte payload did not compile, using literal checks: {}",
                payload.len(),
                e
            );
            literal_redirect(body, payload)
        }
    }
}

/// Exact-text variant of [`client_side_redirect`] for the common spellings.
fn literal_redirect(body: &str, payload: &str) -> Option<String> {
    let snippets = [
        format!(r#"window.location.href = "{}""#, payload),
        format!("window.location.href = '{}'", payload),
        format!(r#"window.location = "{}""#, payload),
        format!("window.location = '{}'", payload),
        format!(r#"location.href = "{}""#, payload),
        format!(r#"window.location.href="{}""#, payload),
        format!(r#"window.location="{}""#, payload),
        format!(r#"location.href="{}""#, payload),
    ];
    if let Some(hit) = snippets.into_iter().find(|s| body.contains(s.as_str())) {
        return Some(hit);
    }

    // ASCII lowercasing keeps byte offsets, so the match can be cut from `body`.
    let meta =
        format!(r#"meta http-equiv="refresh" content="0;url={}"#, payload).to_ascii_lowercase();
    body.to_ascii_lowercase()
        .find(&meta)
        .map(|start| body[start..start + meta.len()].to_string())
}
