use std::time::Duration;

use super::Injector;

/// Renderer instances are heavy; never run more than this many at once.
pub const MAX_RENDERERS: usize = 3;

pub const DEFAULT_PAGE_LOAD_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_DIALOG_WAIT: Duration = Duration::from_secs(3);

pub const EVIDENCE_DIALOG: &str = "alert";
pub const EVIDENCE_REFLECTED: &str = "reflected";

/// Classifies what a renderer saw. Driving the renderer is left to the
/// executor so this stays a pure function.
#[derive(Debug, Clone)]
pub struct XssDetector {
    pub page_load_timeout: Duration,
    pub dialog_wait: Duration,
}

impl XssDetector {
    pub fn new(page_load_timeout: Duration, dialog_wait: Duration) -> Self {
        Self { page_load_timeout, dialog_wait }
    }

    /// A dialog beats reflection; reflection means the raw payload made it
    /// into the rendered document unescaped.
    pub fn classify(
        &self,
        payload: &str,
        dialog_seen: bool,
        source: Option<&str>,
    ) -> Option<&'static str> {
        if dialog_seen {
            return Some(EVIDENCE_DIALOG);
        }
        match source {
            Some(src) if !payload.is_empty() && src.contains(payload) => Some(EVIDENCE_REFLECTED),
            _ => None,
        }
    }
}

impl Injector for XssDetector {}

impl Default for XssDetector {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_LOAD_TIMEOUT, DEFAULT_DIALOG_WAIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialog_wins() {
        let detector = XssDetector::default();
        assert_eq!(detector.classify("<svg onload=alert(1)>", true, None), Some("alert"));
    }

    #[test]
    fn test_raw_reflection() {
        let detector = XssDetector::default();
        let payload = "<img src=x onerror=alert(1)>";
        let source = format!("<html><body>{}</body></html>", payload);
        assert_eq!(detector.classify(payload, false, Some(&source)), Some("reflected"));
    }

    #[test]
    fn test_escaped_reflection_is_safe() {
        let detector = XssDetector::default();
        let source = "<p>&lt;script&gt;alert(1)&lt;/script&gt;</p>";
        assert_eq!(detector.classify("<script>alert(1)</script>", false, Some(source)), None);
        assert_eq!(detector.classify("", false, Some(source)), None);
    }

    #[test]
    fn test_target_url_encodes_trimmed_payload() {
        let detector = XssDetector::default();
        let payload = detector.prepare(" <b> ");
        assert_eq!(detector.target_url("http://t.test/?q=", payload), "http://t.test/?q=%3Cb%3E");
    }
}
