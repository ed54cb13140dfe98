use std::time::Duration;

use crate::http::TransportResponse;

use super::{HttpDetector, Injector};

pub const SQL_ERROR_SIGNATURES: &[&str] = &[
    "sql error",
    "mysql error",
    "syntax error",
    "ora-",
    "unclosed quotation mark",
];

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_TIME_THRESHOLD: Duration = Duration::from_secs(10);

/// Time-based first, error-based as fallback.
#[derive(Debug, Clone)]
pub struct SqliDetector {
    time_threshold: Duration,
    timeout: Duration,
    custom_signatures: Vec<String>,
}

impl SqliDetector {
    pub fn new(
        time_threshold: Duration,
        timeout: Duration,
        custom_signatures: Vec<String>,
    ) -> Self {
        Self {
            time_threshold,
            timeout,
            custom_signatures: custom_signatures
                .into_iter()
                .map(|s| s.to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn time_threshold(&self) -> Duration {
        self.time_threshold
    }
}

impl Default for SqliDetector {
    fn default() -> Self {
        Self::new(DEFAULT_TIME_THRESHOLD, DEFAULT_TIMEOUT, Vec::new())
    }
}

impl Injector for SqliDetector {}

impl HttpDetector for SqliDetector {
    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn classify(&self, _payload: &str, response: &TransportResponse) -> Option<String> {
        if response.elapsed >= self.time_threshold {
            return Some(format!("time:{:.2}", response.elapsed.as_secs_f64()));
        }

        let body = response.body.to_lowercase();
        SQL_ERROR_SIGNATURES
            .iter()
            .copied()
            .chain(self.custom_signatures.iter().map(String::as_str))
            .find(|sig| body.contains(sig))
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(body: &str, elapsed: Duration) -> TransportResponse {
        TransportResponse { status: 200, body: body.to_string(), elapsed, ..Default::default() }
    }

    #[test]
    fn test_time_based_ignores_body() {
        let detector = SqliDetector::default();
        let resp = response("<html>ok</html>", Duration::from_secs(11));
        assert_eq!(detector.classify("' OR SLEEP(10)--", &resp).as_deref(), Some("time:11.00"));
    }

    #[test]
    fn test_time_takes_priority_over_errors() {
        let detector = SqliDetector::default();
        let resp = response("You have an SQL Error", Duration::from_millis(10_500));
        assert_eq!(detector.classify("'", &resp).as_deref(), Some("time:10.50"));
    }

    #[test]
    fn test_error_based() {
        let detector = SqliDetector::default();
        let resp = response("ORA-00933: SQL command not properly ended", Duration::from_millis(80));
        assert_eq!(detector.classify("'", &resp).as_deref(), Some("ora-"));
    }

    #[test]
    fn test_custom_signatures() {
        let detector = SqliDetector::new(
            DEFAULT_TIME_THRESHOLD,
            DEFAULT_TIMEOUT,
            vec!["SQLSTATE[".to_string(), String::new()],
        );
        let resp = response("sqlstate[42000]: boom", Duration::from_millis(5));
        assert_eq!(detector.classify("'", &resp).as_deref(), Some("sqlstate["));
    }

    #[test]
    fn test_below_threshold_clean() {
        let detector = SqliDetector::new(Duration::from_secs(2), DEFAULT_TIMEOUT, vec![]);
        assert!(detector.classify("'", &response("fine", Duration::from_millis(1999))).is_none());
        assert_eq!(detector.timeout(), Duration::from_secs(30));
    }
}
