use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use log::{debug, warn};

use crate::core::result_aggregator::ProbeResult;
use crate::detectors::{Detector, HttpDetector, Injector, XssDetector};
use crate::http::{HttpTransport, TransportError};
use crate::render::{RenderError, Renderer, RendererFactory};
use crate::utils::panic_message;

/// Runs one probe end to end. Whatever goes wrong ends up in the returned
/// result; `execute` itself never fails.
pub struct ProbeExecutor {
    detector: Detector,
    transport: Arc<dyn HttpTransport>,
    renderer: Arc<dyn RendererFactory>,
    headers: Vec<(String, String)>,
}

impl ProbeExecutor {
    pub fn new(
        detector: Detector,
        transport: Arc<dyn HttpTransport>,
        renderer: Arc<dyn RendererFactory>,
    ) -> Self {
        Self { detector, transport, renderer, headers: Vec::new() }
    }

    /// Extra headers sent with every HTTP probe.
    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    pub fn detector(&self) -> &Detector {
        &self.detector
    }

    pub async fn execute(&self, target: &str, payload: &str) -> ProbeResult {
        match &self.detector {
            Detector::Lfi(d) => self.probe_http(d, target, payload).await,
            Detector::Sqli(d) => self.probe_http(d, target, payload).await,
            Detector::OpenRedirect(d) => self.probe_http(d, target, payload).await,
            Detector::Crlf(d) => self.probe_http(d, target, payload).await,
            Detector::Xss(d) => self.probe_rendered(d, target, payload).await,
        }
    }

    async fn probe_http(
        &self,
        detector: &dyn HttpDetector,
        target: &str,
        payload: &str,
    ) -> ProbeResult {
        let payload = detector.prepare(payload);
        let request = detector.request(target, payload).with_headers(&self.headers);

        let outcome = caught(async {
            let response = self.transport.get(&request).await?;
            let evidence = detector.classify(payload, &response);
            Ok::<_, TransportError>((response.status, response.elapsed, evidence))
        })
        .await;

        match outcome {
            Ok(Ok((status, elapsed, evidence))) => ProbeResult::new(request.url, payload)
                .with_status(status)
                .with_elapsed(elapsed)
                .with_evidence(evidence),
            Ok(Err(e)) => {
                debug!("Request to {} failed: {}", request.url, e);
                ProbeResult::failed(request.url, payload, e.to_string())
            }
            Err(panic) => {
                warn!("Probe of {} panicked: {}", request.url, panic);
                ProbeResult::failed(request.url, payload, format!("probe panicked: {}", panic))
            }
        }
    }

    async fn probe_rendered(
        &self,
        detector: &XssDetector,
        target: &str,
        payload: &str,
    ) -> ProbeResult {
        let payload = detector.prepare(payload);
        let url = detector.target_url(target, payload);
        let started = Instant::now();

        let mut renderer = match caught(self.renderer.launch()).await {
            Ok(Ok(renderer)) => renderer,
            Ok(Err(e)) => {
                warn!("Could not start renderer for {}: {}", url, e);
                return ProbeResult::failed(url, payload, e.to_string());
            }
            Err(panic) => {
                return ProbeResult::failed(url, payload, format!("renderer panicked: {}", panic));
            }
        };

        let outcome = caught(render_and_classify(renderer.as_mut(), detector, &url, payload)).await;

        // Released on every path, including a panic mid-render.
        match caught(renderer.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to close renderer for {}: {}", url, e),
            Err(panic) => warn!("Renderer close panicked for {}: {}", url, panic),
        }

        match outcome {
            Ok(Ok(evidence)) => ProbeResult::new(url, payload)
                .with_elapsed(started.elapsed())
                .with_evidence(evidence.map(str::to_string)),
            Ok(Err(e)) => {
                debug!("Rendering {} failed: {}", url, e);
                ProbeResult::failed(url, payload, e.to_string())
            }
            Err(panic) => {
                warn!("Probe of {} panicked: {}", url, panic);
                ProbeResult::failed(url, payload, format!("probe panicked: {}", panic))
            }
        }
    }
}

async fn render_and_classify(
    renderer: &mut dyn Renderer,
    detector: &XssDetector,
    url: &str,
    payload: &str,
) -> Result<Option<&'static str>, RenderError> {
    renderer.navigate(url, detector.page_load_timeout).await?;
    if renderer.wait_for_dialog(detector.dialog_wait).await? {
        return Ok(detector.classify(payload, true, None));
    }
    let source = renderer.rendered_source().await?;
    Ok(detector.classify(payload, false, Some(&source)))
}

async fn caught<F: Future>(future: F) -> Result<F::Output, String> {
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|panic| panic_message(panic.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ScanType;
    use crate::http::{ProbeRequest, TransportResponse};
    use crate::render::NoRenderer;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Echo {
        seen: Mutex<Vec<ProbeRequest>>,
    }

    #[async_trait]
    impl HttpTransport for Echo {
        async fn get(&self, request: &ProbeRequest) -> Result<TransportResponse, TransportError> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(TransportResponse {
                status: 200,
                body: "root:x:0:0:root".to_string(),
                ..Default::default()
            })
        }
    }

    struct Exploding;

    #[async_trait]
    impl HttpTransport for Exploding {
        async fn get(&self, _request: &ProbeRequest) -> Result<TransportResponse, TransportError> {
            panic!("socket on fire");
        }
    }

    struct Unreachable;

    #[async_trait]
    impl HttpTransport for Unreachable {
        async fn get(&self, _request: &ProbeRequest) -> Result<TransportResponse, TransportError> {
            Err(TransportError::Connect("connection refused".to_string()))
        }
    }

    fn executor(scan_type: ScanType, transport: Arc<dyn HttpTransport>) -> ProbeExecutor {
        ProbeExecutor::new(Detector::for_type(scan_type), transport, Arc::new(NoRenderer))
    }

    #[tokio::test]
    async fn test_http_probe_classifies_response() {
        let echo = Arc::new(Echo { seen: Mutex::new(Vec::new()) });
        let exec = executor(ScanType::Lfi, echo.clone())
            .with_headers(vec![("Cookie".to_string(), "s=1".to_string())]);

        let result = exec.execute("http://t.test/?file=", " ../etc/passwd ").await;
        assert!(result.vulnerable);
        assert_eq!(result.target_url, "http://t.test/?file=../etc/passwd");
        assert_eq!(result.payload, "../etc/passwd");
        assert_eq!(result.status_code, Some(200));
        assert_eq!(result.evidence.as_deref(), Some("root:x:0:"));

        let seen = echo.seen.lock().unwrap();
        assert_eq!(seen[0].headers, vec![("Cookie".to_string(), "s=1".to_string())]);
    }

    #[tokio::test]
    async fn test_transport_error_becomes_result() {
        let result = executor(ScanType::Sqli, Arc::new(Unreachable))
            .execute("http://t.test/?id=", "'")
            .await;
        assert!(!result.vulnerable);
        assert!(result.error.as_deref().unwrap().contains("connection refused"));
        assert_eq!(result.status_code, None);
    }

    #[tokio::test]
    async fn test_panic_becomes_result() {
        let result = executor(ScanType::Crlf, Arc::new(Exploding))
            .execute("http://t.test/", "%0aSet-Cookie:crlf=injection")
            .await;
        assert!(!result.vulnerable);
        assert!(result.error.as_deref().unwrap().contains("socket on fire"));
    }

    #[tokio::test]
    async fn test_missing_renderer_becomes_result() {
        let result = executor(ScanType::Xss, Arc::new(Unreachable))
            .execute("http://t.test/?q=", "<b>")
            .await;
        assert!(!result.vulnerable);
        assert_eq!(result.target_url, "http://t.test/?q=%3Cb%3E");
        assert!(result.error.is_some());
    }
}
