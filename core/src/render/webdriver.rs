use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use tokio::time::{sleep, Instant};
use url::Url;

use super::{RenderError, Renderer, RendererFactory};

/// Headless Chrome flags passed to every new session.
pub const CHROME_ARGS: &[&str] = &[
    "--headless",
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--disable-extensions",
    "--disable-infobars",
    "--disable-notifications",
];

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:9515";

const COMMAND_TIMEOUT: Duration = Duration::from_secs(15);
const DIALOG_POLL: Duration = Duration::from_millis(100);

/// Errors straight off the wire, before they are mapped per command.
#[derive(Debug)]
enum WireError {
    Command { code: String, message: String },
    Transport { message: String, timed_out: bool },
    Closed,
}

impl WireError {
    fn is(&self, wanted: &str) -> bool {
        matches!(self, WireError::Command { code, .. } if code == wanted)
    }

    fn into_protocol(self) -> RenderError {
        match self {
            WireError::Command { code, message } => {
                RenderError::Protocol(format!("{}: {}", code, message))
            }
            WireError::Transport { message, .. } => RenderError::Protocol(message),
            WireError::Closed => RenderError::Closed,
        }
    }
}

async fn command(
    http: &Client,
    endpoint: &Url,
    method: Method,
    path: &str,
    body: Option<Value>,
    timeout: Duration,
) -> Result<Value, WireError> {
    let url = endpoint.join(path).map_err(|e| WireError::Transport {
        message: format!("bad WebDriver path {}: {}", path, e),
        timed_out: false,
    })?;

    let mut req = http.request(method, url).timeout(timeout);
    if let Some(body) = body {
        req = req.json(&body);
    }

    let transport = |e: reqwest::Error| WireError::Transport {
        timed_out: e.is_timeout(),
        message: e.to_string(),
    };
    let reply: Value = req.send().await.map_err(transport)?.json().await.map_err(transport)?;

    let value = reply.get("value").cloned().unwrap_or(Value::Null);
    if let Some(code) = value.get("error").and_then(Value::as_str) {
        return Err(WireError::Command {
            code: code.to_string(),
            message: value.get("message").and_then(Value::as_str).unwrap_or_default().to_string(),
        });
    }
    Ok(value)
}

/// Launches browser sessions through a running chromedriver (or any W3C
/// WebDriver endpoint).
pub struct WebDriverFactory {
    endpoint: Url,
    http: Client,
    chrome_args: Vec<String>,
}

impl WebDriverFactory {
    pub fn new(endpoint: &str) -> Result<Self, RenderError> {
        // Url::join drops the last segment unless the base ends in '/'.
        let base = if endpoint.ends_with('/') {
            endpoint.to_string()
        } else {
            format!("{}/", endpoint)
        };
        let endpoint = Url::parse(&base)
            .map_err(|e| RenderError::Launch(format!("invalid WebDriver URL {}: {}", base, e)))?;
        let http = Client::builder()
            .build()
            .map_err(|e| RenderError::Launch(e.to_string()))?;

        Ok(Self {
            endpoint,
            http,
            chrome_args: CHROME_ARGS.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.chrome_args = args;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Prompts are left open so `wait_for_dialog` can see and accept them.
    fn capabilities(&self) -> Value {
        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "unhandledPromptBehavior": "ignore",
                    "goog:chromeOptions": { "args": self.chrome_args }
                }
            }
        })
    }
}

#[async_trait]
impl RendererFactory for WebDriverFactory {
    async fn launch(&self) -> Result<Box<dyn Renderer>, RenderError> {
        let value = command(
            &self.http,
            &self.endpoint,
            Method::POST,
            "session",
            Some(self.capabilities()),
            COMMAND_TIMEOUT,
        )
        .await
        .map_err(|e| RenderError::Launch(e.into_protocol().to_string()))?;

        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| RenderError::Launch("WebDriver returned no session id".to_string()))?
            .to_string();

        debug!("Started WebDriver session {}", session_id);
        Ok(Box::new(WebDriverRenderer {
            http: self.http.clone(),
            endpoint: self.endpoint.clone(),
            session_id: Some(session_id),
        }))
    }
}

pub struct WebDriverRenderer {
    http: Client,
    endpoint: Url,
    session_id: Option<String>,
}

impl WebDriverRenderer {
    async fn call(
        &self,
        method: Method,
        suffix: &str,
        body: Option<Value>,
        timeout: Duration,
    ) -> Result<Value, WireError> {
        let id = self.session_id.as_ref().ok_or(WireError::Closed)?;
        let path = format!("session/{}/{}", id, suffix);
        command(&self.http, &self.endpoint, method, &path, body, timeout).await
    }
}

#[async_trait]
impl Renderer for WebDriverRenderer {
    async fn navigate(
        &mut self,
        url: &str,
        page_load_timeout: Duration,
    ) -> Result<(), RenderError> {
        let timeouts = json!({ "pageLoad": page_load_timeout.as_millis() as u64 });
        self.call(Method::POST, "timeouts", Some(timeouts), COMMAND_TIMEOUT)
            .await
            .map_err(WireError::into_protocol)?;

        let load_budget = page_load_timeout + COMMAND_TIMEOUT;
        match self
            .call(Method::POST, "url", Some(json!({ "url": url })), load_budget)
            .await
        {
            Ok(_) => Ok(()),
            // A dialog opened during load; leave it for wait_for_dialog.
            Err(e) if e.is("unexpected alert open") => Ok(()),
            Err(e) if e.is("timeout") => Err(RenderError::Timeout(page_load_timeout)),
            Err(WireError::Transport { timed_out: true, .. }) => {
                Err(RenderError::Timeout(page_load_timeout))
            }
            Err(e) => Err(e.into_protocol()),
        }
    }

    async fn wait_for_dialog(&mut self, timeout: Duration) -> Result<bool, RenderError> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.call(Method::GET, "alert/text", None, COMMAND_TIMEOUT).await {
                Ok(_) => {
                    self.call(Method::POST, "alert/accept", Some(json!({})), COMMAND_TIMEOUT)
                        .await
                        .map_err(WireError::into_protocol)?;
                    return Ok(true);
                }
                Err(e) if e.is("no such alert") => {}
                Err(e) => return Err(e.into_protocol()),
            }

            if Instant::now() >= deadline {
                return Ok(false);
            }
            sleep(DIALOG_POLL).await;
        }
    }

    async fn rendered_source(&mut self) -> Result<String, RenderError> {
        let value = self
            .call(Method::GET, "source", None, COMMAND_TIMEOUT)
            .await
            .map_err(WireError::into_protocol)?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn close(&mut self) -> Result<(), RenderError> {
        let Some(id) = self.session_id.take() else {
            return Ok(());
        };
        command(
            &self.http,
            &self.endpoint,
            Method::DELETE,
            &format!("session/{}", id),
            None,
            COMMAND_TIMEOUT,
        )
        .await
        .map(|_| debug!("Closed WebDriver session {}", id))
        .map_err(WireError::into_protocol)
    }
}
