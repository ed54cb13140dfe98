//! Browser rendering for XSS probes.
//!
//! Each probe launches its own [`Renderer`] through a [`RendererFactory`]
//! and must call [`Renderer::close`] on every exit path.

pub mod webdriver;

pub use webdriver::WebDriverFactory;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("browser error: {0}")]
    Protocol(String),

    #[error("page load timed out after {0:?}")]
    Timeout(Duration),

    #[error("browser session already closed")]
    Closed,
}

/// One isolated browser context.
#[async_trait]
pub trait Renderer: Send {
    async fn navigate(&mut self, url: &str, page_load_timeout: Duration) -> Result<(), RenderError>;

    /// Waits up to `timeout` for an alert, confirm or prompt. Accepts it
    /// and returns `true` if one shows up.
    async fn wait_for_dialog(&mut self, timeout: Duration) -> Result<bool, RenderError>;

    async fn rendered_source(&mut self) -> Result<String, RenderError>;

    /// Idempotent; safe to call after any earlier failure.
    async fn close(&mut self) -> Result<(), RenderError>;
}

#[async_trait]
pub trait RendererFactory: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn Renderer>, RenderError>;
}

/// Factory for sessions that never probe XSS.
pub struct NoRenderer;

#[async_trait]
impl RendererFactory for NoRenderer {
    async fn launch(&self) -> Result<Box<dyn Renderer>, RenderError> {
        Err(RenderError::Launch("no renderer configured".to_string()))
    }
}
