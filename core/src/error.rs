use std::path::PathBuf;

use thiserror::Error;

/// Setup failures. These abort a session before any probe is sent;
/// per-probe failures never surface here.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("no targets supplied")]
    EmptyTargets,

    #[error("payload file not found: {}", .path.display())]
    PayloadNotFound { path: PathBuf },

    #[error("error loading payloads from {}: {source}", .path.display())]
    PayloadRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("scan session has already been run")]
    SessionReused,

    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[from] reqwest::Error),

    #[error("invalid renderer configuration: {0}")]
    Renderer(#[from] crate::render::RenderError),
}
