//! Error taxonomy for the harvester.
//!
//! Only [`CrawlError::Navigation`] is allowed to abort a run. Everything a
//! [`RenderError`] describes is expected on some page variant and gets turned
//! into an empty field where it happens.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failures reported by a [`crate::renderer::Renderer`] primitive.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    /// A selector or label did not match this variant of the page.
    #[error("element not found: {0}")]
    ElementNotFound(String),

    /// A wait for an element or a text read exceeded its bound.
    #[error("timed out after {timeout:?} waiting for {what}")]
    ExtractionTimeout { what: String, timeout: Duration },

    /// Anything the underlying browser session reported.
    #[error("browser error: {0}")]
    Browser(String),
}

impl RenderError {
    pub fn timeout(what: impl Into<String>, timeout: Duration) -> Self {
        Self::ExtractionTimeout {
            what: what.into(),
            timeout,
        }
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            Self::ExtractionTimeout { .. } => true,
            Self::Browser(msg) => msg.to_lowercase().contains("timeout") || msg.contains("TIMED_OUT"),
            Self::ElementNotFound(_) => false,
        }
    }
}

impl From<anyhow::Error> for RenderError {
    fn from(err: anyhow::Error) -> Self {
        Self::Browser(err.to_string())
    }
}

impl From<serde_json::Error> for RenderError {
    fn from(err: serde_json::Error) -> Self {
        Self::Browser(format!("unexpected script result: {err}"))
    }
}

#[derive(Debug, Error)]
pub enum CrawlError {
    /// The start page never reached a readable state, after every retry.
    #[error("navigation to {url} failed after all retries: {source}")]
    Navigation {
        url: String,
        #[source]
        source: RenderError,
    },

    /// No candidate encoding produced a parseable table.
    #[error("no supported encoding could read {}", path.display())]
    Encoding { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

pub type CrawlResult<T> = std::result::Result<T, CrawlError>;
