//! Rendering collaborator contract.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::domain::artifact::Revalidate;
use crate::domain::key::RouteKey;

/// Output of a successful render.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub body: Bytes,
    /// Per-key revalidation override; `None` falls back to the deployment
    /// default.
    pub revalidate: Option<Revalidate>,
}

impl RenderedPage {
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            revalidate: None,
        }
    }

    pub fn with_revalidate(mut self, revalidate: Revalidate) -> Self {
        self.revalidate = Some(revalidate);
        self
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    /// The underlying entity does not exist. Not retried.
    #[error("no content for key `{key}`")]
    NotFound { key: String },
    #[error("render failed: {message}")]
    Failed { message: String },
}

impl RenderError {
    pub fn not_found(key: &RouteKey) -> Self {
        Self::NotFound {
            key: key.to_string(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// Produces a new artifact payload for a key.
///
/// May be slow, may fail. Must be idempotent: rendering the same key twice
/// has no side effects beyond producing output.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, key: &RouteKey) -> Result<RenderedPage, RenderError>;
}
