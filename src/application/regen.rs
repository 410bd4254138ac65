//! Regeneration engine: render under a ticket, commit, bound the wait.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::time::timeout;
use tracing::debug;

use crate::cache::config::EngineConfig;
use crate::cache::inflight::RegenTicket;
use crate::cache::store::{ArtifactStore, Commit, StoreError};
use crate::domain::artifact::{Artifact, Revalidate};

use super::observer::RegenObserver;
use super::renderer::{RenderError, Renderer};

#[derive(Debug, Error)]
pub enum RegenError {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("regeneration exceeded {limit_ms}ms")]
    TimedOut { limit_ms: u64 },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RegenError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegenError::Render(RenderError::NotFound { .. }))
    }
}

/// Orchestrates one rebuild: render, stamp metadata, commit.
///
/// Failure never touches the previously stored artifact; the ticket is
/// released by the caller's scope, so the next qualifying request may
/// retry.
pub struct RegenerationService {
    renderer: Arc<dyn Renderer>,
    store: Arc<dyn ArtifactStore>,
    observer: Arc<dyn RegenObserver>,
    default_revalidate: Revalidate,
    max_duration: Duration,
}

impl RegenerationService {
    pub fn new(
        config: &EngineConfig,
        renderer: Arc<dyn Renderer>,
        store: Arc<dyn ArtifactStore>,
        observer: Arc<dyn RegenObserver>,
    ) -> Self {
        Self {
            renderer,
            store,
            observer,
            default_revalidate: config.default_revalidate,
            max_duration: config.max_regen_duration,
        }
    }

    /// Render the ticket's key and commit the result as the next
    /// generation.
    ///
    /// The timeout bounds how long we wait for the renderer, not the render
    /// itself; an attempt that outlives it is treated as failed and may be
    /// retried by a later request.
    pub async fn regenerate(&self, ticket: &RegenTicket) -> Result<Arc<Artifact>, RegenError> {
        let key = ticket.key();
        let started = Instant::now();

        let rendered = match timeout(self.max_duration, self.renderer.render(key)).await {
            Ok(Ok(page)) => page,
            Ok(Err(render_err)) => {
                let err = RegenError::from(render_err);
                self.observer.regeneration_failed(key, &err);
                return Err(err);
            }
            Err(_elapsed) => {
                let err = RegenError::TimedOut {
                    limit_ms: self.max_duration.as_millis() as u64,
                };
                self.observer.regeneration_failed(key, &err);
                return Err(err);
            }
        };

        let revalidate = rendered.revalidate.unwrap_or(self.default_revalidate);
        let artifact = Arc::new(Artifact::new(
            rendered.body,
            revalidate,
            ticket.generation_at_start() + 1,
        ));

        match self
            .store
            .put_if_newer(key.clone(), Arc::clone(&artifact))
            .await
        {
            Ok(Commit::Stored) => {
                self.observer.regeneration_succeeded(key, started.elapsed());
                Ok(artifact)
            }
            Ok(Commit::Superseded { current }) => {
                // The ticket should make this unreachable; tolerate it
                // anyway and surface whatever is stored now.
                debug!(
                    key = %key,
                    ticket_id = %ticket.id(),
                    attempted = artifact.generation,
                    current,
                    "discarding superseded regeneration commit"
                );
                self.observer.regeneration_succeeded(key, started.elapsed());
                match self.store.get(key).await? {
                    Some(current_artifact) => Ok(current_artifact),
                    None => Ok(artifact),
                }
            }
            Err(store_err) => {
                let err = RegenError::from(store_err);
                self.observer.regeneration_failed(key, &err);
                Err(err)
            }
        }
    }
}
