//! Request coordination: one decision per request, at most one rebuild per
//! key.

use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, instrument};

use crate::cache::inflight::InFlightRegenerations;
use crate::cache::registry::{Classification, FallbackPolicy, PathRegistry};
use crate::cache::staleness::{Freshness, decide};
use crate::cache::store::{ArtifactStore, StoreError};
use crate::domain::artifact::{Artifact, Generation};
use crate::domain::key::RouteKey;

use super::regen::{RegenError, RegenerationService};
use super::renderer::RenderError;

const PLACEHOLDER_HTML: &str = "<!doctype html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><meta http-equiv=\"refresh\" content=\"1\"><title>Generating…</title></head>\n<body><p>This page is being generated. It will refresh shortly.</p></body>\n</html>\n";

/// Where a served payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
    /// Cached artifact inside its revalidation window.
    Fresh,
    /// Cached artifact past its window; a rebuild may be running.
    Stale,
    /// Generated while this caller waited.
    Generated,
    /// Interim response while the first generation runs in the background.
    Placeholder,
}

impl ServedFrom {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServedFrom::Fresh => "fresh",
            ServedFrom::Stale => "stale",
            ServedFrom::Generated => "generated",
            ServedFrom::Placeholder => "placeholder",
        }
    }
}

/// A successful response from the coordinator.
#[derive(Debug, Clone)]
pub struct Served {
    pub payload: Bytes,
    pub served_from: ServedFrom,
    pub age_seconds: u64,
    pub generation: Generation,
}

#[derive(Debug, Error)]
pub enum ServeError {
    /// Key rejected as unknown, or a blocking first render reported the
    /// underlying entity missing.
    #[error("no page for key `{key}`")]
    NotFound { key: String },
    /// The artifact store failed. Deliberately distinct from a cache miss:
    /// an outage must not trigger generation.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// A blocking first generation failed with nothing older to serve.
    #[error(transparent)]
    Regen(RegenError),
}

impl ServeError {
    fn not_found(key: &RouteKey) -> Self {
        Self::NotFound {
            key: key.to_string(),
        }
    }
}

/// Public entry point of the engine.
///
/// Serving a cached artifact, fresh or stale, is always O(store read);
/// only a first-time generation under `Block` policy (or for a known key
/// with no artifact yet) waits on render work.
pub struct RequestCoordinator {
    store: Arc<dyn ArtifactStore>,
    registry: Arc<PathRegistry>,
    inflight: InFlightRegenerations,
    regen: Arc<RegenerationService>,
    placeholder: Bytes,
}

impl RequestCoordinator {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        registry: Arc<PathRegistry>,
        regen: Arc<RegenerationService>,
    ) -> Self {
        Self {
            store,
            registry,
            inflight: InFlightRegenerations::new(),
            regen,
            placeholder: Bytes::from_static(PLACEHOLDER_HTML.as_bytes()),
        }
    }

    /// Decide and serve: cached artifact, on-demand generation, placeholder,
    /// or not-found, per the key's state and the deployment policy.
    #[instrument(skip(self), fields(key = %key))]
    pub async fn handle(&self, key: &RouteKey) -> Result<Served, ServeError> {
        let now = OffsetDateTime::now_utc();
        if let Some(artifact) = self.store.get(key).await? {
            return Ok(match decide(&artifact, now) {
                Freshness::Fresh => serve_cached(&artifact, ServedFrom::Fresh, now),
                Freshness::StaleButServable => self.serve_stale_and_refresh(key, artifact, now),
            });
        }

        // No artifact: generation is governed by the path registry.
        match self.registry.classify(key) {
            Classification::Known | Classification::Unknown(FallbackPolicy::Block) => {
                self.generate_blocking(key).await
            }
            Classification::Unknown(FallbackPolicy::Reject) => {
                debug!("unknown key rejected without render");
                Err(ServeError::not_found(key))
            }
            Classification::Unknown(FallbackPolicy::Placeholder) => {
                Ok(self.generate_behind_placeholder(key))
            }
        }
    }

    /// Explicitly drop a key's artifact. The next request regenerates it
    /// according to its classification.
    pub async fn evict(&self, key: &RouteKey) -> Result<bool, StoreError> {
        self.store.evict(key).await
    }

    /// Serve the stale artifact immediately; kick off a background rebuild
    /// if nobody else already has.
    fn serve_stale_and_refresh(
        &self,
        key: &RouteKey,
        artifact: Arc<Artifact>,
        now: OffsetDateTime,
    ) -> Served {
        match self.inflight.try_begin(key, artifact.generation) {
            Ok(ticket) => {
                debug!(
                    ticket_id = %ticket.id(),
                    generation = artifact.generation,
                    "stale artifact, rebuilding in background"
                );
                let regen = Arc::clone(&self.regen);
                tokio::spawn(async move {
                    // Failures are recorded by the observer; the stale
                    // artifact keeps serving either way.
                    let _ = regen.regenerate(&ticket).await;
                    drop(ticket);
                });
            }
            Err(_in_progress) => {
                debug!("rebuild already in flight, serving stale");
            }
        }
        serve_cached(&artifact, ServedFrom::Stale, now)
    }

    /// First-time generation that the caller waits on. Losers of the ticket
    /// race wait for the winner, then re-read the store.
    async fn generate_blocking(&self, key: &RouteKey) -> Result<Served, ServeError> {
        loop {
            match self.inflight.try_begin(key, 0) {
                Ok(ticket) => {
                    // Another caller may have committed while we raced for
                    // the ticket.
                    if let Some(artifact) = self.store.get(key).await? {
                        return Ok(serve_cached(
                            &artifact,
                            ServedFrom::Generated,
                            OffsetDateTime::now_utc(),
                        ));
                    }

                    let artifact =
                        self.regen
                            .regenerate(&ticket)
                            .await
                            .map_err(|err| match err {
                                RegenError::Render(RenderError::NotFound { .. }) => {
                                    ServeError::not_found(key)
                                }
                                other => ServeError::Regen(other),
                            })?;
                    drop(ticket);

                    if self.registry.promote(key) {
                        debug!("key promoted to known after first generation");
                    }
                    return Ok(serve_cached(
                        &artifact,
                        ServedFrom::Generated,
                        OffsetDateTime::now_utc(),
                    ));
                }
                Err(in_progress) => {
                    debug!("first generation already in flight, waiting");
                    in_progress.finished().await;
                    // The winner either committed an artifact (served on the
                    // next read) or failed (we take over the retry).
                    if let Some(artifact) = self.store.get(key).await? {
                        return Ok(serve_cached(
                            &artifact,
                            ServedFrom::Generated,
                            OffsetDateTime::now_utc(),
                        ));
                    }
                }
            }
        }
    }

    /// First-time generation under `Placeholder` policy: respond
    /// immediately, render in the background, promote on success.
    fn generate_behind_placeholder(&self, key: &RouteKey) -> Served {
        match self.inflight.try_begin(key, 0) {
            Ok(ticket) => {
                debug!(ticket_id = %ticket.id(), "first request, generating behind placeholder");
                let regen = Arc::clone(&self.regen);
                let registry = Arc::clone(&self.registry);
                let key = key.clone();
                tokio::spawn(async move {
                    if regen.regenerate(&ticket).await.is_ok() && registry.promote(&key) {
                        debug!(key = %key, "key promoted to known after first generation");
                    }
                    drop(ticket);
                });
            }
            Err(_in_progress) => {
                debug!("generation already in flight, serving placeholder");
            }
        }
        Served {
            payload: self.placeholder.clone(),
            served_from: ServedFrom::Placeholder,
            age_seconds: 0,
            generation: 0,
        }
    }
}

fn serve_cached(artifact: &Artifact, served_from: ServedFrom, now: OffsetDateTime) -> Served {
    Served {
        payload: artifact.payload.clone(),
        served_from,
        age_seconds: artifact.age_seconds(now),
        generation: artifact.generation,
    }
}
