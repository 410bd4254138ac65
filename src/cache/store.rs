//! Artifact storage.
//!
//! The store never blocks on generation and never triggers one; it only
//! holds what the regeneration engine commits.

use std::num::NonZeroUsize;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use lru::LruCache;
use thiserror::Error;

use crate::domain::artifact::{Artifact, Generation};
use crate::domain::key::RouteKey;

use super::config::EngineConfig;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

/// Failure of the underlying storage.
///
/// Deliberately distinct from "absent": absence triggers generation, and a
/// transient outage must never impersonate it.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("artifact store unavailable: {reason}")]
    Unavailable { reason: String },
}

impl StoreError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}

/// Outcome of an attempted commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commit {
    /// The artifact is now the stored one.
    Stored,
    /// An equal or newer generation was already committed; the write was
    /// discarded.
    Superseded { current: Generation },
}

/// Key → artifact storage.
///
/// Replacement must be atomic from a reader's point of view: a `get` racing
/// a `put_if_newer` observes the previous artifact or the new one, never a
/// torn write. Writes for a key are linearized by generation; a commit that
/// does not advance the stored generation is discarded.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn get(&self, key: &RouteKey) -> Result<Option<Arc<Artifact>>, StoreError>;
    async fn put_if_newer(&self, key: RouteKey, artifact: Arc<Artifact>)
    -> Result<Commit, StoreError>;
    /// Remove the artifact entirely. Returns whether one existed.
    async fn evict(&self, key: &RouteKey) -> Result<bool, StoreError>;
}

/// In-memory artifact store with an LRU capacity bound.
///
/// Artifacts live behind `Arc` and are swapped wholesale, so a reader that
/// obtained one before a replacement keeps a fully-formed artifact. The
/// guard protects constant-time map operations only; rebuild work never
/// runs under it, so unrelated keys make progress independently.
pub struct MemoryStore {
    artifacts: RwLock<LruCache<RouteKey, Arc<Artifact>>>,
}

impl MemoryStore {
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_capacity(config.max_artifacts_non_zero())
    }

    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            artifacts: RwLock::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        rw_read(&self.artifacts, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn get(&self, key: &RouteKey) -> Result<Option<Arc<Artifact>>, StoreError> {
        // LruCache bumps recency on read, which needs the write guard.
        Ok(rw_write(&self.artifacts, SOURCE, "get").get(key).cloned())
    }

    async fn put_if_newer(
        &self,
        key: RouteKey,
        artifact: Arc<Artifact>,
    ) -> Result<Commit, StoreError> {
        let mut guard = rw_write(&self.artifacts, SOURCE, "put_if_newer");
        if let Some(existing) = guard.peek(&key) {
            if existing.generation >= artifact.generation {
                return Ok(Commit::Superseded {
                    current: existing.generation,
                });
            }
        }
        guard.put(key, artifact);
        Ok(Commit::Stored)
    }

    async fn evict(&self, key: &RouteKey) -> Result<bool, StoreError> {
        Ok(rw_write(&self.artifacts, SOURCE, "evict")
            .pop(key)
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use crate::domain::artifact::Revalidate;

    use super::*;

    fn artifact(body: &str, generation: Generation) -> Arc<Artifact> {
        Arc::new(Artifact::new(
            Bytes::from(body.to_string()),
            Revalidate::AfterSeconds(60),
            generation,
        ))
    }

    fn store() -> MemoryStore {
        MemoryStore::new(&EngineConfig::default())
    }

    #[tokio::test]
    async fn get_absent_key_is_none_not_an_error() {
        let store = store();
        let found = store.get(&RouteKey::from("/missing")).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = store();
        let key = RouteKey::from("/p/1");

        let commit = store
            .put_if_newer(key.clone(), artifact("v1", 1))
            .await
            .unwrap();
        assert_eq!(commit, Commit::Stored);

        let found = store.get(&key).await.unwrap().expect("stored artifact");
        assert_eq!(found.payload, Bytes::from("v1"));
        assert_eq!(found.generation, 1);
    }

    #[tokio::test]
    async fn stale_generation_commit_is_discarded() {
        let store = store();
        let key = RouteKey::from("/p/1");

        store
            .put_if_newer(key.clone(), artifact("newer", 3))
            .await
            .unwrap();

        // A slow rebuild that started earlier must not clobber the newer
        // artifact.
        let commit = store
            .put_if_newer(key.clone(), artifact("slow-old", 2))
            .await
            .unwrap();
        assert_eq!(commit, Commit::Superseded { current: 3 });

        let found = store.get(&key).await.unwrap().expect("stored artifact");
        assert_eq!(found.payload, Bytes::from("newer"));
        assert_eq!(found.generation, 3);
    }

    #[tokio::test]
    async fn equal_generation_commit_is_discarded() {
        let store = store();
        let key = RouteKey::from("/p/1");

        store
            .put_if_newer(key.clone(), artifact("first", 2))
            .await
            .unwrap();
        let commit = store
            .put_if_newer(key.clone(), artifact("duplicate", 2))
            .await
            .unwrap();
        assert_eq!(commit, Commit::Superseded { current: 2 });
    }

    #[tokio::test]
    async fn evict_removes_the_artifact() {
        let store = store();
        let key = RouteKey::from("/p/1");

        store
            .put_if_newer(key.clone(), artifact("v1", 1))
            .await
            .unwrap();
        assert!(store.evict(&key).await.unwrap());
        assert!(store.get(&key).await.unwrap().is_none());
        assert!(!store.evict(&key).await.unwrap());
    }

    #[tokio::test]
    async fn capacity_bound_evicts_least_recently_used() {
        let store = MemoryStore::with_capacity(NonZeroUsize::new(2).unwrap());
        let a = RouteKey::from("/a");
        let b = RouteKey::from("/b");
        let c = RouteKey::from("/c");

        store.put_if_newer(a.clone(), artifact("a", 1)).await.unwrap();
        store.put_if_newer(b.clone(), artifact("b", 1)).await.unwrap();
        store.put_if_newer(c.clone(), artifact("c", 1)).await.unwrap();

        assert!(store.get(&a).await.unwrap().is_none());
        assert!(store.get(&b).await.unwrap().is_some());
        assert!(store.get(&c).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn readers_holding_an_arc_survive_replacement() {
        let store = store();
        let key = RouteKey::from("/p/1");

        store
            .put_if_newer(key.clone(), artifact("old", 1))
            .await
            .unwrap();
        let held = store.get(&key).await.unwrap().expect("old artifact");

        store
            .put_if_newer(key.clone(), artifact("new", 2))
            .await
            .unwrap();

        // The reader's view is the complete old artifact, never a mix.
        assert_eq!(held.payload, Bytes::from("old"));
        assert_eq!(held.generation, 1);
    }
}
