//! Known-path registry and the policy for never-seen keys.

use std::collections::HashSet;
use std::sync::RwLock;

use serde::Deserialize;

use crate::domain::key::RouteKey;

use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::registry";

/// What happens on the first request for a key that was never enumerated.
///
/// Chosen once per deployment; applies uniformly to all unknown keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPolicy {
    /// Unknown keys are an immediate not-found.
    Reject,
    /// The first request blocks until generation completes.
    Block,
    /// The first request receives a placeholder while generation runs in
    /// the background.
    Placeholder,
}

/// Classification of a key at request time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Enumerated ahead of time, or promoted after a successful on-demand
    /// generation. Always eligible for generation.
    Known,
    /// Never seen; subject to the carried fallback policy.
    Unknown(FallbackPolicy),
}

/// Tracks which keys are known to be generatable.
///
/// Promotion is process-lifetime only: a restart re-seeds the known set
/// from configuration, and dynamically discovered keys are re-discovered
/// through the fallback policy.
pub struct PathRegistry {
    known: RwLock<HashSet<RouteKey>>,
    fallback: FallbackPolicy,
}

impl PathRegistry {
    pub fn new(fallback: FallbackPolicy) -> Self {
        Self {
            known: RwLock::new(HashSet::new()),
            fallback,
        }
    }

    /// Create a registry pre-seeded with keys enumerated at deploy time.
    pub fn with_known<I, K>(fallback: FallbackPolicy, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<RouteKey>,
    {
        let registry = Self::new(fallback);
        {
            let mut known = rw_write(&registry.known, SOURCE, "with_known");
            known.extend(keys.into_iter().map(Into::into));
        }
        registry
    }

    pub fn classify(&self, key: &RouteKey) -> Classification {
        if rw_read(&self.known, SOURCE, "classify").contains(key) {
            Classification::Known
        } else {
            Classification::Unknown(self.fallback)
        }
    }

    /// Record that a key was generated successfully at least once.
    ///
    /// Returns whether the key was newly promoted.
    pub fn promote(&self, key: &RouteKey) -> bool {
        rw_write(&self.known, SOURCE, "promote").insert(key.clone())
    }

    /// Drop a key from the known set. Returns whether it was present.
    pub fn forget(&self, key: &RouteKey) -> bool {
        rw_write(&self.known, SOURCE, "forget").remove(key)
    }

    pub fn known_count(&self) -> usize {
        rw_read(&self.known, SOURCE, "known_count").len()
    }

    pub fn fallback(&self) -> FallbackPolicy {
        self.fallback
    }
}
