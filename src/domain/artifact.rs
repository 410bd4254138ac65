//! Cached artifacts and their freshness metadata.

use bytes::Bytes;
use time::OffsetDateTime;

/// Monotonically increasing per-key generation number.
///
/// Incremented on each successful regeneration; the store uses it to
/// discard commits from a rebuild that was superseded while it ran.
pub type Generation = u64;

/// Revalidation window for a cached artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revalidate {
    /// The artifact never goes stale; it is replaced only by explicit
    /// eviction.
    Never,
    /// The artifact is stale once its age reaches this many seconds.
    /// Zero makes every request a regeneration candidate.
    AfterSeconds(u64),
}

impl Revalidate {
    pub fn is_never(&self) -> bool {
        matches!(self, Revalidate::Never)
    }
}

/// The cached rendered output for one key, plus freshness metadata.
///
/// An artifact is immutable once constructed. The store replaces artifacts
/// wholesale, so a reader always observes payload and metadata from the same
/// generation.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub payload: Bytes,
    pub produced_at: OffsetDateTime,
    pub revalidate: Revalidate,
    pub generation: Generation,
}

impl Artifact {
    pub fn new(payload: Bytes, revalidate: Revalidate, generation: Generation) -> Self {
        Self {
            payload,
            produced_at: OffsetDateTime::now_utc(),
            revalidate,
            generation,
        }
    }

    /// Whole seconds elapsed since the artifact was produced, clamped at
    /// zero for clocks that moved backwards.
    pub fn age_seconds(&self, now: OffsetDateTime) -> u64 {
        (now - self.produced_at).whole_seconds().max(0) as u64
    }
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use super::*;

    #[test]
    fn age_is_whole_seconds_since_production() {
        let artifact = Artifact::new(Bytes::from("x"), Revalidate::AfterSeconds(10), 1);
        let later = artifact.produced_at + Duration::seconds(7);
        assert_eq!(artifact.age_seconds(later), 7);
    }

    #[test]
    fn age_clamps_negative_drift_to_zero() {
        let artifact = Artifact::new(Bytes::from("x"), Revalidate::Never, 1);
        let earlier = artifact.produced_at - Duration::seconds(5);
        assert_eq!(artifact.age_seconds(earlier), 0);
    }

    #[test]
    fn revalidate_never_is_never() {
        assert!(Revalidate::Never.is_never());
        assert!(!Revalidate::AfterSeconds(0).is_never());
    }
}
