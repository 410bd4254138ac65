//! Staleness decisions.
//!
//! Pure functions, no I/O. The absent-artifact case (`MustGenerate` in the
//! engine's state machine) is handled by the coordinator, which consults the
//! path registry instead of a freshness check.

use time::OffsetDateTime;

use crate::domain::artifact::{Artifact, Revalidate};

/// Outcome of a freshness check for a stored artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Inside the revalidation window, or the window is `Never`.
    Fresh,
    /// Past the window. Still servable; a rebuild may be scheduled.
    StaleButServable,
}

/// Decide freshness for `artifact` at `now`.
///
/// A zero-second window makes every request stale-but-servable: regeneration
/// is attempted on each request, but serving never blocks on it.
pub fn decide(artifact: &Artifact, now: OffsetDateTime) -> Freshness {
    match artifact.revalidate {
        Revalidate::Never => Freshness::Fresh,
        Revalidate::AfterSeconds(window) => {
            if artifact.age_seconds(now) < window {
                Freshness::Fresh
            } else {
                Freshness::StaleButServable
            }
        }
    }
}
