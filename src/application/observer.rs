//! Observability sink for regeneration outcomes.
//!
//! Fire-and-forget: implementations must never fail the caller, and the
//! coordinator's responses do not depend on a sink being reachable.

use std::time::Duration;

use metrics::{counter, histogram};
use tracing::{info, warn};

use crate::domain::key::RouteKey;

use super::regen::RegenError;

pub trait RegenObserver: Send + Sync {
    fn regeneration_succeeded(&self, key: &RouteKey, duration: Duration);
    fn regeneration_failed(&self, key: &RouteKey, error: &RegenError);
}

/// Default sink: structured logs plus `metrics` counters and histograms.
pub struct TelemetryObserver;

impl RegenObserver for TelemetryObserver {
    fn regeneration_succeeded(&self, key: &RouteKey, duration: Duration) {
        let duration_ms = duration.as_millis() as f64;
        info!(key = %key, duration_ms, "page regenerated");
        counter!("rigenera_regen_success_total").increment(1);
        histogram!("rigenera_regen_duration_ms").record(duration_ms);
    }

    fn regeneration_failed(&self, key: &RouteKey, error: &RegenError) {
        warn!(key = %key, error = %error, "page regeneration failed");
        counter!("rigenera_regen_failure_total").increment(1);
    }
}

/// Discards everything; for tests and for deployments that scrape logs
/// elsewhere.
pub struct NullObserver;

impl RegenObserver for NullObserver {
    fn regeneration_succeeded(&self, _key: &RouteKey, _duration: Duration) {}

    fn regeneration_failed(&self, _key: &RouteKey, _error: &RegenError) {}
}
