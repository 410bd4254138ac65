//! Engine runtime configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

use crate::domain::artifact::Revalidate;

use super::registry::FallbackPolicy;

const DEFAULT_MAX_ARTIFACTS: usize = 1024;
const DEFAULT_REVALIDATE_SECS: u64 = 60;
const DEFAULT_MAX_REGEN_MS: u64 = 10_000;

/// Validated runtime configuration for the engine.
///
/// Built from [`crate::config::CacheSettings`] after load-time validation;
/// request handling never re-validates these values.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Capacity bound for the in-memory artifact store.
    pub max_artifacts: usize,
    /// Deployment-wide revalidation window; renderers may override per key.
    pub default_revalidate: Revalidate,
    /// Policy applied to keys that were never enumerated.
    pub fallback: FallbackPolicy,
    /// How long a single regeneration attempt may run before it is treated
    /// as failed. Bounds the wait, not the render itself.
    pub max_regen_duration: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_artifacts: DEFAULT_MAX_ARTIFACTS,
            default_revalidate: Revalidate::AfterSeconds(DEFAULT_REVALIDATE_SECS),
            fallback: FallbackPolicy::Block,
            max_regen_duration: Duration::from_millis(DEFAULT_MAX_REGEN_MS),
        }
    }
}

impl EngineConfig {
    /// Store capacity as `NonZeroUsize`, clamping to 1 if zero.
    pub fn max_artifacts_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.max_artifacts).unwrap_or(NonZeroUsize::MIN)
    }
}

impl From<&crate::config::CacheSettings> for EngineConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            max_artifacts: settings.max_artifacts,
            default_revalidate: match settings.revalidate_after_secs {
                // Negative values are rejected during settings validation.
                Some(secs) => Revalidate::AfterSeconds(secs as u64),
                None => Revalidate::Never,
            },
            fallback: settings.fallback,
            max_regen_duration: Duration::from_millis(settings.max_regen_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = EngineConfig::default();
        assert_eq!(config.max_artifacts, 1024);
        assert_eq!(config.default_revalidate, Revalidate::AfterSeconds(60));
        assert_eq!(config.fallback, FallbackPolicy::Block);
        assert_eq!(config.max_regen_duration, Duration::from_millis(10_000));
    }

    #[test]
    fn non_zero_clamps_to_min() {
        let config = EngineConfig {
            max_artifacts: 0,
            ..Default::default()
        };
        assert_eq!(config.max_artifacts_non_zero().get(), 1);
    }

    #[test]
    fn settings_with_no_window_mean_never_stale() {
        let settings = crate::config::CacheSettings {
            revalidate_after_secs: None,
            ..Default::default()
        };
        let config = EngineConfig::from(&settings);
        assert_eq!(config.default_revalidate, Revalidate::Never);
    }
}
