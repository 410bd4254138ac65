//! Startup warmer for deploy-time-known paths.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::application::coordinator::{RequestCoordinator, ServeError};
use crate::domain::key::RouteKey;

#[derive(Debug, Error)]
pub enum WarmError {
    #[error("failed to warm `{key}`: {source}")]
    Generate {
        key: String,
        #[source]
        source: ServeError,
    },
}

pub struct CacheWarmer {
    coordinator: Arc<RequestCoordinator>,
}

impl CacheWarmer {
    pub fn new(coordinator: Arc<RequestCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Generate every known path once, before traffic arrives.
    ///
    /// Returns the number of pages warmed. Duplicate entries in the
    /// configured list are warmed once.
    pub async fn warm_known(&self, known_paths: &[String]) -> Result<usize, WarmError> {
        let mut warmed = HashSet::new();

        for path in known_paths {
            if !warmed.insert(path.clone()) {
                continue;
            }

            let key = RouteKey::from(path.clone());
            let served =
                self.coordinator
                    .handle(&key)
                    .await
                    .map_err(|source| WarmError::Generate {
                        key: key.to_string(),
                        source,
                    })?;

            info!(
                key = %key,
                served_from = served.served_from.as_str(),
                "cache entry warmed"
            );
        }

        Ok(warmed.len())
    }
}
