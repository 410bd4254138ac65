use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier for one renderable unit, conceptually a route path
/// such as `/guides/setup`.
///
/// Keys compare by exact string equality. The engine performs no
/// normalization; trailing slashes, casing, and percent-encoding are the
/// caller's concern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteKey(String);

impl RouteKey {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RouteKey {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for RouteKey {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_compare_by_exact_string_equality() {
        assert_eq!(RouteKey::from("/products/42"), RouteKey::from("/products/42"));
        assert_ne!(RouteKey::from("/products/42"), RouteKey::from("/products/42/"));
        assert_ne!(RouteKey::from("/Products/42"), RouteKey::from("/products/42"));
    }

    #[test]
    fn display_round_trips() {
        let key = RouteKey::from("/posts/hello");
        assert_eq!(key.to_string(), "/posts/hello");
        assert_eq!(key.as_str(), "/posts/hello");
    }
}
