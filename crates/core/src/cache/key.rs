use sha2::{Digest, Sha256};
use std::fmt;

/// Deterministic cache key: SHA-256 of an operation's canonical parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Start a key for `operation`. Parameters may be added in any order.
    pub fn builder(operation: &'static str) -> CacheKeyBuilder {
        CacheKeyBuilder {
            operation,
            params: Vec::new(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Collects normalized parameters for a [`CacheKey`].
#[derive(Debug, Clone)]
pub struct CacheKeyBuilder {
    operation: &'static str,
    params: Vec<(&'static str, Option<String>)>,
}

impl CacheKeyBuilder {
    /// Free text; trimmed, lower-cased and whitespace-collapsed.
    pub fn text(self, name: &'static str, value: &str) -> Self {
        self.param(name, Some(normalize_text(value)))
    }

    /// Optional free text; blank values count as absent.
    pub fn optional_text(self, name: &'static str, value: Option<&str>) -> Self {
        let value = value.map(normalize_text).filter(|v| !v.is_empty());
        self.param(name, value)
    }

    /// Any value with a canonical `Display` form (numbers, dates, URLs).
    pub fn value(self, name: &'static str, value: impl fmt::Display) -> Self {
        self.param(name, Some(value.to_string()))
    }

    pub fn optional_value<T: fmt::Display>(self, name: &'static str, value: Option<T>) -> Self {
        self.param(name, value.map(|v| v.to_string()))
    }

    fn param(mut self, name: &'static str, value: Option<String>) -> Self {
        self.params.push((name, value));
        self
    }

    /// Canonical, order-independent rendering that gets hashed.
    ///
    /// Values are JSON-encoded so an absent parameter (`null`) never
    /// collides with any string value.
    pub fn canonical(&self) -> String {
        let mut params = self.params.clone();
        params.sort_by(|a, b| a.0.cmp(b.0));

        let rendered: Vec<String> = params
            .iter()
            .map(|(name, value)| {
                let encoded = match value {
                    Some(v) => serde_json::Value::String(v.clone()).to_string(),
                    None => "null".to_string(),
                };
                format!("{}={}", name, encoded)
            })
            .collect();

        format!("{}?{}", self.operation, rendered.join("&"))
    }

    pub fn build(self) -> CacheKey {
        let digest = Sha256::digest(self.canonical().as_bytes());
        CacheKey(hex::encode(digest))
    }
}

/// Trim, lower-case and collapse runs of whitespace.
pub fn normalize_text(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
