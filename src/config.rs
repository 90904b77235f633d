//! Engine configuration properties.
//!
//! The factory accepts a string-keyed property map. Recognised keys are
//! parsed at startup; a value that fails to parse fails factory
//! construction rather than being silently defaulted.

use indexmap::IndexMap;

use crate::error::EngineError;

/// Maximum number of entries kept in the constraint-composition cache.
pub const CONSTRAINTS_CACHE_SIZE: &str = "constraints.cache.size";

const DEFAULT_CONSTRAINTS_CACHE_SIZE: usize = 50;

/// String-keyed configuration consumed by the factory at build time.
#[derive(Debug, Clone, Default)]
pub struct EngineProperties {
    values: IndexMap<String, String>,
}

impl EngineProperties {
    /// Creates an empty property set; every lookup falls back to defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a property value.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Reads a raw property value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Parses `constraints.cache.size`.
    ///
    /// The value must be a positive integer. A missing value yields the
    /// default; an unparseable or non-positive value is a startup failure.
    pub fn constraints_cache_size(&self) -> Result<usize, EngineError> {
        match self.get(CONSTRAINTS_CACHE_SIZE) {
            None => Ok(DEFAULT_CONSTRAINTS_CACHE_SIZE),
            Some(raw) => match raw.parse::<usize>() {
                Ok(size) if size > 0 => Ok(size),
                _ => Err(EngineError::Configuration {
                    key: CONSTRAINTS_CACHE_SIZE.into(),
                    value: raw.into(),
                }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cache_size() {
        let props = EngineProperties::new();
        assert_eq!(props.constraints_cache_size().unwrap(), 50);
    }

    #[test]
    fn test_explicit_cache_size() {
        let props = EngineProperties::new().set(CONSTRAINTS_CACHE_SIZE, "8");
        assert_eq!(props.constraints_cache_size().unwrap(), 8);
    }

    #[test]
    fn test_unparseable_cache_size_fails() {
        let props = EngineProperties::new().set(CONSTRAINTS_CACHE_SIZE, "not-a-number");
        assert!(matches!(
            props.constraints_cache_size(),
            Err(EngineError::Configuration { .. })
        ));
    }

    #[test]
    fn test_zero_cache_size_fails() {
        let props = EngineProperties::new().set(CONSTRAINTS_CACHE_SIZE, "0");
        assert!(props.constraints_cache_size().is_err());
    }
}
