//! Composing-constraint resolution and attribute overrides.
//!
//! A constraint kind may be defined in terms of other constraints. This
//! module resolves a kind's [`Composition`]: its composing declarations plus
//! the attribute-override mappings that copy attribute values from a source
//! occurrence into the composing occurrences. Compositions are pure
//! functions of the registry state and are cached in a bounded LRU sized by
//! the `constraints.cache.size` property.

use std::hash::Hash;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::error::EngineError;
use crate::registry::{AttributeMap, ComposingDeclaration, ConstraintRegistry};

/// A bounded map evicting the least recently used entry on overflow.
pub(crate) struct LruMap<K, V> {
    entries: IndexMap<K, V>,
    capacity: usize,
}

impl<K: Hash + Eq + Clone, V: Clone> LruMap<K, V> {
    pub(crate) fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "LRU capacity must be positive");
        Self {
            entries: IndexMap::new(),
            capacity,
        }
    }

    /// Looks up a value, promoting the entry to most recently used.
    pub(crate) fn get(&mut self, key: &K) -> Option<V> {
        let value = self.entries.shift_remove(key)?;
        self.entries.insert(key.clone(), value.clone());
        Some(value)
    }

    /// Inserts a value, evicting the least recently used entry if full.
    pub(crate) fn insert(&mut self, key: K, value: V) {
        if self.entries.shift_remove(&key).is_none() && self.entries.len() >= self.capacity {
            self.entries.shift_remove_index(0);
        }
        self.entries.insert(key, value);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct OverrideKey {
    kind: String,
    index: Option<usize>,
}

/// The resolved composition of one constraint kind.
#[derive(Debug, Clone)]
pub struct Composition {
    components: Vec<ComposingDeclaration>,
    overrides: IndexMap<OverrideKey, IndexMap<String, String>>,
}

impl Composition {
    /// Resolves the composition of a defined kind, validating override
    /// declarations and target compatibility.
    fn build(kind: &str, registry: &ConstraintRegistry) -> Result<Self, EngineError> {
        let definition = registry.definition(kind).ok_or_else(|| {
            EngineError::ConstraintDefinition(format!("constraint {} is not defined", kind))
        })?;

        let components = definition.composing_declarations().to_vec();
        let mut overrides: IndexMap<OverrideKey, IndexMap<String, String>> = IndexMap::new();

        if components.is_empty() {
            return Ok(Self {
                components,
                overrides,
            });
        }

        let composed_targets = registry.supported_targets(kind);
        for component in &components {
            let composing_targets = registry.supported_targets(&component.kind);
            if composed_targets.is_disjoint(&composing_targets) {
                return Err(EngineError::ConstraintDefinition(format!(
                    "attempt to compose {} of {} but validator targets are incompatible",
                    kind, component.kind
                )));
            }
        }

        for declaration in definition.override_declarations() {
            let to = declaration
                .to
                .clone()
                .unwrap_or_else(|| declaration.from.clone());
            let key = OverrideKey {
                kind: declaration.target_kind.clone(),
                index: declaration.constraint_index,
            };
            let mapping = overrides.entry(key).or_default();
            if mapping.contains_key(&to) {
                return Err(EngineError::ConstraintDefinition(format!(
                    "attempt to override {}.{} (index {:?}) from multiple sources",
                    declaration.target_kind, to, declaration.constraint_index
                )));
            }
            mapping.insert(to, declaration.from.clone());
        }

        Ok(Self {
            components,
            overrides,
        })
    }

    /// True if the kind has composing constraints.
    pub fn is_composed(&self) -> bool {
        !self.components.is_empty()
    }

    /// Produces the composing declarations for a source occurrence, with
    /// overridden attribute values copied in from the source attributes.
    pub fn components_for(
        &self,
        source: &AttributeMap,
    ) -> Result<Vec<ComposingDeclaration>, EngineError> {
        let mut result = self.components.clone();

        for (key, mapping) in &self.overrides {
            let positions: Vec<usize> = result
                .iter()
                .enumerate()
                .filter(|(_, c)| c.kind == key.kind)
                .map(|(i, _)| i)
                .collect();

            let position = match key.index {
                None => {
                    if positions.len() != 1 {
                        return Err(EngineError::ConstraintDefinition(format!(
                            "expected a single composing {} constraint, found {}",
                            key.kind,
                            positions.len()
                        )));
                    }
                    positions[0]
                }
                Some(i) => *positions.get(i).ok_or_else(|| {
                    EngineError::ConstraintDefinition(format!(
                        "no composing {} constraint at index {}",
                        key.kind, i
                    ))
                })?,
            };

            for (to, from) in mapping {
                let value = source.get(from).ok_or_else(|| {
                    EngineError::ConstraintDefinition(format!(
                        "override source attribute {} is not declared",
                        from
                    ))
                })?;
                result[position].attributes.insert(to.clone(), value.clone());
            }
        }
        Ok(result)
    }
}

/// Bounded cache of resolved compositions, keyed by constraint kind.
pub struct CompositionCache {
    cache: Mutex<LruMap<String, Arc<Composition>>>,
}

impl CompositionCache {
    /// Creates a cache bounded to `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: Mutex::new(LruMap::new(capacity)),
        }
    }

    /// Returns the composition for a kind, computing and caching it on
    /// first use. Eviction only costs recomputation; the result is a pure
    /// function of the registry.
    pub fn composition(
        &self,
        registry: &ConstraintRegistry,
        kind: &str,
    ) -> Result<Arc<Composition>, EngineError> {
        if let Some(found) = self.cache.lock().get(&kind.to_string()) {
            return Ok(found);
        }
        let built = Arc::new(Composition::build(kind, registry)?);
        self.cache.lock().insert(kind.to_string(), built.clone());
        tracing::trace!(kind, "cached constraint composition");
        Ok(built)
    }
}
