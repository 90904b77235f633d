//! Value extraction from container values.
//!
//! A [`ValueExtractor`] exposes the sub-values of one container position
//! (list elements, map keys or values, the value inside an optional) as a
//! lazy sequence of `(item, value)` pairs the traversal turns into child
//! frames. Extractors are looked up by [`ContainerElementKey`] in an
//! [`ExtractorRegistry`]: a chain of scopes whose root is pre-populated from
//! the bundled manifest and immutable afterwards.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{CollaboratorError, EngineError};
use crate::metadata::ContainerElementKey;
use crate::value::Value;

const DEFAULT_EXTRACTORS: &str = include_str!("default-extractors.properties");

/// How an extracted value is positioned inside its container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedItem {
    /// Positioned at an index (lists).
    Indexed(usize),
    /// Positioned under a key (maps).
    Keyed(String),
    /// The container holds at most one value (optionals).
    Single,
}

/// Lazy sequence of extracted `(item, value)` pairs.
///
/// Values are usually borrowed from the container; extractors for positions
/// the container does not materialize as values (map keys) yield owned
/// values.
pub type Extraction<'v> = Box<dyn Iterator<Item = (ExtractedItem, Cow<'v, Value>)> + 'v>;

/// Exposes the sub-values of one container position.
///
/// Extractors receive arbitrary values; a value that is not the extractor's
/// container (including null) yields an empty extraction.
pub trait ValueExtractor: Send + Sync {
    /// The container position this extractor serves.
    fn key(&self) -> ContainerElementKey;

    /// Extracts the sub-values of `value`.
    fn extract<'v>(&self, value: &'v Value) -> Result<Extraction<'v>, CollaboratorError>;
}

struct ListElementExtractor;

impl ValueExtractor for ListElementExtractor {
    fn key(&self) -> ContainerElementKey {
        ContainerElementKey::list_element()
    }

    fn extract<'v>(&self, value: &'v Value) -> Result<Extraction<'v>, CollaboratorError> {
        match value {
            Value::List(items) => Ok(Box::new(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| (ExtractedItem::Indexed(i), Cow::Borrowed(v))),
            )),
            _ => Ok(Box::new(std::iter::empty())),
        }
    }
}

struct MapKeyExtractor;

impl ValueExtractor for MapKeyExtractor {
    fn key(&self) -> ContainerElementKey {
        ContainerElementKey::map_key()
    }

    fn extract<'v>(&self, value: &'v Value) -> Result<Extraction<'v>, CollaboratorError> {
        match value {
            Value::Map(entries) => Ok(Box::new(entries.keys().map(|k| {
                (
                    ExtractedItem::Keyed(k.clone()),
                    Cow::Owned(Value::Str(k.clone())),
                )
            }))),
            _ => Ok(Box::new(std::iter::empty())),
        }
    }
}

struct MapValueExtractor;

impl ValueExtractor for MapValueExtractor {
    fn key(&self) -> ContainerElementKey {
        ContainerElementKey::map_value()
    }

    fn extract<'v>(&self, value: &'v Value) -> Result<Extraction<'v>, CollaboratorError> {
        match value {
            Value::Map(entries) => Ok(Box::new(
                entries
                    .iter()
                    .map(|(k, v)| (ExtractedItem::Keyed(k.clone()), Cow::Borrowed(v))),
            )),
            _ => Ok(Box::new(std::iter::empty())),
        }
    }
}

struct OptionalValueExtractor;

impl ValueExtractor for OptionalValueExtractor {
    fn key(&self) -> ContainerElementKey {
        ContainerElementKey::optional_value()
    }

    fn extract<'v>(&self, value: &'v Value) -> Result<Extraction<'v>, CollaboratorError> {
        match value {
            Value::Optional(Some(inner)) => Ok(Box::new(std::iter::once((
                ExtractedItem::Single,
                Cow::Borrowed(&**inner),
            )))),
            _ => Ok(Box::new(std::iter::empty())),
        }
    }
}

fn builtin(name: &str) -> Option<Arc<dyn ValueExtractor>> {
    match name {
        "list.element" => Some(Arc::new(ListElementExtractor)),
        "map.key" => Some(Arc::new(MapKeyExtractor)),
        "map.value" => Some(Arc::new(MapValueExtractor)),
        "optional.value" => Some(Arc::new(OptionalValueExtractor)),
        _ => None,
    }
}

fn gate(name: &str) -> Option<fn() -> bool> {
    match name {
        "always" => Some(|| true),
        "never" => Some(|| false),
        _ => None,
    }
}

/// A scope in the extractor lookup chain.
///
/// Lookup checks the local scope first and walks parent-ward. The root
/// scope is built from the bundled manifest and rejects registration;
/// child scopes accept one extractor per key.
pub struct ExtractorRegistry {
    parent: Option<Arc<ExtractorRegistry>>,
    locals: RwLock<HashMap<ContainerElementKey, Arc<dyn ValueExtractor>>>,
}

impl ExtractorRegistry {
    /// Builds the root scope from the bundled manifest.
    ///
    /// Each manifest line is `extractor = gate`; an unknown extractor or
    /// gate name is a startup failure, a gate reporting false skips the
    /// extractor.
    pub(crate) fn bootstrap() -> Result<Arc<Self>, EngineError> {
        let root = Self {
            parent: None,
            locals: RwLock::new(HashMap::new()),
        };
        for line in DEFAULT_EXTRACTORS.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (name, gate_name) = line.split_once('=').ok_or_else(|| {
                EngineError::Configuration {
                    key: "default-extractors".into(),
                    value: line.into(),
                }
            })?;
            let (name, gate_name) = (name.trim(), gate_name.trim());
            let extractor = builtin(name).ok_or_else(|| EngineError::Configuration {
                key: "default-extractors".into(),
                value: name.into(),
            })?;
            let activation = gate(gate_name).ok_or_else(|| EngineError::Configuration {
                key: "default-extractors".into(),
                value: gate_name.into(),
            })?;
            if activation() {
                root.locals.write().insert(extractor.key(), extractor);
            }
        }
        Ok(Arc::new(root))
    }

    /// Opens a child scope accepting registrations.
    pub fn child(self: &Arc<Self>) -> Arc<Self> {
        Arc::new(Self {
            parent: Some(self.clone()),
            locals: RwLock::new(HashMap::new()),
        })
    }

    /// Registers an extractor in this scope.
    ///
    /// The root scope is immutable; registering the same key twice in one
    /// scope is a definition error. A child registration shadows the
    /// parent's extractor for the same key.
    pub fn register(&self, extractor: Arc<dyn ValueExtractor>) -> Result<(), EngineError> {
        if self.parent.is_none() {
            return Err(EngineError::ConstraintDefinition(
                "the root value-extractor scope is immutable".into(),
            ));
        }
        let key = extractor.key();
        let mut locals = self.locals.write();
        if locals.contains_key(&key) {
            return Err(EngineError::ConstraintDefinition(format!(
                "multiple value extractors registered for {}",
                key
            )));
        }
        locals.insert(key, extractor);
        Ok(())
    }

    /// Finds the extractor for a key, walking parent-ward.
    pub fn find(&self, key: ContainerElementKey) -> Option<Arc<dyn ValueExtractor>> {
        if let Some(found) = self.locals.read().get(&key) {
            return Some(found.clone());
        }
        self.parent.as_ref().and_then(|parent| parent.find(key))
    }
}
