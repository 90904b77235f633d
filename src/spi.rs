//! Integration points consumed by the engine.
//!
//! These traits are implemented by external collaborators: traversal policy,
//! message interpolation, clock access and parameter-name resolution. The
//! crate ships permissive defaults for each.

use std::sync::OnceLock;
use std::time::SystemTime;

use regex::Regex;

use crate::descriptor::{ElementKind, ExecutableDescriptor};
use crate::error::CollaboratorError;
use crate::path::{PathNode, PropertyPath};
use crate::registry::AttributeMap;
use crate::value::Value;

/// Policy deciding whether the engine may read or cascade into an element.
///
/// Both calls are fallible; a failure aborts the job and is surfaced as a
/// fatal validation error wrapped with the offending element.
pub trait TraversableResolver: Send + Sync {
    /// May the engine read the property `node` of `bean`?
    fn is_reachable(
        &self,
        bean: &Value,
        node: &PathNode,
        root_type: &str,
        path_to_bean: &PropertyPath,
        element: ElementKind,
    ) -> Result<bool, CollaboratorError>;

    /// May the engine cascade into the property `node` of `bean`?
    fn is_cascadable(
        &self,
        bean: &Value,
        node: &PathNode,
        root_type: &str,
        path_to_bean: &PropertyPath,
        element: ElementKind,
    ) -> Result<bool, CollaboratorError>;
}

/// A resolver that allows everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct TraverseAll;

impl TraversableResolver for TraverseAll {
    fn is_reachable(
        &self,
        _bean: &Value,
        _node: &PathNode,
        _root_type: &str,
        _path_to_bean: &PropertyPath,
        _element: ElementKind,
    ) -> Result<bool, CollaboratorError> {
        Ok(true)
    }

    fn is_cascadable(
        &self,
        _bean: &Value,
        _node: &PathNode,
        _root_type: &str,
        _path_to_bean: &PropertyPath,
        _element: ElementKind,
    ) -> Result<bool, CollaboratorError> {
        Ok(true)
    }
}

/// Context handed to the message interpolator.
pub struct MessageContext<'a> {
    /// Attributes of the violated constraint.
    pub attributes: &'a AttributeMap,
    /// The value that failed validation.
    pub invalid_value: &'a Value,
}

/// Turns a message template into the final violation message.
pub trait MessageInterpolator: Send + Sync {
    fn interpolate(&self, template: &str, context: &MessageContext<'_>) -> String;
}

/// Default interpolation: bundled texts for `{Kind.message}` templates, then
/// `{attribute}` placeholders substituted from the constraint's attributes.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMessageInterpolator;

impl MessageInterpolator for DefaultMessageInterpolator {
    fn interpolate(&self, template: &str, context: &MessageContext<'_>) -> String {
        static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
        let placeholder = PLACEHOLDER
            .get_or_init(|| Regex::new(r"\{([A-Za-z0-9_.]+)\}").expect("placeholder pattern"));

        let resolved = match crate::constraints::default_message(template) {
            Some(text) => text.to_string(),
            None => template.to_string(),
        };

        placeholder
            .replace_all(&resolved, |caps: &regex::Captures<'_>| {
                let name = &caps[1];
                match context.attributes.get(name) {
                    Some(serde_json::Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

/// Exposes the current time to validators through the context.
pub trait ClockProvider: Send + Sync {
    fn now(&self) -> SystemTime;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ClockProvider for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Resolves the parameter names used in parameter path nodes.
pub trait ParameterNameProvider: Send + Sync {
    fn parameter_names(&self, executable: &ExecutableDescriptor) -> Vec<String>;
}

/// Uses the names declared in the metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclaredParameterNames;

impl ParameterNameProvider for DeclaredParameterNames {
    fn parameter_names(&self, executable: &ExecutableDescriptor) -> Vec<String> {
        executable
            .parameters()
            .iter()
            .map(|p| p.name().to_string())
            .collect()
    }
}
