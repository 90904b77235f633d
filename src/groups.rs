//! Validation groups, group sequences and the group computer.
//!
//! A [`Group`] tags *when* a constraint is evaluated. A group sequence is a
//! named, ordered list of groups evaluated left-to-right with short-circuit
//! on the first group that produced a violation. The [`GroupsComputer`]
//! expands a validation request into the plan the job executes.

use std::fmt::{self, Display};

use indexmap::{IndexMap, IndexSet};

use crate::error::EngineError;

/// Name of the implicit default group.
pub const DEFAULT_GROUP: &str = "Default";

/// A validation group kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Group(String);

impl Group {
    /// Creates a group with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Group(name.into())
    }

    /// The default group.
    pub fn default_group() -> Self {
        Group(DEFAULT_GROUP.into())
    }

    /// The group's name.
    pub fn name(&self) -> &str {
        &self.0
    }

    /// True for the default group.
    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_GROUP
    }
}

impl Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Group {
    fn from(name: &str) -> Self {
        Group::new(name)
    }
}

/// An expanded group sequence ready for evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    /// The sequence kind that was requested.
    pub name: String,
    /// Its ordered component groups.
    pub groups: Vec<Group>,
}

/// The evaluation plan computed from a validation request.
///
/// Simple groups are evaluated first (deduplicated, in request order), then
/// each sequence in turn with short-circuit semantics.
#[derive(Debug, Clone, Default)]
pub struct Groups {
    groups: IndexSet<Group>,
    sequences: Vec<Sequence>,
}

impl Groups {
    /// The simple groups, in request order.
    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.iter()
    }

    /// The expanded sequences, in request order.
    pub fn sequences(&self) -> &[Sequence] {
        &self.sequences
    }
}

/// Expands requested group kinds into an ordered evaluation plan.
#[derive(Debug, Clone, Default)]
pub struct GroupsComputer {
    sequences: IndexMap<String, Vec<String>>,
}

impl GroupsComputer {
    /// Creates a computer knowing the declared sequence kinds.
    pub fn new(sequences: IndexMap<String, Vec<String>>) -> Self {
        Self { sequences }
    }

    /// True if the given kind names a declared sequence.
    pub fn is_sequence(&self, name: &str) -> bool {
        self.sequences.contains_key(name)
    }

    /// Computes the evaluation plan for the requested groups.
    ///
    /// An empty request is treated as a request for the default group.
    /// Sequence kinds expand recursively; a cyclic sequence definition is a
    /// group definition error.
    pub fn compute(&self, requested: &[&str]) -> Result<Groups, EngineError> {
        let mut plan = Groups::default();
        if requested.is_empty() {
            plan.groups.insert(Group::default_group());
            return Ok(plan);
        }
        for &name in requested {
            if self.is_sequence(name) {
                let mut expanded = Vec::new();
                let mut stack = vec![name.to_string()];
                self.expand(name, &mut stack, &mut expanded)?;
                plan.sequences.push(Sequence {
                    name: name.into(),
                    groups: expanded,
                });
            } else {
                plan.groups.insert(Group::new(name));
            }
        }
        Ok(plan)
    }

    fn expand(
        &self,
        name: &str,
        stack: &mut Vec<String>,
        out: &mut Vec<Group>,
    ) -> Result<(), EngineError> {
        let components = self
            .sequences
            .get(name)
            .ok_or_else(|| EngineError::GroupDefinition(format!("unknown sequence {}", name)))?;
        for component in components {
            if self.is_sequence(component) {
                if stack.iter().any(|s| s == component) {
                    return Err(EngineError::GroupDefinition(format!(
                        "cyclic group sequence involving {}",
                        component
                    )));
                }
                stack.push(component.clone());
                self.expand(component, stack, out)?;
                stack.pop();
            } else {
                out.push(Group::new(component));
            }
        }
        Ok(())
    }
}
