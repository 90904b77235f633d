//! Property-path representation for locating validated elements.
//!
//! This module provides [`PropertyPath`] and [`PathNode`] types for building
//! and representing paths to the elements a violation refers to: bean
//! properties, container elements, executable parameters and return values.

use std::fmt::{self, Display};

use crate::value::ContainerKind;

/// A single node of a property path.
///
/// Paths are built from nodes that represent property access, container
/// positions (index/key), executable roots and the special leaf markers used
/// by cross-parameter and return-value validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathNode {
    /// A named property of a bean (e.g. `name`, `address`).
    Property(String),
    /// A position inside an indexed container (e.g. `[0]`).
    Index(usize),
    /// A key inside a keyed container (e.g. `[shipping]`).
    Key(String),
    /// A parameter of an executable, carrying its declared name and index.
    Parameter { name: String, index: usize },
    /// The return value of an executable.
    ReturnValue,
    /// The whole parameter array of an executable.
    CrossParameter,
    /// A container-element position (e.g. `<map value>`). Bare nodes
    /// (`name == None`) contribute nothing to the rendered path.
    ContainerElement {
        name: Option<String>,
        container: ContainerKind,
        type_arg: usize,
    },
    /// The bean itself, appended when a class-level violation is reported
    /// against a traversed bean.
    Bean,
    /// The root node of a method-validation path.
    Method(String),
    /// The root node of a constructor-validation path.
    Constructor(String),
}

impl PathNode {
    /// Creates a property node.
    pub fn property(name: impl Into<String>) -> Self {
        PathNode::Property(name.into())
    }

    /// Creates an index node.
    pub fn index(i: usize) -> Self {
        PathNode::Index(i)
    }

    /// Creates a key node.
    pub fn key(k: impl Into<String>) -> Self {
        PathNode::Key(k.into())
    }

    /// Creates a parameter node.
    pub fn parameter(name: impl Into<String>, index: usize) -> Self {
        PathNode::Parameter {
            name: name.into(),
            index,
        }
    }

    /// Creates a container-element node.
    pub fn container_element(
        name: Option<&str>,
        container: ContainerKind,
        type_arg: usize,
    ) -> Self {
        PathNode::ContainerElement {
            name: name.map(Into::into),
            container,
            type_arg,
        }
    }

    /// The name this node contributes when rendered, if any.
    fn rendered_name(&self) -> Option<&str> {
        match self {
            PathNode::Property(name) => Some(name),
            PathNode::Parameter { name, .. } => Some(name),
            PathNode::ReturnValue => Some("<return value>"),
            PathNode::CrossParameter => Some("<cross-parameter>"),
            PathNode::ContainerElement { name, .. } => name.as_deref(),
            PathNode::Method(name) => Some(name),
            PathNode::Constructor(name) => Some(name),
            PathNode::Index(_) | PathNode::Key(_) | PathNode::Bean => None,
        }
    }
}

/// A path to a validated element.
///
/// `PropertyPath` represents locations like `users[0].email` or
/// `placeOrder.quantity` and provides methods for building paths
/// incrementally. Paths handed to user code are always fresh copies; the
/// engine mutates paths in place only while assembling them.
///
/// # Example
///
/// ```rust
/// use verdict::{PathNode, PropertyPath};
///
/// let path = PropertyPath::root()
///     .child(PathNode::property("users"))
///     .child(PathNode::index(0))
///     .child(PathNode::property("email"));
///
/// assert_eq!(path.to_string(), "users[0].email");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct PropertyPath {
    nodes: Vec<PathNode>,
}

impl PropertyPath {
    /// Creates an empty path representing the root object.
    pub fn root() -> Self {
        Self::default()
    }

    /// Creates a path from the given nodes.
    pub fn of(nodes: impl IntoIterator<Item = PathNode>) -> Self {
        Self {
            nodes: nodes.into_iter().collect(),
        }
    }

    /// Returns a new path with the given node appended.
    ///
    /// This method does not modify the original path; it returns a new one.
    pub fn child(&self, node: PathNode) -> Self {
        let mut nodes = self.nodes.clone();
        nodes.push(node);
        Self { nodes }
    }

    /// Appends a node in place.
    pub fn append(&mut self, node: PathNode) {
        self.nodes.push(node);
    }

    /// Removes and returns the leaf node, if any.
    pub fn remove_leaf(&mut self) -> Option<PathNode> {
        self.nodes.pop()
    }

    /// Returns true if this is the root path (no nodes).
    pub fn is_root(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the number of nodes in this path.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if this path has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns an iterator over the path nodes.
    pub fn nodes(&self) -> impl Iterator<Item = &PathNode> {
        self.nodes.iter()
    }

    /// Returns the parent path (all nodes except the leaf), or None at root.
    pub fn parent(&self) -> Option<Self> {
        if self.nodes.is_empty() {
            None
        } else {
            Some(Self {
                nodes: self.nodes[..self.nodes.len() - 1].to_vec(),
            })
        }
    }

    /// Returns the leaf node, or None at root.
    pub fn leaf(&self) -> Option<&PathNode> {
        self.nodes.last()
    }
}

impl Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut written = false;
        for node in &self.nodes {
            match node {
                PathNode::Index(i) => {
                    write!(f, "[{}]", i)?;
                    written = true;
                }
                PathNode::Key(k) => {
                    write!(f, "[{}]", k)?;
                    written = true;
                }
                other => {
                    if let Some(name) = other.rendered_name() {
                        if written {
                            write!(f, ".")?;
                        }
                        write!(f, "{}", name)?;
                        written = true;
                    }
                }
            }
        }
        Ok(())
    }
}
