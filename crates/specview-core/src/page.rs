//! Page abstraction
//!
//! The engine never owns the page. It reads the structural document and the
//! component-instance graph through these two traits, which together form a
//! [`Page`]. Implementations:
//! - `specview-static`: fixture-rendered pages backed by the `scraper` CSS engine
//! - Tests: hand-built graphs

use crate::error::SearchError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Handle of a structural node.
///
/// Pages must hand out ids whose ordering is document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

/// Handle of a component instance in the runtime's instance graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub usize);

/// Identity of a durable object backing a component instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectKey(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "instance#{}", self.0)
    }
}

/// What an instance is backed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backing {
    /// Host instances are backed by the structural node they render.
    Node(NodeId),
    Object(ObjectKey),
    /// No durable object; identity has to be derived from position.
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceKind {
    /// Top of the instance graph.
    Root,
    /// Instance of a structural element. Marks a structural boundary.
    Host,
    /// Stateful component with a backing object.
    Class,
    /// Stateless component. Anonymous by design.
    Function,
    /// Relocation point: children render under another structural parent.
    Portal,
    Fragment,
    Memo,
    ForwardRef,
}

impl InstanceKind {
    pub fn is_host(self) -> bool {
        matches!(self, InstanceKind::Host)
    }

    /// Whether a matched instance of this kind can be introspected for props.
    ///
    /// Kinds with a backing object are fine, as are function components which
    /// carry props without ever having a backing object. Everything else is
    /// invisible to the adapter.
    pub fn is_introspectable(self, backing: Backing) -> bool {
        match self {
            InstanceKind::Function => true,
            InstanceKind::Memo | InstanceKind::ForwardRef => false,
            _ => !matches!(backing, Backing::None),
        }
    }
}

impl fmt::Display for InstanceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InstanceKind::Root => "root",
            InstanceKind::Host => "host",
            InstanceKind::Class => "class",
            InstanceKind::Function => "function",
            InstanceKind::Portal => "portal",
            InstanceKind::Fragment => "fragment",
            InstanceKind::Memo => "memo",
            InstanceKind::ForwardRef => "forward_ref",
        };
        f.write_str(name)
    }
}

/// Axis-aligned box in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    /// Smallest rectangle containing both.
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = (self.x + self.width).max(other.x + other.width);
        let bottom = (self.y + self.height).max(other.y + other.height);
        Rect {
            x,
            y,
            width: right - x,
            height: bottom - y,
        }
    }
}

/// Read access to the structural document.
pub trait Document {
    /// The document root element.
    fn root(&self) -> NodeId;

    /// Every element, in document order.
    fn nodes(&self) -> Vec<NodeId>;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    fn tag_name(&self, node: NodeId) -> Option<&str>;

    /// Rendered text of the node and its descendants.
    fn text(&self, node: NodeId) -> String;

    fn bounding_rect(&self, node: NodeId) -> Rect;

    /// Descendants of `scope` matching a structural selector, in document order.
    ///
    /// When `scope` is the document root the root element itself is a
    /// candidate as well.
    fn search(&self, scope: NodeId, selector: &str) -> Result<Vec<NodeId>, SearchError>;

    /// Whether `node` is `ancestor` or lies beneath it.
    fn is_inclusive_descendant(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }
}

/// Read access to the component-instance graph.
pub trait ComponentRuntime {
    /// The host instance rendering `node`, if the node belongs to the runtime.
    fn instance_for(&self, node: NodeId) -> Option<InstanceId>;

    /// The "return" link.
    fn parent_instance(&self, instance: InstanceId) -> Option<InstanceId>;

    fn next_sibling(&self, instance: InstanceId) -> Option<InstanceId>;

    fn kind(&self, instance: InstanceId) -> InstanceKind;

    /// Display name if the type declares one, the type name otherwise.
    fn effective_name(&self, instance: InstanceId) -> Option<&str>;

    fn props(&self, instance: InstanceId) -> &Value;

    fn backing(&self, instance: InstanceId) -> Backing;
}

/// A page: structural document plus component runtime.
pub trait Page: Document + ComponentRuntime {
    fn as_document(&self) -> &dyn Document;
    fn as_runtime(&self) -> &dyn ComponentRuntime;
}

impl<T: Document + ComponentRuntime> Page for T {
    fn as_document(&self) -> &dyn Document {
        self
    }

    fn as_runtime(&self) -> &dyn ComponentRuntime {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_union() {
        let a = Rect {
            x: 10.0,
            y: 10.0,
            width: 20.0,
            height: 20.0,
        };
        let b = Rect {
            x: 0.0,
            y: 25.0,
            width: 5.0,
            height: 50.0,
        };
        let u = a.union(&b);
        assert_eq!(
            u,
            Rect {
                x: 0.0,
                y: 10.0,
                width: 30.0,
                height: 65.0
            }
        );
    }

    #[test]
    fn test_introspectable_kinds() {
        assert!(InstanceKind::Class.is_introspectable(Backing::Object(ObjectKey(1))));
        assert!(InstanceKind::Function.is_introspectable(Backing::None));
        assert!(!InstanceKind::Memo.is_introspectable(Backing::None));
        assert!(!InstanceKind::ForwardRef.is_introspectable(Backing::None));
        assert!(!InstanceKind::Class.is_introspectable(Backing::None));
    }
}
