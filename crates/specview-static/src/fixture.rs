//! Declarative page fixtures.
//!
//! ```yaml
//! markup:
//!   - tag: ul
//!     attrs: { class: cats }
//!     children:
//!       - { tag: li, text: Amy }
//! app:
//!   - component: Form
//!     props: { name: signup }
//!     children:
//!       - tag: div
//!         children:
//!           - { tag: button, text: Go, rect: { x: 0, y: 0, width: 40, height: 20 } }
//!       - portal: body
//!         children:
//!           - { component: Tooltip, kind: function, children: [ { tag: span, text: hint } ] }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use specview_core::{InstanceKind, Rect};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageFixture {
    /// Plain nodes outside the component runtime.
    #[serde(default)]
    pub markup: Vec<FixtureNode>,
    /// Nodes rendered through the runtime into `div#root`.
    #[serde(default)]
    pub app: Vec<FixtureNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FixtureNode {
    Text(String),
    Component(ComponentNode),
    Portal(PortalNode),
    Element(ElementNode),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ElementNode {
    pub tag: String,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    /// Text placed before the children.
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub rect: Option<Rect>,
    #[serde(default)]
    pub children: Vec<FixtureNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComponentNode {
    pub component: String,
    #[serde(default)]
    pub kind: ComponentKind,
    /// Takes precedence over `component` when matching by name.
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub props: Value,
    #[serde(default)]
    pub children: Vec<FixtureNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortalNode {
    /// `body` or the id of an element.
    pub portal: String,
    #[serde(default)]
    pub children: Vec<FixtureNode>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    #[default]
    Class,
    Function,
    Memo,
    ForwardRef,
    Fragment,
}

impl From<ComponentKind> for InstanceKind {
    fn from(kind: ComponentKind) -> Self {
        match kind {
            ComponentKind::Class => InstanceKind::Class,
            ComponentKind::Function => InstanceKind::Function,
            ComponentKind::Memo => InstanceKind::Memo,
            ComponentKind::ForwardRef => InstanceKind::ForwardRef,
            ComponentKind::Fragment => InstanceKind::Fragment,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_forms() {
        let fixture: PageFixture = serde_yaml::from_str(
            r#"
app:
  - component: Cat
    kind: function
    props: { name: Amy }
    children:
      - tag: span
        text: Amy
      - plain text
      - portal: body
        children: []
"#,
        )
        .unwrap();
        assert!(fixture.markup.is_empty());
        let FixtureNode::Component(cat) = &fixture.app[0] else {
            panic!("expected a component");
        };
        assert_eq!(cat.kind, ComponentKind::Function);
        assert!(matches!(cat.children[0], FixtureNode::Element(_)));
        assert!(matches!(cat.children[1], FixtureNode::Text(_)));
        assert!(matches!(cat.children[2], FixtureNode::Portal(_)));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let parsed: Result<PageFixture, _> =
            serde_yaml::from_str("app:\n  - { tag: div, colour: red }\n");
        assert!(parsed.is_err());
    }
}
