//! Fixture rendering.
//!
//! Produces the structural tree and the component-instance graph side by
//! side, then renumbers nodes into document order and serializes the tree to
//! HTML for the CSS engine. Every element carries its id in
//! [`NODE_ATTR`] so CSS matches map back to arena nodes.

use crate::error::FixtureError;
use crate::fixture::{ComponentKind, FixtureNode, PageFixture, PortalNode};
use serde_json::{Map, Value};
use specview_core::{Backing, InstanceId, InstanceKind, NodeId, ObjectKey, Rect};
use std::collections::VecDeque;
use std::fmt::Write;

pub const NODE_ATTR: &str = "data-specview-node";

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

#[derive(Debug, Clone)]
pub enum Content {
    Text(String),
    Child(NodeId),
}

#[derive(Debug, Clone)]
pub struct HostNode {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub content: Vec<Content>,
    pub parent: Option<NodeId>,
    pub rect: Option<Rect>,
    pub instance: Option<InstanceId>,
}

impl HostNode {
    pub fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.content.iter().filter_map(|c| match c {
            Content::Child(child) => Some(*child),
            Content::Text(_) => None,
        })
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct InstanceRecord {
    pub parent: Option<InstanceId>,
    pub next_sibling: Option<InstanceId>,
    pub kind: InstanceKind,
    pub name: Option<String>,
    pub props: Value,
    pub backing: Backing,
}

#[derive(Debug)]
pub struct Rendered {
    pub nodes: Vec<HostNode>,
    pub instances: Vec<InstanceRecord>,
}

pub fn render(fixture: &PageFixture) -> Result<Rendered, FixtureError> {
    let mut renderer = Renderer::default();
    let html = renderer.element(None, "html", Vec::new(), None)?;
    renderer.element(Some(html), "head", Vec::new(), None)?;
    let body = renderer.element(Some(html), "body", Vec::new(), None)?;

    for node in &fixture.markup {
        renderer.render_markup(node, body)?;
    }

    let mount = renderer.element(
        Some(body),
        "div",
        vec![("id".to_string(), "root".to_string())],
        None,
    )?;
    let root = renderer.instance(None, InstanceKind::Root, None, Value::Null, Backing::None);
    let key = renderer.next_object();
    renderer.instances[root.0].backing = Backing::Object(key);

    for node in &fixture.app {
        renderer.render_app(node, mount, root)?;
    }
    // Portal children land after everything already in their target.
    while let Some((portal, instance)) = renderer.pending.pop_front() {
        let target = renderer.portal_target(&portal.portal, body)?;
        for child in &portal.children {
            renderer.render_app(child, target, instance)?;
        }
    }

    Ok(renderer.finish())
}

#[derive(Default)]
struct Renderer<'f> {
    nodes: Vec<HostNode>,
    instances: Vec<InstanceRecord>,
    children: Vec<Vec<InstanceId>>,
    next_object: u64,
    pending: VecDeque<(&'f PortalNode, InstanceId)>,
}

impl<'f> Renderer<'f> {
    fn next_object(&mut self) -> ObjectKey {
        self.next_object += 1;
        ObjectKey(self.next_object)
    }

    fn element(
        &mut self,
        parent: Option<NodeId>,
        tag: &str,
        attrs: Vec<(String, String)>,
        rect: Option<Rect>,
    ) -> Result<NodeId, FixtureError> {
        let valid = !tag.is_empty()
            && tag.starts_with(|c: char| c.is_ascii_alphabetic())
            && tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !valid {
            return Err(FixtureError::InvalidTag(tag.to_string()));
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(HostNode {
            tag: tag.to_ascii_lowercase(),
            attrs,
            content: Vec::new(),
            parent,
            rect,
            instance: None,
        });
        if let Some(parent) = parent {
            self.nodes[parent.0].content.push(Content::Child(id));
        }
        Ok(id)
    }

    fn instance(
        &mut self,
        parent: Option<InstanceId>,
        kind: InstanceKind,
        name: Option<String>,
        props: Value,
        backing: Backing,
    ) -> InstanceId {
        let id = InstanceId(self.instances.len());
        self.instances.push(InstanceRecord {
            parent,
            next_sibling: None,
            kind,
            name,
            props,
            backing,
        });
        self.children.push(Vec::new());
        if let Some(parent) = parent {
            self.children[parent.0].push(id);
        }
        id
    }

    fn text(&mut self, parent: NodeId, text: &str) {
        self.nodes[parent.0].content.push(Content::Text(text.to_string()));
    }

    fn render_markup(&mut self, node: &'f FixtureNode, parent: NodeId) -> Result<(), FixtureError> {
        match node {
            FixtureNode::Text(text) => self.text(parent, text),
            FixtureNode::Element(element) => {
                let attrs = element.attrs.clone().into_iter().collect();
                let id = self.element(Some(parent), &element.tag, attrs, element.rect)?;
                if let Some(text) = &element.text {
                    self.text(id, text);
                }
                for child in &element.children {
                    self.render_markup(child, id)?;
                }
            }
            FixtureNode::Component(component) => {
                return Err(FixtureError::ComponentOutsideApp(component.component.clone()));
            }
            FixtureNode::Portal(portal) => {
                return Err(FixtureError::ComponentOutsideApp(format!(
                    "portal to {}",
                    portal.portal
                )));
            }
        }
        Ok(())
    }

    fn render_app(
        &mut self,
        node: &'f FixtureNode,
        parent: NodeId,
        owner: InstanceId,
    ) -> Result<(), FixtureError> {
        match node {
            FixtureNode::Text(text) => self.text(parent, text),
            FixtureNode::Element(element) => {
                let attrs = element.attrs.clone().into_iter().collect();
                let id = self.element(Some(parent), &element.tag, attrs, element.rect)?;
                let host = self.instance(
                    Some(owner),
                    InstanceKind::Host,
                    Some(element.tag.clone()),
                    Value::Null,
                    Backing::Node(id),
                );
                self.nodes[id.0].instance = Some(host);
                if let Some(text) = &element.text {
                    self.text(id, text);
                }
                for child in &element.children {
                    self.render_app(child, id, host)?;
                }
            }
            FixtureNode::Component(component) => {
                let backing = match component.kind {
                    ComponentKind::Class => Backing::Object(self.next_object()),
                    _ => Backing::None,
                };
                let name = match component.kind {
                    ComponentKind::Fragment => None,
                    _ => Some(
                        component
                            .display_name
                            .clone()
                            .unwrap_or_else(|| component.component.clone()),
                    ),
                };
                let props = match &component.props {
                    Value::Null => Value::Object(Map::new()),
                    props => props.clone(),
                };
                let instance =
                    self.instance(Some(owner), component.kind.into(), name, props, backing);
                for child in &component.children {
                    self.render_app(child, parent, instance)?;
                }
            }
            FixtureNode::Portal(portal) => {
                let instance = self.instance(
                    Some(owner),
                    InstanceKind::Portal,
                    None,
                    Value::Null,
                    Backing::None,
                );
                self.pending.push_back((portal, instance));
            }
        }
        Ok(())
    }

    fn portal_target(&self, target: &str, body: NodeId) -> Result<NodeId, FixtureError> {
        if target == "body" {
            return Ok(body);
        }
        self.nodes
            .iter()
            .position(|node| node.attr("id") == Some(target))
            .map(NodeId)
            .ok_or_else(|| FixtureError::UnknownPortalTarget(target.to_string()))
    }

    fn finish(mut self) -> Rendered {
        for siblings in &self.children {
            for pair in siblings.windows(2) {
                self.instances[pair[0].0].next_sibling = Some(pair[1]);
            }
        }
        let nodes = into_document_order(self.nodes, &mut self.instances);
        Rendered {
            nodes,
            instances: self.instances,
        }
    }
}

/// Renumber nodes so that ids follow a pre-order walk from the root.
fn into_document_order(nodes: Vec<HostNode>, instances: &mut [InstanceRecord]) -> Vec<HostNode> {
    let mut order = Vec::with_capacity(nodes.len());
    let mut stack = vec![NodeId(0)];
    while let Some(id) = stack.pop() {
        order.push(id);
        let children: Vec<NodeId> = nodes[id.0].children().collect();
        stack.extend(children.into_iter().rev());
    }

    let mut remap = vec![NodeId(0); nodes.len()];
    for (new, old) in order.iter().enumerate() {
        remap[old.0] = NodeId(new);
    }

    let mut slots: Vec<Option<HostNode>> = nodes.into_iter().map(Some).collect();
    let mut ordered = Vec::with_capacity(order.len());
    for old in order {
        if let Some(mut node) = slots[old.0].take() {
            node.parent = node.parent.map(|p| remap[p.0]);
            for content in &mut node.content {
                if let Content::Child(child) = content {
                    *child = remap[child.0];
                }
            }
            ordered.push(node);
        }
    }

    for instance in instances.iter_mut() {
        if let Backing::Node(node) = instance.backing {
            instance.backing = Backing::Node(remap[node.0]);
        }
    }
    ordered
}

/// Serialize the arena rooted at node 0.
pub fn to_html(nodes: &[HostNode]) -> String {
    let mut out = String::from("<!DOCTYPE html>");
    if !nodes.is_empty() {
        write_node(nodes, NodeId(0), &mut out);
    }
    out
}

fn write_node(nodes: &[HostNode], id: NodeId, out: &mut String) {
    let node = &nodes[id.0];
    let _ = write!(out, "<{} {}=\"{}\"", node.tag, NODE_ATTR, id.0);
    for (name, value) in &node.attrs {
        if name == NODE_ATTR {
            continue;
        }
        let _ = write!(out, " {}=\"{}\"", name, escape(value, true));
    }
    out.push('>');
    if VOID_TAGS.contains(&node.tag.as_str()) {
        return;
    }
    for content in &node.content {
        match content {
            Content::Text(text) => out.push_str(&escape(text, false)),
            Content::Child(child) => write_node(nodes, *child, out),
        }
    }
    let _ = write!(out, "</{}>", node.tag);
}

fn escape(raw: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(yaml: &str) -> PageFixture {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_document_shape() {
        let rendered = render(&fixture("markup:\n  - { tag: p, text: hi }\n")).unwrap();
        let tags: Vec<&str> = rendered.nodes.iter().map(|n| n.tag.as_str()).collect();
        assert_eq!(tags, vec!["html", "head", "body", "p", "div"]);
        assert_eq!(rendered.nodes[4].attr("id"), Some("root"));
        assert_eq!(rendered.instances.len(), 1);
        assert_eq!(rendered.instances[0].kind, InstanceKind::Root);
    }

    #[test]
    fn test_portal_children_follow_target_content() {
        let rendered = render(&fixture(
            r#"
app:
  - component: Dialog
    children:
      - portal: body
        children:
          - { tag: aside, text: overlay }
      - { tag: main }
"#,
        ))
        .unwrap();
        let tags: Vec<&str> = rendered.nodes.iter().map(|n| n.tag.as_str()).collect();
        assert_eq!(tags, vec!["html", "head", "body", "div", "main", "aside"]);
        assert_eq!(rendered.nodes[5].parent, Some(NodeId(2)));

        // aside's host hangs off the portal, which hangs off Dialog.
        let host = rendered.nodes[5].instance.unwrap();
        let portal = rendered.instances[host.0].parent.unwrap();
        assert_eq!(rendered.instances[portal.0].kind, InstanceKind::Portal);
        let dialog = rendered.instances[portal.0].parent.unwrap();
        assert_eq!(rendered.instances[dialog.0].name.as_deref(), Some("Dialog"));
        assert!(matches!(
            rendered.instances[host.0].backing,
            Backing::Node(NodeId(5))
        ));
    }

    #[test]
    fn test_sibling_links() {
        let rendered = render(&fixture(
            r#"
app:
  - { component: A, kind: function }
  - { component: B, kind: function }
  - { component: C, kind: function }
"#,
        ))
        .unwrap();
        let names: Vec<_> = rendered.instances.iter().map(|i| i.name.clone()).collect();
        assert_eq!(names[1..], [Some("A".into()), Some("B".into()), Some("C".into())]);
        assert_eq!(rendered.instances[1].next_sibling, Some(InstanceId(2)));
        assert_eq!(rendered.instances[2].next_sibling, Some(InstanceId(3)));
        assert_eq!(rendered.instances[3].next_sibling, None);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            render(&fixture("app:\n  - { portal: nowhere }\n")),
            Err(FixtureError::UnknownPortalTarget(t)) if t == "nowhere"
        ));
        assert!(matches!(
            render(&fixture("markup:\n  - { component: Foo }\n")),
            Err(FixtureError::ComponentOutsideApp(_))
        ));
        assert!(matches!(
            render(&fixture("markup:\n  - { tag: 'div onclick=x' }\n")),
            Err(FixtureError::InvalidTag(_))
        ));
    }

    #[test]
    fn test_html_serialization() {
        let rendered = render(&fixture(
            r#"
markup:
  - tag: p
    attrs: { title: 'a "quoted" <title>' }
    children:
      - '1 < 2 & 3'
      - { tag: br }
"#,
        ))
        .unwrap();
        let html = to_html(&rendered.nodes);
        assert!(html.contains(
            r#"<p data-specview-node="3" title="a &quot;quoted&quot; &lt;title&gt;">1 &lt; 2 &amp; 3<br data-specview-node="4"></p>"#
        ));
        assert!(html.ends_with("</html>"));
    }
}
