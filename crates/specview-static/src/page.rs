use crate::error::FixtureError;
use crate::fixture::PageFixture;
use crate::render::{self, Content, HostNode, InstanceRecord, NODE_ATTR, Rendered};
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use specview_core::{
    Backing, ComponentRuntime, Document, InstanceId, InstanceKind, NodeId, Rect, SearchError,
};
use tracing::debug;

static NO_PROPS: Value = Value::Null;

/// A rendered fixture page.
///
/// Structural queries go through `scraper` over the serialized markup, the
/// instance graph is read from the render arena.
pub struct StaticPage {
    nodes: Vec<HostNode>,
    instances: Vec<InstanceRecord>,
    markup: String,
    html: Html,
}

impl StaticPage {
    pub fn render(fixture: &PageFixture) -> Result<Self, FixtureError> {
        let Rendered { nodes, instances } = render::render(fixture)?;
        let markup = render::to_html(&nodes);
        let html = Html::parse_document(&markup);
        if !html.errors.is_empty() {
            debug!("HTML parser reported {} issues: {:?}", html.errors.len(), html.errors);
        }
        check_parsed_tree(&html, &nodes)?;
        debug!(
            "Rendered page: {} nodes, {} instances",
            nodes.len(),
            instances.len()
        );
        Ok(Self {
            nodes,
            instances,
            markup,
            html,
        })
    }

    pub fn from_yaml(source: &str) -> Result<Self, FixtureError> {
        let fixture: PageFixture = serde_yaml::from_str(source)?;
        Self::render(&fixture)
    }

    pub fn from_json(source: &str) -> Result<Self, FixtureError> {
        let fixture: PageFixture = serde_json::from_str(source)?;
        Self::render(&fixture)
    }

    /// Serialized markup, as handed to the CSS engine.
    pub fn markup(&self) -> &str {
        &self.markup
    }

    /// Element carrying the given `id` attribute.
    pub fn node_by_id(&self, id: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|node| node.attr("id") == Some(id))
            .map(NodeId)
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.nodes.get(node.0)?.attr(name)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        let Some(host) = self.nodes.get(node.0) else {
            return;
        };
        for content in &host.content {
            match content {
                Content::Text(text) => out.push_str(text),
                Content::Child(child) => self.collect_text(*child, out),
            }
        }
    }
}

/// The parsed document must hold exactly the arena's elements, in the same
/// order and under the same parents.
fn check_parsed_tree(html: &Html, nodes: &[HostNode]) -> Result<(), FixtureError> {
    let mut expected = 0usize;
    for element in html.tree.root().descendants().filter_map(ElementRef::wrap) {
        let tag = element.value().name().to_string();
        let Some(id) = node_id_of(element) else {
            return Err(FixtureError::Reparented { tag, node: None });
        };
        let parent = element
            .parent()
            .and_then(ElementRef::wrap)
            .and_then(node_id_of)
            .map(NodeId);
        let in_place = id == expected && nodes.get(id).is_some_and(|n| n.parent == parent);
        if !in_place {
            return Err(FixtureError::Reparented { tag, node: Some(id) });
        }
        expected += 1;
    }
    if expected != nodes.len() {
        let tag = nodes.get(expected).map(|n| n.tag.clone()).unwrap_or_default();
        return Err(FixtureError::Reparented {
            tag,
            node: Some(expected),
        });
    }
    Ok(())
}

fn node_id_of(element: ElementRef<'_>) -> Option<usize> {
    element.value().attr(NODE_ATTR)?.parse().ok()
}

impl Document for StaticPage {
    fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn nodes(&self) -> Vec<NodeId> {
        (0..self.nodes.len()).map(NodeId).collect()
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0)?.parent
    }

    fn tag_name(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(node.0).map(|n| n.tag.as_str())
    }

    fn text(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    /// Declared rect, or the union of the children's rects when none was given.
    fn bounding_rect(&self, node: NodeId) -> Rect {
        let Some(host) = self.nodes.get(node.0) else {
            return Rect::default();
        };
        if let Some(rect) = host.rect {
            return rect;
        }
        host.children()
            .map(|child| self.bounding_rect(child))
            .filter(|rect| *rect != Rect::default())
            .reduce(|a, b| a.union(&b))
            .unwrap_or_default()
    }

    fn search(&self, scope: NodeId, selector: &str) -> Result<Vec<NodeId>, SearchError> {
        if scope.0 >= self.nodes.len() {
            return Err(SearchError::UnknownNode(scope.0));
        }
        let parsed = Selector::parse(selector).map_err(|e| SearchError::InvalidSelector {
            selector: selector.to_string(),
            reason: e.to_string(),
        })?;
        let root = self.root();
        Ok(self
            .html
            .select(&parsed)
            .filter_map(node_id_of)
            .map(NodeId)
            .filter(|node| {
                (*node != scope || scope == root) && self.is_inclusive_descendant(*node, scope)
            })
            .collect())
    }
}

impl ComponentRuntime for StaticPage {
    fn instance_for(&self, node: NodeId) -> Option<InstanceId> {
        self.nodes.get(node.0)?.instance
    }

    fn parent_instance(&self, instance: InstanceId) -> Option<InstanceId> {
        self.instances.get(instance.0)?.parent
    }

    fn next_sibling(&self, instance: InstanceId) -> Option<InstanceId> {
        self.instances.get(instance.0)?.next_sibling
    }

    fn kind(&self, instance: InstanceId) -> InstanceKind {
        // Unknown handles behave like unnamed plumbing.
        self.instances
            .get(instance.0)
            .map_or(InstanceKind::Fragment, |i| i.kind)
    }

    fn effective_name(&self, instance: InstanceId) -> Option<&str> {
        self.instances.get(instance.0)?.name.as_deref()
    }

    fn props(&self, instance: InstanceId) -> &Value {
        self.instances
            .get(instance.0)
            .map_or(&NO_PROPS, |i| &i.props)
    }

    fn backing(&self, instance: InstanceId) -> Backing {
        self.instances
            .get(instance.0)
            .map_or(Backing::None, |i| i.backing)
    }
}
