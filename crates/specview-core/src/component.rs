//! Component tree adapter.
//!
//! Bridges the structural document and the component-instance graph: which
//! component directly owns a node, which nodes a component renders, and the
//! scope-aware descendant search behind `@Component` segments.
//!
//! The instance graph is only ever walked leaf to root. Enumerating the
//! document in order and climbing from each node's host instance keeps the
//! results in document order and jumps through portals for free.

use crate::error::EngineError;
use crate::identity::{Identity, IdentityResolver};
use crate::matcher::PropertyMatcher;
use crate::page::{InstanceId, NodeId, Page};
use crate::selector::ComponentQuery;
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// Where a component search is rooted.
#[derive(Debug, Clone, PartialEq)]
pub enum Scope {
    /// The whole component-instance graph.
    Root,
    /// Strict descendants of any of these instances.
    Instances(Vec<InstanceId>),
}

pub struct ComponentAdapter<'a> {
    page: &'a dyn Page,
    matcher: &'a dyn PropertyMatcher,
    identity: &'a mut IdentityResolver,
}

impl<'a> ComponentAdapter<'a> {
    pub fn new(
        page: &'a dyn Page,
        matcher: &'a dyn PropertyMatcher,
        identity: &'a mut IdentityResolver,
    ) -> Self {
        Self {
            page,
            matcher,
            identity,
        }
    }

    pub fn page(&self) -> &'a dyn Page {
        self.page
    }

    /// Component instances that directly own `node`, nearest first.
    ///
    /// The walk ends at the next host instance: anything above it owns that
    /// host, not `node`. Empty for nodes outside the runtime.
    pub fn owner_chain(&self, node: NodeId) -> Vec<InstanceId> {
        let mut chain = Vec::new();
        let Some(host) = self.page.instance_for(node) else {
            return chain;
        };
        let mut cursor = self.page.parent_instance(host);
        while let Some(instance) = cursor {
            if self.page.kind(instance).is_host() {
                break;
            }
            chain.push(instance);
            cursor = self.page.parent_instance(instance);
        }
        chain
    }

    /// Nearest direct owner of `node` satisfying `query` (any owner if `None`).
    pub fn owner_of(&self, node: NodeId, query: Option<&ComponentQuery>) -> Option<InstanceId> {
        self.owner_chain(node)
            .into_iter()
            .find(|instance| query.is_none_or(|q| self.is_match(*instance, q)))
    }

    /// Structural nodes directly owned by `instance`, in document order.
    ///
    /// Scans the whole document so nodes relocated through a portal are
    /// included.
    pub fn elements_of(&mut self, instance: InstanceId) -> Vec<NodeId> {
        let page = self.page;
        let target = self.identity.of_instance(page.as_runtime(), instance);
        let mut elements = Vec::new();
        for node in page.nodes() {
            let owned = self
                .owner_chain(node)
                .into_iter()
                .any(|owner| self.identity.of_instance(page.as_runtime(), owner) == target);
            if owned {
                elements.push(node);
            }
        }
        elements
    }

    /// Nodes owned by any of `instances`, in document order.
    pub fn elements_of_all(&mut self, instances: &[InstanceId]) -> Vec<NodeId> {
        let mut nodes = Vec::new();
        for instance in instances {
            nodes.extend(self.elements_of(*instance));
        }
        nodes.sort();
        nodes.dedup();
        nodes
    }

    /// Structural search across the component boundary.
    ///
    /// Searches from the parent of every element the components render and
    /// keeps matches that are one of those elements or lie inside one.
    pub fn search_within(
        &mut self,
        instances: &[InstanceId],
        selector: &str,
    ) -> Result<Vec<NodeId>, EngineError> {
        let mut found = Vec::new();
        for instance in instances {
            let elements = self.elements_of(*instance);
            let mut bases: Vec<NodeId> = elements
                .iter()
                .map(|e| self.page.parent(*e).unwrap_or(*e))
                .collect();
            bases.sort();
            bases.dedup();
            for base in bases {
                for hit in self.page.search(base, selector)? {
                    if elements
                        .iter()
                        .any(|e| self.page.is_inclusive_descendant(hit, *e))
                    {
                        found.push(hit);
                    }
                }
            }
        }
        found.sort();
        found.dedup();
        Ok(found)
    }

    /// Components matching `query` below `scope`, deduplicated by identity
    /// and in document order.
    pub fn find_descendants(
        &mut self,
        scope: &Scope,
        query: &ComponentQuery,
    ) -> Result<Vec<InstanceId>, EngineError> {
        let page = self.page;
        let runtime = page.as_runtime();
        let scope_ids: Option<HashSet<Identity>> = match scope {
            Scope::Root => None,
            Scope::Instances(instances) if instances.is_empty() => return Ok(Vec::new()),
            Scope::Instances(instances) => Some(
                instances
                    .iter()
                    .map(|i| self.identity.of_instance(runtime, *i))
                    .collect(),
            ),
        };

        let mut in_scope_memo: HashMap<InstanceId, bool> = HashMap::new();
        let mut seen: HashSet<Identity> = HashSet::new();
        let mut results = Vec::new();
        let mut visited = 0usize;

        for node in page.nodes() {
            let mut path = Vec::new();
            let mut cursor = page.instance_for(node);
            while let Some(instance) = cursor {
                let identity = self.identity.of_instance(runtime, instance);
                if seen.contains(&identity) {
                    break;
                }
                visited += 1;
                if self.is_match(instance, query) {
                    let in_scope = match &scope_ids {
                        None => true,
                        Some(ids) => self.in_scope(instance, ids, &mut in_scope_memo),
                    };
                    if in_scope {
                        self.validate(instance, &query.name)?;
                        path.push(instance);
                    }
                }
                seen.insert(identity);
                cursor = page.parent_instance(instance);
            }
            path.reverse();
            results.extend(path);
        }

        trace!(
            "find_descendants @{}: visited {} instances, {} matches",
            query.name,
            visited,
            results.len()
        );
        Ok(results)
    }

    /// Components matching `query` below structural context nodes.
    ///
    /// Nodes inside the runtime scope the search through their host
    /// instances. Nodes outside it admit any component rendering an element
    /// strictly inside them.
    pub fn find_below_nodes(
        &mut self,
        nodes: &[NodeId],
        query: &ComponentQuery,
    ) -> Result<Vec<InstanceId>, EngineError> {
        let mut hosts = Vec::new();
        let mut outside = Vec::new();
        for node in nodes {
            match self.page.instance_for(*node) {
                Some(host) => hosts.push(host),
                None => outside.push(*node),
            }
        }

        let scoped = self.find_descendants(&Scope::Instances(hosts), query)?;
        if outside.is_empty() {
            return Ok(scoped);
        }

        let page = self.page;
        let runtime = page.as_runtime();
        let scoped_ids: HashSet<Identity> = scoped
            .iter()
            .map(|i| self.identity.of_instance(runtime, *i))
            .collect();
        let mut kept = Vec::new();
        for candidate in self.find_descendants(&Scope::Root, query)? {
            if scoped_ids.contains(&self.identity.of_instance(runtime, candidate)) {
                kept.push(candidate);
                continue;
            }
            let inside = self.elements_of(candidate).into_iter().any(|element| {
                outside
                    .iter()
                    .any(|o| element != *o && page.is_inclusive_descendant(element, *o))
            });
            if inside {
                kept.push(candidate);
            }
        }
        Ok(kept)
    }

    pub fn is_match(&self, instance: InstanceId, query: &ComponentQuery) -> bool {
        if self.page.kind(instance).is_host() {
            return false;
        }
        self.page.effective_name(instance) == Some(query.name.as_str())
            && self
                .matcher
                .matches(&query.predicate, self.page.props(instance))
    }

    fn validate(&self, instance: InstanceId, name: &str) -> Result<(), EngineError> {
        let kind = self.page.kind(instance);
        if kind.is_introspectable(self.page.backing(instance)) {
            Ok(())
        } else {
            Err(EngineError::UnsupportedComponentKind {
                name: name.to_string(),
                kind,
            })
        }
    }

    /// Whether some ancestor of `instance` is in `scope`, memoized per instance.
    fn in_scope(
        &mut self,
        instance: InstanceId,
        scope: &HashSet<Identity>,
        memo: &mut HashMap<InstanceId, bool>,
    ) -> bool {
        let page = self.page;
        let runtime = page.as_runtime();
        let mut chain = Vec::new();
        let mut cursor = instance;
        let answer = loop {
            if let Some(known) = memo.get(&cursor) {
                break *known;
            }
            chain.push(cursor);
            match runtime.parent_instance(cursor) {
                None => break false,
                Some(parent) => {
                    if scope.contains(&self.identity.of_instance(runtime, parent)) {
                        break true;
                    }
                    cursor = parent;
                }
            }
        };
        for member in chain {
            memo.insert(member, answer);
        }
        answer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SearchError;
    use crate::matcher::QueryMatcher;
    use crate::page::{Backing, ComponentRuntime, Document, InstanceKind, ObjectKey, Rect};
    use crate::selector::Predicate;
    use serde_json::{Value, json};

    /// Hand-built page:
    ///
    /// ```text
    /// nodes:  0 div#root
    ///           1 ul            (host of List)
    ///             2 li          (host of Item a)
    ///             3 li          (host of Item b)
    ///         4 div.portal      (host of Tooltip, portalled out of List via a memo)
    /// instances: 0 root, 1 List(class), 2 host ul, 3 Item a(class),
    ///            4 host li, 5 Item b(function), 6 host li, 7 portal,
    ///            8 Tooltip(class), 9 host div, 10 host div#root, 11 Memo
    /// ```
    struct Fixture {
        parents: Vec<Option<usize>>,
        nodes: Vec<(Option<usize>, &'static str, Option<usize>)>,
        kinds: Vec<(InstanceKind, Option<&'static str>, Backing)>,
        props: Vec<Value>,
    }

    fn fixture() -> Fixture {
        Fixture {
            parents: vec![
                None,
                Some(10),
                Some(1),
                Some(2),
                Some(3),
                Some(2),
                Some(5),
                Some(11),
                Some(7),
                Some(8),
                Some(0),
                Some(1),
            ],
            nodes: vec![
                (None, "div", Some(10)),
                (Some(0), "ul", Some(2)),
                (Some(1), "li", Some(4)),
                (Some(1), "li", Some(6)),
                (Some(0), "div", Some(9)),
            ],
            kinds: vec![
                (InstanceKind::Root, None, Backing::Object(ObjectKey(1))),
                (InstanceKind::Class, Some("List"), Backing::Object(ObjectKey(2))),
                (InstanceKind::Host, Some("ul"), Backing::Node(NodeId(1))),
                (InstanceKind::Class, Some("Item"), Backing::Object(ObjectKey(3))),
                (InstanceKind::Host, Some("li"), Backing::Node(NodeId(2))),
                (InstanceKind::Function, Some("Item"), Backing::None),
                (InstanceKind::Host, Some("li"), Backing::Node(NodeId(3))),
                (InstanceKind::Portal, None, Backing::None),
                (InstanceKind::Class, Some("Tooltip"), Backing::Object(ObjectKey(4))),
                (InstanceKind::Host, Some("div"), Backing::Node(NodeId(4))),
                (InstanceKind::Host, Some("div"), Backing::Node(NodeId(0))),
                (InstanceKind::Memo, Some("Wrapped"), Backing::None),
            ],
            props: vec![
                Value::Null,
                json!({}),
                Value::Null,
                json!({"label": "a"}),
                Value::Null,
                json!({"label": "b"}),
                Value::Null,
                Value::Null,
                json!({}),
                Value::Null,
                Value::Null,
                json!({}),
            ],
        }
    }

    impl Document for Fixture {
        fn root(&self) -> NodeId {
            NodeId(0)
        }
        fn nodes(&self) -> Vec<NodeId> {
            (0..self.nodes.len()).map(NodeId).collect()
        }
        fn parent(&self, node: NodeId) -> Option<NodeId> {
            self.nodes[node.0].0.map(NodeId)
        }
        fn tag_name(&self, node: NodeId) -> Option<&str> {
            Some(self.nodes[node.0].1)
        }
        fn text(&self, _node: NodeId) -> String {
            String::new()
        }
        fn bounding_rect(&self, _node: NodeId) -> Rect {
            Rect::default()
        }
        fn search(&self, scope: NodeId, selector: &str) -> Result<Vec<NodeId>, SearchError> {
            Ok(self
                .nodes()
                .into_iter()
                .filter(|n| *n != scope && self.is_inclusive_descendant(*n, scope))
                .filter(|n| self.tag_name(*n) == Some(selector))
                .collect())
        }
    }

    impl ComponentRuntime for Fixture {
        fn instance_for(&self, node: NodeId) -> Option<InstanceId> {
            self.nodes[node.0].2.map(InstanceId)
        }
        fn parent_instance(&self, instance: InstanceId) -> Option<InstanceId> {
            self.parents[instance.0].map(InstanceId)
        }
        fn next_sibling(&self, _instance: InstanceId) -> Option<InstanceId> {
            None
        }
        fn kind(&self, instance: InstanceId) -> InstanceKind {
            self.kinds[instance.0].0
        }
        fn effective_name(&self, instance: InstanceId) -> Option<&str> {
            self.kinds[instance.0].1
        }
        fn props(&self, instance: InstanceId) -> &Value {
            &self.props[instance.0]
        }
        fn backing(&self, instance: InstanceId) -> Backing {
            self.kinds[instance.0].2
        }
    }

    fn query(name: &str, predicate: Value) -> ComponentQuery {
        let Value::Object(map) = predicate else {
            panic!("object expected");
        };
        ComponentQuery {
            name: name.to_string(),
            predicate: Predicate(map),
        }
    }

    #[test]
    fn test_owner_of_stops_at_structural_boundary() {
        let page = fixture();
        let mut ids = IdentityResolver::new();
        let adapter = ComponentAdapter::new(&page, &QueryMatcher, &mut ids);
        assert_eq!(adapter.owner_of(NodeId(1), None), Some(InstanceId(1)));
        assert_eq!(adapter.owner_of(NodeId(2), None), Some(InstanceId(3)));
        // div#root's host hangs directly off the root instance.
        assert_eq!(adapter.owner_of(NodeId(0), None), Some(InstanceId(0)));
        assert_eq!(
            adapter.owner_of(NodeId(4), Some(&ComponentQuery::named("Tooltip"))),
            Some(InstanceId(8))
        );
        // Portals and memos are not structural boundaries.
        assert_eq!(
            adapter.owner_of(NodeId(4), Some(&ComponentQuery::named("List"))),
            Some(InstanceId(1))
        );
        // The ul host sits between the li and List.
        assert_eq!(
            adapter.owner_of(NodeId(2), Some(&ComponentQuery::named("List"))),
            None
        );
    }

    #[test]
    fn test_elements_of() {
        let page = fixture();
        let mut ids = IdentityResolver::new();
        let mut adapter = ComponentAdapter::new(&page, &QueryMatcher, &mut ids);
        assert_eq!(adapter.elements_of(InstanceId(1)), vec![NodeId(1), NodeId(4)]);
        assert_eq!(adapter.elements_of(InstanceId(5)), vec![NodeId(3)]);
        assert_eq!(adapter.elements_of(InstanceId(8)), vec![NodeId(4)]);
    }

    #[test]
    fn test_find_descendants_document_order() {
        let page = fixture();
        let mut ids = IdentityResolver::new();
        let mut adapter = ComponentAdapter::new(&page, &QueryMatcher, &mut ids);
        let items = adapter
            .find_descendants(&Scope::Root, &ComponentQuery::named("Item"))
            .unwrap();
        assert_eq!(items, vec![InstanceId(3), InstanceId(5)]);

        let b = adapter
            .find_descendants(&Scope::Root, &query("Item", json!({"label": "b"})))
            .unwrap();
        assert_eq!(b, vec![InstanceId(5)]);
    }

    #[test]
    fn test_find_descendants_crosses_portal() {
        let page = fixture();
        let mut ids = IdentityResolver::new();
        let mut adapter = ComponentAdapter::new(&page, &QueryMatcher, &mut ids);
        let scope = Scope::Instances(vec![InstanceId(1)]);
        let tips = adapter
            .find_descendants(&scope, &ComponentQuery::named("Tooltip"))
            .unwrap();
        assert_eq!(tips, vec![InstanceId(8)]);

        let scope = Scope::Instances(vec![InstanceId(3)]);
        assert!(
            adapter
                .find_descendants(&scope, &ComponentQuery::named("Tooltip"))
                .unwrap()
                .is_empty()
        );
        assert!(
            adapter
                .find_descendants(&Scope::Instances(vec![]), &ComponentQuery::named("Item"))
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_scope_is_strict() {
        let page = fixture();
        let mut ids = IdentityResolver::new();
        let mut adapter = ComponentAdapter::new(&page, &QueryMatcher, &mut ids);
        let scope = Scope::Instances(vec![InstanceId(1)]);
        assert!(
            adapter
                .find_descendants(&scope, &ComponentQuery::named("List"))
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_memo_match_is_unsupported() {
        let page = fixture();
        let mut ids = IdentityResolver::new();
        let mut adapter = ComponentAdapter::new(&page, &QueryMatcher, &mut ids);
        match adapter.find_descendants(&Scope::Root, &ComponentQuery::named("Wrapped")) {
            Err(EngineError::UnsupportedComponentKind { name, kind }) => {
                assert_eq!(name, "Wrapped");
                assert_eq!(kind, InstanceKind::Memo);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_search_within_is_inclusive() {
        let page = fixture();
        let mut ids = IdentityResolver::new();
        let mut adapter = ComponentAdapter::new(&page, &QueryMatcher, &mut ids);
        assert_eq!(
            adapter.search_within(&[InstanceId(1)], "ul").unwrap(),
            vec![NodeId(1)]
        );
        assert_eq!(
            adapter.search_within(&[InstanceId(1)], "li").unwrap(),
            vec![NodeId(2), NodeId(3)]
        );
        assert!(adapter.search_within(&[InstanceId(3)], "ul").unwrap().is_empty());
    }

    #[test]
    fn test_find_below_nodes() {
        let page = fixture();
        let mut ids = IdentityResolver::new();
        let mut adapter = ComponentAdapter::new(&page, &QueryMatcher, &mut ids);
        let items = adapter
            .find_below_nodes(&[NodeId(1)], &ComponentQuery::named("Item"))
            .unwrap();
        assert_eq!(items, vec![InstanceId(3), InstanceId(5)]);
        let none = adapter
            .find_below_nodes(&[NodeId(2)], &ComponentQuery::named("Item"))
            .unwrap();
        assert!(none.is_empty());
    }
}
