//! Fetcher execution.
//!
//! Resolution happens in two phases per fetcher: normalize the context
//! (resolving nested fetchers first), then run the query or function against
//! it. Query execution only ever sees null, a resolved handle, the root, or an
//! array of those, and maps over arrays. That mapping is where result
//! dimensionality comes from.

use crate::component::{ComponentAdapter, Scope};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::fetcher::{Context, Fetcher, FunctionCall, Operation, Query};
use crate::functions::{CallContext, FunctionRegistry, HighlightOverlay};
use crate::identity::IdentityResolver;
use crate::matcher::{PropertyMatcher, QueryMatcher};
use crate::page::{InstanceId, NodeId, Page};
use crate::result::{Outcome, ResultSet};
use crate::selector::{Segment, Selector, SelectorCache};
use std::time::Instant;
use tracing::{debug, trace};

/// Normalized context.
#[derive(Debug, Clone, PartialEq)]
enum Anchor {
    Root,
    Null,
    Nodes(Vec<NodeId>),
    Components(Vec<InstanceId>),
    Array(Vec<Anchor>),
}

impl From<ResultSet> for Anchor {
    fn from(results: ResultSet) -> Self {
        match results {
            ResultSet::Null => Anchor::Null,
            ResultSet::Nodes(nodes) => Anchor::Nodes(nodes),
            ResultSet::Components(components) => Anchor::Components(components),
            ResultSet::Array(items) => Anchor::Array(items.into_iter().map(Anchor::from).collect()),
        }
    }
}

/// Running value while a selector's segments execute.
enum Step {
    Root,
    Nodes(Vec<NodeId>),
    Components(Vec<InstanceId>),
}

pub struct Engine<'p> {
    page: &'p dyn Page,
    matcher: Box<dyn PropertyMatcher>,
    functions: FunctionRegistry,
    selectors: SelectorCache,
    identity: IdentityResolver,
    overlay: HighlightOverlay,
    config: EngineConfig,
}

impl<'p> Engine<'p> {
    pub fn new(page: &'p dyn Page) -> Self {
        Self::with_config(page, EngineConfig::default())
    }

    pub fn with_config(page: &'p dyn Page, config: EngineConfig) -> Self {
        Self {
            page,
            matcher: Box::new(QueryMatcher::new()),
            functions: FunctionRegistry::builtin(),
            selectors: SelectorCache::new(),
            identity: IdentityResolver::new(),
            overlay: HighlightOverlay::new(),
            config,
        }
    }

    /// Replace the property matcher used for component predicates.
    pub fn with_matcher(mut self, matcher: impl PropertyMatcher + 'static) -> Self {
        self.matcher = Box::new(matcher);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn functions_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.functions
    }

    pub fn highlights(&self) -> &HighlightOverlay {
        &self.overlay
    }

    /// Highlight markers still showing at `now`.
    pub fn highlight_count_at(&self, now: Instant) -> usize {
        self.overlay.count_at(now)
    }

    pub fn highlight_count(&self) -> usize {
        self.highlight_count_at(Instant::now())
    }

    pub fn clear_highlights(&mut self) {
        self.overlay.clear();
    }

    /// Resolve a fetcher against the page.
    ///
    /// Identities are recomputed for every call.
    pub fn fetch(&mut self, fetcher: &Fetcher) -> Result<Outcome, EngineError> {
        self.identity = IdentityResolver::new();
        self.overlay.prune(Instant::now());
        debug!("fetch: {}", describe(fetcher));
        self.resolve(fetcher, self.config.allow_component_results)
    }

    fn resolve(
        &mut self,
        fetcher: &Fetcher,
        allow_components: bool,
    ) -> Result<Outcome, EngineError> {
        let anchor = self.normalize(&fetcher.context)?;
        match &fetcher.operation {
            Operation::Query { query } => self
                .execute_query(query, &anchor, allow_components)
                .map(Outcome::Results),
            Operation::Call(call) => self.call_function(call, &anchor).map(Outcome::Value),
        }
    }

    fn normalize(&mut self, context: &Context) -> Result<Anchor, EngineError> {
        match context {
            Context::Null => Ok(Anchor::Null),
            Context::Root(marker) if marker.is_root => Ok(Anchor::Root),
            Context::Root(_) => Err(EngineError::InvalidContext(
                "isRoot must be true".to_string(),
            )),
            Context::Node { node } => Ok(Anchor::Nodes(vec![*node])),
            Context::Nodes { nodes } => Ok(Anchor::Nodes(nodes.clone())),
            Context::Components { components } => Ok(Anchor::Components(components.clone())),
            Context::Array(items) => items
                .iter()
                .map(|item| self.normalize(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Anchor::Array),
            Context::Fetcher(inner) => match self.resolve(inner, true)? {
                Outcome::Results(results) => Ok(Anchor::from(results)),
                // A function result (say, an interaction element) can anchor
                // further queries when it has a handle shape.
                Outcome::Value(value) => {
                    let context: Context = serde_json::from_value(value.clone()).map_err(|_| {
                        EngineError::InvalidContext(format!(
                            "function result {} cannot be used as a context",
                            value
                        ))
                    })?;
                    self.normalize(&context)
                }
            },
        }
    }

    fn execute_query(
        &mut self,
        query: &Query,
        anchor: &Anchor,
        allow_components: bool,
    ) -> Result<ResultSet, EngineError> {
        if *anchor == Anchor::Null {
            return Ok(ResultSet::Null);
        }
        let selector = self.selectors.get_or_parse(&query.selector)?;
        if !allow_components && selector.ends_in_component() {
            return Err(EngineError::ComponentResultNotAllowed {
                selector: query.selector.clone(),
            });
        }
        if let (false, Some(at)) = (query.multi, query.at) {
            return Err(EngineError::IndexOnSingleQuery {
                selector: query.selector.clone(),
                at,
            });
        }
        debug!(
            "query '{}' (multi: {}, at: {:?}, {} segments)",
            query.selector,
            query.multi,
            query.at,
            selector.segments.len()
        );
        self.run_query(query, &selector, anchor)
    }

    fn run_query(
        &mut self,
        query: &Query,
        selector: &Selector,
        anchor: &Anchor,
    ) -> Result<ResultSet, EngineError> {
        let start = match anchor {
            Anchor::Null => return Ok(ResultSet::Null),
            Anchor::Array(items) => {
                return items
                    .iter()
                    .map(|item| self.run_query(query, selector, item))
                    .collect::<Result<Vec<_>, _>>()
                    .map(ResultSet::Array);
            }
            Anchor::Root => Step::Root,
            Anchor::Nodes(nodes) => Step::Nodes(nodes.clone()),
            Anchor::Components(components) => Step::Components(components.clone()),
        };

        let mut step = start;
        for segment in &selector.segments {
            step = self.run_segment(segment, step)?;
        }
        Ok(self.shape(query, step))
    }

    fn run_segment(&mut self, segment: &Segment, step: Step) -> Result<Step, EngineError> {
        let page = self.page;
        let next = match (segment, step) {
            (Segment::Structural { selector }, Step::Root) => {
                Step::Nodes(page.search(page.root(), selector)?)
            }
            (Segment::Structural { selector }, Step::Nodes(nodes)) => {
                let mut found = Vec::new();
                for node in nodes {
                    found.extend(page.search(node, selector)?);
                }
                found.sort();
                found.dedup();
                Step::Nodes(found)
            }
            (Segment::Structural { selector }, Step::Components(components)) => {
                Step::Nodes(self.adapter().search_within(&components, selector)?)
            }
            (Segment::Component(query), Step::Root) => {
                Step::Components(self.adapter().find_descendants(&Scope::Root, query)?)
            }
            (Segment::Component(query), Step::Nodes(nodes)) => {
                Step::Components(self.adapter().find_below_nodes(&nodes, query)?)
            }
            (Segment::Component(query), Step::Components(components)) => Step::Components(
                self.adapter()
                    .find_descendants(&Scope::Instances(components), query)?,
            ),
        };
        trace!(
            "segment {:?} -> {}",
            segment,
            match &next {
                Step::Root => "root".to_string(),
                Step::Nodes(nodes) => format!("{} nodes", nodes.len()),
                Step::Components(components) => format!("{} components", components.len()),
            }
        );
        Ok(next)
    }

    /// Expand or collapse the terminal step per the query's multi flag.
    fn shape(&self, query: &Query, step: Step) -> ResultSet {
        let items: Vec<ResultSet> = match step {
            Step::Root => vec![ResultSet::node(self.page.root())],
            Step::Nodes(nodes) => nodes.into_iter().map(ResultSet::node).collect(),
            Step::Components(components) => components
                .into_iter()
                .map(|c| ResultSet::Components(vec![c]))
                .collect(),
        };

        if !query.multi {
            return items.into_iter().next().unwrap_or(ResultSet::Null);
        }
        match query.at {
            None => ResultSet::Array(items),
            Some(at) => {
                let index = if at < 0 { items.len() as i64 + at } else { at };
                usize::try_from(index)
                    .ok()
                    .and_then(|i| items.into_iter().nth(i))
                    .unwrap_or(ResultSet::Null)
            }
        }
    }

    fn call_function(
        &mut self,
        call: &FunctionCall,
        anchor: &Anchor,
    ) -> Result<serde_json::Value, EngineError> {
        let input = self.function_input(anchor);
        let Some(function) = self.functions.get(&call.name) else {
            return Err(EngineError::UnknownFunction(call.name.clone()));
        };
        debug!("calling {}({} args)", call.name, call.args.len());
        let mut cx = CallContext {
            adapter: ComponentAdapter::new(self.page, self.matcher.as_ref(), &mut self.identity),
            config: &self.config,
            overlay: &mut self.overlay,
            now: Instant::now(),
        };
        function.call(&mut cx, &input, &call.args)
    }

    /// Functions see the root as the document root node.
    fn function_input(&self, anchor: &Anchor) -> ResultSet {
        match anchor {
            Anchor::Root => ResultSet::node(self.page.root()),
            Anchor::Null => ResultSet::Null,
            Anchor::Nodes(nodes) => ResultSet::Nodes(nodes.clone()),
            Anchor::Components(components) => ResultSet::Components(components.clone()),
            Anchor::Array(items) => {
                ResultSet::Array(items.iter().map(|item| self.function_input(item)).collect())
            }
        }
    }

    fn adapter(&mut self) -> ComponentAdapter<'_> {
        ComponentAdapter::new(self.page, self.matcher.as_ref(), &mut self.identity)
    }
}

fn describe(fetcher: &Fetcher) -> String {
    serde_json::to_string(fetcher).unwrap_or_else(|_| "<unprintable fetcher>".to_string())
}
