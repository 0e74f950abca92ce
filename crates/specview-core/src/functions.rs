//! Terminal query functions.
//!
//! Functions consume an already-resolved [`ResultSet`] and produce a plain
//! value. Most of them map element-wise over nested arrays, so the output
//! has the same shape as the input.

use crate::component::ComponentAdapter;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::page::{InstanceId, NodeId, Rect};
use crate::result::ResultSet;
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::debug;

/// A non-empty component collection counts once, however many instances it
/// holds. Existing callers rely on this, surprising as it is.
pub const COMPONENT_COUNTS_AS_ONE: u64 = 1;

/// Everything a function may touch while it runs.
pub struct CallContext<'a> {
    pub adapter: ComponentAdapter<'a>,
    pub config: &'a EngineConfig,
    pub overlay: &'a mut HighlightOverlay,
    pub now: Instant,
}

pub trait TerminalFunction {
    fn call(
        &self,
        cx: &mut CallContext<'_>,
        input: &ResultSet,
        args: &[Value],
    ) -> Result<Value, EngineError>;
}

/// Terminal functions by name.
#[derive(Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Box<dyn TerminalFunction>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `text`, `exists`, `count`, `prop`, `interactionElement`
    /// and `highlight`.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register("text", Text);
        registry.register("exists", Exists);
        registry.register("count", Count);
        registry.register("prop", Prop);
        registry.register("interactionElement", InteractionElement);
        registry.register("highlight", Highlight);
        registry
    }

    /// Register a function, replacing any previous one with the same name.
    pub fn register(&mut self, name: impl Into<String>, function: impl TerminalFunction + 'static) {
        self.functions.insert(name.into(), Box::new(function));
    }

    pub fn get(&self, name: &str) -> Option<&dyn TerminalFunction> {
        self.functions.get(name).map(|f| f.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.names())
            .finish()
    }
}

/// Apply `f` to every non-array leaf, keeping the array shape.
fn deep_map<'a, F>(
    cx: &mut CallContext<'a>,
    input: &ResultSet,
    f: &mut F,
) -> Result<Value, EngineError>
where
    F: FnMut(&mut CallContext<'a>, &ResultSet) -> Result<Value, EngineError>,
{
    match input {
        ResultSet::Array(items) => items
            .iter()
            .map(|item| deep_map(cx, item, f))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        leaf => f(cx, leaf),
    }
}

fn node_handle(node: NodeId) -> Value {
    json!({ "node": node })
}

pub fn exists_in(input: &ResultSet) -> bool {
    match input {
        ResultSet::Null => false,
        ResultSet::Nodes(nodes) => !nodes.is_empty(),
        ResultSet::Components(components) => !components.is_empty(),
        ResultSet::Array(items) => items.iter().any(exists_in),
    }
}

pub fn count_in(input: &ResultSet) -> u64 {
    match input {
        ResultSet::Null => 0,
        ResultSet::Nodes(nodes) => nodes.len() as u64,
        ResultSet::Components(components) if components.is_empty() => 0,
        ResultSet::Components(_) => COMPONENT_COUNTS_AS_ONE,
        ResultSet::Array(items) => items.iter().map(count_in).sum(),
    }
}

struct Text;
struct Exists;
struct Count;
struct Prop;
struct InteractionElement;
struct Highlight;

impl TerminalFunction for Text {
    fn call(
        &self,
        cx: &mut CallContext<'_>,
        input: &ResultSet,
        _args: &[Value],
    ) -> Result<Value, EngineError> {
        deep_map(cx, input, &mut |cx, leaf| {
            let nodes = match leaf {
                ResultSet::Nodes(nodes) => nodes.clone(),
                ResultSet::Components(components) => cx.adapter.elements_of_all(components),
                _ => return Ok(Value::Null),
            };
            let page = cx.adapter.page();
            let text: String = nodes.iter().map(|n| page.text(*n)).collect();
            Ok(Value::String(text))
        })
    }
}

impl TerminalFunction for Exists {
    fn call(
        &self,
        _cx: &mut CallContext<'_>,
        input: &ResultSet,
        _args: &[Value],
    ) -> Result<Value, EngineError> {
        Ok(Value::Bool(exists_in(input)))
    }
}

impl TerminalFunction for Count {
    fn call(
        &self,
        _cx: &mut CallContext<'_>,
        input: &ResultSet,
        _args: &[Value],
    ) -> Result<Value, EngineError> {
        Ok(json!(count_in(input)))
    }
}

impl TerminalFunction for Prop {
    fn call(
        &self,
        cx: &mut CallContext<'_>,
        input: &ResultSet,
        args: &[Value],
    ) -> Result<Value, EngineError> {
        let Some(key) = args.first().and_then(Value::as_str) else {
            return Err(EngineError::InvalidArgument {
                function: "prop".to_string(),
                reason: "expected a property name".to_string(),
            });
        };
        deep_map(cx, input, &mut |cx, leaf| match leaf {
            ResultSet::Nodes(_) => Err(EngineError::PropsOnElement),
            ResultSet::Components(components) => Ok(components
                .first()
                .and_then(|c| cx.adapter.page().props(*c).get(key))
                .cloned()
                .unwrap_or(Value::Null)),
            _ => Ok(Value::Null),
        })
    }
}

impl TerminalFunction for InteractionElement {
    fn call(
        &self,
        cx: &mut CallContext<'_>,
        input: &ResultSet,
        _args: &[Value],
    ) -> Result<Value, EngineError> {
        match input {
            ResultSet::Null => Ok(Value::Null),
            ResultSet::Array(items) => Err(EngineError::MultipleElementInteraction {
                count: items.len(),
            }),
            ResultSet::Nodes(nodes) => match nodes.as_slice() {
                [] => Ok(Value::Null),
                [node] => Ok(node_handle(*node)),
                _ => Err(EngineError::AmbiguousInteractionTarget { count: nodes.len() }),
            },
            ResultSet::Components(components) => match components.as_slice() {
                [] => Ok(Value::Null),
                [component] => Ok(interaction_target(cx, *component)?
                    .map(node_handle)
                    .unwrap_or(Value::Null)),
                _ => Err(EngineError::MultipleElementInteraction {
                    count: components.len(),
                }),
            },
        }
    }
}

/// First configured control inside the component, else its first element.
fn interaction_target(
    cx: &mut CallContext<'_>,
    component: InstanceId,
) -> Result<Option<NodeId>, EngineError> {
    for control in &cx.config.interaction_controls {
        if let Some(node) = cx.adapter.search_within(&[component], control)?.first() {
            return Ok(Some(*node));
        }
    }
    Ok(cx.adapter.elements_of(component).first().copied())
}

impl TerminalFunction for Highlight {
    fn call(
        &self,
        cx: &mut CallContext<'_>,
        input: &ResultSet,
        args: &[Value],
    ) -> Result<Value, EngineError> {
        let timeout_ms = match args.first() {
            None | Some(Value::Null) => cx.config.highlight.default_timeout_ms,
            Some(value) => Some(value.as_u64().ok_or_else(|| EngineError::InvalidArgument {
                function: "highlight".to_string(),
                reason: format!("timeout must be a non-negative integer, got {}", value),
            })?),
        };
        // A zero timeout keeps the markers, like an absent one.
        let expires_at = timeout_ms
            .filter(|ms| *ms > 0)
            .map(|ms| cx.now + Duration::from_millis(ms));
        let uid = cx.overlay.next_uid();

        let mut added = 0usize;
        deep_map(cx, input, &mut |cx, leaf| {
            let nodes = match leaf {
                ResultSet::Nodes(nodes) => nodes.clone(),
                ResultSet::Components(components) => cx.adapter.elements_of_all(components),
                _ => return Ok(Value::Null),
            };
            let page = cx.adapter.page();
            let Some(rect) = nodes
                .iter()
                .map(|n| page.bounding_rect(*n))
                .reduce(|a, b| a.union(&b))
            else {
                return Ok(Value::Null);
            };
            let style = &cx.config.highlight;
            cx.overlay.add(Marker {
                uid: uid.clone(),
                rect,
                fill: style.fill.clone(),
                border: style.border.clone(),
                z_index: style.z_index,
                expires_at,
            });
            added += 1;
            Ok(Value::Null)
        })?;

        debug!("highlight {}: {} markers, timeout {:?}", uid, added, timeout_ms);
        Ok(Value::Bool(true))
    }
}

/// One highlighted box.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub uid: String,
    pub rect: Rect,
    pub fill: String,
    pub border: String,
    pub z_index: i64,
    #[serde(skip)]
    pub expires_at: Option<Instant>,
}

impl Marker {
    pub fn is_active_at(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|deadline| now < deadline)
    }
}

/// Engine-owned highlight layer. The page itself is never touched.
#[derive(Debug, Default)]
pub struct HighlightOverlay {
    markers: Vec<Marker>,
    next_uid: u64,
}

impl HighlightOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_uid(&mut self) -> String {
        self.next_uid += 1;
        format!("specview-highlight-{}", self.next_uid)
    }

    pub fn add(&mut self, marker: Marker) {
        self.markers.push(marker);
    }

    pub fn active_at(&self, now: Instant) -> Vec<&Marker> {
        self.markers.iter().filter(|m| m.is_active_at(now)).collect()
    }

    pub fn count_at(&self, now: Instant) -> usize {
        self.markers.iter().filter(|m| m.is_active_at(now)).count()
    }

    /// Drop expired markers.
    pub fn prune(&mut self, now: Instant) {
        self.markers.retain(|m| m.is_active_at(now));
    }

    pub fn clear(&mut self) {
        self.markers.clear();
    }
}
