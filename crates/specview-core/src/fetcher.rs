//! Fetcher descriptors.
//!
//! A fetcher is a deferred, serializable description of what to find and
//! where to look for it. Chaining views builds fetchers top-down; the engine
//! resolves them context first.
//!
//! Wire shape:
//!
//! ```json
//! {"context": {"isRoot": true}, "query": {"selector": "ul.cats li", "multi": true}}
//! {"context": {"context": {"isRoot": true}, "query": {"selector": "@Cat"}}, "fn": "count", "args": []}
//! ```

use crate::page::{InstanceId, NodeId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fetcher {
    pub context: Context,
    #[serde(flatten)]
    pub operation: Operation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Operation {
    Query { query: Query },
    Call(FunctionCall),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub selector: String,
    #[serde(default)]
    pub multi: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    #[serde(rename = "fn")]
    pub name: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RootMarker {
    #[serde(rename = "isRoot")]
    pub is_root: bool,
}

/// Where a fetcher runs.
///
/// Resolved handles use the same shapes a resolved result serializes to, so
/// results can be fed back as contexts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Context {
    Root(RootMarker),
    Fetcher(Box<Fetcher>),
    Node { node: NodeId },
    Nodes { nodes: Vec<NodeId> },
    Components { components: Vec<InstanceId> },
    Array(Vec<Context>),
    Null,
}

impl Context {
    pub fn root() -> Self {
        Context::Root(RootMarker { is_root: true })
    }

    pub fn node(node: NodeId) -> Self {
        Context::Node { node }
    }

    pub fn components(components: Vec<InstanceId>) -> Self {
        Context::Components { components }
    }
}

impl From<Fetcher> for Context {
    fn from(fetcher: Fetcher) -> Self {
        Context::Fetcher(Box::new(fetcher))
    }
}

impl Query {
    pub fn single(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            multi: false,
            at: None,
        }
    }

    pub fn multi(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            multi: true,
            at: None,
        }
    }

    pub fn at(mut self, index: i64) -> Self {
        self.at = Some(index);
        self
    }
}

impl Fetcher {
    pub fn new(context: impl Into<Context>, query: Query) -> Self {
        Self {
            context: context.into(),
            operation: Operation::Query { query },
        }
    }

    /// Query against the document root.
    pub fn root(query: Query) -> Self {
        Self::new(Context::root(), query)
    }

    pub fn call(context: impl Into<Context>, name: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            context: context.into(),
            operation: Operation::Call(FunctionCall {
                name: name.into(),
                args,
            }),
        }
    }

    /// Chain a query onto this fetcher's result.
    pub fn then(self, query: Query) -> Self {
        Self::new(self, query)
    }

    /// Apply a terminal function to this fetcher's result.
    pub fn apply(self, name: impl Into<String>, args: Vec<Value>) -> Self {
        Self::call(self, name, args)
    }

    pub fn query(&self) -> Option<&Query> {
        match &self.operation {
            Operation::Query { query } => Some(query),
            Operation::Call(_) => None,
        }
    }
}
