//! Query engine for chainable page views.
//!
//! A [`Fetcher`] describes a selector query (or a terminal function call)
//! together with the context it runs against. The [`Engine`] resolves it
//! against a [`Page`], walking both the structural document and the
//! component-instance graph layered on top of it.

pub mod component;
pub mod config;
pub mod engine;
pub mod error;
pub mod fetcher;
pub mod functions;
pub mod identity;
pub mod matcher;
pub mod page;
pub mod result;
pub mod selector;

pub use component::{ComponentAdapter, Scope};
pub use config::{EngineConfig, HighlightConfig};
pub use engine::Engine;
pub use error::{EngineError, SearchError};
pub use fetcher::{Context, Fetcher, FunctionCall, Operation, Query};
pub use functions::{CallContext, FunctionRegistry, HighlightOverlay, Marker, TerminalFunction};
pub use identity::{Identity, IdentityResolver};
pub use matcher::{PropertyMatcher, QueryMatcher};
pub use page::{
    Backing, ComponentRuntime, Document, InstanceId, InstanceKind, NodeId, ObjectKey, Page, Rect,
};
pub use result::{Outcome, ResultSet};
pub use selector::{ComponentQuery, Predicate, Segment, Selector, SelectorError, parse};
