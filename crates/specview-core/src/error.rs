use crate::page::InstanceKind;
use crate::selector::SelectorError;
use thiserror::Error;

/// Failures reported by the structural matching collaborator.
#[derive(Debug, Clone, Error)]
pub enum SearchError {
    #[error("Invalid structural selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Unknown node: {0}")]
    UnknownNode(usize),
}

/// Errors raised while resolving a fetcher.
///
/// Absence is never an error: empty and null results are values. Every
/// variant here is fatal to the current resolution and the engine does not
/// retry.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Syntax error: {0}")]
    Syntax(#[from] SelectorError),

    #[error("Search failed: {0}")]
    Search(#[from] SearchError),

    #[error("Component '{name}' is a {kind} instance, which cannot be introspected")]
    UnsupportedComponentKind { name: String, kind: InstanceKind },

    #[error("Cannot interact with multiple elements at once ({count} candidates)")]
    MultipleElementInteraction { count: usize },

    #[error("Interaction target is ambiguous: {count} elements matched")]
    AmbiguousInteractionTarget { count: usize },

    #[error("Unknown query function: {0}")]
    UnknownFunction(String),

    #[error("Selector '{selector}' ends in a component, which cannot be returned here")]
    ComponentResultNotAllowed { selector: String },

    #[error("Selector '{selector}' is not a multi query and cannot be indexed with at={at}")]
    IndexOnSingleQuery { selector: String, at: i64 },

    #[error("Cannot get props from an HTML element")]
    PropsOnElement,

    #[error("Invalid argument for {function}: {reason}")]
    InvalidArgument { function: String, reason: String },

    #[error("Invalid context: {0}")]
    InvalidContext(String),
}
