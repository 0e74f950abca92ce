//! Hybrid selector grammar.
//!
//! A selector mixes plain structural (CSS) runs with `@Component{...}`
//! segments:
//!
//! ```text
//! div.foo @Animal{type: 'dog'}{name: 'Toto'} div.bar @Collar span
//! ```
//!
//! Only descendant semantics are supported around component segments, so
//! `div > @Widget` or `@A + @B` are not meaningful.

pub mod predicate;
pub mod tokenizer;

pub use predicate::Predicate;

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Marks the start of a component segment.
pub const COMPONENT_MARKER: char = '@';

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SelectorError {
    #[error("Empty selector")]
    Empty,

    #[error("Unterminated quote in '{fragment}'")]
    UnterminatedQuote { fragment: String },

    #[error("Unbalanced brackets in '{fragment}'")]
    Unbalanced { fragment: String },

    #[error("Missing component name in '{fragment}'")]
    MissingComponentName { fragment: String },

    #[error("Failed to parse property string {fragment}: {reason}")]
    InvalidPredicate { fragment: String, reason: String },

    #[error("Selector '{selector}' does not end in a component segment")]
    NotAComponent { selector: String },
}

/// Component name plus property predicate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentQuery {
    pub name: String,
    pub predicate: Predicate,
}

impl ComponentQuery {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            predicate: Predicate::any(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Segment {
    Structural { selector: String },
    Component(ComponentQuery),
}

impl Segment {
    pub fn is_component(&self) -> bool {
        matches!(self, Segment::Component(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selector {
    pub source: String,
    pub segments: Vec<Segment>,
}

impl Selector {
    pub fn ends_in_component(&self) -> bool {
        self.segments.last().is_some_and(Segment::is_component)
    }
}

/// Parse a selector string into its segments.
pub fn parse(source: &str) -> Result<Selector, SelectorError> {
    let tokens = tokenizer::split_tokens(source)?;
    if tokens.is_empty() {
        return Err(SelectorError::Empty);
    }

    let mut segments = Vec::new();
    let mut run: Vec<&str> = Vec::new();

    for token in tokens {
        match token.strip_prefix(COMPONENT_MARKER) {
            Some(body) => {
                flush_run(&mut run, &mut segments);
                segments.push(Segment::Component(parse_component(token, body)?));
            }
            None => run.push(token),
        }
    }
    flush_run(&mut run, &mut segments);

    Ok(Selector {
        source: source.to_string(),
        segments,
    })
}

fn flush_run(run: &mut Vec<&str>, segments: &mut Vec<Segment>) {
    if run.is_empty() {
        return;
    }
    segments.push(Segment::Structural {
        selector: run.join(" "),
    });
    run.clear();
}

fn parse_component(token: &str, body: &str) -> Result<ComponentQuery, SelectorError> {
    let (name, blocks) = match body.find('{') {
        Some(idx) => (&body[..idx], Some(&body[idx..])),
        None => (body, None),
    };
    if name.is_empty() {
        return Err(SelectorError::MissingComponentName {
            fragment: token.to_string(),
        });
    }
    let predicate = match blocks {
        Some(blocks) => predicate::parse_blocks(blocks)?,
        None => Predicate::any(),
    };
    Ok(ComponentQuery {
        name: name.to_string(),
        predicate,
    })
}

/// Append a predicate block to the trailing component segment of `selector`.
///
/// `with_props("@Foo{baz: 12}", {"foo": "bar"})` gives `@Foo{baz: 12}{"foo":"bar"}`.
pub fn with_props(selector: &str, props: &Map<String, Value>) -> Result<String, SelectorError> {
    if !parse(selector)?.ends_in_component() {
        return Err(SelectorError::NotAComponent {
            selector: selector.to_string(),
        });
    }
    let block = Value::Object(props.clone()).to_string();
    Ok(format!("{}{}", selector.trim_end(), block))
}

/// Memoized parses keyed by the selector string.
#[derive(Debug, Default)]
pub struct SelectorCache {
    parsed: HashMap<String, Arc<Selector>>,
}

impl SelectorCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_parse(&mut self, source: &str) -> Result<Arc<Selector>, SelectorError> {
        if let Some(selector) = self.parsed.get(source) {
            return Ok(Arc::clone(selector));
        }
        let selector = Arc::new(parse(source)?);
        self.parsed.insert(source.to_string(), Arc::clone(&selector));
        Ok(selector)
    }

    pub fn len(&self) -> usize {
        self.parsed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsed.is_empty()
    }
}
