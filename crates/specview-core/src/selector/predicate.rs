//! Property predicate literals.
//!
//! Predicate blocks are parsed as data with a pest grammar; nothing in a
//! selector is ever evaluated as code.

use super::SelectorError;
use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

#[derive(Parser)]
#[grammar = "selector/predicate.pest"]
pub struct PredicateParser;

/// Nested-key match document for component props.
///
/// An empty predicate is unconstrained and matches any props.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Predicate(pub Map<String, Value>);

impl Predicate {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn is_unconstrained(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Overlay `other` onto this predicate. Keys in `other` win.
    pub fn merge(&mut self, other: Map<String, Value>) {
        for (key, value) in other {
            self.0.insert(key, value);
        }
    }
}

impl From<Map<String, Value>> for Predicate {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Parse one or more directly concatenated `{...}` blocks into a single
/// predicate, later blocks overriding earlier keys.
pub fn parse_blocks(source: &str) -> Result<Predicate, SelectorError> {
    let invalid = |reason: String| SelectorError::InvalidPredicate {
        fragment: source.to_string(),
        reason,
    };

    let mut pairs =
        PredicateParser::parse(Rule::blocks, source).map_err(|e| invalid(e.to_string()))?;
    let blocks = pairs
        .next()
        .ok_or_else(|| invalid("no predicate block".to_string()))?;

    let mut predicate = Predicate::any();
    for block in blocks.into_inner() {
        if block.as_rule() == Rule::object {
            predicate.merge(object_from(block).map_err(invalid)?);
        }
    }
    Ok(predicate)
}

fn object_from(pair: Pair<Rule>) -> Result<Map<String, Value>, String> {
    let mut map = Map::new();
    for entry in pair.into_inner() {
        let mut inner = entry.into_inner();
        let (Some(key), Some(value)) = (inner.next(), inner.next()) else {
            return Err("malformed key/value pair".to_string());
        };
        let key = match key.as_rule() {
            Rule::string => string_from(key)?,
            _ => key.as_str().to_string(),
        };
        map.insert(key, value_from(value)?);
    }
    Ok(map)
}

fn value_from(pair: Pair<Rule>) -> Result<Value, String> {
    match pair.as_rule() {
        Rule::object => Ok(Value::Object(object_from(pair)?)),
        Rule::array => pair
            .into_inner()
            .map(value_from)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Rule::string => Ok(Value::String(string_from(pair)?)),
        Rule::number => number_from(pair.as_str()).map(Value::Number),
        Rule::boolean => Ok(Value::Bool(pair.as_str() == "true")),
        Rule::null => Ok(Value::Null),
        Rule::regex => {
            let mut inner = pair.into_inner();
            let body = inner.next().map(|p| p.as_str()).unwrap_or_default();
            let flags = inner.next().map(|p| p.as_str()).unwrap_or_default();
            let mut operator = Map::new();
            operator.insert("$regex".to_string(), Value::String(body.to_string()));
            operator.insert("$options".to_string(), Value::String(flags.to_string()));
            Ok(Value::Object(operator))
        }
        rule => Err(format!("unexpected {:?}", rule)),
    }
}

fn number_from(raw: &str) -> Result<Number, String> {
    if let Ok(n) = raw.parse::<i64>() {
        return Ok(Number::from(n));
    }
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .ok_or_else(|| format!("invalid number {}", raw))
}

fn string_from(pair: Pair<Rule>) -> Result<String, String> {
    let raw = pair.into_inner().next().map(|p| p.as_str()).unwrap_or_default();
    unescape(raw)
}

fn unescape(raw: &str) -> Result<String, String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{0008}'),
            Some('f') => out.push('\u{000C}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                let code = u32::from_str_radix(&hex, 16)
                    .map_err(|_| format!("invalid unicode escape \\u{}", hex))?;
                out.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
            }
            Some(other) => out.push(other),
            None => return Err("dangling escape".to_string()),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parsed(source: &str) -> Value {
        Value::Object(parse_blocks(source).unwrap().0)
    }

    #[test]
    fn test_bare_keys_and_quotes() {
        assert_eq!(
            parsed(r#"{patrick: "stewart", 'single': 'quoted', "n": 4.5}"#),
            json!({"patrick": "stewart", "single": "quoted", "n": 4.5})
        );
    }

    #[test]
    fn test_nested_with_comment() {
        assert_eq!(
            parsed(r#"{"wrench": {"open": false, "weight": 47 /*kilograms*/}}"#),
            json!({"wrench": {"open": false, "weight": 47}})
        );
    }

    #[test]
    fn test_trailing_commas_and_arrays() {
        assert_eq!(
            parsed("{tags: ['a', 'b',], empty: null, gone: undefined,}"),
            json!({"tags": ["a", "b"], "empty": null, "gone": null})
        );
    }

    #[test]
    fn test_chained_blocks_merge_left_to_right() {
        assert_eq!(parsed("{a: 1, b: 1}{b: 2}"), json!({"a": 1, "b": 2}));
        assert_eq!(
            parsed("{tag: false},{tag: true},{decoration: 'bones'}"),
            json!({"tag": true, "decoration": "bones"})
        );
    }

    #[test]
    fn test_regex_literal() {
        assert_eq!(
            parsed("{word: /^boo+$/i}"),
            json!({"word": {"$regex": "^boo+$", "$options": "i"}})
        );
    }

    #[test]
    fn test_escapes() {
        assert_eq!(
            parsed(r#"{s: 'it\'s', t: "tab\there", u: "A"}"#),
            json!({"s": "it's", "t": "tab\there", "u": "A"})
        );
    }

    #[test]
    fn test_code_is_rejected() {
        let err = parse_blocks("{a: alert(1)}").unwrap_err();
        match err {
            SelectorError::InvalidPredicate { fragment, .. } => {
                assert_eq!(fragment, "{a: alert(1)}")
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(parse_blocks(r#"{info="bravo"}"#).is_err());
        assert!(parse_blocks("{a: 1} trailing").is_err());
    }
}
