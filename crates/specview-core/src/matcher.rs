//! Property predicates evaluated against component props.
//!
//! [`QueryMatcher`] understands the subset of the document query language
//! selectors rely on: dotted key paths with array fan-out, plain equality and
//! a handful of `$` operators.

use crate::selector::Predicate;
use regex::RegexBuilder;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use tracing::warn;

/// Decides whether a props document satisfies a predicate.
pub trait PropertyMatcher {
    fn matches(&self, predicate: &Predicate, props: &Value) -> bool;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct QueryMatcher;

impl QueryMatcher {
    pub fn new() -> Self {
        Self
    }

    fn test_condition(&self, candidates: &[&Value], condition: &Value) -> bool {
        match operators(condition) {
            Some(ops) => ops
                .iter()
                .all(|(op, arg)| self.test_operator(candidates, op, arg, ops)),
            None => any_equal(candidates, condition),
        }
    }

    fn test_operator(
        &self,
        candidates: &[&Value],
        op: &str,
        arg: &Value,
        ops: &Map<String, Value>,
    ) -> bool {
        match op {
            "$eq" => any_equal(candidates, arg),
            "$ne" => !any_equal(candidates, arg),
            "$gt" => any_ordered(candidates, arg, |o| o == Ordering::Greater),
            "$gte" => any_ordered(candidates, arg, |o| o != Ordering::Less),
            "$lt" => any_ordered(candidates, arg, |o| o == Ordering::Less),
            "$lte" => any_ordered(candidates, arg, |o| o != Ordering::Greater),
            "$in" => in_list(candidates, arg),
            "$nin" => !in_list(candidates, arg),
            "$exists" => is_truthy(arg) != candidates.is_empty(),
            "$regex" => {
                let options = ops.get("$options").and_then(Value::as_str).unwrap_or("");
                matches_regex(candidates, arg, options)
            }
            // Consumed by $regex.
            "$options" => true,
            other => {
                warn!("Unsupported query operator {}", other);
                false
            }
        }
    }
}

impl PropertyMatcher for QueryMatcher {
    fn matches(&self, predicate: &Predicate, props: &Value) -> bool {
        predicate.iter().all(|(path, condition)| {
            let segments: Vec<&str> = path.split('.').collect();
            let mut candidates = Vec::new();
            resolve(props, &segments, &mut candidates);
            self.test_condition(&candidates, condition)
        })
    }
}

/// Operator documents are objects whose keys all start with `$`.
fn operators(condition: &Value) -> Option<&Map<String, Value>> {
    match condition {
        Value::Object(map) if !map.is_empty() && map.keys().all(|k| k.starts_with('$')) => {
            Some(map)
        }
        _ => None,
    }
}

/// Collect every value reachable through `path`, fanning out over arrays.
fn resolve<'v>(value: &'v Value, path: &[&str], out: &mut Vec<&'v Value>) {
    let Some((head, rest)) = path.split_first() else {
        out.push(value);
        return;
    };
    match value {
        Value::Object(map) => {
            if let Some(child) = map.get(*head) {
                resolve(child, rest, out);
            }
        }
        Value::Array(items) => match head.parse::<usize>() {
            Ok(index) => {
                if let Some(child) = items.get(index) {
                    resolve(child, rest, out);
                }
            }
            Err(_) => {
                for item in items {
                    resolve(item, path, out);
                }
            }
        },
        _ => {}
    }
}

/// Candidates plus the elements of any array candidate.
fn flattened<'v>(candidates: &[&'v Value]) -> Vec<&'v Value> {
    let mut out = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        out.push(*candidate);
        if let Value::Array(items) = candidate {
            out.extend(items.iter());
        }
    }
    out
}

fn any_equal(candidates: &[&Value], target: &Value) -> bool {
    // A missing field equals null.
    if target.is_null() && candidates.is_empty() {
        return true;
    }
    flattened(candidates)
        .into_iter()
        .any(|value| values_equal(value, target))
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn any_ordered(candidates: &[&Value], bound: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    flattened(candidates)
        .into_iter()
        .filter_map(|value| compare(value, bound))
        .any(accept)
}

fn in_list(candidates: &[&Value], list: &Value) -> bool {
    match list {
        Value::Array(items) => items.iter().any(|item| any_equal(candidates, item)),
        other => {
            warn!("$in/$nin expects an array, got {}", other);
            false
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn matches_regex(candidates: &[&Value], pattern: &Value, options: &str) -> bool {
    let Some(pattern) = pattern.as_str() else {
        warn!("$regex expects a string pattern, got {}", pattern);
        return false;
    };
    let regex = match RegexBuilder::new(pattern)
        .case_insensitive(options.contains('i'))
        .multi_line(options.contains('m'))
        .dot_matches_new_line(options.contains('s'))
        .build()
    {
        Ok(regex) => regex,
        Err(e) => {
            warn!("Invalid regular expression /{}/{}: {}", pattern, options, e);
            return false;
        }
    };
    flattened(candidates)
        .into_iter()
        .filter_map(Value::as_str)
        .any(|s| regex.is_match(s))
}
