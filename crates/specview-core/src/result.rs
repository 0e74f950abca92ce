use crate::fetcher::Context;
use crate::page::{InstanceId, NodeId};
use serde::{Serialize, Serializer};
use serde_json::{Value, json};

/// Working value of the engine.
///
/// Array nesting depth equals the number of multi queries executed so far.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultSet {
    Null,
    Nodes(Vec<NodeId>),
    Components(Vec<InstanceId>),
    Array(Vec<ResultSet>),
}

impl ResultSet {
    pub fn node(node: NodeId) -> Self {
        ResultSet::Nodes(vec![node])
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ResultSet::Null)
    }

    /// Nesting depth along the first element of each array level.
    pub fn depth(&self) -> usize {
        match self {
            ResultSet::Array(items) => 1 + items.first().map_or(0, ResultSet::depth),
            _ => 0,
        }
    }

    pub fn as_array(&self) -> Option<&[ResultSet]> {
        match self {
            ResultSet::Array(items) => Some(items),
            _ => None,
        }
    }

    /// The handle shapes accepted as a fetcher context.
    pub fn to_context(&self) -> Context {
        match self {
            ResultSet::Null => Context::Null,
            ResultSet::Nodes(nodes) if nodes.len() == 1 => Context::node(nodes[0]),
            ResultSet::Nodes(nodes) => Context::Nodes {
                nodes: nodes.clone(),
            },
            ResultSet::Components(components) => Context::components(components.clone()),
            ResultSet::Array(items) => Context::Array(items.iter().map(Self::to_context).collect()),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ResultSet::Null => Value::Null,
            ResultSet::Nodes(nodes) if nodes.len() == 1 => json!({ "node": nodes[0] }),
            ResultSet::Nodes(nodes) => json!({ "nodes": nodes }),
            ResultSet::Components(components) => json!({ "components": components }),
            ResultSet::Array(items) => Value::Array(items.iter().map(Self::to_json).collect()),
        }
    }
}

impl Serialize for ResultSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_context().serialize(serializer)
    }
}

/// What a fetch produced: a query result or a terminal function's value.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Results(ResultSet),
    Value(Value),
}

impl Outcome {
    pub fn results(&self) -> Option<&ResultSet> {
        match self {
            Outcome::Results(results) => Some(results),
            Outcome::Value(_) => None,
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Outcome::Value(value) => Some(value),
            Outcome::Results(_) => None,
        }
    }

    pub fn into_json(self) -> Value {
        match self {
            Outcome::Results(results) => results.to_json(),
            Outcome::Value(value) => value,
        }
    }
}

impl Serialize for Outcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Outcome::Results(results) => results.serialize(serializer),
            Outcome::Value(value) => value.serialize(serializer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shapes() {
        let rs = ResultSet::Array(vec![
            ResultSet::node(NodeId(3)),
            ResultSet::Null,
            ResultSet::Components(vec![InstanceId(7)]),
            ResultSet::Nodes(vec![NodeId(1), NodeId(2)]),
        ]);
        assert_eq!(
            rs.to_json(),
            json!([{"node": 3}, null, {"components": [7]}, {"nodes": [1, 2]}])
        );
        assert_eq!(serde_json::to_value(&rs).unwrap(), rs.to_json());
    }

    #[test]
    fn test_result_feeds_back_as_context() {
        let rs = ResultSet::Array(vec![ResultSet::node(NodeId(3)), ResultSet::Null]);
        let ctx: Context = serde_json::from_value(rs.to_json()).unwrap();
        assert_eq!(ctx, rs.to_context());
    }

    #[test]
    fn test_depth() {
        assert_eq!(ResultSet::Null.depth(), 0);
        assert_eq!(ResultSet::node(NodeId(1)).depth(), 0);
        let two = ResultSet::Array(vec![ResultSet::Array(vec![ResultSet::node(NodeId(1))])]);
        assert_eq!(two.depth(), 2);
    }
}
