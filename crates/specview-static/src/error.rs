use thiserror::Error;

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown portal target '{0}'")]
    UnknownPortalTarget(String),

    #[error("Component '{0}' must be rendered inside `app`")]
    ComponentOutsideApp(String),

    #[error("Invalid tag name '{0}'")]
    InvalidTag(String),

    /// The HTML parser moved or inserted an element, so CSS matching would
    /// disagree with the fixture tree.
    #[error("<{tag}> does not survive HTML parsing in place (node {node:?})")]
    Reparented { tag: String, node: Option<usize> },
}
