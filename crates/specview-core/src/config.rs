use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Let the outermost query of a fetch end in a component segment.
    #[serde(default)]
    pub allow_component_results: bool,
    /// Tags tried in order when picking an interaction target inside a component.
    #[serde(default = "default_interaction_controls")]
    pub interaction_controls: Vec<String>,
    #[serde(default)]
    pub highlight: HighlightConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            allow_component_results: false,
            interaction_controls: default_interaction_controls(),
            highlight: HighlightConfig::default(),
        }
    }
}

fn default_interaction_controls() -> Vec<String> {
    ["textarea", "input", "button", "select"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HighlightConfig {
    #[serde(default = "default_fill")]
    pub fill: String,
    #[serde(default = "default_border")]
    pub border: String,
    #[serde(default = "default_z_index")]
    pub z_index: i64,
    /// Applied when `highlight` is called without a timeout. `None` keeps
    /// markers until cleared.
    #[serde(default)]
    pub default_timeout_ms: Option<u64>,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            fill: default_fill(),
            border: default_border(),
            z_index: default_z_index(),
            default_timeout_ms: None,
        }
    }
}

fn default_fill() -> String {
    "rgba(255, 170, 0, 0.5)".to_string()
}

fn default_border() -> String {
    "rgba(255, 170, 0, 0.7)".to_string()
}

fn default_z_index() -> i64 {
    100000
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: EngineConfig =
            serde_json::from_value(json!({"highlight": {"default_timeout_ms": 250}})).unwrap();
        assert!(!config.allow_component_results);
        assert_eq!(
            config.interaction_controls,
            vec!["textarea", "input", "button", "select"]
        );
        assert_eq!(config.highlight.default_timeout_ms, Some(250));
        assert_eq!(config.highlight.z_index, 100000);
        assert_eq!(config.highlight.fill, "rgba(255, 170, 0, 0.5)");
    }
}
