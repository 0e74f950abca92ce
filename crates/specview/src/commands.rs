use crate::config::SpecViewConfig;
use anyhow::{Context as _, Result, bail};
use serde_json::Value;
use specview_core::{Engine, Fetcher, FunctionRegistry};
use specview_static::StaticPage;
use std::path::Path;
use tracing::{debug, info};

pub fn parse_selector(selector: &str) -> Result<Value> {
    let parsed = specview_core::parse(selector)?;
    Ok(serde_json::to_value(&parsed.segments)?)
}

/// Load a fixture; `.json` files are read as JSON, everything else as YAML.
pub async fn load_page(path: &Path) -> Result<StaticPage> {
    let source = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read page fixture {}", path.display()))?;
    let page = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => StaticPage::from_json(&source),
        _ => StaticPage::from_yaml(&source),
    }
    .with_context(|| format!("Invalid page fixture {}", path.display()))?;
    info!(
        "Loaded {}: {} nodes, {} component instances",
        path.display(),
        page.node_count(),
        page.instance_count()
    );
    Ok(page)
}

pub async fn read_fetcher(inline: Option<&str>, file: Option<&Path>) -> Result<Fetcher> {
    let source = match (inline, file) {
        (Some(json), None) => json.to_string(),
        (None, Some(path)) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read fetcher {}", path.display()))?,
        _ => bail!("Provide exactly one of --fetcher or --fetcher-file"),
    };
    let fetcher: Fetcher = serde_json::from_str(&source).context("Invalid fetcher JSON")?;
    Ok(fetcher)
}

pub fn fetch(page: &StaticPage, config: &SpecViewConfig, fetcher: &Fetcher) -> Result<Value> {
    let mut engine = Engine::with_config(page, config.engine.clone());
    let outcome = engine.fetch(fetcher)?;
    let active = engine.highlight_count();
    if active > 0 {
        debug!("{} highlight markers active", active);
    }
    Ok(outcome.into_json())
}

pub fn functions() -> Vec<String> {
    FunctionRegistry::builtin()
        .names()
        .into_iter()
        .map(String::from)
        .collect()
}

pub fn to_output(value: &Value, pretty: bool) -> Result<String> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::fs;

    const PAGE: &str = r#"
app:
  - component: Greeting
    props: { who: world }
    children:
      - { tag: p, text: hello }
"#;

    #[test]
    fn test_parse_selector() {
        let segments = parse_selector("div.a @Foo{x: 1}{y: 'z'} span").unwrap();
        assert_eq!(segments.as_array().map(|s| s.len()), Some(3));
        assert!(parse_selector("").is_err());
    }

    #[tokio::test]
    async fn test_fetch_against_yaml_fixture() {
        let temp_dir = tempfile::tempdir().unwrap();
        let page_path = temp_dir.path().join("page.yaml");
        fs::write(&page_path, PAGE).await.unwrap();
        let fetcher_path = temp_dir.path().join("fetcher.json");
        fs::write(
            &fetcher_path,
            r#"{"context": {"context": {"isRoot": true}, "query": {"selector": "@Greeting"}}, "fn": "prop", "args": ["who"]}"#,
        )
        .await
        .unwrap();

        let page = load_page(&page_path).await.unwrap();
        let fetcher = read_fetcher(None, Some(&fetcher_path)).await.unwrap();
        let value = fetch(&page, &SpecViewConfig::default(), &fetcher).unwrap();
        assert_eq!(value, json!("world"));
    }

    #[tokio::test]
    async fn test_inline_fetcher_and_config() {
        let temp_dir = tempfile::tempdir().unwrap();
        let page_path = temp_dir.path().join("page.yaml");
        fs::write(&page_path, PAGE).await.unwrap();
        let page = load_page(&page_path).await.unwrap();

        let inline = r#"{"context": {"isRoot": true}, "query": {"selector": "@Greeting"}}"#;
        let fetcher = read_fetcher(Some(inline), None).await.unwrap();
        assert!(fetch(&page, &SpecViewConfig::default(), &fetcher).is_err());

        let mut config = SpecViewConfig::default();
        config.engine.allow_component_results = true;
        let value = fetch(&page, &config, &fetcher).unwrap();
        assert!(value.get("components").is_some());

        assert!(read_fetcher(None, None).await.is_err());
    }

    #[test]
    fn test_functions_and_output() {
        let names = functions();
        assert!(names.contains(&"interactionElement".to_string()));
        assert_eq!(to_output(&json!({"a": 1}), false).unwrap(), r#"{"a":1}"#);
    }
}
