use serde::{Deserialize, Serialize};
use specview_core::EngineConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpecViewConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Indent JSON output.
    #[serde(default = "default_true")]
    pub pretty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            pretty: default_true(),
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Files tried in order when no `--config` is given: the working
    /// directory's `specview.yaml`, then `~/.specview/config.yaml`.
    pub fn candidates() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("specview.yaml")];
        paths.extend(dirs::home_dir().map(|home| home.join(".specview").join("config.yaml")));
        paths
    }

    /// An explicit path must load; otherwise the first existing candidate
    /// wins and defaults apply when there is none.
    pub async fn load(explicit: Option<&Path>) -> Result<SpecViewConfig, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_from(path).await;
        }
        match Self::candidates().into_iter().find(|path| path.is_file()) {
            Some(path) => Self::load_from(&path).await,
            None => {
                debug!("No config file found, using defaults");
                Ok(SpecViewConfig::default())
            }
        }
    }

    pub async fn load_from(path: &Path) -> Result<SpecViewConfig, ConfigError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let config = serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::fs;

    #[tokio::test]
    async fn test_load_partial_config() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("specview.yaml");
        let content = r#"
engine:
  allow_component_results: true
  highlight:
    default_timeout_ms: 1500
output:
  pretty: false
"#;
        fs::write(&path, content).await.unwrap();

        let config = ConfigLoader::load(Some(&path)).await.unwrap();
        assert!(config.engine.allow_component_results);
        assert_eq!(config.engine.highlight.default_timeout_ms, Some(1500));
        assert_eq!(config.engine.highlight.z_index, 100000);
        assert_eq!(
            config.engine.interaction_controls,
            vec!["textarea", "input", "button", "select"]
        );
        assert!(!config.output.pretty);
    }

    #[tokio::test]
    async fn test_empty_config_uses_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("empty.yaml");
        fs::write(&path, "{}").await.unwrap();

        let config = ConfigLoader::load_from(&path).await.unwrap();
        assert!(!config.engine.allow_component_results);
        assert!(config.output.pretty);
    }

    #[test]
    fn test_candidates_start_in_working_directory() {
        let candidates = ConfigLoader::candidates();
        assert_eq!(candidates[0], PathBuf::from("specview.yaml"));
        assert!(candidates.iter().skip(1).all(|p| p.ends_with(".specview/config.yaml")));
    }

    #[tokio::test]
    async fn test_missing_and_malformed_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let missing = temp_dir.path().join("nope.yaml");
        assert!(matches!(
            ConfigLoader::load_from(&missing).await,
            Err(ConfigError::Read { .. })
        ));

        let broken = temp_dir.path().join("broken.yaml");
        fs::write(&broken, "engine: [1, 2").await.unwrap();
        assert!(matches!(
            ConfigLoader::load_from(&broken).await,
            Err(ConfigError::Parse { .. })
        ));
    }
}
