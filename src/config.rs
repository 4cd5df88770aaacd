use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::utils;

const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_CLUSTER_COUNT: usize = 30;
const DEFAULT_NUM_RESULTS: usize = 5;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AtlasConfig {
    pub data_dir: String,
    pub dataset_path: String,
    pub embeddings_path: String,
    pub embeddings_json_path: String,
    pub themes_dir: String,
    pub templates_dir: String,
    pub static_dir: String,
    pub default_cluster_count: usize,
    pub default_num_results: usize,
}

#[derive(Debug, Deserialize)]
pub struct AtlasConfigFile {
    #[serde(default)]
    data_dir: Option<String>,
    #[serde(default)]
    dataset_path: Option<String>,
    #[serde(default)]
    embeddings_path: Option<String>,
    #[serde(default)]
    embeddings_json_path: Option<String>,
    #[serde(default)]
    themes_dir: Option<String>,
    #[serde(default)]
    templates_dir: Option<String>,
    #[serde(default)]
    static_dir: Option<String>,
    #[serde(default)]
    default_cluster_count: Option<usize>,
    #[serde(default)]
    default_num_results: Option<usize>,
}

fn default_data_dir() -> String {
    DEFAULT_DATA_DIR.to_string()
}

fn data_path(data_dir: &str, entry: &str) -> String {
    Path::new(data_dir).join(entry).to_string_lossy().to_string()
}

impl Default for AtlasConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            dataset_path: data_path(&data_dir, "papers.csv"),
            embeddings_path: data_path(&data_dir, "embeddings.bin"),
            embeddings_json_path: data_path(&data_dir, "embeddings.json"),
            themes_dir: data_dir.clone(),
            templates_dir: "templates".to_string(),
            static_dir: "static".to_string(),
            default_cluster_count: DEFAULT_CLUSTER_COUNT,
            default_num_results: DEFAULT_NUM_RESULTS,
            data_dir,
        }
    }
}

impl AtlasConfig {
    fn from_file(config: AtlasConfigFile) -> Self {
        let data_dir = config.data_dir.unwrap_or_else(default_data_dir);
        Self {
            dataset_path: config
                .dataset_path
                .unwrap_or_else(|| data_path(&data_dir, "papers.csv")),
            embeddings_path: config
                .embeddings_path
                .unwrap_or_else(|| data_path(&data_dir, "embeddings.bin")),
            embeddings_json_path: config
                .embeddings_json_path
                .unwrap_or_else(|| data_path(&data_dir, "embeddings.json")),
            themes_dir: config.themes_dir.unwrap_or_else(|| data_dir.clone()),
            templates_dir: config
                .templates_dir
                .unwrap_or_else(|| "templates".to_string()),
            static_dir: config.static_dir.unwrap_or_else(|| "static".to_string()),
            default_cluster_count: config
                .default_cluster_count
                .unwrap_or(DEFAULT_CLUSTER_COUNT),
            default_num_results: config.default_num_results.unwrap_or(DEFAULT_NUM_RESULTS),
            data_dir,
        }
    }
}

pub fn load_config(path: &Path) -> Result<AtlasConfig, String> {
    if path.exists() {
        let contents = fs::read_to_string(path)
            .map_err(|err| format!("Failed to read config {path:?}: {err}"))?;
        let config = serde_json::from_str::<AtlasConfigFile>(&contents)
            .map_err(|err| format!("Failed to parse config {path:?}: {err}"))?;
        Ok(AtlasConfig::from_file(config))
    } else {
        Ok(AtlasConfig::default())
    }
}

pub fn write_config(path: &Path, config: &AtlasConfig) -> Result<(), String> {
    let _ = utils::ensure_parent_dir(path)?;
    let contents = serde_json::to_string_pretty(config)
        .map_err(|err| format!("Failed to serialize config {path:?}: {err}"))?;
    utils::write_atomic_bytes(path, contents.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_resolve_under_data_dir() {
        let config = AtlasConfig::default();
        assert_eq!(config.dataset_path, data_path("data", "papers.csv"));
        assert_eq!(config.themes_dir, "data");
        assert_eq!(config.default_cluster_count, 30);
        assert_eq!(config.default_num_results, 5);
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            "{}",
            r#"{"data_dir": "artifacts", "default_cluster_count": 50}"#
        )
        .expect("write config");
        let config = load_config(file.path()).expect("load config");
        assert_eq!(config.data_dir, "artifacts");
        assert_eq!(config.dataset_path, data_path("artifacts", "papers.csv"));
        assert_eq!(config.themes_dir, "artifacts");
        assert_eq!(config.default_cluster_count, 50);
        assert_eq!(config.default_num_results, 5);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = load_config(&dir.path().join("nope.json")).expect("load config");
        assert_eq!(config.data_dir, "data");
    }

    #[test]
    fn write_then_load_round_trips() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("atlas_config.json");
        let mut config = AtlasConfig::default();
        config.default_cluster_count = 70;
        write_config(&path, &config).expect("write config");
        let loaded = load_config(&path).expect("load config");
        assert_eq!(loaded.default_cluster_count, 70);
    }
}
