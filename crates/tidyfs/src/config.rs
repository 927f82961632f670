use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, TidyError};
use crate::types::Category;

pub const CONFIG_FILENAME: &str = "tidyfs.json";
pub const CONFIG_VERSION: &str = "1.0.0";

pub const DEFAULT_CACHE_DIR: &str = "cache";
pub const DEFAULT_SNAPSHOT_FILE: &str = "system_model_cache.bin.zst";
pub const DEFAULT_SCHEDULE_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TidyConfig {
    pub version: String,
    /// Snapshot directory, resolved against the config directory when relative.
    pub cache_dir: PathBuf,
    pub snapshot_file: String,
    pub hidden: HiddenPolicy,
    /// Subtrees never scanned.
    pub ignored_paths: Vec<PathBuf>,
    pub parallel_scan: bool,
    /// Write one snapshot after every top-level scan.
    pub autosave_after_scan: bool,
    pub category_folders: BTreeMap<Category, String>,
    pub schedule_interval_secs: u64,
}

/// Which names count as hidden-by-convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HiddenPolicy {
    pub prefixes: Vec<String>,
    /// Leave hidden entries out of the tree entirely during scans.
    pub skip_on_scan: bool,
}

impl Default for HiddenPolicy {
    fn default() -> Self {
        Self {
            prefixes: vec![".".to_string()],
            skip_on_scan: false,
        }
    }
}

impl HiddenPolicy {
    pub fn is_hidden(&self, name: &str) -> bool {
        self.prefixes
            .iter()
            .any(|prefix| !prefix.is_empty() && name.starts_with(prefix.as_str()))
    }
}

impl Default for TidyConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            snapshot_file: DEFAULT_SNAPSHOT_FILE.to_string(),
            hidden: HiddenPolicy::default(),
            ignored_paths: Vec::new(),
            parallel_scan: false,
            autosave_after_scan: true,
            category_folders: Category::ALL
                .into_iter()
                .map(|category| (category, category.default_folder().to_string()))
                .collect(),
            schedule_interval_secs: DEFAULT_SCHEDULE_INTERVAL_SECS,
        }
    }
}

impl TidyConfig {
    /// Folder name for a category, falling back to the built-in name.
    pub fn folder_for(&self, category: Category) -> &str {
        self.category_folders
            .get(&category)
            .map(String::as_str)
            .unwrap_or_else(|| category.default_folder())
    }

    /// Full snapshot location.
    pub fn snapshot_path(&self) -> PathBuf {
        self.cache_dir.join(&self.snapshot_file)
    }

    pub fn schedule_interval(&self) -> Duration {
        Duration::from_secs(self.schedule_interval_secs.max(1))
    }

    /// Anchors a relative `cache_dir` at `base`.
    pub fn with_base_dir(mut self, base: &Path) -> Self {
        if self.cache_dir.is_relative() {
            self.cache_dir = base.join(&self.cache_dir);
        }
        self
    }
}

pub fn load_or_create_config(dir: &Path) -> Result<TidyConfig> {
    std::fs::create_dir_all(dir).map_err(|error| {
        TidyError::Config(format!(
            "failed to create config directory {}: {error}",
            dir.display()
        ))
    })?;

    let path = config_path(dir);
    if !path.exists() {
        let config = TidyConfig::default();
        write_config(&path, &config)?;
        return Ok(config.with_base_dir(dir));
    }

    let data = std::fs::read_to_string(&path).map_err(|error| {
        TidyError::Config(format!(
            "failed to read config {}: {error}",
            path.display()
        ))
    })?;
    let config: TidyConfig = serde_json::from_str(&data).map_err(|error| {
        TidyError::Config(format!(
            "failed to parse config {}: {error}",
            path.display()
        ))
    })?;

    if config.version != CONFIG_VERSION {
        return Err(TidyError::Config(format!(
            "unsupported config version {} in {}",
            config.version,
            path.display()
        )));
    }

    Ok(config.with_base_dir(dir))
}

pub fn config_path(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILENAME)
}

fn write_config(path: &Path, config: &TidyConfig) -> Result<()> {
    let data = serde_json::to_string_pretty(config).map_err(|error| {
        TidyError::Config(format!(
            "failed to serialize config {}: {error}",
            path.display()
        ))
    })?;
    std::fs::write(path, data).map_err(|error| {
        TidyError::Config(format!(
            "failed to write config {}: {error}",
            path.display()
        ))
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creates_config_when_missing() {
        let dir = tempdir().expect("tempdir");
        let config = load_or_create_config(dir.path()).expect("load/create");

        assert!(config_path(dir.path()).exists());
        assert_eq!(config.version, CONFIG_VERSION);
        assert_eq!(config.cache_dir, dir.path().join(DEFAULT_CACHE_DIR));
        assert_eq!(
            config.snapshot_path(),
            dir.path().join("cache").join(DEFAULT_SNAPSHOT_FILE)
        );
        assert!(config.autosave_after_scan);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(
            config_path(dir.path()),
            r#"{ "version": "1.0.0", "parallel_scan": true, "category_folders": { "photos": "Pictures" } }"#,
        )
        .expect("write config");

        let config = load_or_create_config(dir.path()).expect("load config");
        assert!(config.parallel_scan);
        assert_eq!(config.folder_for(Category::Photos), "Pictures");
        assert_eq!(config.folder_for(Category::Music), "Music");
        assert_eq!(config.hidden.prefixes, vec![".".to_string()]);
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(config_path(dir.path()), "{ not json").expect("write config");

        let err = load_or_create_config(dir.path()).expect_err("expected error");
        match err {
            TidyError::Config(message) => assert!(message.contains("failed to parse config")),
            other => panic!("expected Config, got {other:?}"),
        }
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let dir = tempdir().expect("tempdir");
        let config = TidyConfig {
            version: "0.1.0".to_string(),
            ..TidyConfig::default()
        };
        write_config(&config_path(dir.path()), &config).expect("write config");

        assert!(matches!(
            load_or_create_config(dir.path()),
            Err(TidyError::Config(_))
        ));
    }

    #[test]
    fn hidden_policy_prefixes() {
        let policy = HiddenPolicy {
            prefixes: vec![".".to_string(), "~$".to_string()],
            skip_on_scan: false,
        };
        assert!(policy.is_hidden(".DS_Store"));
        assert!(policy.is_hidden("~$draft.docx"));
        assert!(!policy.is_hidden("notes.txt"));
    }
}
