use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration file structure for ciseed.
///
/// Holds the settings that stay the same between seeding runs for a
/// project. Configuration files are loaded from the current directory or
/// a specified path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Project the seeded pipelines belong to
    #[serde(default)]
    pub project: ProjectConfig,

    /// Ref protection rules
    #[serde(default)]
    pub protection: ProtectionConfig,

    /// Pipeline store location
    #[serde(default)]
    pub store: StoreConfig,

    /// Output format preferences
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProjectConfig {
    /// Numeric project ID
    #[serde(default = "default_project_id")]
    pub id: u64,

    /// Project path (e.g., 'group/project')
    #[serde(default = "default_project_path")]
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProtectionConfig {
    /// Protected ref names or wildcard patterns (e.g., 'release/*')
    #[serde(default = "default_protected_refs")]
    pub protected_refs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StoreConfig {
    /// Persist seeded pipelines to disk
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Store file path, defaults to the platform data directory
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Default output format
    #[serde(default)]
    pub format: OutputFormat,

    /// Pretty-print JSON output
    #[serde(default)]
    pub pretty: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Summary,
    Json,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            id: default_project_id(),
            path: default_project_path(),
        }
    }
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self {
            protected_refs: default_protected_refs(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

fn default_project_id() -> u64 {
    1
}

fn default_project_path() -> String {
    "group/project".to_string()
}

fn default_protected_refs() -> Vec<String> {
    vec!["main".to_string(), "master".to_string()]
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./ciseed.toml
    /// 3. ./ciseed.json
    /// 4. ./ciseed.yaml
    /// 5. ./ciseed.yml
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        let candidates = ["ciseed.toml", "ciseed.json", "ciseed.yaml", "ciseed.yml"];

        for candidate in &candidates {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load_from_path(path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => {
                // Try TOML first, then JSON, then YAML
                toml::from_str(&contents)
                    .or_else(|_| serde_json::from_str(&contents))
                    .or_else(|_| serde_yaml::from_str(&contents))
                    .with_context(|| format!("Failed to parse config file: {}", path.display()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.project.id, 1);
        assert_eq!(config.project.path, "group/project");
        assert_eq!(config.protection.protected_refs, vec!["main", "master"]);
        assert!(config.store.enabled);
        assert!(config.store.path.is_none());
        assert_eq!(config.output.format, OutputFormat::Summary);
    }

    #[test]
    fn test_load_toml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        let toml_content = r#"
[project]
id = 42
path = "gitlab-org/gitlab"

[protection]
protected-refs = ["master", "release/*"]

[store]
enabled = false

[output]
format = "json"
pretty = true
"#;
        write!(temp_file, "{toml_content}").unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.project.id, 42);
        assert_eq!(config.project.path, "gitlab-org/gitlab");
        assert_eq!(
            config.protection.protected_refs,
            vec!["master", "release/*"]
        );
        assert!(!config.store.enabled);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(config.output.pretty);
    }

    #[test]
    fn test_load_json_config() {
        let mut temp_file = NamedTempFile::with_suffix(".json").unwrap();
        let json_content = r#"{
  "project": {
    "path": "group/json"
  },
  "store": {
    "path": "/tmp/ciseed-store.json"
  }
}"#;
        write!(temp_file, "{json_content}").unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.project.id, 1);
        assert_eq!(config.project.path, "group/json");
        assert_eq!(
            config.store.path,
            Some(PathBuf::from("/tmp/ciseed-store.json"))
        );
        assert!(config.store.enabled);
    }

    #[test]
    fn test_load_yaml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".yml").unwrap();
        write!(temp_file, "protection:\n  protected-refs: []\n").unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert!(config.protection.protected_refs.is_empty());
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let result = Config::load(Some(Path::new("nonexistent-ciseed.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_without_extension_falls_back_to_yaml() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("ciseed");
        std::fs::write(&path, "project:\n  path: group/fallback\noutput:\n  format: json\n")
            .unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.project.path, "group/fallback");
        assert_eq!(loaded.output.format, OutputFormat::Json);
    }
}
