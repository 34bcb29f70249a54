// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 mobci contributors

//! Orchestrator configuration
//!
//! Loaded once at startup from YAML, JSON or TOML, chosen by file extension.

mod validation;

pub use validation::ConfigValidator;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::checker::DEFAULT_DATABASE;
use crate::errors::{MobciError, MobciResult};
use crate::matrix::MatrixVariant;
use crate::scheduler::{Recurrence, ScheduleEntry};

/// Default config file name
pub const CONFIG_FILE: &str = "mobci.yaml";

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MobciConfig {
    /// Root of the per-build directories
    #[serde(default)]
    pub work_dir: Option<PathBuf>,

    pub store: StoreConfig,

    /// Test applications by name
    #[serde(default)]
    pub apps: BTreeMap<String, AppConfig>,

    /// Default repository matrix, by project
    #[serde(default)]
    pub repos: BTreeMap<String, RepoConfig>,

    #[serde(default)]
    pub tools: ToolsConfig,

    /// Builders by name
    #[serde(default)]
    pub builders: BTreeMap<String, BuilderConfig>,

    #[serde(default)]
    pub schedules: Vec<ScheduleConfig>,
}

/// Result store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub uri: String,

    #[serde(default = "default_database")]
    pub database: String,

    /// Upper bound on one store query
    #[serde(default = "default_wait_secs")]
    pub wait_secs: u64,
}

fn default_database() -> String {
    DEFAULT_DATABASE.to_string()
}

fn default_wait_secs() -> u64 {
    30
}

/// A test application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Entry command, program first
    pub command: Vec<String>,

    /// Overall run timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Checkout directory of the app, relative to the build directory
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

fn default_timeout_secs() -> u64 {
    1800
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoConfig {
    pub url: String,

    #[serde(default = "default_branch")]
    pub branch: String,
}

fn default_branch() -> String {
    "master".to_string()
}

/// A program with leading arguments
///
/// Pipeline steps append their own arguments after `args`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// External tools the build pipeline calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Fetches an external repository matrix: `<args> <dest> <uri>`
    #[serde(default = "default_download")]
    pub download: CommandSpec,

    /// Clones the repositories: `<args> <repos config>`
    #[serde(default = "default_clone")]
    pub clone: CommandSpec,

    /// Installs the app: `<args> <platform>`
    #[serde(default = "default_install")]
    pub install: CommandSpec,

    /// Gathers device logs: `<args> <platform> <log dir>`
    #[serde(default)]
    pub logs: Option<CommandSpec>,
}

fn default_download() -> CommandSpec {
    CommandSpec::new("curl", &["-fsSL", "-o"])
}

fn default_clone() -> CommandSpec {
    CommandSpec::new("node", &["medic/checkout.js", "--config"])
}

fn default_install() -> CommandSpec {
    CommandSpec::new("node", &["medic/install.js", "--platform"])
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            download: default_download(),
            clone: default_clone(),
            install: default_install(),
            logs: None,
        }
    }
}

/// A platform-bound build configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuilderConfig {
    pub platform: String,

    /// Name of the app in `apps`
    pub app: String,

    /// Matrix variants; a builder without variants runs once
    #[serde(default)]
    pub variants: Vec<MatrixVariant>,

    /// Extra initial properties of every build
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl BuilderConfig {
    pub fn is_matrix(&self) -> bool {
        !self.variants.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub name: String,

    /// Trigger minutes within an hour
    pub minutes: Vec<u32>,

    #[serde(default = "default_hour_stride")]
    pub hour_stride: u32,

    pub builders: Vec<String>,
}

fn default_hour_stride() -> u32 {
    1
}

impl ScheduleConfig {
    pub fn to_entry(&self) -> MobciResult<ScheduleEntry> {
        Ok(ScheduleEntry {
            name: self.name.clone(),
            recurrence: Recurrence::new(self.minutes.iter().copied(), self.hour_stride)?,
            builders: self.builders.clone(),
        })
    }
}

impl MobciConfig {
    /// Load a config file, picking the format from its extension
    pub fn load(path: &Path) -> MobciResult<Self> {
        if !path.exists() {
            return Err(MobciError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| MobciError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content, path)
    }

    /// Parse config text; `path` only selects the format
    pub fn parse(content: &str, path: &Path) -> MobciResult<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(serde_json::from_str(content)?),
            Some("toml") => Ok(toml::from_str(content)?),
            _ => Ok(serde_yaml::from_str(content)?),
        }
    }

    /// Config path to use when none is given
    ///
    /// `./mobci.yaml` wins over the per-user config directory.
    pub fn default_path() -> PathBuf {
        let local = PathBuf::from(CONFIG_FILE);
        if local.exists() {
            return local;
        }

        directories::ProjectDirs::from("org", "mobci", "mobci")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
            .unwrap_or(local)
    }

    /// Root directory of per-build directories
    pub fn work_root(&self) -> PathBuf {
        self.work_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("mobci"))
    }

    pub fn builder(&self, name: &str) -> MobciResult<&BuilderConfig> {
        self.builders.get(name).ok_or_else(|| MobciError::UnknownBuilder {
            builder: name.to_string(),
        })
    }

    pub fn app(&self, name: &str) -> MobciResult<&AppConfig> {
        self.apps
            .get(name)
            .ok_or_else(|| MobciError::invalid_config(format!("app '{}' is not configured", name)))
    }

    /// Schedule entries of every configured schedule
    pub fn schedule_entries(&self) -> MobciResult<Vec<ScheduleEntry>> {
        self.schedules.iter().map(ScheduleConfig::to_entry).collect()
    }

    /// Write the default repository matrix as JSON
    pub async fn write_repos_config(&self, path: &Path) -> MobciResult<()> {
        let to_write_error = |e: std::io::Error| MobciError::FileWriteError {
            path: path.to_path_buf(),
            error: e.to_string(),
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(to_write_error)?;
        }

        let json = serde_json::to_string_pretty(&self.repos)?;
        tokio::fs::write(path, json).await.map_err(to_write_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const YAML: &str = r#"
store:
  uri: http://couchdb.local:5984
apps:
  mobilespec:
    command: [node, medic/build.js]
    timeout_secs: 600
repos:
  cordova-android:
    url: https://github.com/apache/cordova-android.git
builders:
  android-nexus:
    platform: android
    app: mobilespec
  windows-store:
    platform: windows
    app: mobilespec
    variants:
      - label: store80
        extra_args: ["--winvers=store80"]
schedules:
  - name: nightly
    minutes: [30]
    hour_stride: 2
    builders: [android-nexus, windows-store]
"#;

    #[test]
    fn test_parse_yaml_with_defaults() {
        let config = MobciConfig::parse(YAML, Path::new("mobci.yaml")).unwrap();

        assert_eq!(config.store.database, "mobilespec_results");
        assert_eq!(config.store.wait_secs, 30);
        assert_eq!(config.repos["cordova-android"].branch, "master");
        assert_eq!(config.tools.clone.program, "node");
        assert!(config.builder("windows-store").unwrap().is_matrix());
        assert!(!config.builder("android-nexus").unwrap().is_matrix());
    }

    #[test]
    fn test_unknown_builder() {
        let config = MobciConfig::parse(YAML, Path::new("mobci.yaml")).unwrap();
        assert!(matches!(
            config.builder("blackberry"),
            Err(MobciError::UnknownBuilder { .. })
        ));
    }

    #[test]
    fn test_parse_toml() {
        let content = r#"
work_dir = "/var/mobci"

[store]
uri = "http://localhost:5984"
database = "results"

[apps.spec]
command = ["node", "run.js"]
"#;
        let config = MobciConfig::parse(content, Path::new("mobci.toml")).unwrap();
        assert_eq!(config.store.database, "results");
        assert_eq!(config.work_root(), PathBuf::from("/var/mobci"));
        assert_eq!(config.app("spec").unwrap().timeout_secs, 1800);
    }

    #[test]
    fn test_schedule_entries() {
        let config = MobciConfig::parse(YAML, Path::new("mobci.yaml")).unwrap();
        let entries = config.schedule_entries().unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].recurrence.hour_stride(), 2);
        assert_eq!(entries[0].builders, vec!["android-nexus", "windows-store"]);
    }

    #[test]
    fn test_missing_config() {
        let err = MobciConfig::load(Path::new("/nonexistent/mobci.yaml")).unwrap_err();
        assert!(matches!(err, MobciError::ConfigNotFound { .. }));
    }

    #[tokio::test]
    async fn test_write_repos_config() {
        let config = MobciConfig::parse(YAML, Path::new("mobci.yaml")).unwrap();
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("conf/repos.json");

        config.write_repos_config(&path).await.unwrap();

        let written: BTreeMap<String, RepoConfig> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, config.repos);
    }
}
