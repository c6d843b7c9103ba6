use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

fn default_title() -> String {
    "Hound".to_string()
}

fn default_max_concurrent_indexers() -> usize {
    2
}

fn default_max_concurrent_queries() -> usize {
    num_cpus::get()
}

fn default_health_check_uri() -> String {
    "/healthz".to_string()
}

fn default_result_limit() -> usize {
    5000
}

fn default_ms_between_poll() -> u64 {
    30_000
}

fn default_vcs() -> String {
    "git".to_string()
}

fn default_base_url() -> String {
    "{url}/blob/{rev}/{path}{anchor}".to_string()
}

fn default_anchor() -> String {
    "#L{line}".to_string()
}

fn default_max_file_bytes() -> u64 {
    5 * 1024 * 1024
}

fn default_true() -> bool {
    true
}

/// Server-level configuration, consumed already-validated (the loader that
/// parses TOML off disk lives outside the core, see `load`/`save` below,
/// which are a convenience, not the boundary).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub dbpath: PathBuf,

    #[serde(default = "default_title")]
    pub title: String,

    #[serde(default)]
    pub repos: HashMap<String, RepoConfig>,

    #[serde(default = "default_max_concurrent_indexers")]
    pub max_concurrent_indexers: usize,

    #[serde(default = "default_max_concurrent_queries")]
    pub max_concurrent_queries: usize,

    #[serde(default = "default_health_check_uri")]
    pub health_check_uri: String,

    #[serde(default = "default_result_limit")]
    pub result_limit: usize,

    #[serde(default)]
    pub vcs_config: HashMap<String, toml::Value>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            dbpath: default_dbpath(),
            title: default_title(),
            repos: HashMap::new(),
            max_concurrent_indexers: default_max_concurrent_indexers(),
            max_concurrent_queries: default_max_concurrent_queries(),
            health_check_uri: default_health_check_uri(),
            result_limit: default_result_limit(),
            vcs_config: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct UrlPattern {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_anchor")]
    pub anchor: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RepoConfig {
    pub url: String,

    #[serde(default)]
    pub display_name: Option<String>,

    #[serde(default = "default_ms_between_poll")]
    pub ms_between_poll: u64,

    #[serde(default = "default_vcs")]
    pub vcs: String,

    #[serde(default)]
    pub url_pattern: UrlPattern,

    #[serde(default)]
    pub exclude_dot_files: bool,

    #[serde(default = "default_true")]
    pub enable_poll_updates: bool,

    #[serde(default)]
    pub enable_push_updates: bool,

    #[serde(default)]
    pub auto_generated_files: Vec<String>,

    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

impl RepoConfig {
    /// `display-name` defaults to the repo's map key, which the loader
    /// doesn't know until after deserialization; callers fill it in.
    pub fn display_name_or(&self, name: &str) -> String {
        self.display_name.clone().unwrap_or_else(|| name.to_string())
    }
}

fn default_dbpath() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".hound")
}

impl Config {
    /// Loads and expands a TOML config file. This is a convenience for the
    /// two binaries; nothing downstream of `Config` re-parses TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&raw)
            .map_err(|e| Error::ConfigInvalid(format!("{}: {e}", path.display())))?;
        config.dbpath = expand_path(&config.dbpath);
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let raw = toml::to_string_pretty(self)
            .map_err(|e| Error::ConfigInvalid(e.to_string()))?;
        std::fs::write(path, raw)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.dbpath.as_os_str().is_empty() {
            return Err(Error::ConfigInvalid("dbpath must not be empty".into()));
        }
        for (name, repo) in &self.repos {
            if repo.url.is_empty() {
                return Err(Error::ConfigInvalid(format!("repo {name}: url is required")));
            }
        }
        Ok(())
    }

    pub fn ensure_dbpath(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dbpath)?;
        Ok(())
    }

    pub fn repo_dir(&self, repo_name: &str) -> PathBuf {
        self.dbpath.join(repo_name)
    }
}

fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&raw).into_owned())
}
