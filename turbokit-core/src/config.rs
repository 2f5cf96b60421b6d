//! Optional `turbokit.toml` settings at the repository root.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::catalog::MemberPolicy;
use crate::error::{Error, Result};
use crate::root::RepositoryRoot;

pub const CONFIG_FILE: &str = "turbokit.toml";

/// How the orchestration executable is located and invoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrchestratorConfig {
    /// Executable name looked up on `PATH`, or a path to it.
    pub program: String,
    /// Flag asking the orchestrator for a JSON run report on stdout.
    pub json_flag: String,
    /// Flag preceding the package filter value.
    pub filter_flag: String,
    /// Default timeout applied when a request carries none.
    pub timeout_ms: Option<u64>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            program: "turbo".to_string(),
            json_flag: "--json".to_string(),
            filter_flag: "--filter".to_string(),
            timeout_ms: None,
        }
    }
}

impl OrchestratorConfig {
    /// Timeout applied to requests that do not set their own.
    #[inline]
    pub fn default_timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogConfig {
    pub member_policy: MemberPolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub orchestrator: OrchestratorConfig,
    pub catalog: CatalogConfig,
}

impl Settings {
    /// Loads `turbokit.toml` from the root, falling back to defaults when the
    /// file does not exist.
    pub fn load(root: &RepositoryRoot) -> Result<Self> {
        let path = root.path().join(CONFIG_FILE);
        if !path.is_file() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content, &path)
    }

    pub fn from_toml_str(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}
