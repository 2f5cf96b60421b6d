//! `package.json` manifest model.
//!
//! Only the fields this crate acts on are decoded. Unknown fields are
//! ignored, but a known field with the wrong shape makes the whole manifest
//! undecodable.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// File name of a package manifest.
pub const MANIFEST_FILE: &str = "package.json";

/// File name whose presence marks a directory as the repository root.
pub const MARKER_FILE: &str = "turbo.json";

/// Workspace declaration of a root manifest.
///
/// Both the npm array form and the yarn object form are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Workspaces {
    List(Vec<String>),
    Object {
        #[serde(default)]
        packages: Vec<String>,
    },
}

impl Workspaces {
    pub fn globs(&self) -> &[String] {
        match self {
            Workspaces::List(globs) => globs,
            Workspaces::Object { packages } => packages,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageManifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub scripts: IndexMap<String, String>,
    /// Alternative task table; entries already in `scripts` win.
    #[serde(default)]
    pub commands: IndexMap<String, String>,
    #[serde(default)]
    pub workspaces: Option<Workspaces>,
}

impl PackageManifest {
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| Error::manifest(path, e))
    }

    /// Reads and decodes the manifest at `path`.
    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::manifest(path, e))?;
        Self::parse(&content, path)
    }

    /// Reads the manifest inside `dir`.
    pub fn read_in(dir: &Path) -> Result<Self> {
        Self::read(&dir.join(MANIFEST_FILE))
    }

    #[inline]
    pub fn workspace_globs(&self) -> &[String] {
        self.workspaces.as_ref().map(|w| w.globs()).unwrap_or(&[])
    }

    #[inline]
    pub fn declares_workspaces(&self) -> bool {
        !self.workspace_globs().is_empty()
    }

    /// Task names in declaration order, `scripts` first.
    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.scripts.keys().map(String::as_str).chain(
            self.commands
                .keys()
                .filter(move |name| !self.scripts.contains_key(*name))
                .map(String::as_str),
        )
    }
}

/// Best-effort read of a manifest's `name`, ignoring every other field.
pub fn read_name(dir: &Path) -> Option<String> {
    let content = std::fs::read_to_string(dir.join(MANIFEST_FILE)).ok()?;
    let value: serde_json::Value = serde_json::from_str(&content).ok()?;
    value
        .get("name")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}
