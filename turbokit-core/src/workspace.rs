//! Workspace member discovery.
//!
//! Members are derived from the root manifest's `workspaces` list on every
//! call. Only a restricted glob subset is understood: `<dir>/*` selects the
//! immediate subdirectories of `<dir>`, and a pattern without wildcards names
//! a single directory. Anything else is rejected rather than guessed at.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::manifest::{self, PackageManifest, MANIFEST_FILE};
use crate::root::RepositoryRoot;

const GLOB_CHARS: &[char] = &['*', '?', '[', ']', '{', '}', '!'];

/// A package directory inside the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceMember {
    pub name: String,
    pub relative_path: PathBuf,
}

impl WorkspaceMember {
    pub fn new(name: impl Into<String>, relative_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            relative_path: relative_path.into(),
        }
    }

    #[inline]
    pub fn path(&self, root: &RepositoryRoot) -> PathBuf {
        root.path().join(&self.relative_path)
    }

    #[inline]
    pub fn manifest_path(&self, root: &RepositoryRoot) -> PathBuf {
        self.path(root).join(MANIFEST_FILE)
    }
}

/// A parsed `workspaces` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceGlob {
    /// `<dir>/*`: every immediate subdirectory of `dir`.
    Children(PathBuf),
    /// A plain relative directory.
    Exact(PathBuf),
}

impl WorkspaceGlob {
    /// Parses a workspace pattern.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedWorkspaceGlob`] for negations, nested or
    /// mid-path wildcards, character classes, brace sets, absolute paths and
    /// `..` segments.
    pub fn parse(pattern: &str) -> Result<Self> {
        let trimmed = pattern.trim();
        if trimmed.is_empty() {
            return Err(Error::glob(pattern, "pattern is empty"));
        }
        if trimmed.starts_with('!') {
            return Err(Error::glob(pattern, "negated patterns are not supported"));
        }

        let mut normalized = trimmed;
        while let Some(rest) = normalized.strip_prefix("./") {
            normalized = rest;
        }
        let normalized = normalized.trim_end_matches('/');

        let (base, children) = if normalized == "*" {
            ("", true)
        } else if let Some(base) = normalized.strip_suffix("/*") {
            (base, true)
        } else {
            (normalized, false)
        };

        if base.contains(GLOB_CHARS) {
            return Err(Error::glob(
                pattern,
                "a wildcard is only allowed as the whole final segment",
            ));
        }

        let base_path = Path::new(base);
        if base.starts_with('/') || base_path.is_absolute() {
            return Err(Error::glob(pattern, "absolute paths are not allowed"));
        }
        if base_path
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(Error::glob(pattern, "'..' segments are not allowed"));
        }

        if children {
            Ok(WorkspaceGlob::Children(base_path.to_path_buf()))
        } else if base.is_empty() || base == "." {
            Err(Error::glob(pattern, "pattern selects the repository root itself"))
        } else {
            Ok(WorkspaceGlob::Exact(base_path.to_path_buf()))
        }
    }

    /// Relative paths of the package directories this glob selects.
    ///
    /// A missing base directory selects nothing.
    pub fn expand(&self, root: &Path) -> Vec<PathBuf> {
        match self {
            WorkspaceGlob::Children(base) => WalkDir::new(root.join(base))
                .min_depth(1)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.path().is_dir())
                .filter(|e| e.path().join(MANIFEST_FILE).is_file())
                .map(|e| base.join(e.file_name()))
                .collect(),
            WorkspaceGlob::Exact(dir) => {
                if root.join(dir).join(MANIFEST_FILE).is_file() {
                    vec![dir.clone()]
                } else {
                    Vec::new()
                }
            }
        }
    }
}

/// Parses every `workspaces` entry of the root manifest.
pub fn workspace_globs(root: &RepositoryRoot) -> Result<Vec<WorkspaceGlob>> {
    let manifest = PackageManifest::read(&root.manifest_path())?;
    manifest
        .workspace_globs()
        .iter()
        .map(|pattern| WorkspaceGlob::parse(pattern))
        .collect()
}

/// Lists workspace members ordered by relative path.
///
/// Directories without a `package.json` are skipped. A member whose manifest
/// has no usable `name` is named after its directory.
///
/// # Errors
///
/// Returns [`Error::ManifestRead`] if the root manifest is missing or
/// undecodable, and [`Error::UnsupportedWorkspaceGlob`] for patterns outside
/// the supported subset.
pub fn list_workspaces(root: &RepositoryRoot) -> Result<Vec<WorkspaceMember>> {
    let globs = workspace_globs(root)?;

    let mut dirs: BTreeMap<String, PathBuf> = BTreeMap::new();
    for glob in &globs {
        for relative in glob.expand(root.path()) {
            dirs.insert(relative.to_string_lossy().into_owned(), relative);
        }
    }

    let dirs: Vec<PathBuf> = dirs.into_values().collect();
    let members: Vec<WorkspaceMember> = dirs
        .par_iter()
        .map(|relative| {
            let name = manifest::read_name(&root.path().join(relative)).unwrap_or_else(|| {
                let fallback = relative
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| relative.to_string_lossy().into_owned());
                warn!(
                    path = %relative.display(),
                    "manifest has no usable name, using directory name '{}'",
                    fallback
                );
                fallback
            });
            WorkspaceMember::new(name, relative.clone())
        })
        .collect();

    debug!(count = members.len(), "enumerated workspace members");
    Ok(members)
}
