//! Repository root resolution.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::manifest::{PackageManifest, MANIFEST_FILE, MARKER_FILE};

/// Absolute path of a monorepo root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RepositoryRoot(PathBuf);

impl RepositoryRoot {
    #[inline]
    pub fn path(&self) -> &Path {
        &self.0
    }

    #[inline]
    pub fn manifest_path(&self) -> PathBuf {
        self.0.join(MANIFEST_FILE)
    }
}

impl AsRef<Path> for RepositoryRoot {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for RepositoryRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Why a directory qualified as the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootMarker {
    OrchestratorConfig,
    WorkspaceManifest,
}

impl RootMarker {
    pub fn file_name(&self) -> &'static str {
        match self {
            RootMarker::OrchestratorConfig => MARKER_FILE,
            RootMarker::WorkspaceManifest => MANIFEST_FILE,
        }
    }
}

/// Reports whether `dir` itself qualifies as a repository root.
pub fn detect_marker(dir: &Path) -> Option<RootMarker> {
    if dir.join(MARKER_FILE).is_file() {
        return Some(RootMarker::OrchestratorConfig);
    }

    let manifest_path = dir.join(MANIFEST_FILE);
    if !manifest_path.is_file() {
        return None;
    }

    match PackageManifest::read(&manifest_path) {
        Ok(manifest) if manifest.declares_workspaces() => Some(RootMarker::WorkspaceManifest),
        Ok(_) => None,
        Err(e) => {
            debug!(path = %manifest_path.display(), error = %e, "ignoring undecodable manifest");
            None
        }
    }
}

/// Walks upward from `start_dir` to the first directory holding `turbo.json`
/// or a `package.json` with a non-empty `workspaces` list.
///
/// Symlinks are not resolved. A relative `start_dir` is anchored at the
/// process working directory so the walk can reach the filesystem root, and
/// `.`/`..` components are folded lexically before walking, so only true
/// ancestors of the start directory are visited.
///
/// # Errors
///
/// Returns [`Error::NotInMonorepo`] when no ancestor qualifies.
pub fn find_root(start_dir: impl AsRef<Path>) -> Result<RepositoryRoot> {
    let start_dir = start_dir.as_ref();
    let start = if start_dir.is_absolute() {
        normalize_lexically(start_dir)
    } else {
        normalize_lexically(&std::env::current_dir()?.join(start_dir))
    };

    let mut current_dir = start.as_path();
    loop {
        trace!(dir = %current_dir.display(), "checking for repository root");
        if let Some(marker) = detect_marker(current_dir) {
            debug!(
                root = %current_dir.display(),
                marker = marker.file_name(),
                "found repository root"
            );
            return Ok(RepositoryRoot(current_dir.to_path_buf()));
        }

        match current_dir.parent() {
            Some(parent) if parent != current_dir => current_dir = parent,
            _ => break,
        }
    }

    Err(Error::NotInMonorepo { start })
}

/// Drops `.` and resolves `..` against the preceding component without
/// touching the filesystem. `..` at the filesystem root stays at the root.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}

/// Like [`find_root`], starting at the process working directory.
pub fn find_root_from_cwd() -> Result<RepositoryRoot> {
    find_root(std::env::current_dir()?)
}
