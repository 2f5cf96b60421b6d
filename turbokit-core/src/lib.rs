//! Workspace discovery and task dispatch for turbo-style monorepos.
//!
//! The crate resolves the repository root, enumerates workspace members from
//! the root `package.json`, aggregates the scripts they declare, and hands a
//! task off to the orchestration executable, reporting its JSON run summary.

pub mod catalog;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod manifest;
pub mod report;
pub mod root;
pub mod workspace;

pub use catalog::{list_tasks, MemberPolicy, SkippedMember, TaskCatalog};
pub use config::{CatalogConfig, OrchestratorConfig, Settings};
pub use dispatcher::{Dispatcher, StderrMode, TaskRunRequest};
pub use error::{Error, Result};
pub use manifest::{PackageManifest, Workspaces, MANIFEST_FILE, MARKER_FILE};
pub use report::{RunOutcome, TaskRunResult};
pub use root::{detect_marker, find_root, find_root_from_cwd, RepositoryRoot, RootMarker};
pub use workspace::{list_workspaces, WorkspaceGlob, WorkspaceMember};
