//! Task catalog: which workspace members declare which scripts.

use std::path::PathBuf;

use indexmap::IndexMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::manifest::PackageManifest;
use crate::root::RepositoryRoot;
use crate::workspace::WorkspaceMember;

/// What to do when a member manifest cannot be read while building a catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberPolicy {
    /// Leave the member out and record it in [`TaskCatalog::skipped`].
    #[default]
    Report,
    /// Fail the whole catalog.
    Strict,
}

/// A member left out of a catalog, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedMember {
    pub name: String,
    pub relative_path: PathBuf,
    pub reason: String,
}

/// Mapping from task name to the members that declare it.
///
/// Task names keep first-seen order and member lists keep the order in which
/// members were supplied.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskCatalog {
    tasks: IndexMap<String, Vec<String>>,
    skipped: Vec<SkippedMember>,
}

impl TaskCatalog {
    pub fn tasks(&self) -> &IndexMap<String, Vec<String>> {
        &self.tasks
    }

    #[inline]
    pub fn members_for(&self, task: &str) -> Option<&[String]> {
        self.tasks.get(task).map(Vec::as_slice)
    }

    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(String::as_str)
    }

    pub fn skipped(&self) -> &[SkippedMember] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    fn record(&mut self, task: &str, member: &str) {
        self.tasks
            .entry(task.to_string())
            .or_default()
            .push(member.to_string());
    }
}

/// Builds the task catalog for `members`.
///
/// Manifests are read in parallel; aggregation happens in `members` order.
///
/// # Errors
///
/// Under [`MemberPolicy::Strict`], the first unreadable member manifest is
/// returned as [`crate::Error::ManifestRead`].
pub fn list_tasks(
    root: &RepositoryRoot,
    members: &[WorkspaceMember],
    policy: MemberPolicy,
) -> Result<TaskCatalog> {
    let manifests: Vec<Result<PackageManifest>> = members
        .par_iter()
        .map(|member| PackageManifest::read(&member.manifest_path(root)))
        .collect();

    let mut catalog = TaskCatalog::default();
    for (member, manifest) in members.iter().zip(manifests) {
        match manifest {
            Ok(manifest) => {
                for task in manifest.task_names() {
                    catalog.record(task, &member.name);
                }
            }
            Err(e) if policy == MemberPolicy::Strict => return Err(e),
            Err(e) => {
                warn!(member = %member.name, error = %e, "skipping member with unreadable manifest");
                catalog.skipped.push(SkippedMember {
                    name: member.name.clone(),
                    relative_path: member.relative_path.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    debug!(
        tasks = catalog.len(),
        skipped = catalog.skipped.len(),
        "built task catalog"
    );
    Ok(catalog)
}
