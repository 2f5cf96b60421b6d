use std::fs;
use std::path::Path;

use tempfile::TempDir;

use turbokit_core::catalog::{list_tasks, MemberPolicy};
use turbokit_core::error::Error;
use turbokit_core::root::{find_root, RepositoryRoot};
use turbokit_core::workspace::{list_workspaces, WorkspaceMember};

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn create_repo() -> (TempDir, RepositoryRoot) {
    let temp_dir = TempDir::new().unwrap();
    write(
        &temp_dir.path().join("package.json"),
        r#"{"name": "repo", "workspaces": ["packages/*"]}"#,
    );
    let root = find_root(temp_dir.path()).unwrap();
    (temp_dir, root)
}

fn create_package(root: &Path, dir: &str, manifest: &str) {
    write(&root.join("packages").join(dir).join("package.json"), manifest);
}

#[test]
fn test_catalog_aggregates_members_per_task() {
    let (temp_dir, root) = create_repo();
    create_package(
        temp_dir.path(),
        "a",
        r#"{"name": "a", "scripts": {"build": "tsc"}}"#,
    );
    create_package(
        temp_dir.path(),
        "b",
        r#"{"name": "b", "scripts": {"build": "tsc", "test": "vitest"}}"#,
    );

    let members = list_workspaces(&root).unwrap();
    let catalog = list_tasks(&root, &members, MemberPolicy::Report).unwrap();

    assert_eq!(catalog.len(), 2);
    assert_eq!(catalog.members_for("build").unwrap(), ["a", "b"]);
    assert_eq!(catalog.members_for("test").unwrap(), ["b"]);
    assert!(catalog.members_for("lint").is_none());
    assert!(catalog.skipped().is_empty());
}

#[test]
fn test_catalog_preserves_member_order() {
    let (temp_dir, root) = create_repo();
    create_package(temp_dir.path(), "a", r#"{"name": "a", "scripts": {"build": "x"}}"#);
    create_package(temp_dir.path(), "b", r#"{"name": "b", "scripts": {"build": "x"}}"#);

    let members = vec![
        WorkspaceMember::new("b", "packages/b"),
        WorkspaceMember::new("a", "packages/a"),
    ];
    let catalog = list_tasks(&root, &members, MemberPolicy::Report).unwrap();
    assert_eq!(catalog.members_for("build").unwrap(), ["b", "a"]);
}

#[test]
fn test_task_names_keep_first_seen_order() {
    let (temp_dir, root) = create_repo();
    create_package(
        temp_dir.path(),
        "a",
        r#"{"name": "a", "scripts": {"lint": "x", "build": "x"}}"#,
    );
    create_package(
        temp_dir.path(),
        "b",
        r#"{"name": "b", "scripts": {"test": "x", "build": "x"}}"#,
    );

    let members = list_workspaces(&root).unwrap();
    let catalog = list_tasks(&root, &members, MemberPolicy::Report).unwrap();
    let names: Vec<&str> = catalog.task_names().collect();
    assert_eq!(names, ["lint", "build", "test"]);
}

#[test]
fn test_commands_table_is_merged_with_scripts() {
    let (temp_dir, root) = create_repo();
    create_package(
        temp_dir.path(),
        "a",
        r#"{"name": "a", "scripts": {"build": "tsc"}, "commands": {"build": "other", "deploy": "ship"}}"#,
    );

    let members = list_workspaces(&root).unwrap();
    let catalog = list_tasks(&root, &members, MemberPolicy::Report).unwrap();
    assert_eq!(catalog.members_for("build").unwrap(), ["a"]);
    assert_eq!(catalog.members_for("deploy").unwrap(), ["a"]);
}

#[test]
fn test_unreadable_member_is_reported_and_skipped() {
    let (temp_dir, root) = create_repo();
    create_package(temp_dir.path(), "good", r#"{"name": "good", "scripts": {"build": "x"}}"#);
    create_package(temp_dir.path(), "bad", r#"{"name": "bad", "scripts": ["build"]}"#);

    let members = list_workspaces(&root).unwrap();
    assert_eq!(members.len(), 2);

    let catalog = list_tasks(&root, &members, MemberPolicy::Report).unwrap();
    assert_eq!(catalog.members_for("build").unwrap(), ["good"]);
    assert_eq!(catalog.skipped().len(), 1);
    assert_eq!(catalog.skipped()[0].name, "bad");
    assert!(!catalog.skipped()[0].reason.is_empty());
}

#[test]
fn test_strict_policy_fails_on_unreadable_member() {
    let (temp_dir, root) = create_repo();
    create_package(temp_dir.path(), "good", r#"{"name": "good", "scripts": {"build": "x"}}"#);
    create_package(temp_dir.path(), "bad", "{ nope");

    let members = list_workspaces(&root).unwrap();
    match list_tasks(&root, &members, MemberPolicy::Strict) {
        Err(Error::ManifestRead { path, .. }) => {
            assert!(path.ends_with("packages/bad/package.json"))
        }
        other => panic!("expected ManifestRead, got {:?}", other),
    }
}

#[test]
fn test_empty_members_give_empty_catalog() {
    let (_temp_dir, root) = create_repo();
    let catalog = list_tasks(&root, &[], MemberPolicy::Strict).unwrap();
    assert!(catalog.is_empty());
}
