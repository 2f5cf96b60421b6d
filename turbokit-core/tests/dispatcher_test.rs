#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use turbokit_core::config::OrchestratorConfig;
use turbokit_core::dispatcher::{Dispatcher, StderrMode, TaskRunRequest};
use turbokit_core::error::Error;
use turbokit_core::report::RunOutcome;
use turbokit_core::root::{find_root, RepositoryRoot};

fn create_repo() -> (TempDir, RepositoryRoot) {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("turbo.json"), "{}").unwrap();
    let root = find_root(temp_dir.path()).unwrap();
    (temp_dir, root)
}

/// Writes an executable shell script standing in for the orchestrator.
///
/// The script is written under a temporary name and renamed into place, so
/// the final path is never open for writing.
fn fake_orchestrator(dir: &Path, body: &str) -> String {
    let staging = dir.join(".fake-turbo.partial");
    fs::write(&staging, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(&staging, fs::Permissions::from_mode(0o755)).unwrap();
    let path = dir.join("fake-turbo");
    fs::rename(&staging, &path).unwrap();
    path.to_string_lossy().into_owned()
}

fn dispatcher(root: &RepositoryRoot, program: String) -> Dispatcher {
    let config = OrchestratorConfig {
        program,
        ..Default::default()
    };
    Dispatcher::new(root.clone(), config)
        .unwrap()
        .with_stderr(StderrMode::Discard)
}

#[tokio::test]
async fn test_successful_report_is_returned_verbatim() {
    let (temp_dir, root) = create_repo();
    let report = r#"{"success":true,"tasks":[{"pkg":"@x/ui","status":"ok"}]}"#;
    let program = fake_orchestrator(temp_dir.path(), &format!("echo '{}'", report));

    let result = dispatcher(&root, program)
        .run_task(&TaskRunRequest::new("build"))
        .await
        .unwrap();

    assert!(result.success);
    let expected: serde_json::Value = serde_json::from_str(report).unwrap();
    assert_eq!(serde_json::to_value(&result).unwrap(), expected);
}

#[tokio::test]
async fn test_nonzero_exit_overrides_reported_success() {
    let (temp_dir, root) = create_repo();
    let program = fake_orchestrator(
        temp_dir.path(),
        "echo '{\"success\":true,\"tasks\":[{\"pkg\":\"a\"}]}'\nexit 3",
    );

    let result = dispatcher(&root, program)
        .run_task(&TaskRunRequest::new("build"))
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.tasks.len(), 1);
    assert!(result.exit_overrode_report());
    assert!(matches!(
        result.outcome,
        RunOutcome::Completed {
            exit_code: Some(3),
            ..
        }
    ));
}

#[tokio::test]
async fn test_malformed_output_collapses_to_failure() {
    let (temp_dir, root) = create_repo();
    let program = fake_orchestrator(temp_dir.path(), "echo 'Tasks: 3 successful'\nexit 0");

    let result = dispatcher(&root, program)
        .run_task(&TaskRunRequest::new("build"))
        .await
        .unwrap();

    assert!(!result.success);
    assert!(result.tasks.is_empty());
    assert!(matches!(result.outcome, RunOutcome::MalformedReport { .. }));
}

#[tokio::test]
async fn test_timeout_kills_orchestrator() {
    let (temp_dir, root) = create_repo();
    let program = fake_orchestrator(temp_dir.path(), "exec sleep 30");

    let request = TaskRunRequest::new("build").with_timeout(Duration::from_millis(200));
    let started = Instant::now();
    let result = dispatcher(&root, program).run_task(&request).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(!result.success);
    assert!(result.tasks.is_empty());
    assert_eq!(
        result.outcome,
        RunOutcome::TimedOut {
            after: Duration::from_millis(200)
        }
    );
}

#[tokio::test]
async fn test_timeout_kills_orchestrator_workers() {
    let (temp_dir, root) = create_repo();
    let program = fake_orchestrator(temp_dir.path(), "(sleep 1; touch survivor) &\nsleep 30");

    let request = TaskRunRequest::new("build").with_timeout(Duration::from_millis(200));
    let started = Instant::now();
    let result = dispatcher(&root, program).run_task(&request).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(matches!(result.outcome, RunOutcome::TimedOut { .. }));

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(!temp_dir.path().join("survivor").exists());
}

#[tokio::test]
async fn test_background_worker_does_not_hold_run_open() {
    let (temp_dir, root) = create_repo();
    let program = fake_orchestrator(
        temp_dir.path(),
        "sleep 30 &\necho '{\"success\":true,\"tasks\":[]}'",
    );

    let dispatcher = dispatcher(&root, program);
    let request = TaskRunRequest::new("build");
    let run = dispatcher.run_task(&request);
    let result = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .expect("run should finish once the orchestrator exits")
        .unwrap();
    assert!(result.success);
}

#[tokio::test]
async fn test_default_timeout_from_config() {
    let (temp_dir, root) = create_repo();
    let program = fake_orchestrator(temp_dir.path(), "exec sleep 30");
    let config = OrchestratorConfig {
        program,
        timeout_ms: Some(150),
        ..Default::default()
    };

    let result = Dispatcher::new(root, config)
        .unwrap()
        .with_stderr(StderrMode::Discard)
        .run_task(&TaskRunRequest::new("build"))
        .await
        .unwrap();
    assert!(matches!(result.outcome, RunOutcome::TimedOut { .. }));
}

#[tokio::test]
async fn test_arguments_and_working_directory() {
    let (temp_dir, root) = create_repo();
    let program = fake_orchestrator(
        temp_dir.path(),
        "printf '%s\\n' \"$@\" > args.txt\npwd > cwd.txt\necho '{\"success\":true,\"tasks\":[]}'",
    );

    let request = TaskRunRequest::new("test").with_filter("@x/ui...");
    let result = dispatcher(&root, program).run_task(&request).await.unwrap();
    assert!(result.success);

    let args = fs::read_to_string(temp_dir.path().join("args.txt")).unwrap();
    assert_eq!(
        args.lines().collect::<Vec<_>>(),
        ["run", "test", "--json", "--filter", "@x/ui..."]
    );
    assert!(temp_dir.path().join("cwd.txt").exists());
}

#[test]
fn test_blocking_run() {
    let (temp_dir, root) = create_repo();
    let program = fake_orchestrator(temp_dir.path(), "echo '{\"success\":false,\"tasks\":[]}'");

    let result = dispatcher(&root, program)
        .run_task_blocking(&TaskRunRequest::new("lint"))
        .unwrap();
    assert!(!result.success);
    assert!(!result.exit_overrode_report());
}

#[test]
fn test_freshly_written_orchestrators_run_concurrently() {
    let handles: Vec<_> = (0..8)
        .map(|_| {
            std::thread::spawn(|| {
                let (temp_dir, root) = create_repo();
                let program = fake_orchestrator(
                    temp_dir.path(),
                    "echo '{\"success\":true,\"tasks\":[]}'",
                );
                dispatcher(&root, program)
                    .run_task_blocking(&TaskRunRequest::new("build"))
                    .unwrap()
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap().success);
    }
}

#[test]
fn test_missing_orchestrator_is_detected_at_construction() {
    let (_temp_dir, root) = create_repo();
    let config = OrchestratorConfig {
        program: "turbokit-no-such-orchestrator".to_string(),
        ..Default::default()
    };

    match Dispatcher::new(root, config) {
        Err(Error::MissingDependency { program, .. }) => {
            assert_eq!(program, "turbokit-no-such-orchestrator")
        }
        other => panic!("expected MissingDependency, got {:?}", other),
    }
}

#[test]
fn test_local_node_modules_bin_is_preferred() {
    let (temp_dir, root) = create_repo();
    let bin_dir = temp_dir.path().join("node_modules").join(".bin");
    fs::create_dir_all(&bin_dir).unwrap();
    fake_orchestrator(&bin_dir, "exit 0");
    let config = OrchestratorConfig {
        program: "fake-turbo".to_string(),
        ..Default::default()
    };

    let dispatcher = Dispatcher::new(root, config).unwrap();
    assert_eq!(dispatcher.program(), bin_dir.join("fake-turbo"));
}

#[tokio::test]
async fn test_empty_task_name_is_rejected() {
    let (temp_dir, root) = create_repo();
    let program = fake_orchestrator(temp_dir.path(), "exit 0");

    let result = dispatcher(&root, program)
        .run_task(&TaskRunRequest::new("  "))
        .await;
    assert!(matches!(result, Err(Error::InvalidRequest(_))));
}
