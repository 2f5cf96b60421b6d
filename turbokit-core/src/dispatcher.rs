//! Dispatching a task to the external orchestrator.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::config::OrchestratorConfig;
use crate::error::{Error, Result};
use crate::report::{RunOutcome, TaskRunResult};
use crate::root::RepositoryRoot;

const SPAWN_RETRIES: u32 = 5;
const SPAWN_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Where the orchestrator's stderr goes. Stdout is always captured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StderrMode {
    /// Shown live on this process's stderr.
    #[default]
    Inherit,
    /// Thrown away.
    Discard,
}

impl StderrMode {
    fn stdio(self) -> Stdio {
        match self {
            StderrMode::Inherit => Stdio::inherit(),
            StderrMode::Discard => Stdio::null(),
        }
    }
}

/// A request to run one task through the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskRunRequest {
    pub task_name: String,
    /// Package selector handed to the orchestrator verbatim.
    pub filter: Option<String>,
    pub timeout: Option<Duration>,
}

impl TaskRunRequest {
    pub fn new(task_name: impl Into<String>) -> Self {
        Self {
            task_name: task_name.into(),
            ..Default::default()
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.task_name.trim().is_empty() {
            return Err(Error::InvalidRequest("task name cannot be empty".to_string()));
        }
        if self.task_name.starts_with('-') {
            return Err(Error::InvalidRequest(format!(
                "task name '{}' looks like a flag",
                self.task_name
            )));
        }
        Ok(())
    }
}

/// Runs tasks by spawning the orchestration executable, one child per call.
///
/// The executable is located when the dispatcher is built, so a missing
/// orchestrator is reported before anything is spawned. Concurrent calls are
/// independent; nothing here serializes them.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    root: RepositoryRoot,
    program: PathBuf,
    config: OrchestratorConfig,
    stderr: StderrMode,
}

impl Dispatcher {
    /// # Errors
    ///
    /// Returns [`Error::MissingDependency`] if `config.program` cannot be
    /// found in `<root>/node_modules/.bin` or on `PATH`.
    pub fn new(root: RepositoryRoot, config: OrchestratorConfig) -> Result<Self> {
        let program = locate_program(&root, &config.program)?;
        debug!(program = %program.display(), "located orchestrator");
        Ok(Self {
            root,
            program,
            config,
            stderr: StderrMode::default(),
        })
    }

    pub fn with_stderr(mut self, stderr: StderrMode) -> Self {
        self.stderr = stderr;
        self
    }

    #[inline]
    pub fn program(&self) -> &Path {
        &self.program
    }

    #[inline]
    pub fn root(&self) -> &RepositoryRoot {
        &self.root
    }

    /// Arguments passed to the orchestrator for `request`.
    pub fn command_args(&self, request: &TaskRunRequest) -> Vec<String> {
        let mut args = vec!["run".to_string(), request.task_name.clone()];
        if !self.config.json_flag.is_empty() {
            args.push(self.config.json_flag.clone());
        }
        if let Some(ref filter) = request.filter {
            args.push(self.config.filter_flag.clone());
            args.push(filter.clone());
        }
        args
    }

    /// Runs the task and waits for the orchestrator to exit.
    ///
    /// A timeout or an unusable report is not an error: both produce a
    /// failed [`TaskRunResult`], since the orchestrator may already have done
    /// real work. The orchestrator runs in its own process group, and the
    /// whole group is killed on timeout and once the orchestrator exits.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRequest`] for an empty task name, [`Error::Spawn`] if
    /// the process cannot be started, [`Error::Io`] if its output cannot be
    /// read.
    pub async fn run_task(&self, request: &TaskRunRequest) -> Result<TaskRunResult> {
        request.validate()?;
        let timeout = request.timeout.or_else(|| self.config.default_timeout());

        let mut command = Command::new(&self.program);
        command
            .args(self.command_args(request))
            .current_dir(self.root.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(self.stderr.stdio())
            .kill_on_drop(true);
        // The orchestrator leads its own group so its workers can be signalled with it.
        #[cfg(unix)]
        command.process_group(0);

        info!(
            task = %request.task_name,
            filter = ?request.filter,
            program = %self.program.display(),
            "dispatching task"
        );
        let started = Instant::now();

        let mut child = self.spawn(&mut command).await?;
        let group = child.id();
        let mut stdout = child.stdout.take().ok_or_else(|| {
            Error::Io(std::io::Error::other("orchestrator stdout was not captured"))
        })?;
        let reader = tokio::spawn(async move {
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf).await.map(|_| buf)
        });

        let status = match timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => status?,
                Err(_) => {
                    warn!(
                        task = %request.task_name,
                        timeout_ms = limit.as_millis() as u64,
                        "orchestrator timed out, killing its process group"
                    );
                    kill_process_group(group);
                    if let Err(e) = child.kill().await {
                        warn!(error = %e, "failed to kill orchestrator");
                    }
                    reader.abort();
                    return Ok(TaskRunResult::timed_out(limit));
                }
            },
            None => child.wait().await?,
        };

        // Workers left behind by an exited orchestrator may still hold stdout open.
        kill_process_group(group);
        let output = reader
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))??;

        let result = TaskRunResult::from_report(&output, status.success(), status.code());
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match result.outcome {
            RunOutcome::MalformedReport { ref reason, exit_code } => {
                warn!(?exit_code, %reason, elapsed_ms, "orchestrator report is unusable");
            }
            RunOutcome::Completed { exit_code, .. } if result.exit_overrode_report() => {
                warn!(
                    ?exit_code,
                    elapsed_ms,
                    "orchestrator reported success but exited with failure"
                );
            }
            _ => {
                info!(
                    success = result.success,
                    tasks = result.tasks.len(),
                    elapsed_ms,
                    "task finished"
                );
            }
        }

        Ok(result)
    }

    /// Spawns `command`, retrying briefly while the executable is still open
    /// for writing somewhere (`ETXTBSY`), as happens right after it was
    /// installed.
    async fn spawn(&self, command: &mut Command) -> Result<Child> {
        let mut attempt = 0;
        loop {
            match command.spawn() {
                Err(e) if is_text_file_busy(&e) && attempt < SPAWN_RETRIES => {
                    attempt += 1;
                    debug!(
                        attempt,
                        program = %self.program.display(),
                        "executable busy, retrying spawn"
                    );
                    tokio::time::sleep(SPAWN_RETRY_DELAY).await;
                }
                result => {
                    return result.map_err(|source| Error::Spawn {
                        program: self.program.clone(),
                        source,
                    })
                }
            }
        }
    }

    /// Blocking form of [`Dispatcher::run_task`].
    ///
    /// Drives the run on a private current-thread runtime, so it must not be
    /// called from inside an async context.
    pub fn run_task_blocking(&self, request: &TaskRunRequest) -> Result<TaskRunResult> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.run_task(request))
    }
}

#[cfg(unix)]
fn is_text_file_busy(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(nix::errno::Errno::ETXTBSY as i32)
}

#[cfg(not(unix))]
fn is_text_file_busy(_e: &std::io::Error) -> bool {
    false
}

/// Sends `SIGKILL` to every process in the group led by `leader`.
#[cfg(unix)]
fn kill_process_group(leader: Option<u32>) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(leader) = leader else {
        return;
    };
    match killpg(Pid::from_raw(leader as i32), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!(pgid = leader, error = %e, "failed to kill orchestrator process group"),
    }
}

#[cfg(not(unix))]
fn kill_process_group(_leader: Option<u32>) {}

fn locate_program(root: &RepositoryRoot, program: &str) -> Result<PathBuf> {
    let local_bin = root.path().join("node_modules").join(".bin");
    if local_bin.is_dir() {
        if let Ok(path) = which::which_in(program, Some(&local_bin), root.path()) {
            return Ok(path);
        }
    }

    which::which_in(program, std::env::var_os("PATH"), root.path()).map_err(|e| {
        Error::MissingDependency {
            program: program.to_string(),
            reason: e.to_string(),
        }
    })
}
