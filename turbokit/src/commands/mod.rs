//! Command implementations for the CLI.

mod discovery;
mod execution;

use std::path::PathBuf;

use anyhow::Result;
use tracing::debug;
use turbokit_core::{find_root, find_root_from_cwd, RepositoryRoot, Settings};

pub use discovery::{cmd_root, cmd_tasks, cmd_workspaces};
pub use execution::cmd_run;

/// Options shared by every subcommand.
pub struct GlobalArgs {
    pub cwd: Option<PathBuf>,
    pub orchestrator: Option<String>,
}

struct Context {
    root: RepositoryRoot,
    settings: Settings,
}

fn resolve_root(global: &GlobalArgs) -> Result<RepositoryRoot> {
    let root = match global.cwd {
        Some(ref dir) => find_root(dir)?,
        None => find_root_from_cwd()?,
    };
    Ok(root)
}

fn load_context(global: &GlobalArgs) -> Result<Context> {
    let root = resolve_root(global)?;
    let mut settings = Settings::load(&root)?;
    if let Some(ref program) = global.orchestrator {
        settings.orchestrator.program = program.clone();
    }
    debug!(root = %root, program = %settings.orchestrator.program, "loaded settings");
    Ok(Context { root, settings })
}
