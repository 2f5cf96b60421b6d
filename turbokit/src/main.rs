mod commands;
mod formatting;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

use commands::GlobalArgs;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "turbokit", version)]
#[command(about = "Inspect monorepo workspaces and dispatch tasks to the orchestrator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory to start looking for the repository root from
    #[arg(long, global = true)]
    cwd: Option<PathBuf>,

    /// Orchestrator executable (name on PATH or path)
    #[arg(long, global = true, env = "TURBOKIT_ORCHESTRATOR")]
    orchestrator: Option<String>,

    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[arg(short, long, global = true, action)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the repository root
    Root,
    /// List workspace members
    Workspaces {
        #[arg(long, action)]
        json: bool,
    },
    /// List tasks and the members that declare them
    Tasks {
        #[arg(long, action)]
        json: bool,
        /// Fail instead of skipping members with unreadable manifests
        #[arg(long, action)]
        strict: bool,
    },
    /// Run a task through the orchestrator
    Run {
        task: String,
        /// Package selector passed to the orchestrator
        #[arg(long)]
        filter: Option<String>,
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Print the run report as JSON
        #[arg(long, action)]
        json: bool,
        /// Discard the orchestrator's stderr
        #[arg(long, action)]
        silent: bool,
    },
}

fn init_tracing(verbose: u8, quiet: bool) {
    let level = if quiet {
        LevelFilter::ERROR
    } else {
        match verbose {
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    };

    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .with_env_var("TURBOKIT_LOG")
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    let global = GlobalArgs {
        cwd: cli.cwd,
        orchestrator: cli.orchestrator,
    };

    match cli.command {
        Commands::Root => commands::cmd_root(&global)?,
        Commands::Workspaces { json } => commands::cmd_workspaces(&global, json)?,
        Commands::Tasks { json, strict } => commands::cmd_tasks(&global, json, strict)?,
        Commands::Run {
            task,
            filter,
            timeout_ms,
            json,
            silent,
        } => return commands::cmd_run(&global, task, filter, timeout_ms, json, silent),
    }

    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            formatting::print_error(&e.to_string());
            ExitCode::from(2)
        }
    }
}
