//! Error types and result aliases.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(
        "Not inside a monorepo: no turbo.json or workspace-declaring package.json found above {}",
        start.display()
    )]
    NotInMonorepo { start: PathBuf },

    #[error("Failed to read manifest {}: {reason}", path.display())]
    ManifestRead { path: PathBuf, reason: String },

    #[error("Unsupported workspace glob '{pattern}': {reason}. Only '<dir>/*' and plain directories are supported.")]
    UnsupportedWorkspaceGlob { pattern: String, reason: String },

    #[error("Orchestrator '{program}' is not available: {reason}")]
    MissingDependency { program: String, reason: String },

    #[error("Failed to spawn '{}': {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid task request: {0}")]
    InvalidRequest(String),

    #[error("Config error in {}: {message}", path.display())]
    Config { path: PathBuf, message: String },
}

impl Error {
    pub(crate) fn manifest(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::ManifestRead {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn glob(pattern: &str, reason: impl Into<String>) -> Self {
        Error::UnsupportedWorkspaceGlob {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
