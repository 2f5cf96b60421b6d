//! Decoding the orchestrator's JSON run report.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The part of a run report this crate trusts.
#[derive(Debug, Deserialize)]
struct RunReport {
    success: bool,
    tasks: Vec<Value>,
}

/// How a dispatched run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The process exited and printed a well-formed report.
    Completed {
        exit_code: Option<i32>,
        reported_success: bool,
    },
    /// The process exited but stdout was not a usable report.
    MalformedReport {
        exit_code: Option<i32>,
        reason: String,
    },
    /// The process outlived its timeout and was killed.
    TimedOut { after: Duration },
}

/// Result of one orchestrator run.
///
/// Serializes as `{"success": .., "tasks": [..]}`. Task records are passed
/// through untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRunResult {
    pub success: bool,
    pub tasks: Vec<Value>,
    #[serde(skip)]
    pub outcome: RunOutcome,
}

impl TaskRunResult {
    pub fn timed_out(after: Duration) -> Self {
        Self {
            success: false,
            tasks: Vec::new(),
            outcome: RunOutcome::TimedOut { after },
        }
    }

    /// Builds a result from captured stdout and the process exit status.
    ///
    /// Anything other than a JSON object with a boolean `success` and an
    /// array `tasks` collapses to `{success: false, tasks: []}`. A failed
    /// exit forces `success` to `false` even if the report claims otherwise.
    pub fn from_report(stdout: &[u8], exit_success: bool, exit_code: Option<i32>) -> Self {
        match decode(stdout) {
            Ok(report) => Self {
                success: report.success && exit_success,
                tasks: report.tasks,
                outcome: RunOutcome::Completed {
                    exit_code,
                    reported_success: report.success,
                },
            },
            Err(reason) => Self {
                success: false,
                tasks: Vec::new(),
                outcome: RunOutcome::MalformedReport { exit_code, reason },
            },
        }
    }

    /// True when the report said success but the exit status overruled it.
    pub fn exit_overrode_report(&self) -> bool {
        !self.success
            && matches!(
                self.outcome,
                RunOutcome::Completed {
                    reported_success: true,
                    ..
                }
            )
    }
}

fn decode(stdout: &[u8]) -> std::result::Result<RunReport, String> {
    let value: Value = serde_json::from_slice(stdout).map_err(|e| e.to_string())?;
    if !value.is_object() {
        return Err("report is not a JSON object".to_string());
    }
    RunReport::deserialize(value).map_err(|e| e.to_string())
}
