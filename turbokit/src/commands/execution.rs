//! Task execution command.

use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::Result;
use turbokit_core::{Dispatcher, RunOutcome, StderrMode, TaskRunRequest, TaskRunResult};

use crate::formatting::{
    create_spinner, format_duration, print_record_table, print_section_header,
    print_separator_with_spacing, print_success, print_summary_box, print_warning, SectionStyle,
};

use super::{load_context, GlobalArgs};

fn outcome_message(result: &TaskRunResult) -> String {
    match result.outcome {
        RunOutcome::Completed { exit_code, .. } if result.exit_overrode_report() => format!(
            "Orchestrator reported success but exited with {}",
            exit_code.map_or_else(|| "a signal".to_string(), |c| format!("code {}", c))
        ),
        RunOutcome::Completed { .. } if result.success => "Task succeeded".to_string(),
        RunOutcome::Completed { .. } => "Task failed".to_string(),
        RunOutcome::MalformedReport { ref reason, .. } => {
            format!("Orchestrator report could not be read: {}", reason)
        }
        RunOutcome::TimedOut { after } => format!(
            "Orchestrator killed after {}",
            format_duration(after.as_secs_f64())
        ),
    }
}

fn print_run_result(task: &str, result: &TaskRunResult, elapsed: Duration) {
    print_section_header(&format!("Run '{}'", task), SectionStyle::Primary);

    if !result.tasks.is_empty() {
        print_record_table(&result.tasks);
        println!();
    }

    let message = outcome_message(result);
    if result.success {
        print_success(&message);
    } else {
        print_warning(&message);
    }

    print_separator_with_spacing();
    print_summary_box(
        "Summary",
        &[
            ("Duration", &format_duration(elapsed.as_secs_f64())),
            ("Tasks", &result.tasks.len().to_string()),
        ],
    );
    println!();
}

pub fn cmd_run(
    global: &GlobalArgs,
    task: String,
    filter: Option<String>,
    timeout_ms: Option<u64>,
    json: bool,
    silent: bool,
) -> Result<ExitCode> {
    let start = Instant::now();
    let ctx = load_context(global)?;

    let stderr = if silent {
        StderrMode::Discard
    } else {
        StderrMode::Inherit
    };
    let dispatcher = Dispatcher::new(ctx.root, ctx.settings.orchestrator)?.with_stderr(stderr);

    let mut request = TaskRunRequest::new(task);
    request.filter = filter;
    request.timeout = timeout_ms.map(Duration::from_millis);

    let spinner =
        (silent && !json).then(|| create_spinner(&format!("Running {}...", request.task_name)));
    let result = dispatcher.run_task_blocking(&request);
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let result = result?;

    if json {
        println!("{}", serde_json::to_string(&result)?);
    } else {
        print_run_result(&request.task_name, &result, start.elapsed());
    }

    Ok(if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
