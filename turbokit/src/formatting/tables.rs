//! Table formatting utilities using comfy-table.

use comfy_table::{Cell, Table};
use owo_colors::OwoColorize;
use serde_json::Value;
use turbokit_core::WorkspaceMember;

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(*h).add_attribute(comfy_table::Attribute::Bold))
                .collect::<Vec<_>>(),
        )
        .load_preset(comfy_table::presets::UTF8_FULL)
        .apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS)
        .set_content_arrangement(comfy_table::ContentArrangement::Dynamic);
    table
}

/// Prints workspace members with their paths.
pub fn print_member_table(members: &[WorkspaceMember]) {
    let mut table = new_table(&["Package", "Path"]);
    for member in members {
        table.add_row(vec![
            Cell::new(&member.name).fg(comfy_table::Color::White),
            Cell::new(member.relative_path.display()).fg(comfy_table::Color::DarkGrey),
        ]);
    }
    println!("{}", table);
}

/// Prints each task with the members that declare it.
pub fn print_task_table<'a>(tasks: impl IntoIterator<Item = (&'a String, &'a Vec<String>)>) {
    let mut table = new_table(&["Task", "Packages"]);
    for (task, members) in tasks {
        let members_str = if members.is_empty() {
            "(none)".bright_black().to_string()
        } else {
            members.join(", ")
        };
        table.add_row(vec![
            Cell::new(task).fg(comfy_table::Color::White),
            Cell::new(members_str),
        ]);
    }
    println!("{}", table);
}

fn field<'a>(record: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| record.get(*key))
}

fn field_text(record: &Value, keys: &[&str]) -> String {
    match field(record, keys) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Prints the orchestrator's per-task records.
///
/// Records are opaque; common keys are picked out when present and the raw
/// record is shown otherwise.
pub fn print_record_table(records: &[Value]) {
    let mut table = new_table(&["Task", "Package", "Status"]);
    for record in records {
        let task = field_text(record, &["taskId", "task"]);
        let package = field_text(record, &["package", "pkg"]);
        let status = field_text(record, &["status"]);

        if task.is_empty() && package.is_empty() && status.is_empty() {
            table.add_row(vec![Cell::new(record.to_string()), Cell::new(""), Cell::new("")]);
            continue;
        }

        let color = match status.as_str() {
            "ok" | "success" => comfy_table::Color::Green,
            "failed" | "error" => comfy_table::Color::Red,
            _ => comfy_table::Color::White,
        };
        table.add_row(vec![
            Cell::new(task).fg(comfy_table::Color::White),
            Cell::new(package).fg(comfy_table::Color::White),
            Cell::new(status).fg(color),
        ]);
    }
    println!("{}", table);
}
