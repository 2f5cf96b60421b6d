//! Discovery and inspection commands.

use anyhow::Result;
use owo_colors::OwoColorize;
use turbokit_core::{list_tasks, list_workspaces, MemberPolicy};

use crate::formatting::{
    print_key_value, print_member_table, print_section_header, print_success, print_task_table,
    print_warning, SectionStyle,
};

use super::{load_context, resolve_root, GlobalArgs};

pub fn cmd_root(global: &GlobalArgs) -> Result<()> {
    let root = resolve_root(global)?;
    println!("{}", root);
    Ok(())
}

pub fn cmd_workspaces(global: &GlobalArgs, json: bool) -> Result<()> {
    let root = resolve_root(global)?;
    let members = list_workspaces(&root)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&members)?);
        return Ok(());
    }

    print_section_header("Workspaces", SectionStyle::Primary);
    print_key_value("Root", &root.to_string());
    println!();

    if members.is_empty() {
        print_warning("No workspace members found");
    } else {
        print_member_table(&members);
        println!();
        print_success(&format!("Found {} members", members.len()));
    }
    println!();

    Ok(())
}

pub fn cmd_tasks(global: &GlobalArgs, json: bool, strict: bool) -> Result<()> {
    let ctx = load_context(global)?;
    let policy = if strict {
        MemberPolicy::Strict
    } else {
        ctx.settings.catalog.member_policy
    };

    let members = list_workspaces(&ctx.root)?;
    let catalog = list_tasks(&ctx.root, &members, policy)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&catalog)?);
        return Ok(());
    }

    print_section_header("Available Tasks", SectionStyle::Primary);

    if catalog.is_empty() {
        print_warning("No tasks declared by any workspace member");
    } else {
        print_task_table(catalog.tasks());
    }
    println!();

    if !catalog.skipped().is_empty() {
        print_section_header("Skipped Members", SectionStyle::Warning);
        for skipped in catalog.skipped() {
            print_warning(&format!(
                "{} {}",
                skipped.name,
                format!("({})", skipped.relative_path.display()).bright_black()
            ));
            println!("    {}", skipped.reason.bright_black());
        }
        println!();
    }

    Ok(())
}
