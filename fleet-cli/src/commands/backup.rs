//! `fleet backup` command

use super::ui;
use super::Context;
use anyhow::{Context as _, Result};
use chrono::Local;
use colored::Colorize;
use fleet_core::{Archive, ArchiveSubject, RestoreOutcome};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};

/// What `fleet backup` was asked to do.
pub enum BackupAction {
    CertStore,
    Tenant(String),
    AllTenants,
    List,
    Restore(PathBuf),
    /// Retention in days; `None` uses the configured value.
    Cleanup(Option<u32>),
    Verify(PathBuf),
}

pub async fn run(ctx: &Context, action: BackupAction) -> Result<()> {
    let manager = ctx.backups();

    match action {
        BackupAction::CertStore => {
            let spinner = ui::spinner("Archiving certificate store...");
            let result = manager.backup_edge_cert_store().await;
            spinner.finish_and_clear();
            let archive = result.context("Certificate store backup failed")?;
            print_created(&archive);
        }

        BackupAction::Tenant(id) => {
            let tenant = ctx.registry.find(&id)?;
            let spinner = ui::spinner(format!("Dumping database of {}...", tenant.id));
            let result = manager.backup_tenant_data(&tenant).await;
            spinner.finish_and_clear();
            let archive = result.with_context(|| format!("Backup of {} failed", tenant.id))?;
            print_created(&archive);
        }

        BackupAction::AllTenants => {
            let spinner = ui::spinner("Backing up all tenants...");
            let result = manager.backup_all_tenants().await;
            spinner.finish_and_clear();
            let report = result?;
            if report.outcomes.is_empty() {
                println!("No tenants found");
                return Ok(());
            }
            ui::print_report(&report, "backed up");
            ui::ensure_success(&report)?;
        }

        BackupAction::List => list(&manager.list()?, manager.backup_dir()),

        BackupAction::Restore(file) => match manager.restore(&file).await? {
            RestoreOutcome::Restored => {
                println!("{} Restored from {}", "✓".green().bold(), file.display().to_string().bold());
            }
            RestoreOutcome::Aborted => println!("Aborted."),
        },

        BackupAction::Cleanup(days) => {
            let days = days.unwrap_or(ctx.config.retention_days);
            let removed = manager.cleanup(days)?;
            if removed == 0 {
                println!("No archives removed");
            } else {
                println!("{} Removed {} archive(s) older than {} days", "✓".green().bold(), removed, days);
            }
        }

        BackupAction::Verify(file) => {
            let spinner = ui::spinner(format!("Verifying {}...", file.display()));
            let result = manager.verify(&file).await;
            spinner.finish_and_clear();
            let archive = result.with_context(|| format!("{} is damaged", file.display()))?;
            println!(
                "{} {} is intact ({}, {})",
                "✓".green().bold(),
                archive.file_name().bold(),
                archive.subject,
                ui::format_size(archive.size)
            );
        }
    }

    Ok(())
}

fn print_created(archive: &Archive) {
    println!(
        "{} Created {} ({})",
        "✓".green().bold(),
        archive.path.display().to_string().bold(),
        ui::format_size(archive.size)
    );
}

#[derive(Tabled)]
struct ArchiveRow {
    #[tabled(rename = "FILE")]
    file: String,
    #[tabled(rename = "SIZE")]
    size: String,
    #[tabled(rename = "CREATED")]
    created: String,
    #[tabled(rename = "AGE")]
    age: String,
    #[tabled(rename = "READABLE")]
    readable: String,
}

fn list(grouped: &BTreeMap<ArchiveSubject, Vec<Archive>>, dir: &Path) {
    if grouped.is_empty() {
        println!("No archives in {}", dir.display());
        return;
    }

    let now = Local::now().naive_local();
    for (subject, archives) in grouped {
        println!("{} {}", "→".cyan().bold(), subject.to_string().bold());

        let rows: Vec<ArchiveRow> = archives
            .iter()
            .map(|a| ArchiveRow {
                file: a.file_name(),
                size: ui::format_size(a.size),
                created: a.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                age: format!("{}d", (now - a.created_at).num_days().max(0)),
                readable: if a.readable { "yes".green().to_string() } else { "no".red().to_string() },
            })
            .collect();

        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{}", table);
        println!();
    }
}
