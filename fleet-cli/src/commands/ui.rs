//! Terminal output helpers shared by commands.

use colored::Colorize;
use fleet_core::{BulkReport, LedgerStatus, LiveHealth, Outcome};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Steady-ticking spinner on stderr.
pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(TICKS);
    spinner.set_style(style);
    spinner.set_message(message.into());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

pub fn colorize_ledger(status: LedgerStatus) -> String {
    let text = status.as_str();
    match status {
        LedgerStatus::Running => text.green().to_string(),
        LedgerStatus::Stopped => text.yellow().to_string(),
        LedgerStatus::Error => text.red().bold().to_string(),
        LedgerStatus::Unknown => text.dimmed().to_string(),
    }
}

pub fn colorize_live(health: LiveHealth) -> String {
    let text = health.as_str();
    match health {
        LiveHealth::Healthy => text.green().bold().to_string(),
        LiveHealth::Running => text.green().to_string(),
        LiveHealth::Stopped => text.red().to_string(),
        LiveHealth::Unknown => text.dimmed().to_string(),
    }
}

/// Human-readable byte count.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

/// One line per tenant, then the totals.
pub fn print_report(report: &BulkReport, verb: &str) {
    for entry in &report.outcomes {
        match &entry.outcome {
            Outcome::Succeeded => {
                println!("  {} {} {}", "✓".green().bold(), entry.tenant.as_str().bold(), verb.dimmed())
            }
            Outcome::Failed(reason) => {
                println!("  {} {} {}", "✗".red().bold(), entry.tenant.as_str().bold(), reason.red())
            }
        }
    }
    println!();
    println!("{}", summary(report));
}

pub fn summary(report: &BulkReport) -> String {
    let (succeeded, failed) = report.counts();
    format!("Succeeded: {}, Failed: {}", succeeded, failed)
}

/// Fail the command when any tenant failed.
pub fn ensure_success(report: &BulkReport) -> anyhow::Result<()> {
    if report.is_full_success() {
        Ok(())
    } else {
        anyhow::bail!("{} of {} tenant(s) failed", report.failed, report.outcomes.len())
    }
}
