//! `fleet deploy`, `fleet stop` and `fleet restart`

use super::ui;
use super::Context;
use anyhow::{Context as _, Result};
use colored::Colorize;
use fleet_core::{Action, BulkReport};

/// Deploy one tenant, or every tenant with `all`.
pub async fn deploy(ctx: &Context, tenant: Option<&str>, all: bool) -> Result<()> {
    let controller = ctx.controller();

    if all {
        let spinner = ui::spinner("Deploying all tenants...");
        let report = controller.deploy_all(&ctx.registry).await;
        spinner.finish_and_clear();
        return finish_bulk(report?, Action::Deploy);
    }

    let id = tenant.ok_or_else(|| anyhow::anyhow!("Specify a tenant or --all"))?;
    let tenant = ctx.registry.find(id)?;

    let spinner = ui::spinner(format!("Deploying {}...", tenant.label()));
    let result = controller.deploy_one(&tenant).await;
    spinner.finish_and_clear();
    result.with_context(|| format!("Failed to deploy {}", tenant.id))?;

    println!("{} Deployed {}", "✓".green().bold(), tenant.label().bold());
    Ok(())
}

/// Stop one tenant, or every tenant with `all`.
pub async fn stop(ctx: &Context, tenant: Option<&str>, all: bool) -> Result<()> {
    let controller = ctx.controller();

    if all {
        let spinner = ui::spinner("Stopping all tenants...");
        let report = controller.stop_all(&ctx.registry).await;
        spinner.finish_and_clear();
        return finish_bulk(report?, Action::Stop);
    }

    let id = tenant.ok_or_else(|| anyhow::anyhow!("Specify a tenant or --all"))?;
    let tenant = ctx.registry.find(id)?;

    let spinner = ui::spinner(format!("Stopping {}...", tenant.label()));
    let result = controller.stop_one(&tenant).await;
    spinner.finish_and_clear();
    result.with_context(|| format!("Failed to stop {}", tenant.id))?;

    println!("{} Stopped {}", "✓".green().bold(), tenant.label().bold());
    Ok(())
}

/// Restart one tenant.
pub async fn restart(ctx: &Context, tenant: &str) -> Result<()> {
    let tenant = ctx.registry.find(tenant)?;

    let spinner = ui::spinner(format!("Restarting {}...", tenant.label()));
    let result = ctx.controller().restart(&tenant).await;
    spinner.finish_and_clear();
    result.with_context(|| format!("Failed to restart {}", tenant.id))?;

    println!("{} Restarted {}", "✓".green().bold(), tenant.label().bold());
    Ok(())
}

fn finish_bulk(report: BulkReport, action: Action) -> Result<()> {
    if report.outcomes.is_empty() {
        println!("No tenants found");
        return Ok(());
    }

    let verb = match action {
        Action::Deploy => "deployed",
        Action::Stop => "stopped",
        Action::Restart => "restarted",
        Action::Backup => "backed up",
    };
    ui::print_report(&report, verb);
    ui::ensure_success(&report)
}
