//! `fleet status` and `fleet list` commands

use super::ui;
use super::Context;
use anyhow::Result;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "TENANT")]
    tenant: String,
    #[tabled(rename = "DOMAIN")]
    label: String,
    #[tabled(rename = "LEDGER")]
    ledger: String,
    #[tabled(rename = "WEB")]
    web: String,
    #[tabled(rename = "DB")]
    db: String,
    #[tabled(rename = "LAST ACTION")]
    last_action: String,
    #[tabled(rename = "UPDATED")]
    updated: String,
}

/// Ledger status next to live container health for every tenant.
pub async fn status(ctx: &Context) -> Result<()> {
    let tenants = ctx.registry.discover()?;
    if tenants.is_empty() {
        println!("No tenants found in {}", ctx.registry.root().display());
        return Ok(());
    }

    let view = ctx.reconciler().status_all(&tenants).await?;
    let drifted = view.iter().filter(|t| t.drift()).count();

    let rows: Vec<StatusRow> = view
        .into_iter()
        .map(|health| {
            let drift = health.drift();
            let (last_action, updated) = match &health.ledger {
                Some(entry) => (
                    entry.last_action.clone(),
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                ),
                None => ("-".to_string(), "-".to_string()),
            };
            let mut ledger = ui::colorize_ledger(health.ledger_status());
            if drift {
                ledger = format!("{} {}", ledger, "⚠".yellow().bold());
            }
            StatusRow {
                tenant: health.tenant.to_string(),
                label: health.label,
                ledger,
                web: ui::colorize_live(health.web),
                db: ui::colorize_live(health.db),
                last_action,
                updated,
            }
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", table);

    if drifted > 0 {
        println!();
        println!(
            "{} {} tenant(s) differ from their recorded status",
            "⚠".yellow().bold(),
            drifted
        );
    }

    Ok(())
}

#[derive(Tabled)]
struct TenantRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "TENANT")]
    id: String,
    #[tabled(rename = "DOMAIN")]
    domain: String,
    #[tabled(rename = "PORT")]
    port: String,
    #[tabled(rename = "IMAGE")]
    image: String,
    #[tabled(rename = "PATH")]
    path: String,
}

/// Discovered tenants in registry order.
pub fn list(ctx: &Context) -> Result<()> {
    let tenants = ctx.registry.discover()?;
    if tenants.is_empty() {
        println!("No tenants found in {}", ctx.registry.root().display());
        return Ok(());
    }

    let rows: Vec<TenantRow> = tenants
        .into_iter()
        .enumerate()
        .map(|(i, t)| TenantRow {
            index: i + 1,
            id: t.id.to_string(),
            domain: t.domain.clone().unwrap_or_else(|| "-".to_string()),
            port: t.app_port.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string()),
            image: t.app_image.clone().unwrap_or_else(|| "-".to_string()),
            path: t.root().display().to_string(),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::modern());
    println!("{}", table);

    Ok(())
}
