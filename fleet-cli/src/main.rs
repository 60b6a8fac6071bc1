use anyhow::Result;
use clap::{ArgGroup, Args, Parser, Subcommand};
use fleet_core::Config;
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "fleet")]
#[command(about = "Tenant stack fleet manager", long_about = None)]
struct Cli {
    /// Configuration file (defaults to $FLEET_CONFIG or the user config dir)
    #[arg(long, global = true, env = "FLEET_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter when RUST_LOG is unset (e.g. "info", "fleet_core=debug")
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Answer yes to every confirmation prompt
    #[arg(short, long, global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy one tenant or all of them
    Deploy {
        /// Tenant identifier
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        tenant: Option<String>,

        /// Deploy every discovered tenant
        #[arg(long)]
        all: bool,
    },

    /// Stop one tenant or all of them
    Stop {
        /// Tenant identifier
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        tenant: Option<String>,

        /// Stop every discovered tenant
        #[arg(long)]
        all: bool,
    },

    /// Restart a tenant in place
    Restart {
        /// Tenant identifier
        tenant: String,
    },

    /// Show recorded and live status of every tenant
    Status,

    /// List discovered tenants
    List,

    /// Show container logs of a tenant
    Logs {
        /// Tenant identifier
        tenant: String,

        /// Show the database container instead of the web container
        #[arg(long)]
        db: bool,

        /// Number of lines from the end
        #[arg(short, long, default_value = "100")]
        tail: usize,
    },

    /// List images known to the container runtime
    Images,

    /// Create, list, verify, restore and prune archives
    Backup(BackupArgs),
}

#[derive(Args)]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["cert", "tenant", "all", "list", "restore", "cleanup", "verify"])
))]
struct BackupArgs {
    /// Archive the edge certificate store
    #[arg(long)]
    cert: bool,

    /// Archive one tenant's database
    #[arg(long, value_name = "NAME")]
    tenant: Option<String>,

    /// Archive every tenant's database
    #[arg(long)]
    all: bool,

    /// List archives
    #[arg(long)]
    list: bool,

    /// Restore from an archive
    #[arg(long, value_name = "FILE")]
    restore: Option<PathBuf>,

    /// Delete archives past retention
    #[arg(long)]
    cleanup: bool,

    /// Retention in days for --cleanup (defaults to the configured value)
    #[arg(long, requires = "cleanup")]
    days: Option<u32>,

    /// Check that an archive decodes completely
    #[arg(long, value_name = "FILE")]
    verify: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let level = cli.log_level.clone().unwrap_or_else(|| config.log_level.clone());
    if let Err(e) = fleet_core::init_observability(&level) {
        eprintln!("Warning: failed to initialize logging: {}", e);
    }
    tracing::debug!(tenants = %config.tenants_dir.display(), "Configuration loaded");

    let ctx = commands::Context::new(config, cli.yes);

    match cli.command {
        Commands::Deploy { tenant, all } => {
            commands::lifecycle::deploy(&ctx, tenant.as_deref(), all).await?;
        }

        Commands::Stop { tenant, all } => {
            commands::lifecycle::stop(&ctx, tenant.as_deref(), all).await?;
        }

        Commands::Restart { tenant } => {
            commands::lifecycle::restart(&ctx, &tenant).await?;
        }

        Commands::Status => {
            commands::status::status(&ctx).await?;
        }

        Commands::List => {
            commands::status::list(&ctx)?;
        }

        Commands::Logs { tenant, db, tail } => {
            commands::logs::logs(&ctx, &tenant, db, tail).await?;
        }

        Commands::Images => {
            commands::images::images(&ctx).await?;
        }

        Commands::Backup(args) => {
            let BackupArgs { cert, tenant, all, list, restore, cleanup, days, verify } = args;
            let action = if cert {
                commands::backup::BackupAction::CertStore
            } else if let Some(tenant) = tenant {
                commands::backup::BackupAction::Tenant(tenant)
            } else if all {
                commands::backup::BackupAction::AllTenants
            } else if list {
                commands::backup::BackupAction::List
            } else if let Some(file) = restore {
                commands::backup::BackupAction::Restore(file)
            } else if cleanup {
                commands::backup::BackupAction::Cleanup(days)
            } else if let Some(file) = verify {
                commands::backup::BackupAction::Verify(file)
            } else {
                anyhow::bail!("No backup action given");
            };
            commands::backup::run(&ctx, action).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deploy_requires_tenant_or_all() {
        assert!(Cli::try_parse_from(["fleet", "deploy"]).is_err());
        assert!(Cli::try_parse_from(["fleet", "deploy", "acme", "--all"]).is_err());
        assert!(Cli::try_parse_from(["fleet", "deploy", "--all"]).is_ok());
    }

    #[test]
    fn test_backup_modes_are_exclusive() {
        assert!(Cli::try_parse_from(["fleet", "backup"]).is_err());
        assert!(Cli::try_parse_from(["fleet", "backup", "--cert", "--list"]).is_err());
        assert!(Cli::try_parse_from(["fleet", "backup", "--days", "7"]).is_err());

        let cli = Cli::try_parse_from(["fleet", "-y", "backup", "--cleanup", "--days", "7"]).unwrap();
        assert!(cli.yes);
        match cli.command {
            Commands::Backup(args) => {
                assert!(args.cleanup);
                assert_eq!(args.days, Some(7));
            }
            _ => panic!("expected backup"),
        }
    }

    #[test]
    fn test_logs_defaults() {
        let cli = Cli::try_parse_from(["fleet", "logs", "acme", "--db"]).unwrap();
        match cli.command {
            Commands::Logs { tenant, db, tail } => {
                assert_eq!(tenant, "acme");
                assert!(db);
                assert_eq!(tail, 100);
            }
            _ => panic!("expected logs"),
        }
    }
}
