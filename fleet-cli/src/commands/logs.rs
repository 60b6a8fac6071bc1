//! `fleet logs` command - print container logs of a tenant

use super::Context;
use anyhow::Result;
use fleet_core::naming;
use tokio_stream::StreamExt;

/// Print the last `tail` lines of a tenant's web or database container.
pub async fn logs(ctx: &Context, tenant: &str, db: bool, tail: usize) -> Result<()> {
    let tenant = ctx.registry.find(tenant)?;
    let container =
        if db { naming::db_container(&tenant.id) } else { naming::web_container(&tenant.id) };

    let mut stream = ctx.runtime.stream_logs(&container, tail).await?;

    while let Some(line) = stream.next().await {
        match line {
            Ok(line) => println!("{}", line),
            Err(e) => {
                eprintln!("Error reading logs: {}", e);
                break;
            }
        }
    }

    Ok(())
}
