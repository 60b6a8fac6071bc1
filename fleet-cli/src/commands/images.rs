//! `fleet images` command

use super::Context;
use anyhow::Result;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct ImageRow {
    #[tabled(rename = "REPOSITORY")]
    repository: String,
    #[tabled(rename = "TAG")]
    tag: String,
    #[tabled(rename = "IMAGE ID")]
    id: String,
    #[tabled(rename = "SIZE")]
    size: String,
}

/// List images known to the container runtime
pub async fn images(ctx: &Context) -> Result<()> {
    let images = ctx.runtime.list_images().await?;

    if images.is_empty() {
        println!("No images available");
        return Ok(());
    }

    let rows: Vec<ImageRow> = images
        .into_iter()
        .map(|image| ImageRow {
            repository: image.repository,
            tag: image.tag,
            id: image.id,
            size: image.size,
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::modern());
    println!("{}", table);

    Ok(())
}
