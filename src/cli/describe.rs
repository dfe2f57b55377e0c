//! CLI entry-point for Wikipedia label descriptions.

use anyhow::Result;
use tracing::instrument;

use crate::{config::Settings, labels};

#[instrument(skip(settings))]
pub async fn run(settings: Settings) -> Result<()> {
    let summary = labels::describe(&settings).await?;
    println!("{summary}");
    Ok(())
}
