//! CLI entry-point for the device-event corpus.

use anyhow::Result;
use tracing::instrument;

use crate::{config::Settings, data};

#[instrument(skip(settings))]
pub async fn run(settings: Settings) -> Result<()> {
    data::device::assemble(&settings).await?;
    Ok(())
}
