//! CLI entry-point for VAERS archive assembly.

use anyhow::Result;
use clap::Args as ClapArgs;
use tracing::{info, instrument};

use crate::{config::Settings, data};

/// Args for the `assemble` sub-command.
#[derive(Debug, Clone, ClapArgs)]
pub struct Args {
    /// Rebuild the combined table even when its manifest is current.
    #[arg(long)]
    pub force: bool,
}

#[instrument(skip(settings))]
pub async fn run(args: Args, settings: Settings) -> Result<()> {
    let summary = data::vaers::assemble(&settings, args.force).await?;
    info!(?summary, "assembly finished");
    Ok(())
}
