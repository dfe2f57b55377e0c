//! CLI entry-point for train/test/dev splitting.

use anyhow::Result;
use clap::Args as ClapArgs;
use tracing::instrument;

use crate::{config::Settings, data};

/// Args for the `split` sub-command.
#[derive(Debug, Clone, ClapArgs)]
pub struct Args {
    /// Keep split order instead of sorting by token count.
    #[arg(long)]
    pub no_sort: bool,
}

#[instrument(skip(settings))]
pub async fn run(args: Args, settings: Settings) -> Result<()> {
    data::split::run(&settings, !args.no_sort).await?;
    Ok(())
}
