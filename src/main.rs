//! Entry point wiring CLI dispatch to pipeline stages.

use anyhow::Result;
use tracing::info;
use vaers_corpus::{cli::Cli, config::Settings, logging};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.log_directive())?;
    let settings = Settings::load()?;

    info!(?cli, "starting stage");
    cli.dispatch(settings).await
}
