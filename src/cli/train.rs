//! CLI entry-point for word2vec training.

use anyhow::Result;
use clap::Args as ClapArgs;
use tracing::instrument;

use crate::{config::Settings, data::io::TextSource, nlp::word2vec};

/// Args for the `train` sub-command.
#[derive(Debug, Clone, ClapArgs)]
pub struct Args {
    /// Text columns as PATH:COLUMN.
    #[arg(long = "source")]
    pub sources: Vec<TextSource>,
    /// Model name; saved as processed_<name>.w2v.parquet.
    #[arg(long, default_value = "train_device_wiki")]
    pub name: String,
    #[arg(long)]
    pub size: Option<usize>,
    #[arg(long)]
    pub min_count: Option<usize>,
    #[arg(long)]
    pub epochs: Option<usize>,
}

#[instrument(skip(settings))]
pub async fn run(args: Args, settings: Settings) -> Result<()> {
    let sources = super::sources_or_default(args.sources, &settings);
    let mut params = settings.embedding.clone();
    params.size = args.size.unwrap_or(params.size);
    params.min_count = args.min_count.unwrap_or(params.min_count);
    params.epochs = args.epochs.unwrap_or(params.epochs);

    let out = settings.join_model(word2vec::model_file(&args.name));
    word2vec::train_from_sources(&sources, &params, &out)?;
    Ok(())
}
