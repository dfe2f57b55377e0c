//! CLI entry-point for vocabulary construction.

use anyhow::Result;
use clap::Args as ClapArgs;
use tracing::instrument;

use crate::{
    config::Settings,
    data::io::TextSource,
    nlp::{tokenizer::Tokenizer, vocab},
};

/// Args for the `vocab` sub-command.
#[derive(Debug, Clone, ClapArgs)]
pub struct Args {
    /// Text columns as PATH:COLUMN; defaults to the training split plus
    /// any auxiliary corpora present.
    #[arg(long = "source")]
    pub sources: Vec<TextSource>,
    /// Override the minimum document frequency.
    #[arg(long)]
    pub min_df: Option<usize>,
    /// Output file name inside the vocabulary directory.
    #[arg(long, default_value = vocab::VOCAB_FILE)]
    pub out: String,
}

#[instrument(skip(settings))]
pub async fn run(args: Args, settings: Settings) -> Result<()> {
    let sources = super::sources_or_default(args.sources, &settings);
    let tokenizer = Tokenizer::new(true, settings.max_length);
    vocab::build_from_sources(
        &sources,
        &tokenizer,
        args.min_df.unwrap_or(settings.min_df),
        &settings.join_vocab(&args.out),
    )?;
    Ok(())
}
