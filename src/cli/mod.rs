//! Command-line interface wiring for vaers-corpus.

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::{
    config::Settings,
    data::{device::DEVICE_FILE, io::TextSource, split::TRAIN_RAW_FILE},
    labels::WIKI_CORPUS_FILE,
};

pub mod assemble;
pub mod describe;
pub mod device;
pub mod matrix;
pub mod split;
pub mod train;
pub mod vocab;

/// Top-level CLI definition.
#[derive(Debug, Parser)]
#[command(author, version, about = "VAERS corpus assembly pipeline", long_about = None)]
pub struct Cli {
    /// Log at debug level unless RUST_LOG is set.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Parse CLI arguments from the environment.
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Default tracing directive for the selected verbosity.
    pub fn log_directive(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "info"
        }
    }

    /// Dispatch the selected sub-command.
    pub async fn dispatch(self, settings: Settings) -> Result<()> {
        match self.command {
            Commands::Assemble(args) => assemble::run(args, settings).await,
            Commands::Split(args) => split::run(args, settings).await,
            Commands::Device => device::run(settings).await,
            Commands::Describe => describe::run(settings).await,
            Commands::Vocab(args) => vocab::run(args, settings).await,
            Commands::Train(args) => train::run(args, settings).await,
            Commands::Matrix(args) => matrix::run(args, settings).await,
        }
    }
}

/// Supported sub-commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Join VAERS archives into the post-processed dataset and label list.
    Assemble(assemble::Args),
    /// Write seeded train/test/dev splits.
    Split(split::Args),
    /// Build the auxiliary device-event corpus.
    Device,
    /// Scrape label descriptions from Wikipedia.
    Describe,
    /// Build the document-frequency vocabulary.
    Vocab(vocab::Args),
    /// Train word2vec embeddings.
    Train(train::Args),
    /// Extract the embedding matrix and label description vectors.
    Matrix(matrix::Args),
}

/// Training text plus the auxiliary corpora that already exist.
pub fn default_sources(settings: &Settings) -> Vec<TextSource> {
    let mut sources = vec![TextSource::new(
        settings.join_data(TRAIN_RAW_FILE),
        "RAW_TEXT",
    )];
    for file in [DEVICE_FILE, WIKI_CORPUS_FILE] {
        let path = settings.join_data(file);
        if path.exists() {
            sources.push(TextSource::new(path, "TEXT"));
        }
    }
    sources
}

fn sources_or_default(sources: Vec<TextSource>, settings: &Settings) -> Vec<TextSource> {
    if sources.is_empty() {
        default_sources(settings)
    } else {
        sources
    }
}
