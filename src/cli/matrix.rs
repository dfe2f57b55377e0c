//! CLI entry-point for embedding matrix extraction.

use anyhow::Result;
use clap::Args as ClapArgs;
use tracing::{info, instrument, warn};

use crate::{
    config::Settings,
    labels::SUPPLEMENT_FILE,
    nlp::{
        matrix,
        tokenizer::Tokenizer,
        vocab::{Vocabulary, VOCAB_FILE},
        word2vec::{self, WordVectors},
    },
};

pub const DESCRIPTION_VECTORS_FILE: &str = "description_vectors.vocab";

/// Args for the `matrix` sub-command.
#[derive(Debug, Clone, ClapArgs)]
pub struct Args {
    /// Name of the trained model; also names the `.embed` output.
    #[arg(long, default_value = "train_device_wiki")]
    pub name: String,
    /// Vocabulary file name inside the vocabulary directory.
    #[arg(long, default_value = VOCAB_FILE)]
    pub vocab: String,
}

#[instrument(skip(settings))]
pub async fn run(args: Args, settings: Settings) -> Result<()> {
    let vocab = Vocabulary::load(&settings.join_vocab(&args.vocab))?;
    let model = WordVectors::load(&settings.join_model(word2vec::model_file(&args.name)))?;

    let dim = model.dim();
    if dim != settings.embedding.size {
        warn!(
            model_dim = dim,
            configured = settings.embedding.size,
            "model size differs from EMBEDDING_SIZE; using the model's"
        );
    }
    let embeddings = matrix::build_matrix(&vocab, &model, dim);
    embeddings.write(&settings.join_data(format!("{}.embed", args.name)))?;

    let supplement = settings.join_data(SUPPLEMENT_FILE);
    if supplement.exists() {
        let tokenizer = Tokenizer::new(true, settings.max_length);
        matrix::write_description_vectors(
            &supplement,
            &vocab,
            &tokenizer,
            &settings.join_data(DESCRIPTION_VECTORS_FILE),
        )?;
    } else {
        info!(path = %supplement.display(), "no supplemental labels; skipping description vectors");
    }
    Ok(())
}
