//! Index-aligned embedding matrices and label description vectors.

use std::{io::Write, path::Path};

use anyhow::Result;
use ndarray::Array2;
use tracing::{info, warn};

use crate::{
    data::io::{decode_field, AtomicOutput},
    error::PipelineError,
    nlp::{
        tokenizer::Tokenizer,
        vocab::{Vocabulary, PAD_TOKEN},
        word2vec::WordVectors,
    },
};

/// Row `i` of `vectors` belongs to `tokens[i]`; row 0 is padding.
#[derive(Debug, Clone)]
pub struct EmbeddingMatrix {
    pub tokens: Vec<String>,
    pub vectors: Array2<f32>,
    /// Vocabulary tokens that fell back to the zero vector.
    pub missing: usize,
}

/// Look up every vocabulary token in the trained model, in index order.
///
/// Tokens the model never saw, and the padding row, get the zero vector.
pub fn build_matrix(vocab: &Vocabulary, model: &WordVectors, dim: usize) -> EmbeddingMatrix {
    let mut vectors = Array2::<f32>::zeros((vocab.len() + 1, dim));
    let mut tokens = Vec::with_capacity(vocab.len() + 1);
    tokens.push(PAD_TOKEN.to_string());
    let mut missing = 0usize;

    for (offset, token) in vocab.tokens().iter().enumerate() {
        let row = offset + 1;
        match model.get(token) {
            Some(trained) if trained.len() == dim => vectors.row_mut(row).assign(&trained),
            Some(trained) => {
                warn!(%token, got = trained.len(), dim, "dimension mismatch; using zeros");
                missing += 1;
            }
            None => missing += 1,
        }
        tokens.push(token.clone());
    }

    EmbeddingMatrix {
        tokens,
        vectors,
        missing,
    }
}

impl EmbeddingMatrix {
    /// Write `token v1 ... vD` lines in index order.
    pub fn write(&self, path: &Path) -> Result<()> {
        let mut out = AtomicOutput::create(path)?;
        {
            let file = out.file();
            for (token, row) in self.tokens.iter().zip(self.vectors.rows()) {
                let mut line = token.clone();
                for value in row {
                    line.push(' ');
                    line.push_str(&value.to_string());
                }
                writeln!(file, "{line}")?;
            }
            file.flush()?;
        }
        out.commit()?;
        info!(
            path = %path.display(),
            rows = self.tokens.len(),
            missing = self.missing,
            "wrote embedding matrix"
        );
        Ok(())
    }
}

/// Map each description token to its vocabulary index (unknown -> `len + 1`).
pub fn description_indices(desc: &str, vocab: &Vocabulary, tokenizer: &Tokenizer) -> Vec<usize> {
    tokenizer
        .tokenize(desc)
        .iter()
        .map(|token| vocab.index_of(token))
        .collect()
}

/// Read the supplemental label file and write `label i1 i2 ...` rows.
pub fn write_description_vectors(
    supplement: &Path,
    vocab: &Vocabulary,
    tokenizer: &Tokenizer,
    out_path: &Path,
) -> Result<usize> {
    PipelineError::require(supplement)?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_path(supplement)?;

    let mut out = AtomicOutput::create(out_path)?;
    let mut written = 0usize;
    {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b' ')
            .flexible(true)
            .from_writer(out.file());
        writer.write_record(["CODE", "VECTOR"])?;
        for record in reader.byte_records() {
            let Ok(record) = record else { continue };
            let label = record.get(0).map(decode_field).unwrap_or_default();
            let desc = record.get(1).map(decode_field).unwrap_or_default();
            if label.is_empty() {
                continue;
            }
            let mut fields = vec![label];
            fields.extend(
                description_indices(&desc, vocab, tokenizer)
                    .into_iter()
                    .map(|i| i.to_string()),
            );
            writer.write_record(&fields)?;
            written += 1;
        }
        writer.flush()?;
    }
    out.commit()?;
    info!(path = %out_path.display(), labels = written, "wrote description vectors");
    Ok(written)
}
