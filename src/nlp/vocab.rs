//! Document-frequency vocabulary construction and index lookup.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    io::{BufRead, BufReader, Write},
    path::Path,
};

use anyhow::{Context, Result};
use tracing::info;

use crate::{
    data::io::{self, AtomicOutput, TextSource},
    error::PipelineError,
    nlp::tokenizer::Tokenizer,
};

pub const VOCAB_FILE: &str = "vocab.csv";

/// Token written for the padding row of index-aligned outputs.
pub const PAD_TOKEN: &str = "**PAD**";

/// Sorted vocabulary. Index 0 pads, tokens occupy `1..=len`, `len + 1` is unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vocabulary {
    tokens: Vec<String>,
    index: HashMap<String, usize>,
}

impl Vocabulary {
    /// Build from arbitrary tokens; duplicates collapse and order is sorted.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut sorted: Vec<String> = tokens.into_iter().map(Into::into).collect();
        sorted.sort();
        sorted.dedup();
        let index = sorted
            .iter()
            .enumerate()
            .map(|(i, token)| (token.clone(), i + 1))
            .collect();
        Self {
            tokens: sorted,
            index,
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Tokens in index order (index `i + 1` for position `i`).
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn contains(&self, token: &str) -> bool {
        self.index.contains_key(token)
    }

    pub fn unknown_index(&self) -> usize {
        self.tokens.len() + 1
    }

    /// 1-based index of `token`, or the unknown index.
    pub fn index_of(&self, token: &str) -> usize {
        self.index
            .get(token)
            .copied()
            .unwrap_or_else(|| self.unknown_index())
    }

    /// Token at a 1-based index.
    pub fn token(&self, index: usize) -> Option<&str> {
        index
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(String::as_str)
    }

    /// Read a vocabulary file (one token per line).
    pub fn load(path: &Path) -> Result<Self> {
        PipelineError::require(path)?;
        let file =
            std::fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
        let mut tokens = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            let token = line.trim();
            if !token.is_empty() {
                tokens.push(token.to_string());
            }
        }
        Ok(Self::from_tokens(tokens))
    }

    /// Write the tokens sorted, one per line.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut out = AtomicOutput::create(path)?;
        {
            let file = out.file();
            for token in &self.tokens {
                writeln!(file, "{token}")?;
            }
            file.flush()?;
        }
        out.commit()?;
        Ok(())
    }
}

/// Count, for every token, the number of documents containing it.
pub fn document_frequencies<I, S>(docs: I, tokenizer: &Tokenizer) -> BTreeMap<String, usize>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut counts = BTreeMap::new();
    for doc in docs {
        let unique: HashSet<String> = tokenizer.tokenize(doc.as_ref()).into_iter().collect();
        for token in unique {
            *counts.entry(token).or_insert(0) += 1;
        }
    }
    counts
}

/// Keep tokens found in at least `min_df` documents.
pub fn build_vocabulary<I, S>(docs: I, tokenizer: &Tokenizer, min_df: usize) -> Vocabulary
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let counts = document_frequencies(docs, tokenizer);
    Vocabulary::from_tokens(
        counts
            .into_iter()
            .filter(|(_, df)| *df >= min_df)
            .map(|(token, _)| token),
    )
}

/// Build a vocabulary over the given text columns and write it to `out_path`.
pub fn build_from_sources(
    sources: &[TextSource],
    tokenizer: &Tokenizer,
    min_df: usize,
    out_path: &Path,
) -> Result<Vocabulary> {
    let docs = io::read_columns(sources)?;
    info!(documents = docs.len(), min_df, "fitting vocabulary");
    let vocab = build_vocabulary(&docs, tokenizer, min_df);
    vocab.save(out_path)?;
    info!(tokens = vocab.len(), path = %out_path.display(), "wrote vocabulary");
    Ok(vocab)
}
