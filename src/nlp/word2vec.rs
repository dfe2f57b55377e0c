//! CBOW word2vec with negative sampling, persisted to parquet.

use std::{collections::HashMap, fs::File, path::Path};

use anyhow::{bail, Context, Result};
use ndarray::{Array1, Array2, ArrayView1};
use polars::prelude::{DataFrame, NamedFrom, ParquetReader, ParquetWriter, SerReader, Series};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::{
    config::EmbeddingParams,
    data::io::{self, AtomicOutput, TextSource},
    error::PipelineError,
};

/// File name of a persisted model inside the model directory.
pub fn model_file(name: &str) -> String {
    format!("processed_{name}.w2v.parquet")
}

const START_ALPHA: f32 = 0.025;
const MIN_ALPHA: f32 = 0.0001;
const MAX_EXP: f32 = 6.0;
const NOISE_POWER: f64 = 0.75;

/// Trained token vectors with their corpus counts.
#[derive(Debug, Clone)]
pub struct WordVectors {
    tokens: Vec<String>,
    counts: Vec<u64>,
    index: HashMap<String, usize>,
    vectors: Array2<f32>,
}

impl WordVectors {
    fn from_parts(tokens: Vec<String>, counts: Vec<u64>, vectors: Array2<f32>) -> Self {
        let index = tokens
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();
        Self {
            tokens,
            counts,
            index,
            vectors,
        }
    }

    /// Vector for `token`, if it survived the frequency cut.
    pub fn get(&self, token: &str) -> Option<ArrayView1<'_, f32>> {
        self.index.get(token).map(|&i| self.vectors.row(i))
    }

    pub fn count(&self, token: &str) -> Option<u64> {
        self.index.get(token).map(|&i| self.counts[i])
    }

    pub fn dim(&self) -> usize {
        self.vectors.ncols()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Persist as parquet with columns `token`, `count`, `d0..d{dim-1}`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut columns = Vec::with_capacity(self.dim() + 2);
        columns.push(Series::new("token".into(), self.tokens.clone()));
        let counts: Vec<i64> = self.counts.iter().map(|&c| c as i64).collect();
        columns.push(Series::new("count".into(), counts));
        for d in 0..self.dim() {
            let values: Vec<f32> = self.vectors.column(d).to_vec();
            columns.push(Series::new(format!("d{d}").as_str().into(), values));
        }
        let mut df = DataFrame::new(columns)?;

        let mut out = AtomicOutput::create(path)?;
        ParquetWriter::new(out.file()).finish(&mut df)?;
        out.commit()?;
        info!(path = %path.display(), tokens = self.len(), dim = self.dim(), "saved word vectors");
        Ok(())
    }

    /// Load a model written by [`WordVectors::save`].
    pub fn load(path: &Path) -> Result<Self> {
        PipelineError::require(path)?;
        let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let df = ParquetReader::new(file).finish()?;
        let tokens: Vec<String> = df
            .column("token")?
            .str()?
            .into_no_null_iter()
            .map(|s| s.to_string())
            .collect();
        let counts: Vec<u64> = df
            .column("count")?
            .i64()?
            .into_no_null_iter()
            .map(|c| c.max(0) as u64)
            .collect();
        let dim = df.width().saturating_sub(2);
        let mut vectors = Array2::<f32>::zeros((tokens.len(), dim));
        for d in 0..dim {
            let column = df.column(format!("d{d}").as_str())?.f32()?;
            for row in 0..tokens.len() {
                vectors[[row, d]] = column.get(row).unwrap_or(0.0);
            }
        }
        Ok(Self::from_parts(tokens, counts, vectors))
    }
}

/// Split every document of the sources on whitespace.
pub fn sentences_from_sources(sources: &[TextSource]) -> Result<Vec<Vec<String>>> {
    Ok(io::read_columns(sources)?
        .into_iter()
        .map(|doc| doc.split_whitespace().map(str::to_string).collect::<Vec<_>>())
        .filter(|sentence| !sentence.is_empty())
        .collect())
}

/// Train CBOW vectors over pre-tokenized sentences.
pub fn train(sentences: &[Vec<String>], params: &EmbeddingParams) -> Result<WordVectors> {
    if params.size == 0 {
        bail!("embedding size must be positive");
    }
    let (tokens, counts) = count_vocabulary(sentences, params.min_count);
    let dim = params.size;
    let mut rng = StdRng::seed_from_u64(params.seed);
    if tokens.is_empty() {
        warn!(min_count = params.min_count, "no token reached min_count; model is empty");
        return Ok(WordVectors::from_parts(tokens, counts, Array2::zeros((0, dim))));
    }

    let index: HashMap<&str, usize> = tokens
        .iter()
        .enumerate()
        .map(|(i, t)| (t.as_str(), i))
        .collect();
    let encoded: Vec<Vec<usize>> = sentences
        .iter()
        .map(|s| s.iter().filter_map(|t| index.get(t.as_str()).copied()).collect())
        .collect();

    let mut syn0 =
        Array2::from_shape_fn((tokens.len(), dim), |_| (rng.gen::<f32>() - 0.5) / dim as f32);
    let mut syn1neg = Array2::<f32>::zeros((tokens.len(), dim));
    let noise = NoiseTable::new(&counts);

    let words_per_epoch: usize = encoded.iter().map(Vec::len).sum();
    let total = (words_per_epoch * params.epochs).max(1) as f32;
    let mut processed = 0usize;

    info!(
        tokens = tokens.len(),
        sentences = sentences.len(),
        epochs = params.epochs,
        dim,
        "training word2vec"
    );
    for epoch in 0..params.epochs {
        for sentence in &encoded {
            for pos in 0..sentence.len() {
                let alpha = (START_ALPHA * (1.0 - processed as f32 / total)).max(MIN_ALPHA);
                processed += 1;

                let shrink = rng.gen_range(0..params.window.max(1));
                let reach = params.window.max(1) - shrink;
                let lo = pos.saturating_sub(reach);
                let hi = (pos + reach).min(sentence.len() - 1);
                let context: Vec<usize> = (lo..=hi)
                    .filter(|&c| c != pos)
                    .map(|c| sentence[c])
                    .collect();
                if context.is_empty() {
                    continue;
                }

                let mut hidden = Array1::<f32>::zeros(dim);
                for &c in &context {
                    hidden += &syn0.row(c);
                }
                hidden /= context.len() as f32;

                let target = sentence[pos];
                let mut grad = Array1::<f32>::zeros(dim);
                for d in 0..=params.negative {
                    let (word, label) = if d == 0 {
                        (target, 1.0)
                    } else {
                        let sample = noise.sample(&mut rng);
                        if sample == target {
                            continue;
                        }
                        (sample, 0.0)
                    };
                    let f = hidden.dot(&syn1neg.row(word));
                    let g = (label - sigmoid(f)) * alpha;
                    grad.scaled_add(g, &syn1neg.row(word));
                    syn1neg.row_mut(word).scaled_add(g, &hidden);
                }
                for &c in &context {
                    syn0.row_mut(c).scaled_add(1.0, &grad);
                }
            }
        }
        debug!(epoch, processed, "finished epoch");
    }

    Ok(WordVectors::from_parts(tokens, counts, syn0))
}

/// Train over the sources and persist the model to `out_path`.
pub fn train_from_sources(
    sources: &[TextSource],
    params: &EmbeddingParams,
    out_path: &Path,
) -> Result<WordVectors> {
    let sentences = sentences_from_sources(sources)?;
    let model = train(&sentences, params)?;
    model.save(out_path)?;
    Ok(model)
}

/// Tokens with count >= `min_count`, most frequent first, ties by token.
fn count_vocabulary(sentences: &[Vec<String>], min_count: usize) -> (Vec<String>, Vec<u64>) {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for sentence in sentences {
        for token in sentence {
            *counts.entry(token.as_str()).or_insert(0) += 1;
        }
    }
    let mut kept: Vec<(&str, u64)> = counts
        .into_iter()
        .filter(|(_, c)| *c >= min_count as u64)
        .collect();
    kept.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    kept.into_iter().map(|(t, c)| (t.to_string(), c)).unzip()
}

fn sigmoid(x: f32) -> f32 {
    let x = x.clamp(-MAX_EXP, MAX_EXP);
    1.0 / (1.0 + (-x).exp())
}

/// Unigram noise distribution raised to the 3/4 power.
struct NoiseTable {
    cumulative: Vec<f64>,
}

impl NoiseTable {
    fn new(counts: &[u64]) -> Self {
        let mut acc = 0.0;
        let cumulative = counts
            .iter()
            .map(|&c| {
                acc += (c as f64).powf(NOISE_POWER);
                acc
            })
            .collect();
        Self { cumulative }
    }

    fn sample<R: Rng>(&self, rng: &mut R) -> usize {
        let total = self.cumulative.last().copied().unwrap_or(0.0);
        let point = rng.gen::<f64>() * total;
        self.cumulative
            .partition_point(|&c| c <= point)
            .min(self.cumulative.len().saturating_sub(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<Vec<String>> {
        let lines = [
            "patient developed fever after vaccine",
            "patient developed rash after vaccine",
            "fever and rash resolved",
            "patient reported fever",
        ];
        lines
            .iter()
            .map(|l| l.split_whitespace().map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn vocabulary_respects_min_count_and_order() {
        let (tokens, counts) = count_vocabulary(&corpus(), 2);
        assert_eq!(tokens[0], "fever");
        assert_eq!(counts[0], 3);
        assert_eq!(tokens[1], "patient");
        assert!(!tokens.contains(&"resolved".to_string()));
    }

    #[test]
    fn training_is_seeded() {
        let params = EmbeddingParams {
            size: 8,
            min_count: 1,
            epochs: 2,
            ..EmbeddingParams::default()
        };
        let a = train(&corpus(), &params).unwrap();
        let b = train(&corpus(), &params).unwrap();
        assert_eq!(a.dim(), 8);
        assert_eq!(a.get("fever"), b.get("fever"));
        assert!(a.get("unseen").is_none());
    }

    #[test]
    fn noise_sampling_stays_in_range() {
        let table = NoiseTable::new(&[5, 1, 1]);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            assert!(table.sample(&mut rng) < 3);
        }
    }
}
