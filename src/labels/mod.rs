//! Supplemental label descriptions scraped from Wikipedia.

pub mod resolver;
pub mod summary;

use std::{
    io::{BufRead, BufReader},
    path::Path,
};

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use indexmap::IndexSet;
use tracing::info;

use crate::{
    config::Settings,
    data::{io::AtomicOutput, vaers::LABELS_FILE, wikipedia::WikipediaClient},
    error::PipelineError,
    nlp::tokenizer::Tokenizer,
};

pub use resolver::{resolve, KnowledgeSource, LabelDescription, Lookup, Resolution};
pub use summary::ResolutionSummary;

pub const SUPPLEMENT_FILE: &str = "supplement_data.txt";
pub const WIKI_CORPUS_FILE: &str = "wiki_data.csv";
pub const DESCRIPTIONS_FILE: &str = "label_descriptions.csv";

const PROGRESS_EVERY: usize = 100;

/// Distinct, non-empty labels from a one-per-line file, in file order.
pub fn read_labels(path: &Path) -> Result<Vec<String>> {
    PipelineError::require(path)?;
    let file = std::fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut labels = IndexSet::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let label = line.trim();
        if !label.is_empty() {
            labels.insert(label.to_string());
        }
    }
    Ok(labels.into_iter().collect())
}

/// Resolve every label, at most `concurrency` at a time, keeping input order.
pub async fn describe_labels<S: KnowledgeSource>(
    source: &S,
    labels: Vec<String>,
    concurrency: usize,
) -> (Vec<LabelDescription>, ResolutionSummary) {
    let results: Vec<LabelDescription> = stream::iter(labels)
        .map(|label| async move { resolve(source, &label).await })
        .buffered(concurrency.max(1))
        .enumerate()
        .inspect(|(i, _)| {
            if (i + 1) % PROGRESS_EVERY == 0 {
                info!(completed = i + 1, "label searches completed");
            }
        })
        .map(|(_, result)| result)
        .collect()
        .await;
    let summary = results.iter().collect();
    (results, summary)
}

/// Run the description stage against Wikipedia and write its outputs.
pub async fn describe(settings: &Settings) -> Result<ResolutionSummary> {
    let labels = read_labels(&settings.join_label(LABELS_FILE))?;
    info!(labels = labels.len(), "starting label search");

    let client = WikipediaClient::new(&settings.wiki)?;
    let (results, summary) = describe_labels(&client, labels, settings.wiki.concurrency).await;

    write_supplement(&results, &settings.join_data(SUPPLEMENT_FILE))?;
    write_wiki_corpus(
        &results,
        &Tokenizer::new(true, None),
        &settings.join_data(WIKI_CORPUS_FILE),
    )?;
    write_descriptions(&results, &settings.join_data(DESCRIPTIONS_FILE))?;

    info!(%summary, "label search complete");
    Ok(summary)
}

/// Tab-delimited `label`, `desc` table.
pub fn write_supplement(results: &[LabelDescription], path: &Path) -> Result<()> {
    let mut out = AtomicOutput::create(path)?;
    {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(out.file());
        writer.write_record(["label", "desc"])?;
        for result in results {
            writer.write_record([&result.label, &result.description])?;
        }
        writer.flush()?;
    }
    out.commit()?;
    info!(path = %path.display(), rows = results.len(), "wrote supplemental labels");
    Ok(())
}

/// Auxiliary embedding corpus: tokenized full summaries under `TEXT`.
pub fn write_wiki_corpus(
    results: &[LabelDescription],
    tokenizer: &Tokenizer,
    path: &Path,
) -> Result<()> {
    let mut out = AtomicOutput::create(path)?;
    {
        let mut writer = csv::Writer::from_writer(out.file());
        writer.write_record(["LABEL", "TEXT"])?;
        for result in results {
            let text = tokenizer.tokenize_joined(&result.summary);
            writer.write_record([result.label.as_str(), text.as_str()])?;
        }
        writer.flush()?;
    }
    out.commit()?;
    Ok(())
}

fn write_descriptions(results: &[LabelDescription], path: &Path) -> Result<()> {
    let mut out = AtomicOutput::create(path)?;
    {
        let mut writer = csv::Writer::from_writer(out.file());
        for result in results {
            writer.serialize(result)?;
        }
        writer.flush()?;
    }
    out.commit()?;
    Ok(())
}
