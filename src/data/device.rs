//! openFDA device-event narratives as an auxiliary embedding corpus.

use std::{fs::File, io::Read, path::Path};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::{
    config::Settings,
    data::{io::AtomicOutput, vaers::list_archives},
    nlp::tokenizer::Tokenizer,
};

pub const DEVICE_FILE: &str = "device_data.csv";

#[derive(Debug, Deserialize)]
struct DeviceExport {
    #[serde(default)]
    results: Vec<DeviceEvent>,
}

#[derive(Debug, Deserialize)]
struct DeviceEvent {
    #[serde(default)]
    mdr_text: Vec<MdrText>,
}

#[derive(Debug, Deserialize)]
struct MdrText {
    #[serde(default)]
    text: Option<String>,
}

/// Narrative texts of one openFDA export document.
pub fn extract_texts(json: &str) -> Result<Vec<String>> {
    let export: DeviceExport = serde_json::from_str(json)?;
    Ok(export
        .results
        .into_iter()
        .flat_map(|event| event.mdr_text)
        .filter_map(|m| m.text)
        .filter(|t| !t.trim().is_empty())
        .collect())
}

/// Tokenized narratives from every JSON entry in one archive.
fn read_device_archive(path: &Path, tokenizer: &Tokenizer) -> Result<Vec<String>> {
    let file = File::open(path).with_context(|| format!("open archive {}", path.display()))?;
    let mut archive = ZipArchive::new(file)?;
    let mut texts = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if !entry.name().to_ascii_lowercase().ends_with(".json") {
            continue;
        }
        let name = entry.name().to_string();
        let mut json = String::new();
        if let Err(err) = entry.read_to_string(&mut json) {
            warn!(%name, %err, "unreadable device export; skipping");
            continue;
        }
        match extract_texts(&json) {
            Ok(found) => texts.extend(found.iter().map(|t| tokenizer.tokenize_joined(t))),
            Err(err) => warn!(%name, %err, "malformed device export; skipping"),
        }
    }
    Ok(texts)
}

/// Build `device_data.csv` (column `TEXT`) from the device archive directory.
pub async fn assemble(settings: &Settings) -> Result<usize> {
    Settings::require_dir(&settings.device_dir)?;
    let tokenizer = Tokenizer::new(true, None);

    let mut texts = Vec::new();
    for archive in list_archives(&settings.device_dir)? {
        info!(archive = %archive.display(), "processing device archive");
        texts.extend(read_device_archive(&archive, &tokenizer)?);
    }

    let path = settings.join_data(DEVICE_FILE);
    let mut out = AtomicOutput::create(&path)?;
    let mut written = 0usize;
    {
        let mut writer = csv::Writer::from_writer(out.file());
        writer.write_record(["TEXT"])?;
        for text in texts.iter().filter(|t| !t.is_empty()) {
            writer.write_record([text])?;
            written += 1;
        }
        writer.flush()?;
    }
    out.commit()?;
    if written < texts.len() {
        debug!(dropped = texts.len() - written, "narratives with no tokens");
    }
    info!(events = written, path = %path.display(), "wrote device corpus");
    Ok(written)
}
