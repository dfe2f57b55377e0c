//! VAERS archive ingestion: joins narrative and coded-symptom extracts,
//! aggregates codes per report and writes the post-processed dataset.

use std::{
    collections::BTreeSet,
    fs::File,
    io::{Read, Write},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::{
    config::Settings,
    data::io::{decode_field, AtomicOutput},
    error::PipelineError,
    nlp::tokenizer::Tokenizer,
};

pub const COMBINED_FILE: &str = "w266_full_data.csv";
pub const MANIFEST_FILE: &str = "w266_full_data.manifest.json";
pub const POST_PROCESSED_FILE: &str = "post_processed.csv";
pub const LABELS_FILE: &str = "labels.csv";

/// Numbered `SYMPTOMn` columns per coded row.
pub const SYMPTOM_SLOTS: usize = 5;

const DATA_SUFFIX: &str = "VAERSDATA.CSV";
const SYMPTOMS_SUFFIX: &str = "VAERSSYMPTOMS.CSV";

/// One row of the combined (joined, concatenated) table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedRow {
    pub vaers_id: String,
    pub text: Option<String>,
    /// Non-empty codes of this row, in slot order.
    pub symptoms: Vec<String>,
    pub source: String,
}

/// One report after aggregation; `vaers_id` is unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub vaers_id: String,
    pub text: String,
    pub symptoms: Vec<String>,
}

/// Row of `post_processed.csv`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostProcessedRow {
    #[serde(rename = "VAERS_ID")]
    pub vaers_id: String,
    #[serde(rename = "TEXT")]
    pub text: String,
    #[serde(rename = "LABELS")]
    pub labels: String,
    #[serde(rename = "RAW_TEXT", default)]
    pub raw_text: String,
}

impl PostProcessedRow {
    pub fn token_count(&self) -> usize {
        self.text.split_whitespace().count()
    }

    pub fn label_list(&self) -> Vec<&str> {
        self.labels.split(';').filter(|l| !l.is_empty()).collect()
    }
}

/// Identity of the archives a combined file was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveManifest {
    pub archives: Vec<ArchiveStamp>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveStamp {
    pub name: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

/// Counts reported when the stage finishes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssemblySummary {
    pub archives: usize,
    pub joined_rows: usize,
    pub records: usize,
    pub labels: usize,
    pub skipped_rows: usize,
    pub from_cache: bool,
}

/// Run the full assembly stage.
pub async fn assemble(settings: &Settings, force: bool) -> Result<AssemblySummary> {
    Settings::require_dir(&settings.raw_dir)?;
    let archives = list_archives(&settings.raw_dir)?;
    if archives.is_empty() {
        bail!("no .zip archives found in {}", settings.raw_dir.display());
    }

    let combined_path = settings.join_data(COMBINED_FILE);
    let manifest_path = settings.join_data(MANIFEST_FILE);
    let manifest = ArchiveManifest::for_archives(&archives)?;

    let mut summary = AssemblySummary {
        archives: archives.len(),
        ..AssemblySummary::default()
    };

    let rows = if !force && cache_is_fresh(&combined_path, &manifest_path, &manifest) {
        info!(path = %combined_path.display(), "combined file is current; loading it");
        summary.from_cache = true;
        let (rows, skipped) = read_combined(&combined_path)?;
        summary.skipped_rows = skipped;
        rows
    } else {
        let (rows, skipped) = assemble_rows(&settings.raw_dir)?;
        summary.skipped_rows = skipped;
        write_combined(&rows, &combined_path)?;
        manifest.save(&manifest_path)?;
        rows
    };
    summary.joined_rows = rows.len();
    if summary.skipped_rows > 0 {
        warn!(skipped = summary.skipped_rows, "skipped malformed source rows");
    }

    info!("aggregating labels");
    let records = aggregate(&rows);
    let tokenizer = Tokenizer::new(true, settings.max_length);
    let processed = postprocess(&records, &tokenizer);
    summary.records = processed.len();

    let post_path = settings.join_data(POST_PROCESSED_FILE);
    write_post_processed(&processed, &post_path)?;
    summary.labels = write_label_list(&records, &settings.join_label(LABELS_FILE))?;

    info!(
        records = summary.records,
        labels = summary.labels,
        path = %post_path.display(),
        "final dataset assembled"
    );
    Ok(summary)
}

/// Join every archive in `raw_dir`, concatenated in file-name order.
pub fn assemble_rows(raw_dir: &Path) -> Result<(Vec<JoinedRow>, usize)> {
    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for archive in list_archives(raw_dir)? {
        info!(archive = %archive.display(), "processing archive");
        let (archive_rows, archive_skipped) = read_archive(&archive)?;
        skipped += archive_skipped;
        rows.extend(archive_rows);
    }
    Ok((rows, skipped))
}

/// `*.zip` files directly inside `dir`, sorted by name.
pub fn list_archives(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut archives = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry?;
        let path = entry.path();
        let is_zip = path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
        if entry.file_type().is_file() && is_zip {
            archives.push(path.to_path_buf());
        }
    }
    archives.sort();
    Ok(archives)
}

/// Archive stem with a trailing `VAERSData` removed, e.g. `2021VAERSData.zip` -> `2021`.
pub fn source_tag(archive: &Path) -> String {
    let stem = archive
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let upper = stem.to_ascii_uppercase();
    match upper.strip_suffix("VAERSDATA") {
        Some(prefix) if !prefix.is_empty() => stem[..prefix.len()].to_string(),
        _ => stem.to_string(),
    }
}

/// Left-join the narrative extract onto the coded extract of one archive.
///
/// Returns the joined rows and the number of malformed rows skipped.
pub fn read_archive(path: &Path) -> Result<(Vec<JoinedRow>, usize)> {
    let file = File::open(path).with_context(|| format!("open archive {}", path.display()))?;
    let mut archive = ZipArchive::new(file)?;

    let mut verbatim = None;
    let mut coded = None;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let name = entry.name().to_ascii_uppercase();
        if name.ends_with(DATA_SUFFIX) {
            verbatim = Some((entry.name().to_string(), read_bytes(&mut entry)?));
        } else if name.ends_with(SYMPTOMS_SUFFIX) {
            coded = Some((entry.name().to_string(), read_bytes(&mut entry)?));
        }
    }
    let missing = |suffix: &str| PipelineError::MissingArchiveEntry {
        archive: path.to_path_buf(),
        suffix: suffix.to_string(),
    };
    let (verbatim_name, verbatim) = verbatim.ok_or_else(|| missing(DATA_SUFFIX))?;
    let (coded_name, coded) = coded.ok_or_else(|| missing(SYMPTOMS_SUFFIX))?;

    let source = source_tag(path);
    let narratives = parse_extract(&verbatim, &verbatim_name, &["VAERS_ID", "SYMPTOM_TEXT"])?;

    let mut code_columns = vec!["VAERS_ID".to_string()];
    code_columns.extend((1..=SYMPTOM_SLOTS).map(|i| format!("SYMPTOM{i}")));
    let code_refs: Vec<&str> = code_columns.iter().map(String::as_str).collect();
    let codes = parse_extract(&coded, &coded_name, &code_refs)?;

    let mut coded_by_id: IndexMap<String, Vec<Vec<String>>> = IndexMap::new();
    for mut row in codes.rows {
        let Some(id) = row[0].take() else { continue };
        let symptoms = row.into_iter().skip(1).flatten().collect();
        coded_by_id.entry(id).or_default().push(symptoms);
    }

    let mut joined = Vec::new();
    for mut row in narratives.rows {
        let Some(id) = row[0].take() else { continue };
        let text = row[1].take();
        match coded_by_id.get(&id) {
            Some(groups) => {
                for symptoms in groups {
                    joined.push(JoinedRow {
                        vaers_id: id.clone(),
                        text: text.clone(),
                        symptoms: symptoms.clone(),
                        source: source.clone(),
                    });
                }
            }
            None => joined.push(JoinedRow {
                vaers_id: id,
                text,
                symptoms: Vec::new(),
                source: source.clone(),
            }),
        }
    }

    info!(
        %source,
        rows = joined.len(),
        skipped = narratives.skipped + codes.skipped,
        "joined archive extracts"
    );
    Ok((joined, narratives.skipped + codes.skipped))
}

/// Group codes per report and attach them to the report's narrative.
///
/// Codes keep source order with duplicates. Each report keeps its first
/// narrative; rows without narrative contribute codes only.
pub fn aggregate(rows: &[JoinedRow]) -> Vec<EventRecord> {
    let mut codes: IndexMap<&str, Vec<String>> = IndexMap::new();
    let mut narratives: IndexMap<&str, &str> = IndexMap::new();
    let mut conflicting = 0usize;

    for row in rows {
        codes
            .entry(row.vaers_id.as_str())
            .or_default()
            .extend(row.symptoms.iter().cloned());
        if let Some(text) = row.text.as_deref() {
            match narratives.get(row.vaers_id.as_str()) {
                Some(existing) if *existing != text => conflicting += 1,
                Some(_) => {}
                None => {
                    narratives.insert(row.vaers_id.as_str(), text);
                }
            }
        }
    }
    if conflicting > 0 {
        warn!(conflicting, "reports with differing narratives; kept the first");
    }

    narratives
        .into_iter()
        .map(|(id, text)| EventRecord {
            vaers_id: id.to_string(),
            text: text.to_string(),
            symptoms: codes.get(id).cloned().unwrap_or_default(),
        })
        .collect()
}

/// Tokenize narratives (bounded and unbounded) and join labels with `;`.
pub fn postprocess(records: &[EventRecord], tokenizer: &Tokenizer) -> Vec<PostProcessedRow> {
    let raw_tokenizer = tokenizer.unbounded();
    records
        .iter()
        .map(|record| PostProcessedRow {
            vaers_id: record.vaers_id.clone(),
            text: tokenizer.tokenize_joined(&record.text),
            labels: record.symptoms.join(";"),
            raw_text: raw_tokenizer.tokenize_joined(&record.text),
        })
        .collect()
}

/// Read `post_processed.csv`; missing file is fatal.
pub fn read_post_processed(path: &Path) -> Result<Vec<PostProcessedRow>> {
    PipelineError::require(path)?;
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for result in reader.deserialize() {
        match result {
            Ok(row) => rows.push(row),
            Err(_) => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!(skipped, path = %path.display(), "skipped unreadable rows");
    }
    info!(rows = rows.len(), path = %path.display(), "loaded post-processed dataset");
    Ok(rows)
}

pub fn write_post_processed(rows: &[PostProcessedRow], path: &Path) -> Result<()> {
    let mut out = AtomicOutput::create(path)?;
    {
        let mut writer = csv::Writer::from_writer(out.file());
        for row in rows {
            writer.serialize(row)?;
        }
        if rows.is_empty() {
            writer.write_record(["VAERS_ID", "TEXT", "LABELS", "RAW_TEXT"])?;
        }
        writer.flush()?;
    }
    out.commit()?;
    Ok(())
}

/// Write the sorted distinct labels, one per line; returns their count.
pub fn write_label_list(records: &[EventRecord], path: &Path) -> Result<usize> {
    let labels: BTreeSet<&str> = records
        .iter()
        .flat_map(|r| r.symptoms.iter().map(String::as_str))
        .collect();
    let mut out = AtomicOutput::create(path)?;
    {
        let file = out.file();
        for label in &labels {
            writeln!(file, "{label}")?;
        }
        file.flush()?;
    }
    out.commit()?;
    info!(labels = labels.len(), path = %path.display(), "wrote label list");
    Ok(labels.len())
}

fn combined_header() -> Vec<String> {
    let mut header = vec!["VAERS_ID".to_string(), "SYMPTOM_TEXT".to_string()];
    header.extend((1..=SYMPTOM_SLOTS).map(|i| format!("SYMPTOM{i}")));
    header.push("SOURCE".to_string());
    header
}

fn write_combined(rows: &[JoinedRow], path: &Path) -> Result<()> {
    let mut out = AtomicOutput::create(path)?;
    {
        let mut writer = csv::Writer::from_writer(out.file());
        writer.write_record(combined_header())?;
        for row in rows {
            let mut record = vec![row.vaers_id.as_str(), row.text.as_deref().unwrap_or("")];
            for slot in 0..SYMPTOM_SLOTS {
                record.push(row.symptoms.get(slot).map(String::as_str).unwrap_or(""));
            }
            record.push(row.source.as_str());
            writer.write_record(&record)?;
        }
        writer.flush()?;
    }
    out.commit()?;
    info!(rows = rows.len(), path = %path.display(), "wrote combined dataset");
    Ok(())
}

fn read_combined(path: &Path) -> Result<(Vec<JoinedRow>, usize)> {
    let bytes = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let header = combined_header();
    let columns: Vec<&str> = header.iter().map(String::as_str).collect();
    let extract = parse_extract(&bytes, &path.display().to_string(), &columns)?;
    let source_idx = columns.len() - 1;
    let rows = extract
        .rows
        .into_iter()
        .filter_map(|mut row| {
            let vaers_id = row[0].take()?;
            let text = row[1].take();
            let source = row[source_idx].take().unwrap_or_default();
            let symptoms = row[2..source_idx].iter_mut().filter_map(Option::take).collect();
            Some(JoinedRow {
                vaers_id,
                text,
                symptoms,
                source,
            })
        })
        .collect();
    Ok((rows, extract.skipped))
}

impl ArchiveManifest {
    pub fn for_archives(archives: &[PathBuf]) -> Result<Self> {
        let mut stamps = Vec::with_capacity(archives.len());
        for archive in archives {
            let meta = std::fs::metadata(archive)
                .with_context(|| format!("stat {}", archive.display()))?;
            stamps.push(ArchiveStamp {
                name: archive
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                size: meta.len(),
                modified: DateTime::<Utc>::from(meta.modified()?),
            });
        }
        Ok(Self { archives: stamps })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut out = AtomicOutput::create(path)?;
        serde_json::to_writer_pretty(&mut *out.file(), self)?;
        out.commit()?;
        Ok(())
    }
}

/// The combined file is reusable only when its manifest matches `current`.
pub fn cache_is_fresh(combined: &Path, manifest_path: &Path, current: &ArchiveManifest) -> bool {
    if !combined.exists() {
        return false;
    }
    match ArchiveManifest::load(manifest_path) {
        Ok(stored) => stored == *current,
        Err(_) => false,
    }
}

struct Extract {
    rows: Vec<Vec<Option<String>>>,
    skipped: usize,
}

/// Pull the requested columns out of a CSV extract. Empty fields are `None`;
/// rows that fail to parse or carry more fields than the header are skipped.
fn parse_extract(bytes: &[u8], name: &str, columns: &[&str]) -> Result<Extract> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);
    let headers: Vec<String> = reader
        .byte_headers()?
        .iter()
        .map(|h| {
            decode_field(h)
                .trim_start_matches('\u{feff}')
                .trim()
                .to_ascii_uppercase()
        })
        .collect();
    let indices = columns
        .iter()
        .map(|column| {
            headers
                .iter()
                .position(|h| h == column)
                .ok_or_else(|| PipelineError::MissingColumn {
                    path: PathBuf::from(name),
                    column: column.to_string(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for record in reader.byte_records() {
        let record = match record {
            Ok(record) if record.len() <= headers.len() => record,
            _ => {
                skipped += 1;
                continue;
            }
        };
        rows.push(
            indices
                .iter()
                .map(|&i| {
                    record
                        .get(i)
                        .map(|field| decode_field(field).trim().to_string())
                        .filter(|value| !value.is_empty())
                })
                .collect(),
        );
    }
    Ok(Extract { rows, skipped })
}

fn read_bytes<R: Read>(entry: &mut R) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    entry.read_to_end(&mut buf)?;
    Ok(buf)
}
