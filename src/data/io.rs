//! File helpers shared by the pipeline stages: tolerant decoding, column
//! readers and atomic output files.

use std::{
    fmt,
    fs::File,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{anyhow, Context, Result};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::PipelineError;

/// Decode a field as UTF-8, falling back to Latin-1 byte-per-char.
pub fn decode_field(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// A text column inside a CSV file, written `path:COLUMN` on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSource {
    pub path: PathBuf,
    pub column: String,
}

impl TextSource {
    pub fn new(path: impl Into<PathBuf>, column: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            column: column.into(),
        }
    }
}

impl FromStr for TextSource {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        let (path, column) = raw
            .rsplit_once(':')
            .ok_or_else(|| anyhow!("expected PATH:COLUMN, got {raw:?}"))?;
        if path.is_empty() || column.is_empty() {
            return Err(anyhow!("expected PATH:COLUMN, got {raw:?}"));
        }
        Ok(Self::new(path, column))
    }
}

impl fmt::Display for TextSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path.display(), self.column)
    }
}

/// Read every non-empty value of the source column, in file order.
///
/// Unreadable records are skipped; a missing file or column is fatal.
pub fn read_column(source: &TextSource) -> Result<Vec<String>> {
    PipelineError::require(&source.path)?;
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(&source.path)
        .with_context(|| format!("open {}", source.path.display()))?;
    let headers = reader.byte_headers()?.clone();
    let idx = headers
        .iter()
        .position(|h| decode_field(h).trim() == source.column)
        .ok_or_else(|| PipelineError::MissingColumn {
            path: source.path.clone(),
            column: source.column.clone(),
        })?;

    let mut values = Vec::new();
    let mut skipped = 0usize;
    for record in reader.byte_records() {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                debug!(%err, "skipping unreadable record");
                skipped += 1;
                continue;
            }
        };
        if let Some(field) = record.get(idx) {
            let value = decode_field(field);
            if !value.trim().is_empty() {
                values.push(value);
            }
        }
    }
    if skipped > 0 {
        warn!(skipped, source = %source, "skipped malformed rows");
    }
    Ok(values)
}

/// Read several sources back to back.
pub fn read_columns(sources: &[TextSource]) -> Result<Vec<String>> {
    let mut docs = Vec::new();
    for source in sources {
        let values = read_column(source)?;
        debug!(source = %source, rows = values.len(), "read text column");
        docs.extend(values);
    }
    Ok(docs)
}

/// Output file that only appears at `target` once [`AtomicOutput::commit`] runs.
pub struct AtomicOutput {
    target: PathBuf,
    tmp: NamedTempFile,
}

impl AtomicOutput {
    pub fn create<P: AsRef<Path>>(target: P) -> Result<Self> {
        let target = target.as_ref().to_path_buf();
        let parent = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)?;
        let tmp = NamedTempFile::new_in(&parent)
            .with_context(|| format!("create temporary file in {}", parent.display()))?;
        Ok(Self { target, tmp })
    }

    pub fn file(&mut self) -> &mut File {
        self.tmp.as_file_mut()
    }

    /// Rename the finished file into place.
    pub fn commit(self) -> Result<PathBuf> {
        self.tmp
            .persist(&self.target)
            .with_context(|| format!("persist {}", self.target.display()))?;
        Ok(self.target)
    }
}
