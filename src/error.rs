//! Structural failures that halt a pipeline stage.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// An upstream stage has not produced its output yet.
    #[error("required input {0} is missing; run the upstream stage first")]
    MissingInput(PathBuf),
    #[error("column {column} not found in {path}")]
    MissingColumn { path: PathBuf, column: String },
    #[error("archive {archive} has no entry ending in {suffix}")]
    MissingArchiveEntry { archive: PathBuf, suffix: String },
}

impl PipelineError {
    /// Return `MissingInput` unless `path` exists.
    pub fn require(path: &std::path::Path) -> Result<(), PipelineError> {
        if path.exists() {
            Ok(())
        } else {
            Err(PipelineError::MissingInput(path.to_path_buf()))
        }
    }
}
