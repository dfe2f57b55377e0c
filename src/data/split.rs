//! Seeded train/test/dev partitioning of the post-processed dataset.

use std::path::{Path, PathBuf};

use anyhow::Result;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::Serialize;
use tracing::info;

use crate::{
    config::{Settings, SplitProportions},
    data::{
        io::AtomicOutput,
        vaers::{self, PostProcessedRow, POST_PROCESSED_FILE},
    },
};

pub const TRAIN_RAW_FILE: &str = "train_raw.csv";
pub const TRAIN_FILE: &str = "train.csv";
pub const TEST_FILE: &str = "test.csv";
pub const DEV_FILE: &str = "dev.csv";

// Absorbs float noise such as 0.2 * 10 = 2.0000000000000004 before ceil.
const ROUNDING_SLACK: f64 = 1e-9;

/// Disjoint index sets covering `0..n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
    /// Validation records.
    pub dev: Vec<usize>,
}

impl SplitIndices {
    pub fn total(&self) -> usize {
        self.train.len() + self.test.len() + self.dev.len()
    }
}

/// Two-stage seeded split.
///
/// Stage one holds out `ceil(n * (test + val))` records from training. Stage
/// two reshuffles the holdout with the same seed and moves
/// `ceil(m * val / (test + val))` of it to dev; the remainder is test.
pub fn split_indices(n: usize, proportions: &SplitProportions, seed: u64) -> SplitIndices {
    let holdout_share = proportions.holdout();
    let holdout_len = ceil_share(n, holdout_share);

    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));
    let train = order.split_off(holdout_len);
    let holdout = order;

    if holdout.is_empty() {
        return SplitIndices {
            train,
            test: holdout,
            dev: Vec::new(),
        };
    }

    let dev_len = ceil_share(holdout.len(), proportions.val / holdout_share);
    let mut positions: Vec<usize> = (0..holdout.len()).collect();
    positions.shuffle(&mut StdRng::seed_from_u64(seed));
    let test_positions = positions.split_off(dev_len);

    let dev = positions.iter().map(|&p| holdout[p]).collect();
    let test = test_positions.iter().map(|&p| holdout[p]).collect();

    SplitIndices { train, test, dev }
}

fn ceil_share(n: usize, share: f64) -> usize {
    let exact = n as f64 * share;
    ((exact - ROUNDING_SLACK).ceil().max(0.0) as usize).min(n)
}

/// Records worth training on: at least two tokens and at least one label.
pub fn usable(row: &PostProcessedRow) -> bool {
    row.token_count() > 1 && !row.labels.trim().is_empty()
}

#[derive(Debug, Serialize)]
struct SplitRow<'a> {
    #[serde(rename = "VAERS_ID")]
    vaers_id: &'a str,
    #[serde(rename = "TEXT")]
    text: &'a str,
    #[serde(rename = "LABELS")]
    labels: &'a str,
    length: usize,
}

#[derive(Debug, Serialize)]
struct RawRow<'a> {
    #[serde(rename = "RAW_TEXT")]
    raw_text: &'a str,
}

/// Output locations of the split stage.
#[derive(Debug, Clone)]
pub struct SplitOutputs {
    pub train_raw: PathBuf,
    pub train: PathBuf,
    pub test: PathBuf,
    pub dev: PathBuf,
    pub sizes: (usize, usize, usize),
}

/// Split `post_processed.csv` and write the train/test/dev files.
pub async fn run(settings: &Settings, sort_by_length: bool) -> Result<SplitOutputs> {
    let rows = vaers::read_post_processed(&settings.join_data(POST_PROCESSED_FILE))?;
    let total = rows.len();
    let rows: Vec<PostProcessedRow> = rows.into_iter().filter(usable).collect();
    info!(total, usable = rows.len(), "creating train/test/dev splits");

    let indices = split_indices(rows.len(), &settings.proportions, settings.split_seed);

    let train_raw = settings.join_data(TRAIN_RAW_FILE);
    write_raw(&rows, &indices.train, &train_raw)?;

    let train = settings.join_data(TRAIN_FILE);
    let test = settings.join_data(TEST_FILE);
    let dev = settings.join_data(DEV_FILE);
    write_split(&rows, &indices.train, sort_by_length, &train)?;
    write_split(&rows, &indices.test, sort_by_length, &test)?;
    write_split(&rows, &indices.dev, sort_by_length, &dev)?;

    let sizes = (indices.train.len(), indices.test.len(), indices.dev.len());
    info!(
        train = sizes.0,
        test = sizes.1,
        dev = sizes.2,
        "wrote splits"
    );
    Ok(SplitOutputs {
        train_raw,
        train,
        test,
        dev,
        sizes,
    })
}

fn write_raw(rows: &[PostProcessedRow], indices: &[usize], path: &Path) -> Result<()> {
    let mut out = AtomicOutput::create(path)?;
    {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(out.file());
        writer.write_record(["RAW_TEXT"])?;
        for &i in indices {
            writer.serialize(RawRow {
                raw_text: &rows[i].raw_text,
            })?;
        }
        writer.flush()?;
    }
    out.commit()?;
    Ok(())
}

fn write_split(
    rows: &[PostProcessedRow],
    indices: &[usize],
    sort_by_length: bool,
    path: &Path,
) -> Result<()> {
    let mut selected: Vec<(usize, &PostProcessedRow)> =
        indices.iter().map(|&i| (rows[i].token_count(), &rows[i])).collect();
    if sort_by_length {
        selected.sort_by_key(|(len, _)| *len);
    }

    let mut out = AtomicOutput::create(path)?;
    {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(out.file());
        writer.write_record(["VAERS_ID", "TEXT", "LABELS", "length"])?;
        for (length, row) in selected {
            writer.serialize(SplitRow {
                vaers_id: &row.vaers_id,
                text: &row.text,
                labels: &row.labels,
                length,
            })?;
        }
        writer.flush()?;
    }
    out.commit()?;
    info!(path = %path.display(), rows = indices.len(), "wrote split");
    Ok(())
}
