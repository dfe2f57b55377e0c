//! Runtime configuration utilities for vaers-corpus.

use std::{
    env,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use anyhow::Context;
use serde::Deserialize;
use thiserror::Error;

const PROPORTION_TOLERANCE: f64 = 1e-9;

/// Startup-fatal configuration problems.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("split proportions must sum to 1 (train {train} + test {test} + val {val} = {sum})")]
    ProportionSum {
        train: f64,
        test: f64,
        val: f64,
        sum: f64,
    },
    #[error("split proportion {name} = {value} is outside [0, 1]")]
    ProportionRange { name: &'static str, value: f64 },
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
    #[error("directory {0} does not exist")]
    MissingDirectory(PathBuf),
}

/// Train/test/validation proportions.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SplitProportions {
    pub train: f64,
    pub test: f64,
    pub val: f64,
}

impl SplitProportions {
    /// Validate and build proportions that sum to one.
    pub fn new(train: f64, test: f64, val: f64) -> Result<Self, ConfigError> {
        for (name, value) in [("train", train), ("test", test), ("val", val)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ProportionRange { name, value });
            }
        }
        let sum = train + test + val;
        if (sum - 1.0).abs() > PROPORTION_TOLERANCE {
            return Err(ConfigError::ProportionSum {
                train,
                test,
                val,
                sum,
            });
        }
        Ok(Self { train, test, val })
    }

    /// Share of records held out of training (test + val).
    pub fn holdout(&self) -> f64 {
        self.test + self.val
    }
}

impl Default for SplitProportions {
    fn default() -> Self {
        Self {
            train: 0.8,
            test: 0.15,
            val: 0.05,
        }
    }
}

/// Word2vec hyper-parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingParams {
    pub size: usize,
    pub min_count: usize,
    pub epochs: usize,
    pub window: usize,
    pub negative: usize,
    pub seed: u64,
}

impl Default for EmbeddingParams {
    fn default() -> Self {
        Self {
            size: 100,
            min_count: 3,
            epochs: 5,
            window: 5,
            negative: 5,
            seed: 1234,
        }
    }
}

/// Knowledge-source client settings.
#[derive(Debug, Clone, Deserialize)]
pub struct WikiSettings {
    pub api_url: String,
    pub contact_email: String,
    pub timeout: Duration,
    pub request_delay: Duration,
    pub concurrency: usize,
}

impl Default for WikiSettings {
    fn default() -> Self {
        Self {
            api_url: "https://en.wikipedia.org/w/api.php".to_string(),
            contact_email: "research@example.com".to_string(),
            timeout: Duration::from_secs(10),
            request_delay: Duration::from_millis(100),
            concurrency: 1,
        }
    }
}

/// Application configuration resolved from `.env` and defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Folder holding the raw VAERS zip archives.
    pub raw_dir: PathBuf,
    /// Folder holding openFDA device-event archives.
    pub device_dir: PathBuf,
    /// Root folder for assembled datasets and splits.
    pub data_dir: PathBuf,
    pub vocab_dir: PathBuf,
    pub label_dir: PathBuf,
    /// Trained embedding models.
    pub model_dir: PathBuf,
    pub proportions: SplitProportions,
    pub split_seed: u64,
    /// Token cap for bounded text; `None` leaves text unbounded.
    pub max_length: Option<usize>,
    /// Minimum document frequency for vocabulary tokens.
    pub min_df: usize,
    pub embedding: EmbeddingParams,
    pub wiki: WikiSettings,
}

impl Settings {
    /// Load configuration from environment with reasonable defaults.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = EmbeddingParams::default();
        let wiki_defaults = WikiSettings::default();

        let proportions = SplitProportions::new(
            env_or("TRAIN_PROP", 0.8)?,
            env_or("TEST_PROP", 0.15)?,
            env_or("VAL_PROP", 0.05)?,
        )?;
        let split_seed = env_or("SPLIT_SEED", 1234u64)?;

        let settings = Self {
            raw_dir: env_path("RAW_DIR", "./raw"),
            device_dir: env_path("DEVICE_DIR", "./raw/device"),
            data_dir: env_path("DATA_DIR", "./vaersdata"),
            vocab_dir: env_path("VOCAB_DIR", "./vocab"),
            label_dir: env_path("LABEL_DIR", "./labels"),
            model_dir: env_path("MODEL_DIR", "./saved_models"),
            proportions,
            split_seed,
            max_length: max_length_from_env()?,
            min_df: env_or("MIN_DF", 3usize)?,
            embedding: EmbeddingParams {
                size: env_or("EMBEDDING_SIZE", defaults.size)?,
                min_count: env_or("MIN_COUNT", defaults.min_count)?,
                epochs: env_or("EMBEDDING_EPOCHS", defaults.epochs)?,
                window: env_or("EMBEDDING_WINDOW", defaults.window)?,
                negative: env_or("NEGATIVE_SAMPLES", defaults.negative)?,
                seed: split_seed,
            },
            wiki: WikiSettings {
                api_url: env::var("WIKI_API_URL").unwrap_or(wiki_defaults.api_url),
                contact_email: env::var("CONTACT_EMAIL").unwrap_or(wiki_defaults.contact_email),
                timeout: Duration::from_secs(env_or("WIKI_TIMEOUT_SECS", 10u64)?),
                request_delay: Duration::from_millis(env_or("WIKI_REQUEST_DELAY_MS", 100u64)?),
                concurrency: env_or("WIKI_CONCURRENCY", wiki_defaults.concurrency)?.max(1),
            },
        };
        settings.ensure_output_dirs()?;
        Ok(settings)
    }

    /// Settings rooted under a single directory, used by tests and tooling.
    pub fn rooted_at<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref();
        Self {
            raw_dir: root.join("raw"),
            device_dir: root.join("raw/device"),
            data_dir: root.join("vaersdata"),
            vocab_dir: root.join("vocab"),
            label_dir: root.join("labels"),
            model_dir: root.join("saved_models"),
            proportions: SplitProportions::default(),
            split_seed: 1234,
            max_length: Some(2500),
            min_df: 3,
            embedding: EmbeddingParams::default(),
            wiki: WikiSettings::default(),
        }
    }

    /// Create every output directory.
    pub fn ensure_output_dirs(&self) -> anyhow::Result<()> {
        for dir in [
            &self.data_dir,
            &self.vocab_dir,
            &self.label_dir,
            &self.model_dir,
        ] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        Ok(())
    }

    /// Fail when a required input directory is absent.
    pub fn require_dir(dir: &Path) -> Result<(), ConfigError> {
        if dir.is_dir() {
            Ok(())
        } else {
            Err(ConfigError::MissingDirectory(dir.to_path_buf()))
        }
    }

    /// Convenience helper for derived path segments.
    pub fn join_data<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.data_dir.join(path)
    }

    pub fn join_vocab<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.vocab_dir.join(path)
    }

    pub fn join_label<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.label_dir.join(path)
    }

    pub fn join_model<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.model_dir.join(path)
    }
}

fn env_path(key: &str, default: &str) -> PathBuf {
    env::var(key)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}

fn env_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
        Err(_) => Ok(default),
    }
}

fn max_length_from_env() -> Result<Option<usize>, ConfigError> {
    match env::var("MAX_LENGTH") {
        Ok(raw) => parse_max_length(&raw).ok_or(ConfigError::InvalidValue {
            key: "MAX_LENGTH",
            value: raw,
        }),
        Err(_) => Ok(Some(2500)),
    }
}

/// `0` and `none` disable the cap; anything else must be a positive count.
pub fn parse_max_length(raw: &str) -> Option<Option<usize>> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("none") {
        return Some(None);
    }
    match trimmed.parse::<usize>() {
        Ok(0) => Some(None),
        Ok(n) => Some(Some(n)),
        Err(_) => None,
    }
}
