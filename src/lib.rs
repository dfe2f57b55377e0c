//! Assembly of a labeled VAERS adverse-event corpus for NLP model training.
//!
//! The pipeline runs as a set of CLI stages: archive assembly, seeded
//! splitting, vocabulary and embedding construction, and Wikipedia-backed
//! label descriptions.

pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod labels;
pub mod logging;
pub mod nlp;
