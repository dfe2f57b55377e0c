//! Data ingestion, splitting and external lookups.

pub mod device;
pub mod io;
pub mod split;
pub mod vaers;
pub mod wikipedia;
