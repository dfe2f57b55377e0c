//! Aggregate counts over resolved label descriptions.

use std::fmt;

use serde::Serialize;

use crate::labels::resolver::{LabelDescription, Resolution};

/// Totals per terminal state, computed by the caller after resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionSummary {
    /// Labels resolved.
    pub searches: usize,
    /// Individual knowledge-source lookups across all labels.
    pub lookups: usize,
    pub original: usize,
    pub disambiguation: usize,
    pub trimmed: usize,
    pub trimmed_disambiguation: usize,
    pub failed: usize,
}

impl ResolutionSummary {
    pub fn record(&mut self, result: &LabelDescription) {
        self.searches += 1;
        self.lookups += result.lookups;
        *self.slot(result.resolution) += 1;
    }

    pub fn count(&self, resolution: Resolution) -> usize {
        match resolution {
            Resolution::Original => self.original,
            Resolution::Disambiguation => self.disambiguation,
            Resolution::Trimmed => self.trimmed,
            Resolution::TrimmedDisambiguation => self.trimmed_disambiguation,
            Resolution::Failed => self.failed,
        }
    }

    fn slot(&mut self, resolution: Resolution) -> &mut usize {
        match resolution {
            Resolution::Original => &mut self.original,
            Resolution::Disambiguation => &mut self.disambiguation,
            Resolution::Trimmed => &mut self.trimmed,
            Resolution::TrimmedDisambiguation => &mut self.trimmed_disambiguation,
            Resolution::Failed => &mut self.failed,
        }
    }
}

impl<'a> FromIterator<&'a LabelDescription> for ResolutionSummary {
    fn from_iter<I: IntoIterator<Item = &'a LabelDescription>>(iter: I) -> Self {
        let mut summary = Self::default();
        for result in iter {
            summary.record(result);
        }
        summary
    }
}

impl fmt::Display for ResolutionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "searches={} lookups={}", self.searches, self.lookups)?;
        for resolution in Resolution::ALL {
            write!(f, " {}={}", resolution, self.count(resolution))?;
        }
        Ok(())
    }
}
