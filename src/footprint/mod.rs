//! Heap footprint analysis: retained size + implementation label per fixture.
//!
//! Observations are bucketed by container size. Within a bucket the rows form a
//! set keyed on the full (label, formatted size) pair, so re-measuring an
//! identical structure collapses while a differing byte count adds a row.

pub mod classify;
pub mod graph;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use classify::Classifier;
pub use graph::{GraphSizer, GraphWalker, HeapNode, Opaque, ReachabilitySizer};

use crate::error::{AnalysisError, ClassificationError};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FootprintRow {
    pub label: String,
    /// Thousands-grouped decimal, e.g. `"12,345"`.
    pub size: String,
    pub bytes: u64,
}

pub type Footprints = BTreeMap<usize, BTreeSet<FootprintRow>>;

pub struct FootprintAnalyzer {
    sizer: Box<dyn GraphSizer>,
    classifier: Classifier,
    observations: Footprints,
}

impl FootprintAnalyzer {
    pub fn new(sizer: Box<dyn GraphSizer>, classifier: Classifier) -> Self {
        Self {
            sizer,
            classifier,
            observations: Footprints::new(),
        }
    }

    pub fn measure(&self, target: &dyn HeapNode) -> Result<u64, AnalysisError> {
        self.sizer.measure(target)
    }

    pub fn classify(&self, target: &dyn HeapNode) -> Result<String, ClassificationError> {
        self.classifier.classify(target.type_name())
    }

    /// Classify and measure `target`, then store it under `container_size`.
    ///
    /// A classification failure is returned to the caller and must abort the
    /// run. A measurement failure only drops this observation.
    pub fn record(&mut self, container_size: usize, target: &dyn HeapNode) -> Result<(), ClassificationError> {
        let label = self.classify(target)?;
        let bytes = match self.measure(target) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(%label, container_size, error = %err, "skipping footprint observation");
                return Ok(());
            }
        };
        debug!(%label, container_size, bytes, "footprint recorded");
        self.observations.entry(container_size).or_default().insert(FootprintRow {
            label,
            size: format_thousands(bytes),
            bytes,
        });
        Ok(())
    }

    pub fn observations(&self) -> &Footprints {
        &self.observations
    }

    pub fn into_observations(self) -> Footprints {
        self.observations
    }
}

impl Default for FootprintAnalyzer {
    fn default() -> Self {
        Self::new(Box::<ReachabilitySizer>::default(), Classifier::default())
    }
}

/// `1234567` -> `"1,234,567"`.
pub fn format_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
