//! Cell-Type Classifier
//!
//! Guesses a coarse cell type from a neuron id when the node table does not
//! provide one. Rules are checked in order and the first marker found in the
//! lower-cased id wins, so specific markers must precede the generic ones
//! they contain (`mli1` before `mli`, `pcl` before `pc`).

use serde::{Deserialize, Serialize};

use crate::graph::schema::CellType;

/// A single (substring marker → cell type) rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierRule {
    pub marker: String,
    pub cell_type: CellType,
}

impl ClassifierRule {
    pub fn new(marker: impl Into<String>, cell_type: CellType) -> Self {
        Self {
            marker: marker.into().to_lowercase(),
            cell_type,
        }
    }
}

/// Built-in precedence, most specific first.
const DEFAULT_RULES: &[(&str, CellType)] = &[
    ("fragment", CellType::Fragment),
    ("pcl", CellType::Interneuron),
    ("mli1", CellType::Mli1),
    ("mli2", CellType::Mli2),
    ("mli", CellType::Interneuron),
    ("interneuron", CellType::Interneuron),
    ("pli", CellType::Pli),
    ("cf", CellType::Cf),
    ("pc", CellType::Pc),
    ("grc", CellType::Grc),
    ("pf", CellType::Grc),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellTypeClassifier {
    rules: Vec<ClassifierRule>,
}

impl CellTypeClassifier {
    pub fn new() -> Self {
        Self::with_rules(
            DEFAULT_RULES
                .iter()
                .map(|(marker, t)| ClassifierRule::new(*marker, *t))
                .collect(),
        )
    }

    pub fn with_rules(rules: Vec<ClassifierRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[ClassifierRule] {
        &self.rules
    }

    /// The rule that decides `id`, if any.
    pub fn matching_rule(&self, id: &str) -> Option<&ClassifierRule> {
        let lower = id.to_lowercase();
        self.rules.iter().find(|r| lower.contains(&r.marker))
    }

    pub fn classify(&self, id: &str) -> CellType {
        match self.matching_rule(id) {
            Some(rule) => rule.cell_type,
            None => {
                tracing::warn!("No classifier rule matches '{}'", id);
                CellType::Unknown
            }
        }
    }
}

impl Default for CellTypeClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Classify with the built-in rule table.
pub fn guess_cell_type(id: &str) -> CellType {
    CellTypeClassifier::new().classify(id)
}
