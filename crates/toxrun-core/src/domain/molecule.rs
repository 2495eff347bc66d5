//! Input molecules and their attached endpoint outcomes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::outcome::EndpointOutcome;

/// One input structure, identified by its 1-based position in the batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Molecule {
    pub index: usize,
    pub smiles: String,
    /// Outcomes keyed by endpoint id.
    #[serde(default)]
    pub properties: BTreeMap<String, EndpointOutcome>,
}

impl Molecule {
    pub fn new(index: usize, smiles: impl Into<String>) -> Self {
        Self {
            index,
            smiles: smiles.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn property(&self, endpoint: &str) -> Option<&EndpointOutcome> {
        self.properties.get(endpoint)
    }

    /// Attach (or replace) the outcome for an endpoint.
    pub fn attach(&mut self, endpoint: &str, outcome: EndpointOutcome) {
        self.properties.insert(endpoint.to_string(), outcome);
    }
}

/// Build the initial molecule list: index `i + 1` for the `i`-th structure.
pub fn number_batch(smiles: &[String]) -> Vec<Molecule> {
    smiles
        .iter()
        .enumerate()
        .map(|(i, s)| Molecule::new(i + 1, s.clone()))
        .collect()
}
