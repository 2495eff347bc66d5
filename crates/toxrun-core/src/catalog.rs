//! Endpoint catalog.
//!
//! A read-only table from endpoint id (the code passed to the prediction
//! tool with `-e`) to descriptive metadata. The built-in table covers every
//! endpoint the tool's consensus mode supports; a JSON file with the same
//! shape can replace it.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ToxError};

/// Descriptive metadata for one endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EndpointInfo {
    pub name: String,
    pub unit: String,
    pub description: String,
    pub application: String,
}

impl EndpointInfo {
    pub fn new(name: &str, unit: &str, description: &str, application: &str) -> Self {
        Self {
            name: name.to_string(),
            unit: unit.to_string(),
            description: description.to_string(),
            application: application.to_string(),
        }
    }

    /// Placeholder metadata for an id the catalog does not know.
    pub fn unknown(endpoint: &str) -> Self {
        Self {
            name: endpoint.to_string(),
            unit: "N/A".to_string(),
            description: String::new(),
            application: String::new(),
        }
    }
}

/// Ordered endpoint table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct EndpointCatalog {
    entries: IndexMap<String, EndpointInfo>,
}

impl EndpointCatalog {
    pub fn new(entries: IndexMap<String, EndpointInfo>) -> Self {
        Self { entries }
    }

    /// The built-in T.E.S.T. endpoint table.
    pub fn builtin() -> Self {
        let rows = [
            (
                "LC50",
                "96h Fathead Minnow LC50",
                "mg/L",
                "Concentration lethal to 50% of Pimephales promelas (fish) after 96 hours.",
                "Acute aquatic toxicity",
            ),
            (
                "LC50DM",
                "48h Daphnia magna LC50",
                "mg/L",
                "Concentration lethal to 50% of water fleas after 48 hours.",
                "Acute toxicity to aquatic invertebrates",
            ),
            (
                "IGC50",
                "Tetrahymena pyriformis IGC50",
                "mg/L",
                "Concentration inhibiting growth of 50% of the protozoa.",
                "Chronic toxicity to microorganisms",
            ),
            (
                "LD50",
                "Oral Rat LD50",
                "mg/kg",
                "Oral dose lethal to 50% of rats.",
                "Acute systemic toxicity",
            ),
            (
                "BCF",
                "Bioconcentration Factor",
                "L/kg",
                "Bioaccumulation factor in fish (log BCF).",
                "Bioaccumulation potential",
            ),
            (
                "DevTox",
                "Developmental Toxicity",
                "Binary",
                "Probability of developmental toxicity (yes/no).",
                "Reproductive risk",
            ),
            (
                "Mutagenicity",
                "Ames Mutagenicity",
                "Binary",
                "Mutagenic potential (Ames test).",
                "Carcinogenicity/genotoxicity",
            ),
            (
                "BP",
                "Boiling Point",
                "°C",
                "Boiling temperature.",
                "Physicochemical property",
            ),
            (
                "Density",
                "Density",
                "g/cm³",
                "Density at 25°C.",
                "Physicochemical property",
            ),
            (
                "FP",
                "Flash Point",
                "°C",
                "Flash point temperature.",
                "Chemical safety",
            ),
            (
                "MP",
                "Melting Point",
                "°C",
                "Melting temperature.",
                "Thermal stability",
            ),
            (
                "ST",
                "Surface Tension",
                "mN/m",
                "Surface tension.",
                "Interfacial behaviour",
            ),
            (
                "TC",
                "Thermal Conductivity",
                "W/m·K",
                "Thermal conductivity.",
                "Heat transfer",
            ),
            (
                "VP",
                "Vapor Pressure",
                "mmHg",
                "Vapor pressure at 25°C (log VP).",
                "Volatility",
            ),
            (
                "WS",
                "Water Solubility",
                "mg/L",
                "Water solubility at 25°C (log WS).",
                "Bioavailability",
            ),
            (
                "viscosity",
                "Viscosity",
                "cP",
                "Dynamic viscosity.",
                "Flow and transport",
            ),
            (
                "ER_Binary",
                "Estrogen Receptor Binding (Binary)",
                "Binary",
                "Estrogen receptor binding (yes/no).",
                "Endocrine disruption",
            ),
        ];

        let entries = rows
            .into_iter()
            .map(|(id, name, unit, description, application)| {
                (
                    id.to_string(),
                    EndpointInfo::new(name, unit, description, application),
                )
            })
            .collect();

        Self { entries }
    }

    /// Load a catalog from a JSON object keyed by endpoint id.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let catalog: Self = serde_json::from_str(&text)?;
        if catalog.is_empty() {
            return Err(ToxError::Catalog(format!(
                "{} defines no endpoints",
                path.display()
            )));
        }
        Ok(catalog)
    }

    /// Restrict the catalog to a comma-separated subset.
    ///
    /// `None` keeps every endpoint. Unknown ids are reported all at once.
    /// The result keeps catalog order, not request order.
    pub fn select(&self, subset: Option<&str>) -> Result<Self> {
        let Some(subset) = subset else {
            return Ok(self.clone());
        };

        let requested: Vec<&str> = subset
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .collect();

        let invalid: Vec<String> = requested
            .iter()
            .filter(|id| !self.entries.contains_key(**id))
            .map(|id| id.to_string())
            .collect();
        if !invalid.is_empty() {
            return Err(ToxError::UnknownEndpoints(invalid));
        }

        let entries: IndexMap<String, EndpointInfo> = self
            .entries
            .iter()
            .filter(|(id, _)| requested.contains(&id.as_str()))
            .map(|(id, info)| (id.clone(), info.clone()))
            .collect();
        if entries.is_empty() {
            return Err(ToxError::NoEndpoints);
        }

        Ok(Self { entries })
    }

    pub fn get(&self, endpoint: &str) -> Option<&EndpointInfo> {
        self.entries.get(endpoint)
    }

    /// Metadata for `endpoint`, or a placeholder when it is not catalogued.
    pub fn info_or_unknown(&self, endpoint: &str) -> EndpointInfo {
        self.get(endpoint)
            .cloned()
            .unwrap_or_else(|| EndpointInfo::unknown(endpoint))
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for EndpointCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
