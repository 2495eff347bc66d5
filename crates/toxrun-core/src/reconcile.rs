//! Output reconciliation.
//!
//! Turns one artifact per endpoint into a molecule × endpoint grid. Each
//! endpoint resolves to exactly one of four cases:
//!
//! - table rows, attached to the molecule named by each row's `Index`
//! - an artifact that cannot be split per molecule, shared by all of them
//! - a missing artifact, marked `{"missing": true}` on every molecule
//! - a read/parse failure, recorded as the error on every molecule
//!
//! The molecule set is fixed by the input batch; rows pointing anywhere
//! else are dropped.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::artifact::{artifact_exists, parse_artifact, row_index, ParsedArtifact};
use crate::catalog::EndpointCatalog;
use crate::domain::{number_batch, EndpointOutcome, JobOutcome, Molecule};
use crate::error::Result;

/// How one endpoint's artifact was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Table rows attached per molecule.
    Rows { attached: usize, dropped: usize },
    /// Artifact content shared by every molecule.
    Shared,
    /// No artifact at the expected path.
    Missing,
    /// The artifact could not be read or parsed.
    ParseFailed(String),
}

/// Accumulates endpoint outcomes onto a fixed molecule batch.
pub struct Reconciler<'a> {
    catalog: &'a EndpointCatalog,
    molecules: BTreeMap<usize, Molecule>,
}

impl<'a> Reconciler<'a> {
    pub fn new(catalog: &'a EndpointCatalog, smiles: &[String]) -> Self {
        let molecules = number_batch(smiles)
            .into_iter()
            .map(|m| (m.index, m))
            .collect();
        Self { catalog, molecules }
    }

    /// Apply the artifact expected at `artifact_path` for `endpoint`.
    pub fn apply(&mut self, endpoint: &str, artifact_path: &Path) -> Resolution {
        if !artifact_exists(artifact_path) {
            let info = self.catalog.info_or_unknown(endpoint);
            self.attach_all(endpoint, &EndpointOutcome::missing(&info));
            return Resolution::Missing;
        }
        self.resolve(endpoint, parse_artifact(artifact_path))
    }

    /// Attach the result of reading an existing artifact.
    fn resolve(&mut self, endpoint: &str, parsed: Result<ParsedArtifact>) -> Resolution {
        let info = self.catalog.info_or_unknown(endpoint);
        let parsed = match parsed {
            Ok(parsed) => parsed,
            Err(e) => {
                let message = e.to_string();
                self.attach_all(endpoint, &EndpointOutcome::parse_failure(&info, message.clone()));
                return Resolution::ParseFailed(message);
            }
        };

        let Some(rows) = parsed.rows() else {
            let outcome = EndpointOutcome::unclassified(&info, parsed);
            self.attach_all(endpoint, &outcome);
            return Resolution::Shared;
        };

        let mut attached = 0;
        let mut dropped = 0;
        for row in rows {
            match self.molecules.get_mut(&row_index(row)) {
                Some(molecule) => {
                    molecule.attach(endpoint, EndpointOutcome::from_row(&info, row.clone()));
                    attached += 1;
                }
                None => dropped += 1,
            }
        }
        Resolution::Rows { attached, dropped }
    }

    fn attach_all(&mut self, endpoint: &str, outcome: &EndpointOutcome) {
        for molecule in self.molecules.values_mut() {
            molecule.attach(endpoint, outcome.clone());
        }
    }

    /// Molecules in ascending index order.
    pub fn finish(self) -> Vec<Molecule> {
        self.molecules.into_values().collect()
    }
}

/// Reconcile every job outcome against the input batch.
pub fn reconcile(
    smiles: &[String],
    outcomes: &BTreeMap<String, JobOutcome>,
    catalog: &EndpointCatalog,
) -> Vec<Molecule> {
    let mut reconciler = Reconciler::new(catalog, smiles);

    for (endpoint, outcome) in outcomes {
        match reconciler.apply(endpoint, &outcome.artifact_path) {
            Resolution::Rows { attached, dropped } => {
                debug!(endpoint = %endpoint, attached, dropped, "attached artifact rows");
            }
            Resolution::Shared => {
                debug!(endpoint = %endpoint, "artifact has no rows, shared across molecules");
            }
            Resolution::Missing => {
                warn!(
                    endpoint = %endpoint,
                    exit_code = outcome.exit_code,
                    path = %outcome.artifact_path.display(),
                    "artifact missing"
                );
            }
            Resolution::ParseFailed(error) => {
                warn!(endpoint = %endpoint, error = %error, "artifact could not be parsed");
            }
        }
    }

    reconciler.finish()
}

/// Find the artifact for `endpoint` in an output directory left by an
/// earlier run: a `.csv` file whose stem ends in `_<endpoint>`, else
/// `<endpoint>.csv`. Entries are scanned in name order.
pub fn find_endpoint_artifact(output_dir: &Path, endpoint: &str) -> Option<PathBuf> {
    let suffix = format!("_{endpoint}");
    let mut names: Vec<PathBuf> = fs::read_dir(output_dir)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    names.sort();

    let tagged = names.into_iter().find(|path| {
        let is_csv = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        let stem_matches = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .is_some_and(|stem| stem.ends_with(&suffix));
        is_csv && stem_matches && path.is_file()
    });

    tagged.or_else(|| {
        let plain = output_dir.join(format!("{endpoint}.csv"));
        plain.is_file().then_some(plain)
    })
}

/// Reconcile a batch against artifacts already on disk, one lookup per
/// catalog endpoint. Endpoints with no artifact are marked missing.
pub fn reconcile_dir(
    smiles: &[String],
    output_dir: &Path,
    catalog: &EndpointCatalog,
) -> Vec<Molecule> {
    let mut reconciler = Reconciler::new(catalog, smiles);
    for endpoint in catalog.ids() {
        let path = find_endpoint_artifact(output_dir, &endpoint)
            .unwrap_or_else(|| output_dir.join(format!("{endpoint}.csv")));
        let resolution = reconciler.apply(&endpoint, &path);
        debug!(endpoint = %endpoint, path = %path.display(), ?resolution, "collected artifact");
    }
    reconciler.finish()
}
