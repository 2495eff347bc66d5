//! Input collection: SMILES from arguments and line-delimited files.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::Result;

/// Gather SMILES in submission order: direct arguments first, then each
/// file's non-blank lines (trimmed). Files that do not exist are skipped
/// with a warning. No deduplication is applied, so a molecule's index is
/// always its position in the batch.
pub fn collect_smiles(direct: &[String], files: &[PathBuf]) -> Result<Vec<String>> {
    let mut smiles: Vec<String> = direct.to_vec();

    for path in files {
        if !path.is_file() {
            warn!(path = %path.display(), "SMILES file not found, skipping");
            continue;
        }
        let bytes = fs::read(path)?;
        let text = String::from_utf8_lossy(&bytes);
        let before = smiles.len();
        smiles.extend(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string),
        );
        debug!(path = %path.display(), count = smiles.len() - before, "read SMILES file");
    }

    Ok(smiles)
}

/// Serialize the batch as the tool's input artifact: one structure per
/// line, UTF-8, surrounding whitespace stripped.
pub fn write_smiles_file(smiles: &[String], path: &Path) -> Result<()> {
    let mut file = fs::File::create(path)?;
    for s in smiles {
        writeln!(file, "{}", s.trim())?;
    }
    file.flush()?;
    Ok(())
}
