// crates/kiwiglider-core/src/binaries.rs

use std::path::{Path, PathBuf};

use glob::{glob_with, MatchOptions, Pattern};
use tracing::{debug, info};

use crate::error::Result;

/// Lists files in `directory` matching `pattern` (e.g. `*.[st]bd`), ignoring
/// case, in lexical order.
pub fn discover_binaries(directory: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let escaped = Pattern::escape(&directory.to_string_lossy());
    let full_pattern = format!("{escaped}/{pattern}");
    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::default()
    };

    let mut binaries = Vec::new();
    for entry in glob_with(&full_pattern, options)? {
        let path = entry?;
        if path.is_file() {
            debug!(file = %path.display(), "found glider binary");
            binaries.push(path);
        }
    }
    binaries.sort();

    info!(
        directory = %directory.display(),
        pattern,
        count = binaries.len(),
        "discovered glider binaries"
    );
    Ok(binaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn matches_extensions_regardless_of_case() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["01.SBD", "01.tbd", "02.sbd", "01.dbd", "notes.txt"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }

        let found = discover_binaries(dir.path(), "*.[st]bd").unwrap();
        let names: Vec<String> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["01.SBD", "01.tbd", "02.sbd"]);
    }

    #[test]
    fn empty_directory_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_binaries(dir.path(), "*.[de]bd").unwrap().is_empty());
    }
}
