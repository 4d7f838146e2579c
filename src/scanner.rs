use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::analyzer::decode::DecodeError;
use crate::analyzer::{ContainerConverter, ConvertOutcome};
use crate::{CANONICAL_EXTENSION, CONVERTIBLE_EXTENSIONS};

/// Result of normalizing alternate containers under a folder.
#[derive(Debug, Default)]
pub struct ConvertReport {
    pub converted: u64,
    pub already_present: u64,
    pub failures: Vec<(PathBuf, DecodeError)>,
}

/// All files under `folder` (recursively) in the catalog's canonical format,
/// sorted by path.
pub fn enumerate_audio_files(folder: &Path) -> Vec<PathBuf> {
    collect_with_extensions(folder, &[CANONICAL_EXTENSION])
}

/// Files under `folder` that need conversion before they can be catalogued.
pub fn find_convertible(folder: &Path) -> Vec<PathBuf> {
    collect_with_extensions(folder, CONVERTIBLE_EXTENSIONS)
}

/// Convert every alternate-container file under `folder`. One failing file
/// never stops the others.
pub fn convert_alternate_containers(
    folder: &Path,
    converter: &dyn ContainerConverter,
) -> ConvertReport {
    let mut report = ConvertReport::default();

    for source in find_convertible(folder) {
        match converter.convert(&source) {
            Ok(ConvertOutcome::Converted(_)) => report.converted += 1,
            Ok(ConvertOutcome::AlreadyPresent(_)) => report.already_present += 1,
            Err(e) => {
                log::debug!("Error converting {}: {}", source.display(), e);
                report.failures.push((source, e));
            }
        }
    }

    if report.converted > 0 || !report.failures.is_empty() {
        log::info!(
            "Conversion: {} converted, {} already present, {} failed",
            report.converted,
            report.already_present,
            report.failures.len()
        );
    }
    report
}

fn collect_with_extensions(folder: &Path, extensions: &[&str]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder).follow_links(true) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                log::warn!("Skipping unreadable entry under {}: {}", folder.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let ext = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        if extensions.contains(&ext.as_str()) {
            files.push(entry.into_path());
        }
    }

    files.sort();
    files
}
