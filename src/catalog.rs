use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use indicatif::{ProgressBar, ProgressStyle};

use crate::analyzer::TempoDetector;
use crate::analyzer::decode::DecodeError;

/// Track path → integer BPM.
pub type Catalog = BTreeMap<String, u32>;

/// What one [`ensure_bpm`] pass changed.
#[derive(Debug, Default)]
pub struct CatalogUpdate {
    pub added: Vec<String>,
    pub failures: Vec<(String, DecodeError)>,
}

/// Detect and insert a BPM for every path in `paths` that the catalog does not
/// know yet. Known entries are never recomputed. A detection failure is
/// recorded against its path and the pass moves on to the next one.
pub fn ensure_bpm(
    catalog: &mut Catalog,
    paths: &[PathBuf],
    detector: &dyn TempoDetector,
) -> CatalogUpdate {
    let unseen: Vec<String> = paths
        .iter()
        .map(|p| p.to_string_lossy().to_string())
        .filter(|p| !catalog.contains_key(p))
        .collect();

    let mut update = CatalogUpdate::default();
    if unseen.is_empty() {
        log::debug!("Catalog already covers all {} tracks", paths.len());
        return update;
    }

    log::info!(
        "Detecting tempo for {} new tracks with {}",
        unseen.len(),
        detector.name()
    );

    let pb = ProgressBar::new(unseen.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-"),
    );

    for path in unseen {
        let detected = detector
            .detect_tempo(std::path::Path::new(&path))
            .and_then(|bpm| round_bpm(&path, bpm));
        match detected {
            Ok(bpm) => {
                log::debug!("{} -> {} BPM", path, bpm);
                catalog.insert(path.clone(), bpm);
                update.added.push(path);
            }
            Err(e) => {
                log::debug!("Tempo detection failed for {}: {}", path, e);
                update.failures.push((path, e));
            }
        }
        pb.inc(1);
    }

    pb.finish_with_message(format!(
        "Done: {} added, {} failed",
        update.added.len(),
        update.failures.len()
    ));
    update
}

fn round_bpm(path: &str, bpm: f64) -> Result<u32, DecodeError> {
    let rounded = bpm.round();
    if !rounded.is_finite() || rounded < 1.0 || rounded > u32::MAX as f64 {
        return Err(DecodeError::InvalidTempo {
            path: path.to_string(),
            bpm,
        });
    }
    Ok(rounded as u32)
}

/// Catalog entries for `scope` that are not in `excluded`.
pub fn candidates(catalog: &Catalog, scope: &[PathBuf], excluded: &HashSet<String>) -> Catalog {
    scope
        .iter()
        .map(|p| p.to_string_lossy().to_string())
        .filter(|p| !excluded.contains(p))
        .filter_map(|p| catalog.get(&p).map(|bpm| (p, *bpm)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::path::Path;

    struct FakeDetector {
        calls: RefCell<Vec<String>>,
    }

    impl FakeDetector {
        fn new() -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl TempoDetector for FakeDetector {
        fn detect_tempo(&self, path: &Path) -> Result<f64, DecodeError> {
            let p = path.to_string_lossy().to_string();
            self.calls.borrow_mut().push(p.clone());
            match p.as_str() {
                "/m/corrupt.mp3" => Err(DecodeError::UnsupportedFormat("bad header".into())),
                "/m/zero.mp3" => Ok(0.2),
                "/m/fast.mp3" => Ok(127.6),
                _ => Ok(99.4),
            }
        }

        fn name(&self) -> &'static str {
            "fake"
        }
    }

    fn paths(list: &[&str]) -> Vec<PathBuf> {
        list.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_only_unseen_tracks_are_detected() {
        let mut catalog = Catalog::new();
        catalog.insert("/m/known.mp3".into(), 120);
        let detector = FakeDetector::new();

        let update = ensure_bpm(
            &mut catalog,
            &paths(&["/m/known.mp3", "/m/fast.mp3", "/m/slow.mp3"]),
            &detector,
        );

        assert_eq!(*detector.calls.borrow(), vec!["/m/fast.mp3", "/m/slow.mp3"]);
        assert_eq!(update.added, vec!["/m/fast.mp3", "/m/slow.mp3"]);
        assert_eq!(catalog["/m/known.mp3"], 120);
        assert_eq!(catalog["/m/fast.mp3"], 128);
        assert_eq!(catalog["/m/slow.mp3"], 99);
    }

    #[test]
    fn test_failures_are_isolated_per_track() {
        let mut catalog = Catalog::new();
        let detector = FakeDetector::new();

        let update = ensure_bpm(
            &mut catalog,
            &paths(&["/m/corrupt.mp3", "/m/zero.mp3", "/m/fast.mp3"]),
            &detector,
        );

        assert_eq!(update.added, vec!["/m/fast.mp3"]);
        assert_eq!(update.failures.len(), 2);
        assert!(matches!(update.failures[0].1, DecodeError::UnsupportedFormat(_)));
        assert!(matches!(update.failures[1].1, DecodeError::InvalidTempo { .. }));
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_second_pass_is_a_no_op() {
        let mut catalog = Catalog::new();
        let detector = FakeDetector::new();
        let list = paths(&["/m/a.mp3", "/m/b.mp3"]);
        ensure_bpm(&mut catalog, &list, &detector);
        let update = ensure_bpm(&mut catalog, &list, &detector);
        assert!(update.added.is_empty());
        assert_eq!(detector.calls.borrow().len(), 2);
    }

    #[test]
    fn test_candidates_scope_and_exclusion() {
        let mut catalog = Catalog::new();
        catalog.insert("/m/a.mp3".into(), 100);
        catalog.insert("/m/b.mp3".into(), 103);
        catalog.insert("/elsewhere/c.mp3".into(), 106);
        let excluded: HashSet<String> = ["/m/b.mp3".to_string()].into_iter().collect();

        let pool = candidates(
            &catalog,
            &paths(&["/m/a.mp3", "/m/b.mp3", "/m/undetected.mp3"]),
            &excluded,
        );
        assert_eq!(pool.len(), 1);
        assert_eq!(pool["/m/a.mp3"], 100);
    }
}
