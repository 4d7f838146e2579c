use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::analyzer::{ContainerConverter, TempoDetector};
use crate::catalog::{self, CatalogUpdate};
use crate::config::SessionConfig;
use crate::observer::Observer;
use crate::scanner;
use crate::sequence::{self, MergedSequence, Pattern, RandomSource};
use crate::store::{Store, StoreError};

/// Walks generated per session, merged in this order.
pub const SESSION_PATTERNS: [Pattern; 5] = [
    Pattern::Ascending,
    Pattern::Descending,
    Pattern::Ascending,
    Pattern::Descending,
    Pattern::Ascending,
];

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("No eligible tracks in {} after excluding already played ones", folder.display())]
    EmptyCandidatePool { folder: PathBuf },
    #[error("Nothing to resume: no pending playlist")]
    NothingToResume,
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// Where an interrupted session picks up again.
#[derive(Debug, Clone, PartialEq)]
pub struct ResumePoint {
    pub tracks: Vec<String>,
    pub position_secs: f64,
}

/// Builds playlists for a folder: refreshes the BPM catalog, drops played
/// tracks, and merges several random banded walks into one ordering.
///
/// Holding `&mut self` for the whole build keeps sessions that share an
/// orchestrator strictly one after another.
pub struct SessionOrchestrator<'a> {
    store: &'a Store,
    detector: &'a dyn TempoDetector,
    converter: &'a dyn ContainerConverter,
    observer: &'a dyn Observer,
    rng: Box<dyn RandomSource + 'a>,
    config: SessionConfig,
}

impl<'a> SessionOrchestrator<'a> {
    pub fn new(
        store: &'a Store,
        detector: &'a dyn TempoDetector,
        converter: &'a dyn ContainerConverter,
        observer: &'a dyn Observer,
        rng: Box<dyn RandomSource + 'a>,
    ) -> Self {
        Self {
            store,
            detector,
            converter,
            observer,
            rng,
            config: SessionConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Build, store and return a fresh playable order for `folder`.
    pub fn build_session(&mut self, folder: &Path) -> Result<Vec<String>> {
        let folder = resolve_folder(folder)?;
        log::info!("Building session for {}", folder.display());

        let pending: Vec<String> = if self.config.exclude_pending {
            self.store.load_playlist()?.paths()
        } else {
            Vec::new()
        };
        self.store.clear_playlist()?;

        let (files, _) = self.refresh(&folder)?;

        let mut excluded: HashSet<String> = self.store.load_history()?;
        excluded.extend(pending);
        let catalog = self.store.load_catalog()?;
        let pool = catalog::candidates(&catalog, &files, &excluded);
        log::info!(
            "{} candidates ({} tracks in folder, {} excluded paths)",
            pool.len(),
            files.len(),
            excluded.len()
        );
        if pool.is_empty() {
            return Err(SessionError::EmptyCandidatePool { folder });
        }

        let mut merged = MergedSequence::new();
        for pattern in SESSION_PATTERNS {
            let walk = sequence::generate(&pool, pattern, self.rng.as_mut());
            merged.merge(&walk);
        }

        self.store.merge_save_playlist(&merged)?;
        self.observer.session_built(&folder, merged.len());
        Ok(merged.paths())
    }

    /// Convert alternate containers and detect BPMs for new tracks in
    /// `folder`, persisting the catalog. Does not touch the playlist.
    pub fn refresh_catalog(&mut self, folder: &Path) -> Result<CatalogUpdate> {
        let folder = resolve_folder(folder)?;
        let (_, update) = self.refresh(&folder)?;
        Ok(update)
    }

    /// The stored playlist from the now-playing track onward, or from the
    /// start when no pointer names a playlist entry.
    pub fn resume(&self) -> Result<ResumePoint> {
        let paths = self.store.load_playlist()?.paths();
        if paths.is_empty() {
            return Err(SessionError::NothingToResume);
        }

        if let Some((current, position_secs)) = self.store.load_now_playing()? {
            if let Some(i) = paths.iter().position(|p| *p == current) {
                return Ok(ResumePoint {
                    tracks: paths[i..].to_vec(),
                    position_secs,
                });
            }
            log::debug!("Now-playing track {} is not in the playlist", current);
        }

        Ok(ResumePoint {
            tracks: paths,
            position_secs: 0.0,
        })
    }

    fn refresh(&mut self, folder: &Path) -> Result<(Vec<PathBuf>, CatalogUpdate)> {
        let report = scanner::convert_alternate_containers(folder, self.converter);
        for (path, e) in &report.failures {
            self.observer.conversion_failed(path, e);
        }

        let files = scanner::enumerate_audio_files(folder);
        let mut catalog = self.store.load_catalog()?;
        let update = catalog::ensure_bpm(&mut catalog, &files, self.detector);
        for (path, e) in &update.failures {
            self.observer.tempo_failed(path, e);
        }
        self.store.merge_save_catalog(&catalog)?;

        log::info!(
            "Catalog: {} tracks in folder, {} new, {} failed",
            files.len(),
            update.added.len(),
            update.failures.len()
        );
        Ok((files, update))
    }
}

/// Absolute path of an existing directory.
fn resolve_folder(folder: &Path) -> Result<PathBuf> {
    if !folder.exists() {
        return Err(SessionError::Configuration(format!(
            "folder does not exist: {}",
            folder.display()
        )));
    }
    if !folder.is_dir() {
        return Err(SessionError::Configuration(format!(
            "not a directory: {}",
            folder.display()
        )));
    }
    folder.canonicalize().map_err(|e| {
        SessionError::Configuration(format!("cannot resolve {}: {}", folder.display(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::ConvertOutcome;
    use crate::analyzer::decode::DecodeError;
    use crate::observer::tests::RecordingObserver;
    use crate::sequence::EntropyRandom;
    use crate::sequence::tests::ScriptedRandom;
    use std::cell::RefCell;
    use std::fs;

    /// Tempo comes from the file name: `name_<bpm>.mp3`.
    struct NameTempo;

    impl TempoDetector for NameTempo {
        fn detect_tempo(&self, path: &Path) -> std::result::Result<f64, DecodeError> {
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
            stem.rsplit('_')
                .next()
                .and_then(|b| b.parse().ok())
                .ok_or_else(|| DecodeError::UnsupportedFormat(stem.to_string()))
        }

        fn name(&self) -> &'static str {
            "name"
        }
    }

    /// Pretends to convert by writing the sibling file.
    #[derive(Default)]
    struct CopyConverter {
        seen: RefCell<Vec<PathBuf>>,
    }

    impl ContainerConverter for CopyConverter {
        fn convert(&self, source: &Path) -> std::result::Result<ConvertOutcome, DecodeError> {
            self.seen.borrow_mut().push(source.to_path_buf());
            let target = source.with_extension("mp3");
            fs::write(&target, b"mp3").map_err(DecodeError::Io)?;
            Ok(ConvertOutcome::Converted(target))
        }
    }

    struct Fixture {
        music: tempfile::TempDir,
        _state: tempfile::TempDir,
        store: Store,
    }

    impl Fixture {
        fn new(files: &[&str]) -> Self {
            let music = tempfile::tempdir().unwrap();
            let state = tempfile::tempdir().unwrap();
            for f in files {
                let p = music.path().join(f);
                fs::create_dir_all(p.parent().unwrap()).unwrap();
                fs::write(&p, b"x").unwrap();
            }
            let store = Store::open(state.path()).unwrap();
            Self {
                music,
                _state: state,
                store,
            }
        }

        fn path(&self, name: &str) -> String {
            self.music
                .path()
                .canonicalize()
                .unwrap()
                .join(name)
                .to_string_lossy()
                .to_string()
        }
    }

    fn collaborators() -> (NameTempo, CopyConverter, RecordingObserver) {
        (NameTempo, CopyConverter::default(), RecordingObserver::default())
    }

    fn bpm_of(path: &str) -> u32 {
        let stem = Path::new(path).file_stem().unwrap().to_str().unwrap();
        stem.rsplit('_').next().unwrap().parse().unwrap()
    }

    #[test]
    fn test_missing_or_non_directory_folder() {
        let fx = Fixture::new(&["a_100.mp3"]);
        let (detector, converter, observer) = collaborators();
        let mut session = SessionOrchestrator::new(
            &fx.store,
            &detector,
            &converter,
            &observer,
            Box::new(EntropyRandom::with_seed(1)),
        );

        let err = session.build_session(&fx.music.path().join("nope")).unwrap_err();
        assert!(matches!(err, SessionError::Configuration(_)));
        let err = session.build_session(&fx.music.path().join("a_100.mp3")).unwrap_err();
        assert!(matches!(err, SessionError::Configuration(_)));
    }

    #[test]
    fn test_everything_played_is_empty_pool() {
        let fx = Fixture::new(&["a_100.mp3", "b_104.mp3"]);
        fx.store.append_history(&fx.path("a_100.mp3")).unwrap();
        fx.store.append_history(&fx.path("b_104.mp3")).unwrap();
        let (detector, converter, observer) = collaborators();
        let mut session = SessionOrchestrator::new(
            &fx.store,
            &detector,
            &converter,
            &observer,
            Box::new(EntropyRandom::with_seed(1)),
        );

        let err = session.build_session(fx.music.path()).unwrap_err();
        assert!(matches!(err, SessionError::EmptyCandidatePool { .. }));
        let canonical = fx.music.path().canonicalize().unwrap();
        assert!(err.to_string().contains(&canonical.display().to_string()));
        assert!(observer.events.borrow().iter().all(|e| !e.starts_with("built:")));
        // Catalog was still refreshed before the pool came up empty
        assert_eq!(fx.store.load_catalog().unwrap().len(), 2);
    }

    #[test]
    fn test_build_session_end_to_end() {
        let fx = Fixture::new(&[
            "a_90.mp3",
            "b_94.mp3",
            "c_98.mp3",
            "d_102.mp3",
            "sub/e_106.mp3",
            "sub/f_110.mp3",
            "g_114.mp3",
            "h_118.mp3",
            "corrupt.mp3",
            "import_122.m4a",
        ]);
        fx.store.append_history(&fx.path("d_102.mp3")).unwrap();
        let (detector, converter, observer) = collaborators();
        let mut session = SessionOrchestrator::new(
            &fx.store,
            &detector,
            &converter,
            &observer,
            Box::new(EntropyRandom::with_seed(99)),
        );

        let order = session.build_session(fx.music.path()).unwrap();

        assert!(!order.is_empty());
        assert!(!order.contains(&fx.path("d_102.mp3")));
        let unique: HashSet<&String> = order.iter().collect();
        assert_eq!(unique.len(), order.len());

        // Converted file was catalogued; the corrupt one was isolated
        assert_eq!(converter.seen.borrow().len(), 1);
        let catalog = fx.store.load_catalog().unwrap();
        assert_eq!(catalog.len(), 9);
        assert_eq!(catalog[&fx.path("import_122.mp3")], 122);
        assert!(!catalog.contains_key(&fx.path("corrupt.mp3")));

        let events = observer.events.borrow();
        assert!(events.iter().any(|e| e.starts_with("tempo:") && e.ends_with("corrupt.mp3")));
        assert_eq!(events.last().unwrap(), &format!("built:{}", order.len()));

        // Stored playlist matches the returned order
        assert_eq!(fx.store.load_playlist().unwrap().paths(), order);
    }

    #[test]
    fn test_five_walks_merge_in_call_order() {
        let fx = Fixture::new(&["a_100.mp3", "b_104.mp3", "c_108.mp3"]);
        let (detector, converter, observer) = collaborators();
        // Walk 1 seeds at c and stops; walk 2 seeds at a, steps to b, and is
        // reversed; the remaining walks add nothing new.
        let mut session = SessionOrchestrator::new(
            &fx.store,
            &detector,
            &converter,
            &observer,
            Box::new(ScriptedRandom::new(&[2, 0, 0])),
        );

        let order = session.build_session(fx.music.path()).unwrap();
        assert_eq!(
            order,
            vec![fx.path("c_108.mp3"), fx.path("b_104.mp3"), fx.path("a_100.mp3")]
        );
    }

    #[test]
    fn test_rebuild_replaces_previous_playlist() {
        let fx = Fixture::new(&["a_100.mp3", "b_104.mp3", "c_108.mp3"]);
        let (detector, converter, observer) = collaborators();
        let mut session = SessionOrchestrator::new(
            &fx.store,
            &detector,
            &converter,
            &observer,
            Box::new(ScriptedRandom::new(&[2, 0, 0])),
        );
        session.build_session(fx.music.path()).unwrap();

        // Second build: every walk picks index 0 -> a, b
        let order = session.build_session(fx.music.path()).unwrap();
        assert_eq!(order, vec![fx.path("a_100.mp3"), fx.path("b_104.mp3")]);
        assert_eq!(fx.store.load_playlist().unwrap().paths(), order);
    }

    #[test]
    fn test_exclude_pending_keeps_previous_playlist_out() {
        let fx = Fixture::new(&["a_100.mp3", "b_104.mp3", "c_108.mp3"]);
        let pending: MergedSequence = vec![(fx.path("a_100.mp3"), 100)].into_iter().collect();
        fx.store.merge_save_playlist(&pending).unwrap();
        let (detector, converter, observer) = collaborators();
        let mut session = SessionOrchestrator::new(
            &fx.store,
            &detector,
            &converter,
            &observer,
            Box::new(EntropyRandom::with_seed(5)),
        )
        .with_config(SessionConfig {
            exclude_pending: true,
        });

        let order = session.build_session(fx.music.path()).unwrap();
        assert!(!order.contains(&fx.path("a_100.mp3")));
    }

    #[test]
    fn test_generated_walks_respect_banding() {
        let names: Vec<String> = (0..40).map(|i| format!("t{:02}_{}.mp3", i, 80 + i * 2)).collect();
        let refs: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
        let fx = Fixture::new(&refs);
        let (detector, converter, observer) = collaborators();
        let mut session = SessionOrchestrator::new(
            &fx.store,
            &detector,
            &converter,
            &observer,
            Box::new(EntropyRandom::with_seed(2024)),
        );

        let order = session.build_session(fx.music.path()).unwrap();
        // The first walk is ascending and lands first in the merged order
        let first_step = bpm_of(&order[1]) as f64 - bpm_of(&order[0]) as f64;
        assert!(first_step > 2.5 && first_step < 7.0);
    }

    #[test]
    fn test_resume_from_now_playing() {
        let fx = Fixture::new(&[]);
        let (detector, converter, observer) = collaborators();
        let session = SessionOrchestrator::new(
            &fx.store,
            &detector,
            &converter,
            &observer,
            Box::new(EntropyRandom::with_seed(1)),
        );
        assert!(matches!(session.resume(), Err(SessionError::NothingToResume)));

        let playlist: MergedSequence = vec![
            ("/m/a.mp3".to_string(), 100),
            ("/m/b.mp3".to_string(), 104),
            ("/m/c.mp3".to_string(), 108),
        ]
        .into_iter()
        .collect();
        fx.store.merge_save_playlist(&playlist).unwrap();

        let point = session.resume().unwrap();
        assert_eq!(point.tracks.len(), 3);
        assert_eq!(point.position_secs, 0.0);

        fx.store.save_now_playing("/m/b.mp3", 42.5).unwrap();
        let point = session.resume().unwrap();
        assert_eq!(point.tracks, vec!["/m/b.mp3", "/m/c.mp3"]);
        assert_eq!(point.position_secs, 42.5);
    }
}
