//! Telemetry channel for conditions the engine absorbs instead of returning.
//!
//! Everything here is passed explicitly into the planner and the session
//! orchestrator, so concurrent sessions and tests each see only their own
//! events.

use std::path::Path;

use crate::analyzer::decode::DecodeError;

pub trait Observer {
    /// Tempo detection failed for one track; the catalog pass continued.
    fn tempo_failed(&self, _path: &str, _error: &DecodeError) {}

    /// An alternate container could not be converted; the folder scan continued.
    fn conversion_failed(&self, _path: &Path, _error: &DecodeError) {}

    /// A transition fell back to the neutral plan.
    fn transition_degraded(&self, _current: &Path, _next: &Path, _error: &DecodeError) {}

    /// A session playlist was generated and stored.
    fn session_built(&self, _folder: &Path, _tracks: usize) {}
}

/// Forwards every event to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn tempo_failed(&self, path: &str, error: &DecodeError) {
        log::warn!("Tempo detection failed for {}: {}", path, error);
    }

    fn conversion_failed(&self, path: &Path, error: &DecodeError) {
        log::warn!("Conversion failed for {}: {}", path.display(), error);
    }

    fn transition_degraded(&self, current: &Path, next: &Path, error: &DecodeError) {
        log::warn!(
            "Transition {} -> {} uses neutral plan: {}",
            current.display(),
            next.display(),
            error
        );
    }

    fn session_built(&self, folder: &Path, tracks: usize) {
        log::info!("Session for {} holds {} tracks", folder.display(), tracks);
    }
}
