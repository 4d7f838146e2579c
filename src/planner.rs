use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::analyzer::LoudnessSource;
use crate::analyzer::decode::DecodeError;
use crate::analyzer::silence::ProfileCache;
use crate::config::TransitionConfig;
use crate::observer::Observer;
use crate::track::Track;

/// How to hand over from one track to the next.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitionPlan {
    pub crossfade_secs: f64,
    /// Position in the current track at which the next one starts.
    pub next_start_offset_secs: f64,
}

impl TransitionPlan {
    /// Plan used when either side could not be analyzed.
    pub fn neutral() -> Self {
        Self {
            crossfade_secs: 0.0,
            next_start_offset_secs: 0.0,
        }
    }
}

/// Derive a crossfade from the silence trailing `current` plus the silence
/// leading `next`.
///
/// The raw sum is clamped to `[min, max]` and to the current track's length.
/// A zero-length current track starts the next one immediately; when neither
/// side has measurable silence the configured default is used instead.
pub fn plan_transition(config: &TransitionConfig, current: &Track, next: &Track) -> TransitionPlan {
    let duration = finite_or_zero(current.duration_secs).max(0.0);
    let raw = finite_or_zero(current.trailing_silence_secs).max(0.0)
        + finite_or_zero(next.leading_silence_secs).max(0.0);

    if duration <= 0.0 {
        return TransitionPlan::neutral();
    }

    let crossfade = if raw <= 0.0 {
        config
            .default_crossfade_secs
            .max(config.min_crossfade_secs)
            .min(duration)
    } else {
        raw.max(config.min_crossfade_secs)
            .min(config.max_crossfade_secs)
            .min(duration)
    };

    let offset = (duration - crossfade).max(0.0);
    log::debug!(
        "{} ({:.2}s) -> {}: raw {:.2}s, crossfade {:.2}s, start next at {:.2}s",
        current.display_name(),
        duration,
        next.display_name(),
        raw,
        crossfade,
        offset
    );

    TransitionPlan {
        crossfade_secs: crossfade,
        next_start_offset_secs: offset,
    }
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() { v } else { 0.0 }
}

/// Plans transitions between files, profiling each file once and never
/// failing: an unreadable file yields [`TransitionPlan::neutral`] and an
/// observer event.
pub struct TransitionPlanner<S> {
    cache: ProfileCache<S>,
    config: TransitionConfig,
}

impl<S: LoudnessSource> TransitionPlanner<S> {
    pub fn new(source: S, threshold_dbfs: f64, config: TransitionConfig) -> Self {
        Self {
            cache: ProfileCache::new(source, threshold_dbfs),
            config,
        }
    }

    pub fn plan(&mut self, current: &Path, next: &Path, observer: &dyn Observer) -> TransitionPlan {
        match self.resolve_pair(current, next) {
            Ok((c, n)) => plan_transition(&self.config, &c, &n),
            Err(e) => {
                observer.transition_degraded(current, next, &e);
                TransitionPlan::neutral()
            }
        }
    }

    /// One plan per consecutive pair of `paths`.
    pub fn plan_sequence<P: AsRef<Path>>(
        &mut self,
        paths: &[P],
        observer: &dyn Observer,
    ) -> Vec<TransitionPlan> {
        paths
            .windows(2)
            .map(|pair| self.plan(pair[0].as_ref(), pair[1].as_ref(), observer))
            .collect()
    }

    /// Profiled track record for `path`, cached.
    pub fn track(&mut self, path: &Path) -> Result<Track, DecodeError> {
        let profile = self.cache.profile(path)?;
        Ok(Track::from_profile(path.to_string_lossy(), None, &profile))
    }

    fn resolve_pair(&mut self, current: &Path, next: &Path) -> Result<(Track, Track), DecodeError> {
        let c = self.track(current)?;
        let n = self.track(next)?;
        Ok((c, n))
    }
}
