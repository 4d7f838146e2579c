use std::collections::HashMap;
use std::path::Path;

use super::LoudnessSource;
use super::decode::{DecodeError, LoudnessEnvelope};
use crate::track::SilenceProfile;

/// Buckets at or below this level count as silence.
pub const DEFAULT_SILENCE_THRESHOLD_DBFS: f64 = -35.0;

/// Find the non-silent boundaries of an envelope.
///
/// The leading boundary is the start of the first bucket louder than
/// `threshold_dbfs`; the trailing boundary is the end of the last such bucket.
/// When nothing crosses the threshold the leading boundary sits at the end of
/// the track and the trailing boundary at zero.
///
/// The trailing boundary is the end of the last loud bucket, not its start:
/// a track that is loud to the very end has zero trailing silence, so its
/// transition falls back to the default crossfade.
pub fn profile_envelope(envelope: &LoudnessEnvelope, threshold_dbfs: f64) -> SilenceProfile {
    let duration_secs = envelope.duration_secs();
    let is_audible = |db: &f64| *db > threshold_dbfs;

    let first = envelope.dbfs.iter().position(is_audible);
    let last = envelope.dbfs.iter().rposition(is_audible);

    match (first, last) {
        (Some(first), Some(last)) => SilenceProfile {
            first_sound_secs: first as f64 * envelope.bucket_secs,
            last_sound_secs: ((last + 1) as f64 * envelope.bucket_secs).min(duration_secs),
            duration_secs,
        },
        _ => SilenceProfile {
            first_sound_secs: duration_secs,
            last_sound_secs: 0.0,
            duration_secs,
        },
    }
}

/// Per-path cache in front of a [`LoudnessSource`], so each track is decoded
/// and scanned once no matter how many transitions it takes part in.
pub struct ProfileCache<S> {
    source: S,
    threshold_dbfs: f64,
    entries: HashMap<String, SilenceProfile>,
}

impl<S: LoudnessSource> ProfileCache<S> {
    pub fn new(source: S, threshold_dbfs: f64) -> Self {
        Self {
            source,
            threshold_dbfs,
            entries: HashMap::new(),
        }
    }

    /// Cached profile for `path`, decoding on a miss. Failures are not cached.
    pub fn profile(&mut self, path: &Path) -> Result<SilenceProfile, DecodeError> {
        let key = path.to_string_lossy().to_string();
        if let Some(p) = self.entries.get(&key) {
            return Ok(*p);
        }

        let envelope = self.source.profile_loudness(path)?;
        let profile = profile_envelope(&envelope, self.threshold_dbfs);
        log::debug!(
            "Profiled {}: sound {:.3}s..{:.3}s of {:.3}s",
            path.display(),
            profile.first_sound_secs,
            profile.last_sound_secs,
            profile.duration_secs
        );
        self.entries.insert(key, profile);
        Ok(profile)
    }
}

#[cfg(test)]
impl<S> ProfileCache<S> {
    /// Drop a cached entry so the next lookup re-profiles the file.
    pub(crate) fn invalidate(&mut self, path: &Path) -> bool {
        self.entries.remove(path.to_string_lossy().as_ref()).is_some()
    }

    pub(crate) fn source(&self) -> &S {
        &self.source
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
