pub mod convert;
pub mod decode;
pub mod silence;
pub mod tempo;

use decode::{DecodeError, LoudnessEnvelope};
use std::path::{Path, PathBuf};

/// Tempo estimation for a single audio file.
pub trait TempoDetector {
    /// Estimated tempo in beats per minute.
    fn detect_tempo(&self, path: &Path) -> Result<f64, DecodeError>;

    /// Name of this detector (for logging).
    fn name(&self) -> &'static str;
}

/// Loudness-over-time extraction for a single audio file.
pub trait LoudnessSource {
    fn profile_loudness(&self, path: &Path) -> Result<LoudnessEnvelope, DecodeError>;
}

/// Normalizes an alternate container into the catalog's canonical format.
pub trait ContainerConverter {
    fn convert(&self, source: &Path) -> Result<ConvertOutcome, DecodeError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvertOutcome {
    Converted(PathBuf),
    AlreadyPresent(PathBuf),
}

/// Decodes with symphonia and buckets loudness at a fixed width.
#[derive(Debug, Clone, Copy)]
pub struct SymphoniaLoudness {
    pub bucket_ms: u32,
}

impl Default for SymphoniaLoudness {
    fn default() -> Self {
        Self {
            bucket_ms: decode::DEFAULT_BUCKET_MS,
        }
    }
}

impl LoudnessSource for SymphoniaLoudness {
    fn profile_loudness(&self, path: &Path) -> Result<LoudnessEnvelope, DecodeError> {
        decode::decode_loudness(path, self.bucket_ms)
    }
}
