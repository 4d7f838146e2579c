use serde::{Deserialize, Serialize};

/// Non-silent boundaries of a decoded track, in seconds from the start.
///
/// A fully silent track has `first_sound_secs == duration_secs` and
/// `last_sound_secs == 0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SilenceProfile {
    pub first_sound_secs: f64,
    pub last_sound_secs: f64,
    pub duration_secs: f64,
}

impl SilenceProfile {
    /// Silence before the first audible bucket.
    pub fn leading_silence_secs(&self) -> f64 {
        self.first_sound_secs.clamp(0.0, self.duration_secs.max(0.0))
    }

    /// Silence after the last audible bucket, never negative.
    pub fn trailing_silence_secs(&self) -> f64 {
        (self.duration_secs - self.last_sound_secs).clamp(0.0, self.duration_secs.max(0.0))
    }

    pub fn is_silent(&self) -> bool {
        self.first_sound_secs >= self.duration_secs && self.last_sound_secs <= 0.0
    }
}

/// A track identified by its absolute path, with the attributes the planner
/// and the sequencer read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub path: String,
    pub bpm: Option<u32>,
    pub duration_secs: f64,
    pub leading_silence_secs: f64,
    pub trailing_silence_secs: f64,
}

impl Track {
    pub fn from_profile(
        path: impl Into<String>,
        bpm: Option<u32>,
        profile: &SilenceProfile,
    ) -> Self {
        Self {
            path: path.into(),
            bpm,
            duration_secs: profile.duration_secs.max(0.0),
            leading_silence_secs: profile.leading_silence_secs(),
            trailing_silence_secs: profile.trailing_silence_secs(),
        }
    }

    /// File name for log lines.
    pub fn display_name(&self) -> &str {
        display_name(&self.path)
    }
}

/// Last path component, or the whole string when there is none.
pub fn display_name(path: &str) -> &str {
    std::path::Path::new(path)
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or(path)
}
