use std::path::{Path, PathBuf};
use std::process::Command;

use super::decode::DecodeError;
use super::{ContainerConverter, ConvertOutcome};
use crate::CANONICAL_EXTENSION;

/// Converts alternate containers (e.g. `.m4a`) into an MP3 written next to
/// the source, by shelling out to ffmpeg.
#[derive(Debug, Clone)]
pub struct FfmpegConverter {
    pub program: PathBuf,
}

impl Default for FfmpegConverter {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
        }
    }
}

/// Where the canonical copy of `source` lives.
pub fn canonical_target(source: &Path) -> PathBuf {
    source.with_extension(CANONICAL_EXTENSION)
}

impl ContainerConverter for FfmpegConverter {
    fn convert(&self, source: &Path) -> Result<ConvertOutcome, DecodeError> {
        let target = canonical_target(source);
        if target.exists() {
            return Ok(ConvertOutcome::AlreadyPresent(target));
        }

        if Command::new(&self.program).arg("-version").output().is_err() {
            return Err(DecodeError::FfmpegNotFound);
        }

        let output = Command::new(&self.program)
            .args(["-nostdin", "-i"])
            .arg(source)
            .args(["-vn", "-codec:a", "libmp3lame", "-q:a", "2", "-n"])
            .arg(&target)
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // Don't leave a truncated file behind for the next scan to pick up
            std::fs::remove_file(&target).ok();
            return Err(DecodeError::Ffmpeg(stderr.to_string()));
        }

        log::info!("Converted {} -> {}", source.display(), target.display());
        Ok(ConvertOutcome::Converted(target))
    }
}
