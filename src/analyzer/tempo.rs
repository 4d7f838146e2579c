use lofty::file::TaggedFileExt;
use lofty::prelude::*;
use std::path::Path;

use super::TempoDetector;
use super::decode::DecodeError;

/// Reads the tempo an external tool already wrote into the file's tags
/// (ID3 `TBPM`, Vorbis `BPM`, MP4 `tmpo`).
#[derive(Debug, Default, Clone, Copy)]
pub struct TagTempoDetector;

impl TempoDetector for TagTempoDetector {
    fn detect_tempo(&self, path: &Path) -> Result<f64, DecodeError> {
        let tagged_file = lofty::read_from_path(path)
            .map_err(|e| DecodeError::UnsupportedFormat(format!("{}: {}", path.display(), e)))?;

        let tag = tagged_file
            .primary_tag()
            .or_else(|| tagged_file.first_tag())
            .ok_or_else(|| DecodeError::MissingTag(path.display().to_string()))?;

        let raw = tag
            .get_string(&ItemKey::Bpm)
            .or_else(|| tag.get_string(&ItemKey::IntegerBpm))
            .ok_or_else(|| DecodeError::MissingTag(path.display().to_string()))?;

        parse_bpm(raw).ok_or_else(|| DecodeError::InvalidTempo {
            path: path.display().to_string(),
            bpm: f64::NAN,
        })
    }

    fn name(&self) -> &'static str {
        "bpm-tag"
    }
}

/// Parse a tag value such as `"128"`, `"127.96"` or `"128 BPM"`.
fn parse_bpm(raw: &str) -> Option<f64> {
    let number = raw
        .trim()
        .split(|c: char| c.is_whitespace())
        .next()?
        .replace(',', ".");
    let bpm: f64 = number.parse().ok()?;
    (bpm.is_finite() && bpm > 0.0).then_some(bpm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bpm() {
        assert_eq!(parse_bpm("128"), Some(128.0));
        assert_eq!(parse_bpm(" 127.5 "), Some(127.5));
        assert_eq!(parse_bpm("96,5"), Some(96.5));
        assert_eq!(parse_bpm("140 BPM"), Some(140.0));
        assert_eq!(parse_bpm("0"), None);
        assert_eq!(parse_bpm("-3"), None);
        assert_eq!(parse_bpm("fast"), None);
        assert_eq!(parse_bpm(""), None);
    }

    #[test]
    fn test_unreadable_file_is_decode_error() {
        let err = TagTempoDetector
            .detect_tempo(Path::new("/nope/missing.mp3"))
            .unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedFormat(_)));
    }
}
