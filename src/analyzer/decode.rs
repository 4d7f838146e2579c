use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

/// Loudness buckets are one millisecond wide unless a caller asks otherwise.
pub const DEFAULT_BUCKET_MS: u32 = 1;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("No audio track found")]
    NoAudioTrack,
    #[error("symphonia decode error: {0}")]
    Symphonia(String),
    #[error("ffmpeg not found (required for container conversion)")]
    FfmpegNotFound,
    #[error("ffmpeg conversion error: {0}")]
    Ffmpeg(String),
    #[error("No BPM tag in {0}")]
    MissingTag(String),
    #[error("Invalid tempo {bpm} for {path}")]
    InvalidTempo { path: String, bpm: f64 },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Loudness over time: one dBFS value per fixed-width bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct LoudnessEnvelope {
    pub bucket_secs: f64,
    pub dbfs: Vec<f64>,
}

impl LoudnessEnvelope {
    pub fn duration_secs(&self) -> f64 {
        self.dbfs.len() as f64 * self.bucket_secs
    }
}

/// Decode `path` and reduce it to a dBFS envelope with `bucket_ms` wide buckets.
/// All channels of a bucket contribute to one RMS value.
pub fn decode_loudness(path: &Path, bucket_ms: u32) -> Result<LoudnessEnvelope, DecodeError> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let mut probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| DecodeError::UnsupportedFormat(e.to_string()))?;

    let track = probed
        .format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoAudioTrack)?
        .clone();
    let track_id = track.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::Symphonia(e.to_string()))?;

    let bucket_ms = bucket_ms.max(1);
    let mut meter: Option<BucketMeter> = None;
    let mut bucket_secs = bucket_ms as f64 / 1000.0;

    loop {
        let packet = match probed.format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(DecodeError::Symphonia(e.to_string())),
        };
        if packet.track_id() != track_id {
            continue;
        }
        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(e)) => {
                log::debug!("Skipping corrupt packet in {}: {}", path.display(), e);
                continue;
            }
            Err(e) => return Err(DecodeError::Symphonia(e.to_string())),
        };

        let spec = *decoded.spec();
        let meter = meter.get_or_insert_with(|| {
            // Whole frames per bucket; the bucket width follows the rounded frame count
            let frames = (spec.rate as u64 * bucket_ms as u64 / 1000).max(1);
            bucket_secs = frames as f64 / spec.rate.max(1) as f64;
            BucketMeter::new(frames as usize * spec.channels.count().max(1))
        });

        let mut samples = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        samples.copy_interleaved_ref(decoded);
        for &s in samples.samples() {
            meter.push(s);
        }
    }

    let dbfs = meter.map(BucketMeter::finish).unwrap_or_default();
    log::debug!(
        "Decoded {} into {} buckets of {:.4} ms",
        path.display(),
        dbfs.len(),
        bucket_secs * 1000.0
    );

    Ok(LoudnessEnvelope { bucket_secs, dbfs })
}

/// Running RMS over fixed-size sample windows.
struct BucketMeter {
    samples_per_bucket: usize,
    sum_sq: f64,
    count: usize,
    out: Vec<f64>,
}

impl BucketMeter {
    fn new(samples_per_bucket: usize) -> Self {
        Self {
            samples_per_bucket,
            sum_sq: 0.0,
            count: 0,
            out: Vec::new(),
        }
    }

    fn push(&mut self, sample: f32) {
        self.sum_sq += (sample as f64) * (sample as f64);
        self.count += 1;
        if self.count >= self.samples_per_bucket {
            self.flush();
        }
    }

    fn flush(&mut self) {
        let rms = (self.sum_sq / self.count as f64).sqrt();
        self.out.push(dbfs_from_rms(rms));
        self.sum_sq = 0.0;
        self.count = 0;
    }

    fn finish(mut self) -> Vec<f64> {
        if self.count > 0 {
            self.flush();
        }
        self.out
    }
}

/// Full scale is 1.0; digital silence is negative infinity.
pub fn dbfs_from_rms(rms: f64) -> f64 {
    if rms <= 0.0 {
        f64::NEG_INFINITY
    } else {
        20.0 * rms.log10()
    }
}
