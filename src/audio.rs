use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tracing::debug;

use crate::config::{CHANNELS, SAMPLE_RATE};
use crate::error::Result;
use crate::ffmpeg::FfmpegCommand;

/// Interleaved 16-bit PCM held in memory. Every operation returns a new track.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioTrack {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

pub fn db_to_gain(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

impl AudioTrack {
    pub fn silence(seconds: f64) -> Self {
        let frames = (seconds.max(0.0) * SAMPLE_RATE as f64).round() as usize;
        Self {
            sample_rate: SAMPLE_RATE,
            channels: CHANNELS,
            samples: vec![0; frames * CHANNELS as usize],
        }
    }

    /// Reads a 16-bit WAV file as-is.
    pub fn from_wav(path: &Path) -> Result<Self> {
        let reader = WavReader::open(path)?;
        let spec = reader.spec();
        let samples = reader.into_samples::<i16>().collect::<std::result::Result<_, _>>()?;
        Ok(Self {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Loads any audio file as 44.1 kHz stereo. WAV files already in that
    /// layout are read directly; anything else is converted by ffmpeg into
    /// `scratch` first.
    pub async fn load(path: &Path, ffmpeg: &Path, scratch: &Path) -> Result<Self> {
        if is_native_wav(path) {
            return Self::read_off_thread(path.to_path_buf()).await;
        }

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio".to_string());
        let converted = scratch.join(format!("{}.decoded.wav", stem));
        debug!("Decoding {} to {}", path.display(), converted.display());
        FfmpegCommand::new(&converted)
            .input(path)
            .output_arg("-vn")
            .output_arg("-ar")
            .output_arg(SAMPLE_RATE.to_string())
            .output_arg("-ac")
            .output_arg(CHANNELS.to_string())
            .audio_codec("pcm_s16le")
            .run(ffmpeg)
            .await?;
        Self::read_off_thread(converted).await
    }

    async fn read_off_thread(path: PathBuf) -> Result<Self> {
        tokio::task::spawn_blocking(move || Self::from_wav(&path)).await?
    }

    pub fn write_wav(&self, path: &Path) -> Result<()> {
        let spec = WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec)?;
        for sample in &self.samples {
            writer.write_sample(*sample)?;
        }
        writer.finalize()?;
        Ok(())
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    fn frames_for(&self, seconds: f64) -> usize {
        (seconds.max(0.0) * self.sample_rate as f64).round() as usize
    }

    /// Cuts the track to at most `seconds`; a shorter track is returned whole.
    pub fn truncated(&self, seconds: f64) -> Self {
        let len = (self.frames_for(seconds) * self.channels as usize).min(self.samples.len());
        self.with_samples(self.samples[..len].to_vec())
    }

    /// Repeats the track end to end and cuts it to exactly `seconds`.
    pub fn looped_to(&self, seconds: f64) -> Self {
        let len = self.frames_for(seconds) * self.channels as usize;
        let samples = if self.samples.is_empty() {
            vec![0; len]
        } else {
            self.samples.iter().copied().cycle().take(len).collect()
        };
        self.with_samples(samples)
    }

    pub fn with_gain_db(&self, db: f32) -> Self {
        self.with_volume(db_to_gain(db))
    }

    pub fn with_volume(&self, factor: f32) -> Self {
        self.with_samples(self.samples.iter().map(|s| scale(*s, factor)).collect())
    }

    /// Linear ramp to silence over the last `seconds`.
    pub fn with_fade_out(&self, seconds: f64) -> Self {
        let channels = self.channels.max(1) as usize;
        let total = self.frames();
        let fade = self.frames_for(seconds).min(total);
        let mut samples = self.samples.clone();
        if fade == 0 {
            return self.with_samples(samples);
        }
        let start = total - fade;
        for frame in start..total {
            let remaining = (total - 1 - frame) as f32 / fade as f32;
            for ch in 0..channels {
                let idx = frame * channels + ch;
                samples[idx] = scale(samples[idx], remaining);
            }
        }
        self.with_samples(samples)
    }

    /// Mixes `other` on top, starting at zero. The result keeps this track's
    /// length; samples are summed and clamped.
    pub fn overlay(&self, other: &AudioTrack) -> Self {
        let mut samples = self.samples.clone();
        for (dst, src) in samples.iter_mut().zip(&other.samples) {
            *dst = dst.saturating_add(*src);
        }
        self.with_samples(samples)
    }

    fn with_samples(&self, samples: Vec<i16>) -> Self {
        Self {
            sample_rate: self.sample_rate,
            channels: self.channels,
            samples,
        }
    }
}

fn scale(sample: i16, factor: f32) -> i16 {
    (sample as f32 * factor)
        .round()
        .clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

fn is_native_wav(path: &Path) -> bool {
    let is_wav = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));
    if !is_wav {
        return false;
    }
    match WavReader::open(path) {
        Ok(reader) => {
            let spec = reader.spec();
            spec.sample_rate == SAMPLE_RATE
                && spec.channels == CHANNELS
                && spec.bits_per_sample == 16
                && spec.sample_format == SampleFormat::Int
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(seconds: f64, value: i16) -> AudioTrack {
        let frames = (seconds * SAMPLE_RATE as f64).round() as usize;
        AudioTrack {
            sample_rate: SAMPLE_RATE,
            channels: CHANNELS,
            samples: vec![value; frames * CHANNELS as usize],
        }
    }

    #[test]
    fn silence_has_requested_length() {
        let s = AudioTrack::silence(2.5);
        assert_eq!(s.frames(), 110_250);
        assert_eq!(s.samples.len(), 220_500);
        assert!((s.duration_secs() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn truncation_never_stretches() {
        let t = tone(2.0, 100);
        assert_eq!(t.truncated(1.0).frames(), 44_100);
        assert_eq!(t.truncated(5.0), t);
        assert_eq!(t.truncated(0.0).frames(), 0);
    }

    #[test]
    fn looping_fills_exact_duration() {
        let mut t = tone(0.7, 0);
        t.samples[0] = 42;
        let looped = t.looped_to(3.0);
        assert_eq!(looped.frames(), 132_300);
        // Each repetition starts with the marker sample.
        let period = t.samples.len();
        assert_eq!(looped.samples[period], 42);
        assert_eq!(looped.samples[period * 2], 42);
    }

    #[test]
    fn looping_empty_track_yields_silence() {
        let empty = AudioTrack::silence(0.0);
        let looped = empty.looped_to(1.0);
        assert_eq!(looped.frames(), 44_100);
        assert!(looped.samples.iter().all(|s| *s == 0));
    }

    #[test]
    fn fade_out_ends_in_silence() {
        let t = tone(2.0, 10_000).with_fade_out(1.0);
        assert_eq!(t.samples[0], 10_000);
        assert_eq!(*t.samples.last().unwrap(), 0);
        let mid = t.frames() - 22_050;
        assert!(t.samples[mid * 2] < 10_000 && t.samples[mid * 2] > 0);
    }

    #[test]
    fn overlay_keeps_base_length_and_clamps() {
        let base = tone(1.0, 30_000);
        let loud = tone(2.0, 10_000);
        let mixed = base.overlay(&loud);
        assert_eq!(mixed.frames(), base.frames());
        assert!(mixed.samples.iter().all(|s| *s == i16::MAX));

        let short = tone(0.5, 5);
        let mixed = AudioTrack::silence(1.0).overlay(&short);
        assert_eq!(mixed.samples[0], 5);
        assert_eq!(*mixed.samples.last().unwrap(), 0);
    }

    #[test]
    fn gain_in_decibels() {
        assert!((db_to_gain(-6.0) - 0.501).abs() < 0.001);
        let t = tone(0.1, 1000).with_gain_db(-20.0);
        assert_eq!(t.samples[0], 100);
    }

    #[tokio::test]
    async fn wav_files_load_without_ffmpeg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let t = tone(0.25, -1234);
        t.write_wav(&path).unwrap();

        let loaded = AudioTrack::load(&path, Path::new("/nonexistent/ffmpeg"), dir.path())
            .await
            .unwrap();
        assert_eq!(loaded, t);
    }
}
