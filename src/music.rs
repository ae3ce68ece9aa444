use std::path::{Path, PathBuf};

use rand::Rng;
use rand::seq::IndexedRandom;
use tracing::{debug, info};

use crate::audio::AudioTrack;
use crate::error::Result;

pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "m4a", "aac", "flac"];

/// Attenuation applied to the track before mixing (-12 dB on load, -6 dB after looping).
pub const MUSIC_GAIN_DB: f32 = -18.0;
/// Extra volume factor applied when the music goes under the narration.
pub const MUSIC_VOLUME: f32 = 0.6;
pub const FADE_OUT_SECS: f64 = 1.5;

/// Picks one supported audio file from `dir` at random. `None` when the
/// directory is missing or holds no usable tracks.
pub fn pick_track<R: Rng + ?Sized>(dir: &Path, rng: &mut R) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    let mut tracks: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_supported(path))
        .collect();
    tracks.sort();
    debug!("Found {} music tracks in {}", tracks.len(), dir.display());
    tracks.choose(rng).cloned()
}

/// [`pick_track`] on the blocking pool with a thread-local generator.
pub async fn find_track(dir: &Path) -> Result<Option<PathBuf>> {
    let dir = dir.to_path_buf();
    Ok(tokio::task::spawn_blocking(move || pick_track(&dir, &mut rand::rng())).await?)
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

/// Loads `track` and shapes it into a bed of exactly `seconds`: looped,
/// attenuated, and faded out at the tail.
pub async fn prepare_bed(
    track: &Path,
    seconds: f64,
    ffmpeg: &Path,
    scratch: &Path,
) -> Result<AudioTrack> {
    info!("Using background music {}", track.display());
    let music = AudioTrack::load(track, ffmpeg, scratch).await?;
    Ok(tokio::task::spawn_blocking(move || shape_bed(&music, seconds)).await?)
}

pub fn shape_bed(music: &AudioTrack, seconds: f64) -> AudioTrack {
    music
        .looped_to(seconds)
        .with_gain_db(MUSIC_GAIN_DB)
        .with_volume(MUSIC_VOLUME)
        .with_fade_out(FADE_OUT_SECS.min(seconds))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::config::{CHANNELS, SAMPLE_RATE};

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn missing_or_empty_dir_means_no_music() {
        let dir = tempfile::tempdir().unwrap();
        assert!(pick_track(&dir.path().join("bgm"), &mut rng()).is_none());
        assert!(pick_track(dir.path(), &mut rng()).is_none());
    }

    #[test]
    fn only_supported_extensions_are_picked() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        fs::write(dir.path().join("cover.png"), "x").unwrap();
        fs::create_dir(dir.path().join("nested.mp3")).unwrap();
        assert!(pick_track(dir.path(), &mut rng()).is_none());

        fs::write(dir.path().join("Theme.MP3"), "x").unwrap();
        fs::write(dir.path().join("drone.ogg"), "x").unwrap();
        for seed in 0..20 {
            let picked = pick_track(dir.path(), &mut StdRng::seed_from_u64(seed)).unwrap();
            let name = picked.file_name().unwrap().to_string_lossy().to_string();
            assert!(name == "Theme.MP3" || name == "drone.ogg", "{name}");
        }
    }

    #[tokio::test]
    async fn find_track_reads_the_directory_off_thread() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(find_track(dir.path()).await.unwrap(), None);
        fs::write(dir.path().join("only.wav"), b"").unwrap();
        assert_eq!(
            find_track(dir.path()).await.unwrap(),
            Some(dir.path().join("only.wav"))
        );
    }

    #[tokio::test]
    async fn short_track_is_looped_to_exact_duration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loop.wav");
        let frames = (SAMPLE_RATE as f64 * 1.3) as usize;
        AudioTrack {
            sample_rate: SAMPLE_RATE,
            channels: CHANNELS,
            samples: vec![8_000; frames * CHANNELS as usize],
        }
        .write_wav(&path)
        .unwrap();

        let bed = prepare_bed(&path, 12.0, Path::new("/nonexistent/ffmpeg"), dir.path())
            .await
            .unwrap();
        assert_eq!(bed.frames(), SAMPLE_RATE as usize * 12);
        assert_eq!(bed.duration_secs(), 12.0);
        // Attenuated well below the source level, silent at the very end.
        assert!(bed.samples[0] > 0 && bed.samples[0] < 8_000 / 10);
        assert_eq!(*bed.samples.last().unwrap(), 0);
    }

    #[test]
    fn long_track_is_truncated() {
        let long = AudioTrack::silence(30.0);
        assert_eq!(shape_bed(&long, 9.0).frames(), SAMPLE_RATE as usize * 9);
    }
}
