use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::{FPS, FRAME_HEIGHT, FRAME_WIDTH};
use crate::error::{RenderError, Result};
use crate::ffmpeg::FfmpegCommand;

/// Zoom gained per second while a still is on screen.
const ZOOM_PER_SEC: f64 = 0.03;

/// Encodes stills into clips, joins clips into a timeline, and muxes audio.
#[derive(Debug, Clone)]
pub struct VideoAssembler {
    ffmpeg: PathBuf,
}

impl VideoAssembler {
    pub fn new(ffmpeg: impl AsRef<Path>) -> Self {
        Self {
            ffmpeg: ffmpeg.as_ref().to_path_buf(),
        }
    }

    pub fn ffmpeg(&self) -> &Path {
        &self.ffmpeg
    }

    /// Holds `still` for `seconds` with a slow centred zoom.
    pub async fn still_clip(&self, still: &Path, seconds: u32, output: &Path) -> Result<()> {
        let frames = seconds * FPS;
        FfmpegCommand::new(output)
            .input(still)
            .video_filter(zoom_filter(frames))
            .output_arg("-frames:v")
            .output_arg(frames.to_string())
            .output_arg("-r")
            .output_arg(FPS.to_string())
            .video_codec("libx264")
            .output_args(["-preset", "veryfast", "-an"])
            .run(&self.ffmpeg)
            .await?;
        info!("Created {}s clip {}", seconds, output.display());
        Ok(())
    }

    /// Joins clips back to back, no transitions.
    pub async fn concat(&self, clips: &[PathBuf], list_path: &Path, output: &Path) -> Result<()> {
        if clips.is_empty() {
            return Err(RenderError::InvalidInput("no clips to concatenate".to_string()));
        }
        let mut list = String::new();
        for clip in clips {
            let abs = clip.canonicalize()?;
            list.push_str(&format!("file '{}'\n", escape_concat_path(&abs)));
        }
        tokio::fs::write(list_path, list).await?;

        FfmpegCommand::new(output)
            .input_with(list_path, ["-f", "concat", "-safe", "0"])
            .output_args(["-c", "copy"])
            .run(&self.ffmpeg)
            .await?;
        info!("Concatenated {} clips into {}", clips.len(), output.display());
        Ok(())
    }

    /// Attaches `audio` to `video`, copying the video stream.
    pub async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<()> {
        FfmpegCommand::new(output)
            .input(video)
            .input(audio)
            .output_args(["-map", "0:v:0", "-map", "1:a:0"])
            .video_codec("copy")
            .audio_codec("aac")
            .output_args(["-b:a", "192k", "-movflags", "+faststart"])
            .run(&self.ffmpeg)
            .await?;
        info!("Muxed audio into {}", output.display());
        Ok(())
    }
}

fn zoom_filter(frames: u32) -> String {
    format!(
        "scale={w}:{h},zoompan=z='1+{zoom}*on/{fps}':x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':d={frames}:s={w}x{h}:fps={fps},format=yuv420p",
        w = FRAME_WIDTH,
        h = FRAME_HEIGHT,
        zoom = ZOOM_PER_SEC,
        fps = FPS,
        frames = frames,
    )
}

/// Concat demuxer quoting: a single quote closes, escapes, and reopens.
fn escape_concat_path(path: &Path) -> String {
    path.to_string_lossy().replace('\'', "'\\''")
}
