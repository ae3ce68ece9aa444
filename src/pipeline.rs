//! Single-story render: scenes → captioned stills → timeline → narration →
//! music → mux → encode.
//!
//! Stages run strictly in sequence. Any failure ends the render and is turned
//! into a [`RenderResult`] at [`Renderer::render`]; nothing past that boundary
//! sees an error value.

use std::future::Future;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tracing::{error, info, warn};

use crate::audio::AudioTrack;
use crate::caption::{CaptionRenderer, wrap_caption};
use crate::config::{DEFAULT_DEITY, DEFAULT_TARGET_DURATION, RenderConfig};
use crate::error::{RenderError, Result};
use crate::image_source::{ImageSource, scene_prompt};
use crate::music;
use crate::scene::{per_scene_duration, split_story_into_scenes};
use crate::tts::{Narrator, narration_text};
use crate::video::VideoAssembler;

const STEPS: usize = 6;

/// What to render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderRequest {
    pub story: String,
    pub deity: String,
    pub voice_lang: String,
    /// Requested length in seconds
    pub target_duration: u32,
    /// Used verbatim as every scene's image prompt (or URL) when present
    pub image_prompt: Option<String>,
}

impl RenderRequest {
    pub fn new(story: impl Into<String>, voice_lang: impl Into<String>) -> Self {
        Self {
            story: story.into(),
            deity: DEFAULT_DEITY.to_string(),
            voice_lang: voice_lang.into(),
            target_duration: DEFAULT_TARGET_DURATION,
            image_prompt: None,
        }
    }

    fn prompt(&self) -> String {
        match &self.image_prompt {
            Some(prompt) if !prompt.trim().is_empty() => prompt.trim().to_string(),
            _ => scene_prompt(&self.deity),
        }
    }
}

/// Outcome of one render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RenderResult {
    pub fn success(out_path: impl Into<PathBuf>) -> Self {
        Self {
            ok: true,
            out_path: Some(out_path.into()),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            out_path: None,
            error: Some(error.into()),
        }
    }
}

/// Anything that can turn a story into a video file.
pub trait StoryRenderer {
    fn render(
        &self,
        request: &RenderRequest,
        out_path: &Path,
    ) -> impl Future<Output = RenderResult> + Send;
}

pub struct Renderer {
    config: RenderConfig,
    images: ImageSource,
    captions: CaptionRenderer,
    narrator: Narrator,
    video: VideoAssembler,
}

impl Renderer {
    pub fn new(config: RenderConfig) -> Result<Self> {
        let captions = CaptionRenderer::load(&config.font_path())?;
        let images = ImageSource::new(&config, captions.font().clone())?;
        let narrator = Narrator::new(&config)?;
        let video = VideoAssembler::new(&config.ffmpeg_path);
        Ok(Self {
            config,
            images,
            captions,
            narrator,
            video,
        })
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Renders `request` to `out_path`, reporting failure as a result value.
    pub async fn render(&self, request: &RenderRequest, out_path: &Path) -> RenderResult {
        match self.try_render(request, out_path).await {
            Ok(path) => {
                info!("Render complete: {}", path.display());
                RenderResult::success(path)
            }
            Err(e) => {
                error!("Render failed: {}", e);
                RenderResult::failure(e.to_string())
            }
        }
    }

    async fn try_render(&self, request: &RenderRequest, out_path: &Path) -> Result<PathBuf> {
        info!("Step 1/{}: splitting story", STEPS);
        let scenes = split_story_into_scenes(&request.story, self.config.max_scene_chars);
        if scenes.is_empty() {
            return Err(RenderError::MissingStory);
        }
        let per_scene = per_scene_duration(request.target_duration, scenes.len());
        let timeline_secs = f64::from(per_scene) * scenes.len() as f64;
        info!(
            "{} scenes x {}s = {}s (requested {}s)",
            scenes.len(),
            per_scene,
            timeline_secs,
            request.target_duration
        );

        // Removed with everything in it when this function returns.
        let work = self.scratch_dir().await?;
        let scratch = work.path();

        info!("Step 2/{}: drawing {} scenes", STEPS, scenes.len());
        let prompt = request.prompt();
        let mut clips = Vec::with_capacity(scenes.len());
        for (idx, scene) in scenes.iter().enumerate() {
            let image = self.images.fetch(&prompt).await?;
            let captions = self.captions.clone();
            let caption = wrap_caption(scene, self.config.caption_width);
            let still = scratch.join(format!("scene_{:02}.png", idx));
            let target = still.clone();
            tokio::task::spawn_blocking(move || captions.render(&image, &caption).save(&target))
                .await??;

            let clip = scratch.join(format!("clip_{:02}.mp4", idx));
            self.video.still_clip(&still, per_scene, &clip).await?;
            clips.push(clip);
            info!("Scene {}/{} ready", idx + 1, scenes.len());
        }

        info!("Step 3/{}: assembling timeline", STEPS);
        let timeline = scratch.join("timeline.mp4");
        self.video
            .concat(&clips, &scratch.join("clips.txt"), &timeline)
            .await?;

        info!("Step 4/{}: synthesizing narration", STEPS);
        let narration_mp3 = scratch.join("narration.mp3");
        let story = scenes.join(" ");
        let spoken = narration_text(&story, timeline_secs);
        if spoken.len() < story.len() {
            info!(
                "Narration cut to {} of {} chars to fit {}s",
                spoken.chars().count(),
                story.chars().count(),
                timeline_secs
            );
        }
        self.narrator
            .synthesize(spoken, &request.voice_lang, &narration_mp3)
            .await?;
        let narration = AudioTrack::load(&narration_mp3, self.video.ffmpeg(), scratch)
            .await?
            .truncated(timeline_secs);
        if narration.duration_secs() < timeline_secs {
            info!(
                "Narration is {:.2}s; last {:.2}s play without voice",
                narration.duration_secs(),
                timeline_secs - narration.duration_secs()
            );
        }

        info!("Step 5/{}: mixing audio", STEPS);
        let bed = match music::find_track(&self.config.music_dir()).await? {
            Some(track) => Some(
                music::prepare_bed(&track, timeline_secs, self.video.ffmpeg(), scratch).await?,
            ),
            None => {
                info!("No background music found; narration only");
                None
            }
        };
        let mix_path = scratch.join("mix.wav");
        let target = mix_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut mix = AudioTrack::silence(timeline_secs);
            if let Some(bed) = &bed {
                mix = mix.overlay(bed);
            }
            mix.overlay(&narration).write_wav(&target)
        })
        .await??;

        info!("Step 6/{}: encoding", STEPS);
        let encoded = scratch.join("final.mp4");
        self.video.mux(&timeline, &mix_path, &encoded).await?;
        move_into_place(&encoded, out_path).await?;
        Ok(out_path.to_path_buf())
    }

    async fn scratch_dir(&self) -> Result<TempDir> {
        if let Some(root) = &self.config.scratch_root {
            tokio::fs::create_dir_all(root).await?;
        }
        let mut builder = tempfile::Builder::new();
        builder.prefix("storyreel-");
        let dir = match &self.config.scratch_root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        Ok(dir)
    }
}

impl StoryRenderer for Renderer {
    async fn render(&self, request: &RenderRequest, out_path: &Path) -> RenderResult {
        Renderer::render(self, request, out_path).await
    }
}

/// Moves a finished file to `dst`, creating parent directories. Falls back to
/// copy-and-delete when a rename crosses filesystems.
async fn move_into_place(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    if tokio::fs::rename(src, dst).await.is_ok() {
        return Ok(());
    }
    warn!("Rename to {} failed; copying instead", dst.display());
    tokio::fs::copy(src, dst).await?;
    tokio::fs::remove_file(src).await?;
    Ok(())
}
