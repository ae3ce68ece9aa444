//! Render and server configuration.
//!
//! Everything the pipeline needs from the environment is read once into these
//! structs; nothing below the binary looks at process env again.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::image_source::ImageProvider;

pub const FRAME_WIDTH: u32 = 1080;
pub const FRAME_HEIGHT: u32 = 1920;
pub const FPS: u32 = 24;
pub const SAMPLE_RATE: u32 = 44_100;
pub const CHANNELS: u16 = 2;

pub const DEFAULT_DEITY: &str = "Generic";
pub const DEFAULT_TARGET_DURATION: u32 = 20;
pub const DEFAULT_CHAPTER_DURATION: u32 = 24;

/// Settings shared by every render.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Credential for the image-generation API
    pub openai_api_key: Option<String>,
    /// Which image source scenes are drawn from
    pub image_provider: ImageProvider,
    pub image_model: String,
    /// Size requested from the generation API (result is resized to the frame)
    pub image_size: String,
    /// Narration language used when a request does not name one
    pub voice_lang: String,
    pub tts_endpoint: String,
    /// Root holding `fonts/` and `bgm/`
    pub assets_dir: PathBuf,
    pub ffmpeg_path: PathBuf,
    pub max_scene_chars: usize,
    pub caption_width: usize,
    /// Parent of each render's scratch directory; the OS temp dir when unset
    pub scratch_root: Option<PathBuf>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            image_provider: ImageProvider::OpenAi,
            image_model: "gpt-image-1".to_string(),
            image_size: "1024x1792".to_string(),
            voice_lang: "ta".to_string(),
            tts_endpoint: "https://translate.google.com/translate_tts".to_string(),
            assets_dir: PathBuf::from("assets"),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            max_scene_chars: 140,
            caption_width: 22,
            scratch_root: None,
        }
    }
}

impl RenderConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let image_provider = match std::env::var("IMAGE_PROVIDER") {
            Ok(value) => value.parse().unwrap_or_else(|_| {
                warn!("Unknown IMAGE_PROVIDER '{}', using {}", value, defaults.image_provider);
                defaults.image_provider
            }),
            Err(_) => defaults.image_provider,
        };

        Self {
            openai_api_key: std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            image_provider,
            image_model: env_or("OPENAI_IMAGE_MODEL", defaults.image_model),
            image_size: env_or("OPENAI_IMAGE_SIZE", defaults.image_size),
            voice_lang: env_or("VOICE_LANG", defaults.voice_lang),
            tts_endpoint: env_or("TTS_ENDPOINT", defaults.tts_endpoint),
            assets_dir: std::env::var("ASSETS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.assets_dir),
            ffmpeg_path: std::env::var("FFMPEG_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.ffmpeg_path),
            max_scene_chars: parsed_env_or("MAX_SCENE_CHARS", defaults.max_scene_chars),
            caption_width: parsed_env_or("CAPTION_WIDTH", defaults.caption_width),
            scratch_root: std::env::var("SCRATCH_DIR")
                .ok()
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from),
        }
    }

    pub fn font_path(&self) -> PathBuf {
        self.assets_dir.join("fonts").join("NotoSansTamil-SemiBold.ttf")
    }

    pub fn music_dir(&self) -> PathBuf {
        self.assets_dir.join("bgm")
    }
}

/// HTTP front end settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Root every rendered file is written under and served from
    pub output_dir: PathBuf,
    /// Web page and its script, served at `/` and `/static`
    pub static_dir: PathBuf,
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 10000,
            output_dir: PathBuf::from("outputs"),
            static_dir: PathBuf::from("static"),
            max_body_size: 1024 * 1024, // 1MiB
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env_or("HOST", defaults.host),
            port: parsed_env_or("PORT", defaults.port),
            output_dir: std::env::var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            static_dir: std::env::var("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_dir),
            max_body_size: parsed_env_or("MAX_BODY_SIZE", defaults.max_body_size),
        }
    }

    pub fn with_output_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.output_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_static_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.static_dir = dir.as_ref().to_path_buf();
        self
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn parsed_env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
