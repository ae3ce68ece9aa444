//! Turns a short story into a captioned, narrated 1080x1920 video.

pub mod audio;
pub mod batch;
pub mod caption;
pub mod config;
pub mod error;
pub mod ffmpeg;
pub mod image_source;
pub mod lenient;
pub mod music;
pub mod pipeline;
pub mod scene;
pub mod server;
pub mod tts;
pub mod video;

pub use error::{RenderError, Result};
pub use pipeline::{RenderRequest, RenderResult, Renderer, StoryRenderer};
