use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Missing story")]
    MissingStory,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    MissingConfig(String),

    #[error("{service} request failed: {message}")]
    Upstream {
        service: &'static str,
        message: String,
    },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Audio error: {0}")]
    Audio(#[from] hound::Error),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("FFmpeg failed: {message}")]
    Ffmpeg {
        message: String,
        stderr: Option<String>,
    },

    #[error("Font error: {0}")]
    Font(#[from] ab_glyph::InvalidFont),

    #[error("Blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    pub fn upstream(service: &'static str, message: impl Into<String>) -> Self {
        Self::Upstream {
            service,
            message: message.into(),
        }
    }

    /// Errors caused by the caller's input rather than a stage failing.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::MissingStory | Self::InvalidInput(_))
    }
}

pub type Result<T> = std::result::Result<T, RenderError>;
