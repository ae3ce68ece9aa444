//! Scene images: a local placeholder, a fetched URL, or the OpenAI images API.
//!
//! Every provider returns an RGB frame of exactly `FRAME_WIDTH x FRAME_HEIGHT`.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use ab_glyph::{FontArc, PxScale};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::imageops::FilterType;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_text_mut;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::config::{FRAME_HEIGHT, FRAME_WIDTH, RenderConfig};
use crate::error::{RenderError, Result};

const OPENAI_IMAGES_API: &str = "https://api.openai.com/v1/images/generations";
const URL_FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const GENERATION_TIMEOUT: Duration = Duration::from_secs(120);

const PLACEHOLDER_BG: Rgb<u8> = Rgb([20, 20, 20]);
const PLACEHOLDER_FG: Rgb<u8> = Rgb([230, 230, 230]);
const PLACEHOLDER_PROMPT_CHARS: usize = 60;
const PLACEHOLDER_PX: f32 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageProvider {
    /// Solid canvas with the prompt written on it, no network
    Local,
    /// Prompt is a URL to download
    Url,
    /// Prompt is sent to the image-generation API
    OpenAi,
}

impl FromStr for ImageProvider {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "url" => Ok(Self::Url),
            "openai" => Ok(Self::OpenAi),
            other => Err(RenderError::InvalidInput(format!(
                "unknown image provider '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for ImageProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Local => "local",
            Self::Url => "url",
            Self::OpenAi => "openai",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Deserialize)]
struct ImageGenerationResponse {
    data: Vec<GeneratedImage>,
}

#[derive(Debug, Deserialize)]
struct GeneratedImage {
    b64_json: Option<String>,
}

/// Prompt used for every scene of a story about `deity`.
pub fn scene_prompt(deity: &str) -> String {
    format!(
        "{} devotional portrait, temple, flowers, cinematic lighting, 9:16",
        deity
    )
}

#[derive(Clone)]
pub struct ImageSource {
    provider: ImageProvider,
    api_key: Option<String>,
    model: String,
    size: String,
    client: Client,
    font: FontArc,
}

impl ImageSource {
    pub fn new(config: &RenderConfig, font: FontArc) -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(Self {
            provider: config.image_provider,
            api_key: config.openai_api_key.clone(),
            model: config.image_model.clone(),
            size: config.image_size.clone(),
            client,
            font,
        })
    }

    pub fn provider(&self) -> ImageProvider {
        self.provider
    }

    pub async fn fetch(&self, prompt: &str) -> Result<RgbImage> {
        match self.provider {
            ImageProvider::Local => {
                let source = self.clone();
                let prompt = prompt.to_string();
                Ok(tokio::task::spawn_blocking(move || source.placeholder(&prompt)).await?)
            }
            ImageProvider::Url => self.download(prompt).await,
            ImageProvider::OpenAi => self.generate(prompt).await,
        }
    }

    /// Dark canvas with the first 60 characters of the prompt in the corner.
    pub fn placeholder(&self, prompt: &str) -> RgbImage {
        let mut img = RgbImage::from_pixel(FRAME_WIDTH, FRAME_HEIGHT, PLACEHOLDER_BG);
        draw_text_mut(
            &mut img,
            PLACEHOLDER_FG,
            40,
            40,
            PxScale::from(PLACEHOLDER_PX),
            &self.font,
            &placeholder_label(prompt),
        );
        img
    }

    async fn download(&self, url: &str) -> Result<RgbImage> {
        info!("Downloading scene image from {}", url);
        let response = self
            .client
            .get(url)
            .timeout(URL_FETCH_TIMEOUT)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RenderError::upstream(
                "Image download",
                format!("HTTP {} from {}", status, url),
            ));
        }
        let bytes = response.bytes().await?;
        tokio::task::spawn_blocking(move || decode_to_frame(&bytes)).await?
    }

    async fn generate(&self, prompt: &str) -> Result<RgbImage> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            RenderError::MissingConfig(
                "OPENAI_API_KEY not set. Or set IMAGE_PROVIDER=local".to_string(),
            )
        })?;

        info!("Generating scene image with {}", self.model);
        debug!("Image prompt: {}", prompt);
        let request_body = json!({
            "model": self.model,
            "prompt": prompt,
            "size": self.size,
        });
        let response = self
            .client
            .post(OPENAI_IMAGES_API)
            .bearer_auth(api_key)
            .json(&request_body)
            .timeout(GENERATION_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(RenderError::upstream(
                "Image generation",
                format!("HTTP {}: {}", status, error_text),
            ));
        }

        let body: ImageGenerationResponse = response.json().await?;
        let encoded = body
            .data
            .into_iter()
            .next()
            .and_then(|image| image.b64_json)
            .ok_or_else(|| RenderError::upstream("Image generation", "no image in response"))?;
        let bytes = STANDARD.decode(encoded.trim())?;
        tokio::task::spawn_blocking(move || decode_to_frame(&bytes)).await?
    }
}

fn placeholder_label(prompt: &str) -> String {
    let mut label: String = prompt.chars().take(PLACEHOLDER_PROMPT_CHARS).collect();
    label.push('…');
    label
}

/// Decodes any supported image format and stretches it to the frame size.
pub fn decode_to_frame(bytes: &[u8]) -> Result<RgbImage> {
    let decoded = image::load_from_memory(bytes)?.to_rgb8();
    if decoded.dimensions() == (FRAME_WIDTH, FRAME_HEIGHT) {
        return Ok(decoded);
    }
    Ok(image::imageops::resize(
        &decoded,
        FRAME_WIDTH,
        FRAME_HEIGHT,
        FilterType::Triangle,
    ))
}
