use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use reqwest::header::USER_AGENT;
use tracing::{debug, info};

use crate::caption::wrap_caption;
use crate::config::RenderConfig;
use crate::error::{RenderError, Result};

/// Longest text the translate endpoint accepts in one request.
pub const MAX_CHUNK_CHARS: usize = 100;
/// Upper bound on speech rate; text past `seconds * this` can never be heard.
pub const MAX_CHARS_PER_SEC: f64 = 20.0;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

static CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^.!?,;:।]+[.!?,;:।]*").expect("clause regex"));

/// Speaks a whole story through the Google Translate TTS endpoint.
#[derive(Clone)]
pub struct Narrator {
    client: Client,
    endpoint: String,
}

impl Narrator {
    pub fn new(config: &RenderConfig) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: config.tts_endpoint.clone(),
        })
    }

    /// Synthesizes `text` in `lang` and writes one MP3 to `out_path`.
    pub async fn synthesize(&self, text: &str, lang: &str, out_path: &Path) -> Result<()> {
        let chunks = tts_chunks(text, MAX_CHUNK_CHARS);
        if chunks.is_empty() {
            return Err(RenderError::InvalidInput("nothing to narrate".to_string()));
        }
        info!("Synthesizing narration ({} requests, lang={})", chunks.len(), lang);

        let total = chunks.len().to_string();
        let mut audio = Vec::new();
        for (idx, chunk) in chunks.iter().enumerate() {
            debug!("TTS chunk {}/{}: {}", idx + 1, chunks.len(), chunk);
            let index = idx.to_string();
            let textlen = chunk.chars().count().to_string();
            let response = self
                .client
                .get(&self.endpoint)
                .header(USER_AGENT, "Mozilla/5.0 storyreel/0.1")
                .query(&[
                    ("ie", "UTF-8"),
                    ("client", "tw-ob"),
                    ("tl", lang),
                    ("q", chunk.as_str()),
                    ("idx", index.as_str()),
                    ("total", total.as_str()),
                    ("textlen", textlen.as_str()),
                ])
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(RenderError::upstream(
                    "Speech synthesis",
                    format!("HTTP {} for chunk {}: {}", status, idx + 1, body.trim()),
                ));
            }
            audio.extend_from_slice(&response.bytes().await?);
        }

        tokio::fs::write(out_path, audio).await?;
        info!("Narration saved to {}", out_path.display());
        Ok(())
    }
}

/// Cuts `text` to what fits in `seconds` of speech, ending on a word boundary
/// where there is one.
pub fn narration_text(text: &str, seconds: f64) -> &str {
    let text = text.trim();
    let budget = (seconds.max(0.0) * MAX_CHARS_PER_SEC).ceil() as usize;
    let Some((cut, _)) = text.char_indices().nth(budget) else {
        return text;
    };
    let head = &text[..cut];
    let head = if text[cut..].starts_with(char::is_whitespace) {
        head
    } else {
        head.rfind(char::is_whitespace).map_or(head, |at| &head[..at])
    };
    head.trim_end()
}

/// Splits text into request-sized pieces: on clause punctuation first, then on
/// words, then on characters for words that alone exceed `max_chars`.
pub fn tts_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut pieces = Vec::new();
    for clause in CLAUSE.find_iter(text) {
        let clause = clause.as_str().trim();
        if clause.is_empty() {
            continue;
        }
        if clause.chars().count() <= max_chars {
            pieces.push(clause.to_string());
        } else {
            pieces.extend(wrap_caption(clause, max_chars).lines().map(str::to_string));
        }
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    for piece in pieces {
        let len = piece.chars().count();
        if current.is_empty() {
            current = piece;
            current_len = len;
        } else if current_len + 1 + len <= max_chars {
            current.push(' ');
            current.push_str(&piece);
            current_len += 1 + len;
        } else {
            chunks.push(std::mem::replace(&mut current, piece));
            current_len = len;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
