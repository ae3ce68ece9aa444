//! Multi-chapter renders with a playlist manifest.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{info, warn};

use crate::config::DEFAULT_CHAPTER_DURATION;
use crate::error::Result;
use crate::lenient::optional_u32;
use crate::pipeline::{RenderRequest, StoryRenderer};

pub const PLAYLIST_FILE: &str = "playlist.txt";

fn default_duration() -> u32 {
    DEFAULT_CHAPTER_DURATION
}

/// Numeric text is read as a number; blank or null means the default.
fn chapter_duration<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(optional_u32(deserializer)?.unwrap_or(DEFAULT_CHAPTER_DURATION))
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Chapter {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub story: String,
    #[serde(default = "default_duration", deserialize_with = "chapter_duration")]
    pub duration: u32,
}

/// One chapter's outcome.
#[derive(Debug, Clone, Serialize)]
pub struct EpisodeResult {
    pub chapter: usize,
    pub title: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// `<project>/chapter-NN.mp4`, relative to the output root
    pub file: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub ok: bool,
    /// Name of the project directory (its last path component)
    pub project_dir: String,
    pub episodes: Vec<EpisodeResult>,
    pub playlist_text: String,
}

pub fn chapter_file_name(chapter: usize) -> String {
    format!("chapter-{:02}.mp4", chapter)
}

/// Renders every chapter into `out_dir` one after another, then writes the
/// playlist. A failed chapter is recorded and the batch moves on.
pub async fn build_batch<R>(
    renderer: &R,
    chapters: &[Chapter],
    deity: &str,
    voice_lang: &str,
    out_dir: &Path,
) -> Result<BatchResult>
where
    R: StoryRenderer + Sync,
{
    tokio::fs::create_dir_all(out_dir).await?;
    let project = out_dir
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut episodes = Vec::with_capacity(chapters.len());
    for (idx, chapter) in chapters.iter().enumerate() {
        let number = idx + 1;
        let title = chapter
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Chapter {}", number));
        let file_name = chapter_file_name(number);
        info!("Chapter {}/{}: {}", number, chapters.len(), title);

        let request = RenderRequest {
            story: chapter.story.trim().to_string(),
            deity: deity.to_string(),
            voice_lang: voice_lang.to_string(),
            target_duration: chapter.duration,
            image_prompt: None,
        };
        let result = renderer.render(&request, &out_dir.join(&file_name)).await;
        if !result.ok {
            warn!(
                "Chapter {} failed: {}",
                number,
                result.error.as_deref().unwrap_or("unknown error")
            );
        }

        episodes.push(EpisodeResult {
            chapter: number,
            title,
            ok: result.ok,
            out_path: result.out_path,
            error: result.error,
            file: format!("{}/{}", project, file_name),
        });
    }

    let playlist_text = playlist(&episodes);
    tokio::fs::write(out_dir.join(PLAYLIST_FILE), &playlist_text).await?;
    let succeeded = episodes.iter().filter(|e| e.ok).count();
    info!(
        "Batch finished: {}/{} chapters rendered into {}",
        succeeded,
        episodes.len(),
        out_dir.display()
    );

    Ok(BatchResult {
        ok: true,
        project_dir: project,
        episodes,
        playlist_text,
    })
}

fn playlist(episodes: &[EpisodeResult]) -> String {
    episodes
        .iter()
        .map(|e| format!("Ep {}: {} — {}", e.chapter, e.title, chapter_file_name(e.chapter)))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::pipeline::RenderResult;

    /// Writes a marker file for non-empty stories and records every request.
    #[derive(Default)]
    struct FakeRenderer {
        seen: Mutex<Vec<(RenderRequest, PathBuf)>>,
    }

    impl StoryRenderer for FakeRenderer {
        async fn render(&self, request: &RenderRequest, out_path: &Path) -> RenderResult {
            self.seen
                .lock()
                .unwrap()
                .push((request.clone(), out_path.to_path_buf()));
            if request.story.trim().is_empty() {
                return RenderResult::failure("Missing story");
            }
            match tokio::fs::write(out_path, b"mp4").await {
                Ok(()) => RenderResult::success(out_path),
                Err(e) => RenderResult::failure(e.to_string()),
            }
        }
    }

    #[test]
    fn chapter_defaults() {
        let chapter: Chapter = serde_json::from_str("{}").unwrap();
        assert_eq!(chapter.title, None);
        assert_eq!(chapter.story, "");
        assert_eq!(chapter.duration, 24);
    }

    #[test]
    fn chapter_duration_accepts_numeric_text() {
        let parse = |body: &str| serde_json::from_str::<Chapter>(body).map(|c| c.duration);
        assert_eq!(parse(r#"{"duration": "30"}"#).unwrap(), 30);
        assert_eq!(parse(r#"{"duration": 18}"#).unwrap(), 18);
        assert_eq!(parse(r#"{"duration": ""}"#).unwrap(), 24);
        assert_eq!(parse(r#"{"duration": null}"#).unwrap(), 24);
        assert!(parse(r#"{"duration": "long"}"#).is_err());
    }

    #[tokio::test]
    async fn failed_chapter_does_not_stop_batch() {
        let root = tempfile::tempdir().unwrap();
        let out_dir = root.path().join("proj");
        let chapters: Vec<Chapter> = serde_json::from_str(
            r#"[{"title": "Dawn", "story": "  The sun rose over the hills.  ", "duration": 12},
                {"title": "Dusk", "story": ""}]"#,
        )
        .unwrap();
        let renderer = FakeRenderer::default();

        let result = build_batch(&renderer, &chapters, "Murugan", "ta", &out_dir)
            .await
            .unwrap();

        assert!(result.ok);
        assert_eq!(result.project_dir, "proj");
        assert_eq!(result.episodes.len(), 2);
        assert!(result.episodes[0].ok);
        assert_eq!(result.episodes[0].file, "proj/chapter-01.mp4");
        assert!(!result.episodes[1].ok);
        assert_eq!(result.episodes[1].error.as_deref(), Some("Missing story"));
        assert_eq!(result.episodes[1].file, "proj/chapter-02.mp4");

        assert_eq!(
            result.playlist_text,
            "Ep 1: Dawn — chapter-01.mp4\nEp 2: Dusk — chapter-02.mp4"
        );
        let on_disk = std::fs::read_to_string(out_dir.join(PLAYLIST_FILE)).unwrap();
        assert_eq!(on_disk, result.playlist_text);
        assert!(out_dir.join("chapter-01.mp4").exists());
        assert!(!out_dir.join("chapter-02.mp4").exists());

        let seen = renderer.seen.lock().unwrap();
        assert_eq!(seen[0].0.story, "The sun rose over the hills.");
        assert_eq!(seen[0].0.target_duration, 12);
        assert_eq!(seen[0].0.deity, "Murugan");
        assert_eq!(seen[1].0.target_duration, 24);
        assert_eq!(seen[1].1, out_dir.join("chapter-02.mp4"));
    }

    #[tokio::test]
    async fn untitled_chapters_are_numbered() {
        let root = tempfile::tempdir().unwrap();
        let chapters = vec![
            Chapter {
                title: None,
                story: "One.".to_string(),
                duration: 6,
            },
            Chapter {
                title: Some("  ".to_string()),
                story: "Two.".to_string(),
                duration: 6,
            },
        ];
        let result = build_batch(&FakeRenderer::default(), &chapters, "Generic", "ta", root.path())
            .await
            .unwrap();
        assert_eq!(result.episodes[0].title, "Chapter 1");
        assert_eq!(result.episodes[1].title, "Chapter 2");
    }

    #[tokio::test]
    async fn empty_batch_writes_empty_playlist() {
        let root = tempfile::tempdir().unwrap();
        let out_dir = root.path().join("empty");
        let result = build_batch(&FakeRenderer::default(), &[], "Generic", "ta", &out_dir)
            .await
            .unwrap();
        assert!(result.ok);
        assert!(result.episodes.is_empty());
        assert_eq!(std::fs::read_to_string(out_dir.join(PLAYLIST_FILE)).unwrap(), "");
    }
}
