use axum::Json;
use axum::body::{Body, Bytes};
use axum::extract::rejection::PathRejection;
use axum::extract::{Form, FromRequest, Multipart, Path, Request, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::AppState;
use super::error::{ApiError, ApiResult};
use super::security::{is_valid_project_name, resolve_download};
use crate::batch::{BatchResult, Chapter, build_batch};
use crate::config::{DEFAULT_DEITY, DEFAULT_TARGET_DURATION};
use crate::lenient::optional_u32;
use crate::pipeline::RenderRequest;
use crate::scene::split_story_into_scenes;

/// Request body accepted as JSON, a urlencoded form, or multipart form data.
pub struct Submitted<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for Submitted<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(value) = Form::<T>::from_request(req, state)
                .await
                .map_err(|e| ApiError::bad_request(e.body_text()))?;
            return Ok(Submitted(value));
        }

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| ApiError::bad_request(e.body_text()))?;
            let fields = multipart_fields(multipart).await?;
            return serde_json::from_value(Value::Object(fields))
                .map(Submitted)
                .map_err(|e| ApiError::bad_request(format!("Invalid request body: {}", e)));
        }

        let body = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        let body: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
            b"{}"
        } else {
            &body
        };
        serde_json::from_slice(body)
            .map(Submitted)
            .map_err(|e| ApiError::bad_request(format!("Invalid request body: {}", e)))
    }
}

/// Text fields of a multipart body as a JSON object. File parts are skipped.
async fn multipart_fields(mut multipart: Multipart) -> ApiResult<Map<String, Value>> {
    let mut fields = Map::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if field.file_name().is_some() {
            debug!("Skipping uploaded file in field {}", name);
            continue;
        }
        let text = field
            .text()
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        fields.insert(name, Value::String(text));
    }
    Ok(fields)
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[derive(Debug, Deserialize)]
pub struct CreateForm {
    #[serde(default)]
    pub story: String,
    pub deity: Option<String>,
    pub voice_lang: Option<String>,
    #[serde(default, deserialize_with = "optional_u32")]
    pub duration: Option<u32>,
    pub image_prompt: Option<String>,
}

#[derive(Serialize)]
pub struct CreateResponse {
    pub ok: bool,
    pub file: String,
}

/// Renders one story into `out_<timestamp>.mp4` under the output root.
pub async fn create(
    State(state): State<AppState>,
    Submitted(form): Submitted<CreateForm>,
) -> ApiResult<Json<CreateResponse>> {
    let story = form.story.trim();
    let max_chars = state.renderer.config().max_scene_chars;
    if story.is_empty() || split_story_into_scenes(story, max_chars).is_empty() {
        return Err(ApiError::bad_request("Missing story"));
    }

    let request = RenderRequest {
        story: story.to_string(),
        deity: non_blank(form.deity).unwrap_or_else(|| DEFAULT_DEITY.to_string()),
        voice_lang: non_blank(form.voice_lang)
            .unwrap_or_else(|| state.renderer.config().voice_lang.clone()),
        target_duration: form.duration.unwrap_or(DEFAULT_TARGET_DURATION),
        image_prompt: non_blank(form.image_prompt),
    };
    let name = format!("out_{}.mp4", utc_tag());
    let out_path = state.config.output_dir.join(&name);
    info!("Create request: {} chars -> {}", story.chars().count(), name);

    let result = state.renderer.render(&request, &out_path).await;
    if result.ok {
        Ok(Json(CreateResponse {
            ok: true,
            file: format!("/download/{}", name),
        }))
    } else {
        let error = result.error.unwrap_or_else(|| "Render failed".to_string());
        Err(ApiError::Internal(error))
    }
}

#[derive(Debug, Deserialize)]
pub struct BatchForm {
    pub project: Option<String>,
    #[serde(default)]
    pub chapters: Value,
    pub deity: Option<String>,
    pub voice_lang: Option<String>,
}

#[derive(Serialize)]
pub struct BatchResponse {
    pub project: String,
    #[serde(flatten)]
    pub result: BatchResult,
}

/// Renders a list of chapters into `<output>/<project>/` with a playlist.
pub async fn batch(
    State(state): State<AppState>,
    Submitted(form): Submitted<BatchForm>,
) -> ApiResult<Json<BatchResponse>> {
    if !form.chapters.is_array() {
        return Err(ApiError::bad_request("chapters must be a list"));
    }
    let chapters: Vec<Chapter> = serde_json::from_value(form.chapters)
        .map_err(|e| ApiError::bad_request(format!("Invalid chapter: {}", e)))?;

    let project = match non_blank(form.project) {
        Some(name) if is_valid_project_name(&name) => name,
        Some(name) => {
            warn!("Rejected project name {:?}", name);
            return Err(ApiError::bad_request(
                "project may only contain letters, digits, '_' and '-' (at most 64)",
            ));
        }
        None => format!("project_{}", utc_tag()),
    };
    let deity = non_blank(form.deity).unwrap_or_else(|| DEFAULT_DEITY.to_string());
    let voice_lang =
        non_blank(form.voice_lang).unwrap_or_else(|| state.renderer.config().voice_lang.clone());
    info!("Batch request: {} chapters into {}", chapters.len(), project);

    let out_dir = state.config.output_dir.join(&project);
    let result = build_batch(
        state.renderer.as_ref(),
        &chapters,
        &deity,
        &voice_lang,
        &out_dir,
    )
    .await?;
    Ok(Json(BatchResponse { project, result }))
}

/// Serves a rendered file from the output root as an attachment.
pub async fn download(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<Response> {
    let Ok(Path(requested)) = path else {
        return Err(ApiError::NotFound);
    };
    let resolved =
        resolve_download(&state.config.output_dir, &requested).ok_or(ApiError::NotFound)?;
    let bytes = tokio::fs::read(&resolved)
        .await
        .map_err(|_| ApiError::NotFound)?;

    let file_name = resolved
        .file_name()
        .map(|n| n.to_string_lossy().replace('"', "_"))
        .unwrap_or_else(|| "download".to_string());
    let headers = [
        (CONTENT_TYPE, content_type_for(&file_name).to_string()),
        (
            CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", file_name),
        ),
    ];
    Ok((headers, Body::from(bytes)).into_response())
}

fn content_type_for(file_name: &str) -> &'static str {
    let ext = file_name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("mp4") => "video/mp4",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

fn utc_tag() -> String {
    Utc::now().format("%Y%m%d_%H%M%S").to_string()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
