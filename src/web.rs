// HTTP glue: the form page, the download endpoint, and file cleanup.
// Everything interesting lives in `pipeline`; this layer just moves a URL
// in and a file out.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Form, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use crate::pipeline::Pipeline;

/// How long a served file stays on disk before deferred deletion.
const SERVED_FILE_RETENTION_SECS: u64 = 20 * 60;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

#[derive(Debug, Deserialize)]
pub struct VideoForm {
    #[serde(default)]
    url: String,
}

/// Plain-text error response, per the one-shot nature of the form flow.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

const FORM_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>auto-video</title></head>
<body>
  <h1>Download a video</h1>
  <form method="post" action="/video">
    <input type="text" name="url" size="60" placeholder="https://...">
    <button type="submit">Download</button>
  </form>
</body>
</html>
"#;

pub async fn form_page() -> Html<&'static str> {
    Html(FORM_PAGE)
}

/// POST /video — run the pipeline for the submitted URL and stream the
/// result back as an attachment. Blocks for the full fetch + encode.
pub async fn submit_video(
    State(state): State<AppState>,
    Form(form): Form<VideoForm>,
) -> Result<Response, ApiError> {
    let url = form.url.trim().to_string();
    if url.is_empty() {
        return Err(ApiError::bad_request("Missing url field."));
    }

    let result = state.pipeline.run(&url).await.map_err(|e| {
        warn!(url = %url, "download failed: {}", e);
        ApiError::bad_gateway(format!("Could not download the video: {}", e))
    })?;

    let metadata = tokio::fs::metadata(&result.path)
        .await
        .map_err(|e| ApiError::internal(format!("Result file unreadable: {}", e)))?;

    let file = tokio::fs::File::open(&result.path)
        .await
        .map_err(|e| ApiError::internal(format!("Result file unreadable: {}", e)))?;
    let body = Body::from_stream(ReaderStream::new(file));

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("video/mp4"));
    headers.insert(
        CONTENT_LENGTH,
        HeaderValue::from_str(&metadata.len().to_string())
            .map_err(|_| ApiError::internal("Could not build response headers."))?,
    );
    headers.insert(
        CONTENT_DISPOSITION,
        HeaderValue::from_str(&build_content_disposition(&result.filename))
            .map_err(|_| ApiError::internal("Could not build response headers."))?,
    );

    schedule_cleanup(result.path);

    Ok((headers, body).into_response())
}

/// ASCII fallback plus RFC 5987 UTF-8 name, so non-ASCII titles survive.
fn build_content_disposition(filename: &str) -> String {
    let safe_ascii = ascii_fallback_name(filename);
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        safe_ascii,
        urlencoding::encode(filename)
    )
}

fn ascii_fallback_name(value: &str) -> String {
    let mut sanitized = String::with_capacity(value.len());
    for character in value.chars() {
        if character.is_ascii_alphanumeric()
            || matches!(character, '.' | '-' | '_' | ' ' | '(' | ')')
        {
            sanitized.push(character);
        } else {
            sanitized.push('_');
        }
    }

    let compact = sanitized.trim();
    if compact.is_empty() {
        "video.mp4".to_string()
    } else {
        compact.to_string()
    }
}

/// Delete a served file after the retention window.
fn schedule_cleanup(path: PathBuf) {
    tokio::spawn(async move {
        tokio::time::sleep(tokio::time::Duration::from_secs(SERVED_FILE_RETENTION_SECS)).await;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => info!(file = %path.display(), "removed served file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("could not remove served file {:?}: {}", path, e),
        }
    });
}

/// Sweep leftovers from previous runs out of the working directory.
pub async fn cleanup_stale_files(work_dir: &Path, older_than_secs: u64) {
    let mut entries = match tokio::fs::read_dir(work_dir).await {
        Ok(entries) => entries,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("could not open working directory for cleanup: {}", e);
            }
            return;
        }
    };

    let max_age = std::time::Duration::from_secs(older_than_secs);
    let now = std::time::SystemTime::now();

    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let Ok(metadata) = entry.metadata().await else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }

        let age = metadata
            .modified()
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .unwrap_or_default();

        if age >= max_age {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("could not remove stale file {:?}: {}", path, e);
                }
            } else {
                info!(file = %path.display(), "removed stale file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_disposition_carries_both_names() {
        let header = build_content_disposition("Café Clip.mp4");
        assert!(header.starts_with("attachment; filename=\"Caf_ Clip.mp4\""));
        assert!(header.contains("filename*=UTF-8''Caf%C3%A9%20Clip.mp4"));
    }

    #[test]
    fn ascii_fallback_never_goes_empty() {
        assert_eq!(ascii_fallback_name("日本語"), "___");
        assert_eq!(ascii_fallback_name(""), "video.mp4");
        assert_eq!(ascii_fallback_name("clip (1).mp4"), "clip (1).mp4");
    }

    #[tokio::test]
    async fn stale_sweep_only_removes_old_files() {
        let dir = tempfile::tempdir().unwrap();
        let fresh = dir.path().join("video-now.mp4");
        tokio::fs::write(&fresh, b"x").await.unwrap();

        // A zero-second threshold treats everything as stale
        cleanup_stale_files(dir.path(), 0).await;
        assert!(!fresh.exists());

        let kept = dir.path().join("video-kept.mp4");
        tokio::fs::write(&kept, b"x").await.unwrap();
        cleanup_stale_files(dir.path(), 3600).await;
        assert!(kept.exists());
    }
}
