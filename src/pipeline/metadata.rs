// Metadata probe — asks yt-dlp for the stream formats available at a URL.
//
// The probe is advisory: any failure degrades to empty metadata and the
// quality ladder runs anyway. Only the per-format-id fallback loses its
// candidates.

use tracing::{debug, warn};

use super::errors::DownloadError;
use super::models::{PipelineConfig, VideoMetadata};
use super::utils::run_with_timeout;

pub struct MetadataProbe<'a> {
    config: &'a PipelineConfig,
}

impl<'a> MetadataProbe<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    /// Query stream metadata, degrading to an empty format list on any
    /// failure.
    pub async fn fetch(&self, url: &str) -> VideoMetadata {
        match self.try_fetch(url).await {
            Ok(meta) => {
                debug!(
                    formats = meta.formats.len(),
                    title = meta.title.as_deref().unwrap_or(""),
                    "metadata probe succeeded"
                );
                meta
            }
            Err(e) => {
                warn!("metadata probe failed, continuing without formats: {}", e);
                VideoMetadata::default()
            }
        }
    }

    async fn try_fetch(&self, url: &str) -> Result<VideoMetadata, DownloadError> {
        let args = vec![
            "--dump-json".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            url.to_string(),
        ];

        let output = run_with_timeout(
            &self.config.ytdlp_bin,
            &args,
            self.config.probe_timeout_secs,
        )
        .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(last_error_line(&stderr).into());
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| DownloadError::ParseError(format!("invalid yt-dlp JSON: {}", e)))
    }
}

/// Keep the most useful line of a noisy stderr dump.
fn last_error_line(stderr: &str) -> String {
    stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .next_back()
        .unwrap_or("yt-dlp produced no diagnostics")
        .to_string()
}
