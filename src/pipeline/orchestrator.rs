// Pipeline orchestration: resolve formats, walk the quality ladder,
// transcode, fall back to the raw file when encoding fails.

use std::path::Path;

use tracing::{info, warn};

use super::errors::DownloadError;
use super::ladder::{fetch_plan, Fetcher};
use super::metadata::MetadataProbe;
use super::models::{DownloadResult, PipelineConfig};
use super::transcode::Transcoder;
use super::utils::{sanitize_filename, timestamp_id};

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Download and re-encode the video at `url`. Control flows strictly
    /// resolver -> transcoder -> result; the only fatal outcomes are an
    /// exhausted attempt plan and a failed final rename.
    pub async fn run(&self, url: &str) -> Result<DownloadResult, DownloadError> {
        let id = timestamp_id();
        let raw_path = self.config.work_dir.join(format!("video-{}.mp4", id));
        let final_path = self
            .config
            .work_dir
            .join(format!("video-encode-{}.mp4", id));

        info!(url, id = %id, "starting download");

        // Non-fatal: an unreachable probe just shortens the fallback plan.
        let metadata = MetadataProbe::new(&self.config).fetch(url).await;
        let plan = fetch_plan(&metadata.formats);

        let fetcher = Fetcher::new(&self.config);
        let mut fetched = false;
        for attempt in &plan {
            if fetcher.attempt(attempt, url, &raw_path).await {
                fetched = true;
                break;
            }
        }

        if !fetched {
            warn!(url, attempts = plan.len(), "every download attempt failed");
            return Err(DownloadError::Exhausted {
                attempts: plan.len(),
            });
        }

        let encoded = Transcoder::new(&self.config)
            .transcode(&raw_path, &final_path)
            .await;
        if !encoded {
            warn!("encode failed, serving raw download instead");
        }

        finalize_output(&raw_path, &final_path, encoded).await?;

        let filename = suggested_filename(metadata.title.as_deref(), &id);
        info!(file = %final_path.display(), filename = %filename, encoded, "download ready");

        Ok(DownloadResult {
            path: final_path,
            filename,
            encoded,
        })
    }
}

/// Move the right artifact into the final slot: drop the raw file after a
/// successful encode, or rename it into place when encoding failed.
pub async fn finalize_output(
    raw_path: &Path,
    final_path: &Path,
    encoded: bool,
) -> Result<(), DownloadError> {
    if encoded {
        if let Err(e) = tokio::fs::remove_file(raw_path).await {
            // Final file is intact; a stale intermediate is only noise.
            warn!("could not remove raw file {:?}: {}", raw_path, e);
        }
        Ok(())
    } else {
        tokio::fs::rename(raw_path, final_path).await?;
        Ok(())
    }
}

/// Attachment name: sanitized title when the probe gave one, otherwise the
/// timestamp-derived default.
fn suggested_filename(title: Option<&str>, id: &str) -> String {
    match title.map(sanitize_filename) {
        Some(name) if !name.is_empty() => format!("{}.mp4", name),
        _ => format!("video-{}.mp4", id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_prefers_sanitized_title() {
        assert_eq!(
            suggested_filename(Some("My: Video/Title"), "20260830120000"),
            "My_ Video_Title.mp4"
        );
    }

    #[test]
    fn filename_falls_back_to_timestamp() {
        assert_eq!(
            suggested_filename(None, "20260830120000"),
            "video-20260830120000.mp4"
        );
        assert_eq!(
            suggested_filename(Some("   "), "20260830120000"),
            "video-20260830120000.mp4"
        );
    }

    #[tokio::test]
    async fn finalize_discards_raw_after_encode() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("video-1.mp4");
        let fin = dir.path().join("video-encode-1.mp4");
        tokio::fs::write(&raw, b"raw").await.unwrap();
        tokio::fs::write(&fin, b"encoded").await.unwrap();

        finalize_output(&raw, &fin, true).await.unwrap();

        assert!(!raw.exists());
        assert_eq!(tokio::fs::read(&fin).await.unwrap(), b"encoded");
    }

    #[tokio::test]
    async fn finalize_promotes_raw_when_encode_failed() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("video-2.mp4");
        let fin = dir.path().join("video-encode-2.mp4");
        tokio::fs::write(&raw, b"raw").await.unwrap();

        finalize_output(&raw, &fin, false).await.unwrap();

        assert!(!raw.exists());
        assert_eq!(tokio::fs::read(&fin).await.unwrap(), b"raw");
    }

    #[tokio::test]
    async fn finalize_errors_when_raw_is_gone_and_encode_failed() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("video-3.mp4");
        let fin = dir.path().join("video-encode-3.mp4");

        let err = finalize_output(&raw, &fin, false).await.unwrap_err();
        assert!(matches!(err, DownloadError::Io(_)));
    }

    #[tokio::test]
    async fn exhausted_run_reports_ladder_length() {
        // With unreachable tools the probe degrades to zero formats and
        // every ladder tier fails, so the attempt count is the ladder size.
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::default()
            .with_work_dir(dir.path().to_path_buf())
            .with_ytdlp_bin("no-such-yt-dlp")
            .with_ffmpeg_bin("no-such-ffmpeg")
            .with_fetch_timeout(5);

        let err = Pipeline::new(config)
            .run("https://example.com/watch?v=x")
            .await
            .unwrap_err();

        match err {
            DownloadError::Exhausted { attempts } => {
                assert_eq!(attempts, crate::pipeline::ladder::QUALITY_LADDER.len())
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
