// Transcoder — normalizes a downloaded file to a broadly playable MP4.
//
// Profile: H.264 at a fixed CRF with the ultrafast preset, AAC audio,
// yuv420p pixel format, and faststart so the container streams
// progressively. Encoding failure is never fatal; the orchestrator
// falls back to serving the raw download.

use std::path::Path;

use tracing::{info, warn};

use super::models::PipelineConfig;
use super::utils::{is_nonempty_file, run_with_timeout};

/// ffmpeg arguments for the compatibility profile.
pub fn encode_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-i".to_string(),
        input.to_string_lossy().to_string(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        "ultrafast".to_string(),
        "-crf".to_string(),
        "23".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        output.to_string_lossy().to_string(),
    ]
}

pub struct Transcoder<'a> {
    config: &'a PipelineConfig,
}

impl<'a> Transcoder<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    /// Re-encode `input` into `output`. Returns false on any failure;
    /// the caller decides whether to serve the raw file instead.
    pub async fn transcode(&self, input: &Path, output: &Path) -> bool {
        info!(input = %input.display(), output = %output.display(), "re-encoding for compatibility");

        let args = encode_args(input, output);
        let result = run_with_timeout(
            &self.config.ffmpeg_bin,
            &args,
            self.config.encode_timeout_secs,
        )
        .await;

        match result {
            Ok(out) if out.status.success() => {
                if is_nonempty_file(output).await {
                    info!("encode finished");
                    return true;
                }
                warn!("ffmpeg exited cleanly but wrote no output");
                false
            }
            Ok(out) => {
                let stderr = String::from_utf8_lossy(&out.stderr);
                let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
                warn!(
                    "ffmpeg exited with {}: {}",
                    out.status,
                    tail.into_iter().rev().collect::<Vec<_>>().join(" | ")
                );
                false
            }
            Err(e) => {
                warn!("ffmpeg invocation failed: {}", e);
                false
            }
        }
    }
}
