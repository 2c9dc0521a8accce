// Quality ladder — the ordered fallback list of format selectors, and the
// single-attempt fetch that walks it.
//
// Each tier is one yt-dlp selector expression. Tiers are tried highest
// quality first; a tier only counts as a success when the output file
// exists and has content. After the ladder, every format id reported by
// the metadata probe gets one attempt of its own.

use std::path::Path;

use tracing::{info, warn};

use super::errors::DownloadError;
use super::models::{PipelineConfig, StreamFormat};
use super::utils::{is_nonempty_file, remove_partial, run_with_timeout};

/// One entry in the ordered fallback list of selector profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityTier {
    /// Short label for logging
    pub label: &'static str,
    /// yt-dlp format-selector expression
    pub selector: &'static str,
}

/// Highest quality first; `legacy` is a known-good progressive MP4 id
/// that predates adaptive streams.
pub const QUALITY_LADDER: [QualityTier; 4] = [
    QualityTier {
        label: "hd",
        selector: "bestvideo[height>=720]+bestaudio/best[height>=720]",
    },
    QualityTier {
        label: "sd",
        selector: "bestvideo[height>=480][height<720]+bestaudio/best[height>=480][height<720]",
    },
    QualityTier {
        label: "any",
        selector: "bestvideo+bestaudio/best",
    },
    QualityTier {
        label: "legacy",
        selector: "18",
    },
];

/// A single planned download attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchAttempt {
    pub label: String,
    pub selector: String,
}

/// Build the full attempt sequence: the quality ladder, then one attempt
/// per reported format id, in report order.
pub fn fetch_plan(formats: &[StreamFormat]) -> Vec<FetchAttempt> {
    let mut plan: Vec<FetchAttempt> = QUALITY_LADDER
        .iter()
        .map(|tier| FetchAttempt {
            label: tier.label.to_string(),
            selector: tier.selector.to_string(),
        })
        .collect();

    for format in formats {
        plan.push(FetchAttempt {
            label: format!("format-{}", format.format_id),
            selector: format.format_id.clone(),
        });
    }

    plan
}

/// Arguments for one yt-dlp download invocation.
pub fn download_args(selector: &str, output: &Path, url: &str) -> Vec<String> {
    vec![
        "-f".to_string(),
        selector.to_string(),
        "--no-playlist".to_string(),
        "--no-warnings".to_string(),
        "--no-check-certificates".to_string(),
        "--merge-output-format".to_string(),
        "mp4".to_string(),
        "-o".to_string(),
        output.to_string_lossy().to_string(),
        url.to_string(),
    ]
}

pub struct Fetcher<'a> {
    config: &'a PipelineConfig,
}

impl<'a> Fetcher<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    /// Run one attempt of the plan. On any failure the partial artifact
    /// is removed before returning, so a rejected tier leaves nothing
    /// behind.
    pub async fn attempt(&self, attempt: &FetchAttempt, url: &str, output: &Path) -> bool {
        info!(tier = %attempt.label, selector = %attempt.selector, "trying download tier");

        let args = download_args(&attempt.selector, output, url);
        let result = run_with_timeout(
            &self.config.ytdlp_bin,
            &args,
            self.config.fetch_timeout_secs,
        )
        .await;

        match result {
            Ok(out) if out.status.success() => {
                if is_nonempty_file(output).await {
                    info!(tier = %attempt.label, "download tier succeeded");
                    return true;
                }
                warn!(tier = %attempt.label, "tier exited cleanly but produced no file");
            }
            Ok(out) => {
                let stderr = String::from_utf8_lossy(&out.stderr);
                let reason: DownloadError = stderr.to_string().into();
                warn!(tier = %attempt.label, "download tier failed: {}", reason);
            }
            Err(e) => {
                warn!(tier = %attempt.label, "download tier errored: {}", e);
            }
        }

        remove_partial(output).await;
        false
    }
}
