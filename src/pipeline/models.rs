// Data model for the download/encode pipeline

use std::path::PathBuf;

use serde::Deserialize;

use super::utils::find_tool;

/// One stream variant reported by the metadata probe.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamFormat {
    /// Opaque format id (e.g. "137", "18")
    pub format_id: String,
    /// Container extension (mp4, webm, m4a)
    #[serde(default)]
    pub ext: Option<String>,
    /// Video height in pixels, if known
    #[serde(default)]
    pub height: Option<u32>,
    /// Video codec ("none" for audio-only streams)
    #[serde(default)]
    pub vcodec: Option<String>,
    /// Audio codec ("none" for video-only streams)
    #[serde(default)]
    pub acodec: Option<String>,
    /// File size in bytes, if reported
    #[serde(default)]
    pub filesize: Option<u64>,
}

/// Video metadata from the probe. An empty format list is a valid
/// degraded state: the ladder still runs, only the per-format-id
/// fallback has nothing to try.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub formats: Vec<StreamFormat>,
}

/// Outcome of a successful pipeline run. The caller owns the file at
/// `path` and is responsible for serving and eventually deleting it.
#[derive(Debug, Clone)]
pub struct DownloadResult {
    /// Final file on disk
    pub path: PathBuf,
    /// Suggested display filename for the attachment
    pub filename: String,
    /// False when the raw download was served because encoding failed
    pub encoded: bool,
}

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory for intermediate and final files
    pub work_dir: PathBuf,
    /// Path to the yt-dlp binary
    pub ytdlp_bin: String,
    /// Path to the ffmpeg binary
    pub ffmpeg_bin: String,
    /// Timeout for a single download attempt, in seconds
    pub fetch_timeout_secs: u64,
    /// Timeout for the encode step, in seconds
    pub encode_timeout_secs: u64,
    /// Timeout for the metadata probe, in seconds
    pub probe_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("data"),
            ytdlp_bin: find_tool("yt-dlp"),
            ffmpeg_bin: find_tool("ffmpeg"),
            fetch_timeout_secs: 600,
            encode_timeout_secs: 600,
            probe_timeout_secs: 30,
        }
    }
}

impl PipelineConfig {
    /// Build config from `AUTO_VIDEO_*` environment variables, falling
    /// back to defaults for anything unset.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("AUTO_VIDEO_WORK_DIR") {
            if !dir.trim().is_empty() {
                config.work_dir = PathBuf::from(dir);
            }
        }
        if let Ok(bin) = std::env::var("AUTO_VIDEO_YTDLP") {
            if !bin.trim().is_empty() {
                config.ytdlp_bin = bin;
            }
        }
        if let Ok(bin) = std::env::var("AUTO_VIDEO_FFMPEG") {
            if !bin.trim().is_empty() {
                config.ffmpeg_bin = bin;
            }
        }
        if let Some(secs) = read_secs_env("AUTO_VIDEO_FETCH_TIMEOUT") {
            config.fetch_timeout_secs = secs;
        }
        if let Some(secs) = read_secs_env("AUTO_VIDEO_ENCODE_TIMEOUT") {
            config.encode_timeout_secs = secs;
        }
        if let Some(secs) = read_secs_env("AUTO_VIDEO_PROBE_TIMEOUT") {
            config.probe_timeout_secs = secs;
        }

        config
    }

    pub fn with_work_dir(mut self, dir: PathBuf) -> Self {
        self.work_dir = dir;
        self
    }

    pub fn with_ytdlp_bin(mut self, bin: impl Into<String>) -> Self {
        self.ytdlp_bin = bin.into();
        self
    }

    pub fn with_ffmpeg_bin(mut self, bin: impl Into<String>) -> Self {
        self.ffmpeg_bin = bin.into();
        self
    }

    pub fn with_fetch_timeout(mut self, secs: u64) -> Self {
        self.fetch_timeout_secs = secs;
        self
    }

    pub fn with_encode_timeout(mut self, secs: u64) -> Self {
        self.encode_timeout_secs = secs;
        self
    }
}

fn read_secs_env(name: &str) -> Option<u64> {
    std::env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_parses_ytdlp_dump() {
        let json = r#"{
            "title": "Test Clip",
            "formats": [
                {"format_id": "18", "ext": "mp4", "height": 360, "vcodec": "avc1.42001E", "acodec": "mp4a.40.2"},
                {"format_id": "137", "ext": "mp4", "height": 1080, "vcodec": "avc1.640028", "acodec": "none", "filesize": 1000},
                {"format_id": "140", "ext": "m4a", "vcodec": "none", "acodec": "mp4a.40.2"}
            ]
        }"#;

        let meta: VideoMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta.title.as_deref(), Some("Test Clip"));
        assert_eq!(meta.formats.len(), 3);
        assert_eq!(meta.formats[1].format_id, "137");
        assert_eq!(meta.formats[1].height, Some(1080));
        assert_eq!(meta.formats[2].height, None);
    }

    #[test]
    fn metadata_tolerates_missing_fields() {
        let meta: VideoMetadata = serde_json::from_str("{}").unwrap();
        assert!(meta.title.is_none());
        assert!(meta.formats.is_empty());
    }

    #[test]
    fn builders_override_defaults() {
        let config = PipelineConfig::default()
            .with_work_dir(PathBuf::from("/tmp/av"))
            .with_ytdlp_bin("/opt/yt-dlp")
            .with_fetch_timeout(42);
        assert_eq!(config.work_dir, PathBuf::from("/tmp/av"));
        assert_eq!(config.ytdlp_bin, "/opt/yt-dlp");
        assert_eq!(config.fetch_timeout_secs, 42);
        assert_eq!(config.encode_timeout_secs, 600);
    }
}
