// Subprocess and filename helpers shared by the pipeline steps

use std::path::Path;
use std::process::Command as StdCommand;

use lazy_static::lazy_static;
use regex::Regex;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;
use tokio::process::Command;
use tokio::time::{timeout, Duration};

use super::errors::DownloadError;

const TIMESTAMP_FORMAT: &[FormatItem<'static>] =
    format_description!("[year][month][day][hour][minute][second]");

/// Run a command to completion with a timeout, capturing output.
pub async fn run_with_timeout(
    program: &str,
    args: &[String],
    timeout_secs: u64,
) -> Result<std::process::Output, DownloadError> {
    let command_future = Command::new(program).args(args).kill_on_drop(true).output();

    let output = timeout(Duration::from_secs(timeout_secs), command_future)
        .await
        .map_err(|_| DownloadError::Timeout(timeout_secs))?
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DownloadError::ToolNotFound(program.to_string())
            } else {
                DownloadError::ExecutionError(format!("Failed to start {}: {}", program, e))
            }
        })?;

    Ok(output)
}

/// Find a tool binary in common install locations, then PATH.
pub fn find_tool(name: &str) -> String {
    let common_paths = [
        format!("/opt/homebrew/bin/{}", name),
        format!("/usr/local/bin/{}", name),
        format!("/usr/bin/{}", name),
    ];

    for path in common_paths {
        if Path::new(&path).exists() {
            return path;
        }
    }

    if let Ok(output) = StdCommand::new("which").arg(name).output() {
        if output.status.success() {
            if let Ok(path) = String::from_utf8(output.stdout) {
                let trimmed = path.trim();
                if !trimmed.is_empty() {
                    return trimmed.to_string();
                }
            }
        }
    }

    // Hope it's in PATH at spawn time
    name.to_string()
}

/// Timestamp-derived identifier used to build collision-free file names,
/// e.g. "20260830142755".
pub fn timestamp_id() -> String {
    OffsetDateTime::now_utc()
        .format(TIMESTAMP_FORMAT)
        .unwrap_or_else(|_| OffsetDateTime::now_utc().unix_timestamp().to_string())
}

lazy_static! {
    static ref UNSAFE_CHARS: Regex = Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).unwrap();
    static ref SPACE_RUNS: Regex = Regex::new(r"\s+").unwrap();
}

/// Make a video title safe for use as a download filename.
pub fn sanitize_filename(title: &str) -> String {
    let cleaned = UNSAFE_CHARS.replace_all(title, "_");
    let cleaned = SPACE_RUNS.replace_all(cleaned.trim(), " ");
    let cleaned = cleaned.trim_matches(|c| c == '.' || c == ' ');

    // Keep attachment names reasonable for browsers
    cleaned.chars().take(120).collect()
}

/// Delete a partial artifact left behind by a failed attempt. Missing
/// files are fine; anything else is logged and ignored.
pub async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("could not remove partial file {:?}: {}", path, e),
    }
}

/// Whether a downloaded artifact actually exists and has content.
pub async fn is_nonempty_file(path: &Path) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(meta) => meta.is_file() && meta.len() > 0,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_id_is_fourteen_digits() {
        let id = timestamp_id();
        assert_eq!(id.len(), 14);
        assert!(id.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn sanitize_strips_path_separators() {
        assert_eq!(sanitize_filename("a/b\\c: d?"), "a_b_c_ d_");
    }

    #[test]
    fn sanitize_collapses_whitespace_and_trims() {
        assert_eq!(sanitize_filename("  My   Video \t Title. "), "My Video Title");
    }

    #[test]
    fn sanitize_caps_length() {
        let long = "x".repeat(500);
        assert_eq!(sanitize_filename(&long).len(), 120);
    }

    #[tokio::test]
    async fn remove_partial_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.mp4");
        tokio::fs::write(&path, b"half").await.unwrap();

        remove_partial(&path).await;
        assert!(!path.exists());

        // Second removal of a missing file is a no-op
        remove_partial(&path).await;
    }

    #[tokio::test]
    async fn nonempty_check_rejects_empty_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.mp4");
        tokio::fs::write(&empty, b"").await.unwrap();

        assert!(!is_nonempty_file(&empty).await);
        assert!(!is_nonempty_file(&dir.path().join("missing.mp4")).await);

        let full = dir.path().join("full.mp4");
        tokio::fs::write(&full, b"data").await.unwrap();
        assert!(is_nonempty_file(&full).await);
    }

    #[tokio::test]
    async fn run_with_timeout_reports_missing_tool() {
        let err = run_with_timeout("definitely-not-a-real-binary", &[], 5)
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::ToolNotFound(_)));
    }
}
